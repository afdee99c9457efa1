use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::FilingResult;

const FORM_DIR: &str = "10-K";
const FULL_SUBMISSION: &str = "full-submission.txt";

/// One downloaded 10-K on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingRecord {
    pub ticker: String,
    pub accession: String,
    pub year: i32,
    pub date: NaiveDate,
    #[serde(skip)]
    pub path: PathBuf,
}

static ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}-([0-9]{2})-[0-9]{6}$").expect("accession pattern"));
static TICKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9.\-]*$").expect("ticker pattern"));

/// Filing year encoded in an accession number `##########-YY-######`.
///
/// Two-digit years up to `current_yy` are this century, later ones the last.
pub fn accession_year(name: &str, current_yy: u32) -> Option<i32> {
    let yy: u32 = ACCESSION.captures(name)?[1].parse().ok()?;
    Some(if yy <= current_yy { 2000 + yy as i32 } else { 1900 + yy as i32 })
}

/// Whether an (uppercased) ticker can name a directory under the filings root.
pub fn is_valid_ticker(ticker: &str) -> bool {
    TICKER.is_match(ticker) && !ticker.contains("..")
}

/// First HTML document by name, else the full submission text.
fn primary_document(dir: &Path) -> FilingResult<Option<PathBuf>> {
    let mut html: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("htm") || e.eq_ignore_ascii_case("html"))
                    .unwrap_or(false)
        })
        .collect();
    html.sort();
    if let Some(first) = html.into_iter().next() {
        return Ok(Some(first));
    }
    let full = dir.join(FULL_SUBMISSION);
    Ok(full.is_file().then_some(full))
}

fn modified_date(path: &Path) -> FilingResult<NaiveDate> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified).date_naive())
}

#[derive(Debug, Clone, Default)]
pub struct FilingIndex {
    records: Vec<FilingRecord>,
}

impl FilingIndex {
    /// Scan `<root>/<TICKER>/10-K/<accession>` for the given tickers, or for
    /// every ticker directory when `tickers` is empty.
    pub fn scan(root: impl AsRef<Path>, tickers: &[String]) -> FilingResult<Self> {
        let current_yy = (Utc::now().year() % 100) as u32;
        Self::scan_with_year(root.as_ref(), tickers, current_yy)
    }

    pub fn scan_with_year(root: &Path, tickers: &[String], current_yy: u32) -> FilingResult<Self> {
        // Ticker directories keyed by uppercased name. Requested tickers are
        // looked up here and never joined onto `root` directly.
        let mut dirs: BTreeMap<String, PathBuf> = BTreeMap::new();
        if root.is_dir() {
            for entry in fs::read_dir(root)? {
                let path = entry?.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let ticker = name.to_uppercase();
                if path.is_dir() && is_valid_ticker(&ticker) {
                    dirs.insert(ticker, path);
                }
            }
        }

        let wanted: Vec<(String, PathBuf)> = if tickers.is_empty() {
            dirs.into_iter().collect()
        } else {
            tickers
                .iter()
                .map(|t| t.trim().to_uppercase())
                .filter_map(|t| {
                    let dir = dirs.get(&t).cloned();
                    if dir.is_none() {
                        tracing::debug!(ticker = %t, "no filings directory");
                    }
                    dir.map(|d| (t, d))
                })
                .collect()
        };

        let mut records = Vec::new();
        for (ticker, ticker_dir) in &wanted {
            let base = ticker_dir.join(FORM_DIR);
            if !base.is_dir() {
                tracing::debug!(ticker, path = %base.display(), "no 10-K directory");
                continue;
            }
            for entry in fs::read_dir(&base)? {
                let dir = entry?.path();
                if !dir.is_dir() {
                    continue;
                }
                let Some(accession) = dir.file_name().and_then(|n| n.to_str()).map(str::to_string)
                else {
                    continue;
                };
                let Some(year) = accession_year(&accession, current_yy) else {
                    continue;
                };
                let Some(path) = primary_document(&dir)? else {
                    continue;
                };
                records.push(FilingRecord {
                    ticker: ticker.clone(),
                    accession,
                    year,
                    date: modified_date(&dir)?,
                    path,
                });
            }
        }

        records.sort_by(|a, b| (&a.ticker, a.year, &a.accession).cmp(&(&b.ticker, b.year, &b.accession)));
        tracing::info!(filings = records.len(), "10-K index scanned");
        Ok(Self { records })
    }

    pub fn records(&self) -> &[FilingRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct filing years, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.records
            .iter()
            .map(|r| r.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Latest filing per (ticker, year) within `years`, ordered by date.
    pub fn select(&self, years: &[i32]) -> Vec<FilingRecord> {
        let mut matching: Vec<&FilingRecord> =
            self.records.iter().filter(|r| years.contains(&r.year)).collect();
        matching.sort_by_key(|r| r.date);

        let mut latest: HashMap<(&str, i32), usize> = HashMap::new();
        for (i, r) in matching.iter().enumerate() {
            latest.insert((r.ticker.as_str(), r.year), i);
        }
        let mut keep: Vec<usize> = latest.into_values().collect();
        keep.sort_unstable();
        keep.into_iter().map(|i| matching[i].clone()).collect()
    }

    pub fn find(&self, ticker: &str, accession: &str) -> Option<&FilingRecord> {
        self.records
            .iter()
            .find(|r| r.ticker.eq_ignore_ascii_case(ticker) && r.accession == accession)
    }
}
