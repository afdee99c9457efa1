use regex::{Captures, Regex};
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{FilingError, FilingResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Pdf,
    Text,
}

impl DocumentKind {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "htm" | "html" => DocumentKind::Html,
            "pdf" => DocumentKind::Pdf,
            _ => DocumentKind::Text,
        }
    }
}

/// Plain text of a filing document.
pub fn extract_text(path: &Path) -> FilingResult<String> {
    match DocumentKind::of(path) {
        DocumentKind::Pdf => Err(FilingError::Unsupported(format!(
            "PDF extraction is not available: {}",
            path.display()
        ))),
        kind => {
            let bytes = std::fs::read(path)?;
            let raw = String::from_utf8_lossy(&bytes);
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "extracting filing text");
            Ok(if kind == DocumentKind::Html {
                html_to_text(&raw)
            } else {
                raw.into_owned()
            })
        }
    }
}

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern"));
static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("script/style pattern")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z!?][^>]*>").expect("tag pattern"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9A-Fa-f]{1,6}|#[0-9]{1,7}|[A-Za-z]{2,8});").expect("entity pattern")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Character for an entity body (`amp`, `#46`, `#x41`); `None` when unknown.
fn decode_entity(name: &str) -> Option<char> {
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "rsquo" | "lsquo" => '\'',
        "rdquo" | "ldquo" => '"',
        "mdash" | "ndash" => '-',
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            match char::from_u32(code)? {
                '\u{a0}' => ' ',
                c => c,
            }
        }
    };
    Some(ch)
}

/// Visible text of an HTML document: scripts, styles and comments dropped,
/// tags replaced by spaces, entities decoded and whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let text = COMMENT.replace_all(html, " ");
    let text = SCRIPT_OR_STYLE.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = ENTITY.replace_all(&text, |caps: &Captures| match decode_entity(&caps[1]) {
        Some(ch) => ch.to_string(),
        None => caps[0].to_string(),
    });
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
