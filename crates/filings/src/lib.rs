//! Local 10-K filings: discovery on disk, text extraction, headline figures
//! and question answering over retrieved passages.

pub mod error;
pub mod extract;
pub mod index;
pub mod metrics;
pub mod qa;
pub mod retriever;

pub use error::{FilingError, FilingResult};
pub use extract::{extract_text, html_to_text, DocumentKind};
pub use index::{accession_year, is_valid_ticker, FilingIndex, FilingRecord};
pub use metrics::{headline_metrics, HeadlineMetrics};
pub use qa::{ExtractiveAnswerer, OpenAiAnswerer, QuestionAnswerer, DEFAULT_OPENAI_MODEL};
pub use retriever::{Retriever, CHUNK_WORDS, TOP_K};

/// A filing read into memory with its metrics and retrieval index
#[derive(Debug, Clone)]
pub struct LoadedFiling {
    pub record: FilingRecord,
    pub text: String,
    pub metrics: HeadlineMetrics,
    pub retriever: Retriever,
}

impl LoadedFiling {
    pub fn load(record: FilingRecord) -> FilingResult<Self> {
        let text = extract_text(&record.path)?;
        if text.trim().is_empty() {
            return Err(FilingError::NotFound(format!(
                "{} {} has no readable text",
                record.ticker, record.accession
            )));
        }
        let metrics = headline_metrics(&text);
        let retriever = Retriever::new(&text);
        tracing::info!(
            ticker = %record.ticker,
            accession = %record.accession,
            chunks = retriever.len(),
            "filing loaded"
        );
        Ok(Self {
            record,
            text,
            metrics,
            retriever,
        })
    }

    /// Answer from the top-ranked passages of this filing.
    pub async fn ask(&self, answerer: &dyn QuestionAnswerer, question: &str) -> FilingResult<String> {
        let context = self.retriever.context(question, TOP_K);
        tracing::debug!(answerer = answerer.name(), context_len = context.len(), "answering question");
        answerer.answer(question, &context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::temp_root;
    use chrono::NaiveDate;

    fn record(path: std::path::PathBuf) -> FilingRecord {
        FilingRecord {
            ticker: "AAPL".to_string(),
            accession: "0000320193-23-000106".to_string(),
            year: 2023,
            date: NaiveDate::from_ymd_opt(2023, 11, 3).unwrap(),
            path,
        }
    }

    #[tokio::test]
    async fn test_load_and_ask() {
        let root = temp_root("loaded");
        let path = root.join("aapl-20230930.htm");
        std::fs::write(
            &path,
            "<html><body><p>Total revenue was $383,285 million.</p>\
             <p>Net income of $96,995 million was reported.</p>\
             <p>The fiscal year ends on the last Saturday of September.</p></body></html>",
        )
        .unwrap();

        let filing = LoadedFiling::load(record(path)).unwrap();
        assert_eq!(filing.metrics.total_revenue, "$383,285 million");
        assert_eq!(filing.metrics.net_income, "$96,995 million");
        assert_eq!(filing.metrics.total_assets, "N/A");

        let answer = filing
            .ask(&ExtractiveAnswerer, "When does the fiscal year end?")
            .await
            .unwrap();
        assert_eq!(answer, "The fiscal year ends on the last Saturday of September.");
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let root = temp_root("empty");
        let path = root.join("empty.htm");
        std::fs::write(&path, "<html><script>x()</script></html>").unwrap();
        assert!(matches!(
            LoadedFiling::load(record(path)),
            Err(FilingError::NotFound(_))
        ));
        std::fs::remove_dir_all(&root).unwrap();
    }
}
