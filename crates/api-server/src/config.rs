use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Server settings read from the environment (and `.env` when present)
#[derive(Debug, Clone)]
pub struct Config {
    pub polygon_api_key: String,
    pub bind_addr: String,
    pub fraud_model_path: Option<PathBuf>,
    pub filings_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub benchmark_ticker: String,
    pub ticker_list_limit: usize,
    pub cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let Some(polygon_api_key) = get("POLYGON_API_KEY") else {
            bail!("POLYGON_API_KEY must be set");
        };

        let ticker_list_limit = match get("TICKER_LIST_LIMIT") {
            Some(v) => v
                .parse()
                .with_context(|| format!("TICKER_LIST_LIMIT is not a number: {}", v))?,
            None => 10_000,
        };
        let cache_ttl_minutes: u64 = match get("CACHE_TTL_MINUTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("CACHE_TTL_MINUTES is not a number: {}", v))?,
            None => 60,
        };

        Ok(Self {
            polygon_api_key,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            fraud_model_path: get("FRAUD_MODEL_PATH").map(PathBuf::from),
            filings_dir: PathBuf::from(
                get("FILINGS_DIR").unwrap_or_else(|| "sec-edgar-filings".to_string()),
            ),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL")
                .unwrap_or_else(|| filings::DEFAULT_OPENAI_MODEL.to_string()),
            benchmark_ticker: get("BENCHMARK_TICKER")
                .map(|t| t.to_uppercase())
                .unwrap_or_else(|| "SPY".to_string()),
            ticker_list_limit,
            cache_ttl: Duration::from_secs(cache_ttl_minutes * 60),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("POLYGON_API_KEY", "pk")])).unwrap();
        assert_eq!(config.polygon_api_key, "pk");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.filings_dir, PathBuf::from("sec-edgar-filings"));
        assert_eq!(config.openai_model, "gpt-3.5-turbo");
        assert_eq!(config.benchmark_ticker, "SPY");
        assert!(config.fraud_model_path.is_none());
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("POLYGON_API_KEY", "pk"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("FRAUD_MODEL_PATH", "models/fraud.json"),
            ("OPENAI_API_KEY", "  "),
            ("BENCHMARK_TICKER", "qqq"),
            ("TICKER_LIST_LIMIT", "500"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.fraud_model_path, Some(PathBuf::from("models/fraud.json")));
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.benchmark_ticker, "QQQ");
        assert_eq!(config.ticker_list_limit, 500);
    }

    #[test]
    fn test_missing_key_and_bad_numbers() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("POLYGON_API_KEY", "pk"),
            ("TICKER_LIST_LIMIT", "many"),
        ]))
        .is_err());
    }
}
