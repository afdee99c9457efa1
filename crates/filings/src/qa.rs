use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{FilingError, FilingResult};
use crate::retriever::terms;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const SYSTEM_PROMPT: &str = "You are a helpful financial assistant.";
const NO_ANSWER: &str = "No answer found in the filing.";

/// Answers a question from retrieved filing context
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn answer(&self, question: &str, context: &str) -> FilingResult<String>;
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let boundary = matches!(c, '.' | '?' | '!')
            && chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if boundary {
            let s = text[start..i + c.len_utf8()].trim();
            if !s.is_empty() {
                out.push(s);
            }
            start = i + c.len_utf8();
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

/// Picks the context sentence sharing the most informative terms with the
/// question. Terms are weighted by how rare they are across sentences.
#[derive(Debug, Clone, Default)]
pub struct ExtractiveAnswerer;

impl ExtractiveAnswerer {
    pub fn best_sentence<'a>(&self, question: &str, context: &'a str) -> Option<&'a str> {
        let question_terms: HashSet<String> = terms(question).into_iter().collect();
        let candidates = sentences(context);
        let sentence_terms: Vec<HashSet<String>> = candidates
            .iter()
            .map(|s| terms(s).into_iter().collect())
            .collect();

        let n = candidates.len() as f64;
        let weight = |term: &String| {
            let df = sentence_terms.iter().filter(|ts| ts.contains(term)).count() as f64;
            (1.0 + n / (1.0 + df)).ln()
        };

        let mut best: Option<(usize, f64)> = None;
        for (i, ts) in sentence_terms.iter().enumerate() {
            let score: f64 = question_terms.iter().filter(|t| ts.contains(*t)).map(&weight).sum();
            if score > 0.0 && best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| candidates[i])
    }
}

#[async_trait]
impl QuestionAnswerer for ExtractiveAnswerer {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn answer(&self, question: &str, context: &str) -> FilingResult<String> {
        Ok(self
            .best_sentence(question, context)
            .unwrap_or(NO_ANSWER)
            .to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// OpenAI chat-completions client restricted to the retrieved context
#[derive(Clone)]
pub struct OpenAiAnswerer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiAnswerer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> FilingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_OPENAI_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, question: &str, context: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!(
                        "Use ONLY the context below to answer the question.\n\n\
                         CONTEXT:\n{}\n\nQUESTION:\n{}\n\nAnswer concisely.",
                        context, question
                    ),
                },
            ],
            max_tokens: 300,
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl QuestionAnswerer for OpenAiAnswerer {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn answer(&self, question: &str, context: &str) -> FilingResult<String> {
        if self.api_key.is_empty() {
            return Err(FilingError::MissingApiKey("OpenAI"));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request(question, context))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "OpenAI request failed");
            return Err(FilingError::ServiceUnavailable(format!(
                "Status: {} {}",
                status, body
            )));
        }

        let parsed = response.json::<ChatResponse>().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| FilingError::InvalidResponse("no completion returned".to_string()))
    }
}
