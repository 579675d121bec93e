//! External text-generation collaborator.
//!
//! Search keyword cleanup and category classification both delegate the
//! language work to a hosted generative model behind the small
//! [`TextGenerator`] seam, so handlers and tests can swap in deterministic
//! stubs. The production implementation talks to a Gemini-style
//! `generateContent` REST endpoint over a blocking `ureq` agent; callers on
//! the async side run it through `spawn_blocking`.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::Value;

/// Default endpoint of the hosted model API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One request, one reply, no retries. A failure or an empty reply degrades
/// to whatever fallback the caller defines (raw query for search, a failed
/// operation for category filtering).
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// HTTP client for the `generateContent` endpoint.
pub struct GeminiGenerator {
    agent: ureq::Agent,
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_api_base(DEFAULT_API_BASE.to_string(), api_key, model)
    }

    pub fn with_api_base(api_base: String, api_key: String, model: String) -> Self {
        // The whole request is bounded; a slow model must never stall a
        // search request past the fallback window.
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            agent,
            api_base,
            api_key,
            model,
        }
    }
}

impl TextGenerator for GeminiGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );
        let response = self
            .agent
            .post(&url)
            .send_json(ureq::json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .context("calling text-generation API")?;
        let body: Value = response
            .into_json()
            .context("reading text-generation response")?;
        let text = extract_reply_text(&body);
        if text.trim().is_empty() {
            bail!("text-generation API returned no text");
        }
        Ok(text)
    }
}

/// Pulls the reply text out of a `generateContent` response, tolerating
/// multi-part candidates and missing fields.
fn extract_reply_text(body: &Value) -> String {
    let Some(parts) = body
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
    else {
        return String::new();
    };

    let mut text = String::new();
    for part in parts {
        if let Some(piece) = part.get("text").and_then(Value::as_str) {
            text.push_str(piece);
        }
    }
    text
}

/// Prompt asking the model to typo-correct a query and break it into
/// comma-separated keywords, nothing else.
pub fn keyword_prompt(input: &str) -> String {
    format!(
        "You are a search assistant for a video streaming platform. The user query is: {input}.\n\
         Your job is:\n\
         - if query has typos, correct them.\n\
         - if query has multiple words, break them into meaningful keywords.\n\
         - return only the corrected word(s), comma-separated.\n\
         - do not explain anything, just return the keywords.\n"
    )
}

/// Prompt asking the model to map a query onto the fixed category taxonomy.
/// Multiple comma-separated names are allowed; when nothing fits, exactly
/// one closest name must come back; prose and JSON are forbidden.
pub fn category_prompt(input: &str, categories: &[&str]) -> String {
    format!(
        "You are a category classifier for a video streaming platform.\n\
         The user query is {input}\n\
         Your job:\n\
         - Match this query with the most relevant categories from this list: {}\n\
         - If more than one category fits, return them comma-separated.\n\
         - If nothing fits, return the single closest category.\n\
         - Do NOT explain anything. Do NOT return JSON. Only return category names.\n\
         \n\
         Examples:\n\
         - \"arijit singh songs\" -> \"Music\"\n\
         - \"pubg gameplay\" -> \"Gaming\"\n\
         - \"netflix web series\" -> \"TV Shows\"\n\
         - \"india latest news\" -> \"News\"\n\
         - \"funny animal videos\" -> \"Comedy, Pets\"\n\
         - \"fitness tips\" -> \"Education, Sports\"\n",
        categories.join(",")
    )
}
