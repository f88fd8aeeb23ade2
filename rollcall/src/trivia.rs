//! Best-effort trivia question for the selected student.
//!
//! A request runs on its own thread and never blocks the frame loop.  Every
//! failure collapses into a fixed fallback question so the card always has
//! something to show.  Results belonging to a superseded selection are
//! dropped on arrival.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, TriviaConfig};

pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const TOKEN_FILE: &str = "gemini_api_token.txt";

pub const MISSING_KEY_QUESTION: &str = "API Key missing. Please ask the teacher a question!";
pub const NO_ANSWER: &str = "N/A";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trivia {
    pub question: String,
    pub answer:   String,
}

impl Trivia {
    pub fn missing_key() -> Self {
        Trivia { question: MISSING_KEY_QUESTION.to_string(), answer: NO_ANSWER.to_string() }
    }

    pub fn napping(name: &str) -> Self {
        Trivia {
            question: format!("Gemini is taking a nap. {}, tell us a fun fact!", name),
            answer:   NO_ANSWER.to_string(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Credential
// ════════════════════════════════════════════════════════════════════════════

/// `GEMINI_API_KEY`, else `API_KEY`, else the first non-empty token file.
pub fn load_api_key() -> Option<String> {
    let mut files = vec![PathBuf::from(TOKEN_FILE)];
    if let Some(dir) = AppConfig::config_dir() {
        files.push(dir.join(TOKEN_FILE));
    }
    api_key_from(|k| env::var(k).ok(), &files)
}

pub fn api_key_from<F>(lookup: F, files: &[PathBuf]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for var in ["GEMINI_API_KEY", "API_KEY"] {
        if let Some(v) = lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            debug!("[trivia] API key from ${}", var);
            return Some(v);
        }
    }
    for path in files {
        if let Ok(token) = fs::read_to_string(path) {
            let token = token.trim();
            if !token.is_empty() {
                info!("[trivia] loaded API token from {}", path.display());
                return Some(token.to_string());
            }
        }
    }
    None
}

// ════════════════════════════════════════════════════════════════════════════
// Request / response
// ════════════════════════════════════════════════════════════════════════════

pub fn prompt(name: &str, subject: &str) -> String {
    format!(
        "Generate a short, engaging, single-sentence trivia question for a high school \
         student named {} about the subject: {}. Also provide the answer.",
        name, subject
    )
}

pub fn request_body(name: &str, subject: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [{ "text": prompt(name, subject) }]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "question": { "type": "STRING" },
                    "answer":   { "type": "STRING" }
                },
                "required": ["question", "answer"]
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    parts: Option<Vec<Part>>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Pull the `{question, answer}` object out of a generateContent reply.
pub fn parse_response(body: &str) -> Result<Trivia> {
    let response: GeminiResponse = serde_json::from_str(body).context("Malformed response")?;
    let text: String = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts)
        .map(|parts| parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("No response text"));
    }
    serde_json::from_str(text.trim()).with_context(|| format!("Unexpected trivia payload: {}", text))
}

/// One blocking request.
pub fn fetch(api_key: &str, cfg: &TriviaConfig, name: &str) -> Result<Trivia> {
    let url = format!("{}/{}:generateContent", API_BASE, cfg.model);
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_millis(cfg.timeout_ms))
        .build();

    let response = agent
        .post(&url)
        .set("Content-Type", "application/json")
        .set("x-goog-api-key", api_key)
        .send_json(request_body(name, &cfg.subject))
        .context("Request failed")?;
    let body = response.into_string().context("Failed to read response")?;
    parse_response(&body)
}

/// Question for `name`, with the fixed fallbacks on any failure.
pub fn generate(api_key: Option<&str>, cfg: &TriviaConfig, name: &str) -> Trivia {
    let Some(key) = api_key else {
        return Trivia::missing_key();
    };
    match fetch(key, cfg, name) {
        Ok(t)  => t,
        Err(e) => {
            warn!("[trivia] {:#}", e);
            Trivia::napping(name)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TriviaService — background requests with stale-result guard
// ════════════════════════════════════════════════════════════════════════════

pub type Fetcher = Arc<dyn Fn(&str) -> Trivia + Send + Sync>;

pub struct TriviaService {
    fetcher:    Fetcher,
    tx:         Sender<(u64, Trivia)>,
    rx:         Receiver<(u64, Trivia)>,
    generation: u64,
}

impl TriviaService {
    /// Service backed by the real API (or the missing-key fallback).
    pub fn new(cfg: &TriviaConfig) -> Self {
        let key = load_api_key();
        if key.is_none() {
            warn!("[trivia] no API key; set GEMINI_API_KEY or create {}", TOKEN_FILE);
        }
        let cfg = cfg.clone();
        Self::with_fetcher(Arc::new(move |name: &str| generate(key.as_deref(), &cfg, name)))
    }

    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        let (tx, rx) = mpsc::channel();
        TriviaService { fetcher, tx, rx, generation: 0 }
    }

    /// Start a request for `name`; any earlier request becomes stale.
    pub fn request(&mut self, name: &str) {
        self.generation += 1;
        let generation = self.generation;
        let fetcher    = self.fetcher.clone();
        let tx         = self.tx.clone();
        let name       = name.to_string();
        debug!("[trivia] request #{} for {}", generation, name);
        thread::spawn(move || {
            let _ = tx.send((generation, fetcher(&name)));
        });
    }

    /// Forget any request in flight.
    pub fn cancel(&mut self) {
        self.generation += 1;
    }

    /// The result of the latest request, once it has arrived.
    pub fn poll(&mut self) -> Option<Trivia> {
        let mut latest = None;
        while let Ok((generation, trivia)) = self.rx.try_recv() {
            if generation == self.generation {
                latest = Some(trivia);
            } else {
                debug!("[trivia] dropping stale result #{}", generation);
            }
        }
        latest
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
