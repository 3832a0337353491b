//! AI bot adapters.
//!
//! A [`BotAdapter`] turns a prompt plus conversation history into a finite
//! stream of text fragments. Adapters never fail: a transport error becomes a
//! single [`BOT_FALLBACK_TEXT`] fragment and the stream ends.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use starly_shared::constants::BOT_FALLBACK_TEXT;

use crate::config::ClientConfig;

const SYSTEM_INSTRUCTION: &str = "You are a friendly AI assistant in Starly Chat. \
Respond in Persian. Keep it conversational and brief. Use emojis.";
const TEMPERATURE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One earlier message as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub text: String,
}

impl HistoryTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// Source of streamed AI replies.
pub trait BotAdapter: Send + Sync {
    /// Fragments of the reply to `prompt`, in order. The stream is finite and
    /// cannot be restarted.
    fn stream_reply(&self, prompt: String, history: Vec<HistoryTurn>) -> BoxStream<'static, String>;
}

/// Pick the adapter for a configuration: Gemini when an API key is set.
pub fn from_config(config: &ClientConfig) -> Arc<dyn BotAdapter> {
    match &config.api_key {
        Some(key) => {
            info!(model = %config.ai_model, "AI replies via Gemini");
            Arc::new(GeminiAdapter::new(key, &config.ai_model, &config.ai_base_url))
        }
        None => {
            warn!("No Gemini API key configured, AI replies are disabled");
            Arc::new(UnavailableBot)
        }
    }
}

// ---------------------------------------------------------------------------
// Offline adapters
// ---------------------------------------------------------------------------

/// Replays a fixed list of fragments, optionally pausing before each one.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBot {
    fragments: Vec<String>,
    delay: Option<Duration>,
}

impl ScriptedBot {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl BotAdapter for ScriptedBot {
    fn stream_reply(&self, _prompt: String, _history: Vec<HistoryTurn>) -> BoxStream<'static, String> {
        let fragments = stream::iter(self.fragments.clone());
        match self.delay {
            Some(delay) => fragments
                .then(move |fragment| async move {
                    tokio::time::sleep(delay).await;
                    fragment
                })
                .boxed(),
            None => fragments.boxed(),
        }
    }
}

/// Always answers with the fallback text.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBot;

impl BotAdapter for UnavailableBot {
    fn stream_reply(&self, _prompt: String, _history: Vec<HistoryTurn>) -> BoxStream<'static, String> {
        stream::once(async { BOT_FALLBACK_TEXT.to_string() }).boxed()
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Google Gemini `streamGenerateContent` over server-sent events.
pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiAdapter {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, self.model, self.api_key
        )
    }

    /// Request body: history turns, then the prompt as the final user turn.
    pub fn request_body(prompt: &str, history: &[HistoryTurn]) -> Value {
        let mut contents: Vec<Value> = history
            .iter()
            .map(|turn| json!({ "role": turn.role, "parts": [{ "text": turn.text }] }))
            .collect();
        contents.push(json!({ "role": TurnRole::User, "parts": [{ "text": prompt }] }));

        json!({
            "contents": contents,
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "generationConfig": { "temperature": TEMPERATURE },
        })
    }
}

impl BotAdapter for GeminiAdapter {
    fn stream_reply(&self, prompt: String, history: Vec<HistoryTurn>) -> BoxStream<'static, String> {
        debug!(model = %self.model, turns = history.len(), "Gemini request");
        let state = SseState {
            client: self.client.clone(),
            url: self.endpoint(),
            body: Self::request_body(&prompt, &history),
            bytes: None,
            decoder: SseDecoder::default(),
            ready: VecDeque::new(),
            done: false,
        };
        stream::unfold(state, next_fragment).boxed()
    }
}

type ByteStream = BoxStream<'static, reqwest::Result<Vec<u8>>>;

struct SseState {
    client: reqwest::Client,
    url: String,
    body: Value,
    bytes: Option<ByteStream>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
}

async fn connect(client: &reqwest::Client, url: &str, body: &Value) -> anyhow::Result<ByteStream> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .context("Gemini request failed")?
        .error_for_status()
        .context("Gemini returned an error status")?;
    Ok(response
        .bytes_stream()
        .map(|chunk| chunk.map(|b| b.to_vec()))
        .boxed())
}

async fn next_fragment(mut state: SseState) -> Option<(String, SseState)> {
    loop {
        if let Some(fragment) = state.ready.pop_front() {
            return Some((fragment, state));
        }
        if state.done {
            return None;
        }

        if state.bytes.is_none() {
            match connect(&state.client, &state.url, &state.body).await {
                Ok(bytes) => state.bytes = Some(bytes),
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Gemini stream failed");
                    state.done = true;
                    return Some((BOT_FALLBACK_TEXT.to_string(), state));
                }
            }
        }
        let Some(bytes) = state.bytes.as_mut() else {
            return None;
        };

        match bytes.next().await {
            Some(Ok(chunk)) => {
                let fragments = state.decoder.push(&chunk);
                state.ready.extend(fragments);
            }
            Some(Err(e)) => {
                warn!(error = %e, "Gemini stream interrupted");
                state.done = true;
                state.ready.push_back(BOT_FALLBACK_TEXT.to_string());
            }
            None => {
                let fragments = state.decoder.finish();
                state.ready.extend(fragments);
                state.done = true;
            }
        }
    }
}

/// Splits an SSE byte stream into `data:` events and extracts their text.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk; returns the text of every complete event in it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut fragments = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(text) = event_text(&String::from_utf8_lossy(&line)) {
                fragments.push(text);
            }
        }
        fragments
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        event_text(&String::from_utf8_lossy(&line)).into_iter().collect()
    }
}

/// Concatenated `candidates[].content.parts[].text` of one `data:` line.
fn event_text(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    let event: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable SSE event");
            return None;
        }
    };

    let text: String = event["candidates"]
        .as_array()?
        .iter()
        .filter_map(|candidate| candidate["content"]["parts"].as_array())
        .flatten()
        .filter_map(|part| part["text"].as_str())
        .collect();
    (!text.is_empty()).then_some(text)
}
