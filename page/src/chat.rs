//! Dual-mode chat session.
//!
//! A session owns a transcript of [`Entry`] values and at most one submission
//! in flight. Submitting is split into [`ChatSession::begin_submit`] and
//! [`ChatSession::settle`] so a caller driving many futures can keep the
//! session borrowed only briefly; [`ChatSession::submit`] runs both halves
//! against a [`GatewayPort`] for callers that can simply await.

use thiserror::Error;

use dialectic_types::{
    DisplayMode, DualResponse, ErrorKind, GatewayError, MIN_TEXT_LENGTH, Reply, Request,
    text_length,
};

use crate::GatewayPort;
use crate::render::{RenderOptions, render_dual, user_message};

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    User { text: String },
    /// Placeholder replaced when the matching submission settles.
    Loading { id: u64 },
    Response { response: DualResponse },
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("text is too short ({len} characters, minimum {MIN_TEXT_LENGTH})")]
    TooShort { len: usize },
    #[error("a submission is already in flight")]
    Busy,
}

/// A submission accepted by the session and awaiting its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub id: u64,
    pub text: String,
}

impl Submission {
    #[must_use]
    pub fn request(&self) -> Request {
        Request::analyze_dual(self.text.clone())
    }
}

#[derive(Debug, Default)]
pub struct ChatSession {
    entries: Vec<Entry>,
    display_mode: DisplayMode,
    in_flight: Option<u64>,
    next_id: u64,
    open: bool,
}

impl ChatSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Input is disabled between submit and settle.
    #[must_use]
    pub fn input_enabled(&self) -> bool {
        self.in_flight.is_none()
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Validate `text` and record it. Rejections leave the transcript untouched.
    pub fn begin_submit(&mut self, text: &str) -> Result<Submission, SubmitError> {
        if self.in_flight.is_some() {
            return Err(SubmitError::Busy);
        }
        let text = text.trim();
        let len = text_length(text);
        if len < MIN_TEXT_LENGTH {
            return Err(SubmitError::TooShort { len });
        }

        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(Entry::User {
            text: text.to_string(),
        });
        self.entries.push(Entry::Loading { id });
        self.in_flight = Some(id);
        Ok(Submission {
            id,
            text: text.to_string(),
        })
    }

    /// Replace the loading entry for `id` with the outcome. Returns `false`
    /// for an id this session is not waiting on.
    pub fn settle(&mut self, id: u64, result: Result<DualResponse, GatewayError>) -> bool {
        if self.in_flight != Some(id) {
            return false;
        }
        self.in_flight = None;

        let entry = match result {
            Ok(response) => {
                self.display_mode = DisplayMode::Support;
                Entry::Response { response }
            }
            Err(err) => {
                tracing::debug!(kind = %err.kind, "Chat submission failed");
                Entry::Error {
                    kind: err.kind,
                    message: user_message(&err),
                }
            }
        };

        match self
            .entries
            .iter_mut()
            .rev()
            .find(|e| matches!(e, Entry::Loading { id: pending } if *pending == id))
        {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
        true
    }

    /// Switch which half of the latest response is shown. Local only; the
    /// caller re-renders with [`render_latest`](Self::render_latest).
    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    #[must_use]
    pub fn latest_response(&self) -> Option<&DualResponse> {
        self.entries.iter().rev().find_map(|e| match e {
            Entry::Response { response } => Some(response),
            _ => None,
        })
    }

    /// The latest response rendered in the current display mode.
    #[must_use]
    pub fn render_latest(&self, opts: RenderOptions) -> Option<String> {
        self.latest_response()
            .map(|r| render_dual(r, self.display_mode, opts))
    }

    /// Render a single entry. Responses use the current display mode.
    #[must_use]
    pub fn render_entry(&self, entry: &Entry, opts: RenderOptions) -> String {
        match entry {
            Entry::User { text } => format!("> {text}\n"),
            Entry::Loading { .. } => "Analyzing...\n".to_string(),
            Entry::Response { response } => render_dual(response, self.display_mode, opts),
            Entry::Error { message, .. } => format!("{message}\n"),
        }
    }

    #[must_use]
    pub fn transcript(&self, opts: RenderOptions) -> String {
        self.entries
            .iter()
            .map(|e| self.render_entry(e, opts))
            .collect()
    }

    /// Submit `text` and wait for it to settle.
    pub async fn submit<P: GatewayPort>(&mut self, port: &P, text: &str) -> Result<(), SubmitError> {
        let submission = self.begin_submit(text)?;
        let reply = port.send(submission.request()).await;
        self.settle(submission.id, decode_dual(reply));
        Ok(())
    }
}

/// Interpret a gateway reply as a [`DualResponse`].
pub fn decode_dual(reply: Reply) -> Result<DualResponse, GatewayError> {
    let data = reply.into_result()?;
    serde_json::from_value(data)
        .map_err(|e| GatewayError::unknown(format!("unexpected analysis payload: {e}")))
}
