//! Core domain types for Dialectic.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from the gateway, the page context, and the binary alike.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod analysis;
mod error;
mod message;
mod settings;

pub use analysis::{
    AnalysisPayload, DisplayMode, DualResponse, Element, Fallacy, FallacyDetail, FallacyEntry,
    ReplyOption, Suggestion, ToulminElements,
};
pub use error::{ErrorKind, GatewayError};
pub use message::{
    Action, AnalysisContext, AnalysisRequest, DetectRequest, Platform, PostType, Reply,
    ReplyRequest, Request, RewriteRequest, TextRequest, Tone,
};
pub use settings::{Mode, Settings, SettingsField, SettingsPatch, SettingsPatchError};

/// Minimum trimmed length (in characters) before any surface will submit text.
pub const MIN_TEXT_LENGTH: usize = 20;

/// Upper bound accepted by the upstream analysis service.
pub const MAX_TEXT_LENGTH: usize = 5000;

/// Character count of `text` after trimming surrounding whitespace.
///
/// Every length gate in the system measures text this way so that the page
/// side and the gateway agree on what "too short" means.
#[must_use]
pub fn text_length(text: &str) -> usize {
    text.trim().chars().count()
}

/// Truncate a string to at most `max` characters, appending an ellipsis when cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
