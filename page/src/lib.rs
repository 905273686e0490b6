//! Page context for Dialectic.
//!
//! Everything that runs "inside the page": a headless [`dom::Document`], the
//! per-site [`platform`] table, the [`FieldDetector`], the
//! [`SelectionMonitor`], the dual-mode [`ChatSession`] and result rendering.
//! None of it performs network I/O; every request goes through a
//! [`GatewayPort`], normally a [`dialectic_gateway::GatewayHandle`].
//!
//! [`PageRuntime`] ties the pieces to one document and one gateway and is the
//! usual entry point.

#![allow(clippy::missing_errors_doc)]

mod chat;
mod context;
mod detector;
pub mod dom;
pub mod platform;
mod render;
mod runtime;
mod selection;

use std::future::Future;
use std::time::Duration;

use dialectic_gateway::GatewayHandle;
use dialectic_types::{Reply, Request};

pub use chat::{ChatSession, Entry, SubmitError, Submission, decode_dual};
pub use context::derive_context;
pub use detector::{
    AnalysisTicket, BUTTON_FOR_ATTR, BUTTON_STATE_ATTR, FieldDetector, FieldState, InvokeRejected,
    ReconcileReport, live_buttons_for,
};
pub use render::{RenderOptions, render_dual, render_payload, user_message};
pub use runtime::{Completion, LAUNCHER_ATTR, PageEvent, PageRuntime};
pub use selection::{Rect, Selection, SelectionMonitor};

/// Timing knobs for the page context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    /// Quiet period after the last page mutation before fields are reconciled.
    pub debounce: Duration,
    /// How long a blurred field keeps its button so a click can land.
    pub blur_grace: Duration,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            blur_grace: Duration::from_millis(200),
        }
    }
}

/// The page's only way to reach the network.
pub trait GatewayPort: Clone + Send + Sync + 'static {
    fn send(&self, request: Request) -> impl Future<Output = Reply> + Send;
}

impl GatewayPort for GatewayHandle {
    fn send(&self, request: Request) -> impl Future<Output = Reply> + Send {
        GatewayHandle::send(self, request)
    }
}
