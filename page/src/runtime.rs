//! One page, one gateway: the event loop glue.
//!
//! [`PageRuntime::dispatch`] applies a single user or page event
//! synchronously. Gateway calls it starts are queued as futures; the owner
//! drives them with [`PageRuntime::next_completion`] and feeds each result
//! back through [`PageRuntime::apply_completion`]. Rendered output
//! accumulates until [`PageRuntime::take_output`].

use std::future::Future;
use std::pin::Pin;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde_json::Value;
use tokio::time::Instant;

use dialectic_types::{
    AnalysisPayload, DisplayMode, DualResponse, GatewayError, MIN_TEXT_LENGTH, Request, Settings,
};

use crate::chat::{ChatSession, SubmitError, decode_dual};
use crate::detector::{AnalysisTicket, FieldDetector, InvokeRejected};
use crate::dom::{Document, NodeId, NodeSpec};
use crate::platform::classify;
use crate::render::{RenderOptions, render_payload, user_message};
use crate::selection::{Selection, SelectionMonitor};
use crate::{GatewayPort, PageConfig};

/// Attribute on the floating chat launcher.
pub const LAUNCHER_ATTR: &str = "data-dialectic-launcher";

type Pending = Pin<Box<dyn Future<Output = Completion> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Focus(NodeId),
    Blur(NodeId),
    /// The user edited a field; `text` is its new content.
    Input { field: NodeId, text: String },
    /// A field's button (or the field itself) was activated.
    ButtonPressed(NodeId),
    SelectionChanged(Option<Selection>),
    SelectionAffordanceClicked,
    LauncherClicked,
    ChatSubmit(String),
    SetDisplayMode(DisplayMode),
    SettingsChanged(Settings),
    /// Time passed with no other event.
    Tick,
}

/// A finished gateway call, ready to be applied.
#[derive(Debug)]
pub enum Completion {
    Field {
        ticket: AnalysisTicket,
        result: Result<Value, GatewayError>,
    },
    Chat {
        id: u64,
        result: Result<DualResponse, GatewayError>,
    },
}

pub struct PageRuntime<P: GatewayPort> {
    port: P,
    doc: Document,
    detector: FieldDetector,
    selection: SelectionMonitor,
    chat: ChatSession,
    settings: Settings,
    launcher: Option<NodeId>,
    pending: FuturesUnordered<Pending>,
    output: Vec<String>,
}

impl<P: GatewayPort> std::fmt::Debug for PageRuntime<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRuntime")
            .field("host", &self.doc.host())
            .field("settings", &self.settings)
            .field("tracked_fields", &self.detector.tracked().count())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<P: GatewayPort> PageRuntime<P> {
    /// Attach to `doc` with known settings. Existing fields are discovered
    /// immediately.
    pub fn new(port: P, mut doc: Document, settings: Settings, config: &PageConfig) -> Self {
        let profile = classify(doc.host());
        let mut detector = FieldDetector::new(profile, config, settings.detection_active());
        detector.reconcile(&mut doc);
        doc.take_mutations();

        tracing::debug!(
            host = doc.host(),
            platform = %profile.platform,
            fields = detector.tracked().count(),
            "Page runtime attached"
        );

        let mut runtime = Self {
            port,
            doc,
            detector,
            selection: SelectionMonitor::new(),
            chat: ChatSession::new(),
            settings,
            launcher: None,
            pending: FuturesUnordered::new(),
            output: Vec::new(),
        };
        runtime.sync_launcher();
        runtime
    }

    /// Fetch settings through `port`, then attach to an empty document for
    /// `host`. Unreadable settings fall back to defaults.
    pub async fn connect(port: P, host: &str, config: &PageConfig) -> Self {
        let settings = match port.send(Request::GetSettings).await.into_result() {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("Settings payload unreadable, using defaults: {e}");
                Settings::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {e}");
                Settings::default()
            }
        };
        Self::new(port, Document::new(host), settings, config)
    }

    #[must_use]
    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Direct access for page-side mutations. Changes are picked up on the
    /// next [`dispatch`](Self::dispatch).
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    #[must_use]
    pub fn detector(&self) -> &FieldDetector {
        &self.detector
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionMonitor {
        &self.selection
    }

    #[must_use]
    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn launcher(&self) -> Option<NodeId> {
        self.launcher
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions::from(&self.settings)
    }

    pub fn dispatch(&mut self, event: PageEvent, now: Instant) {
        match event {
            PageEvent::Focus(id) => {
                self.doc.set_focus(Some(id));
                self.detector.on_focus(&mut self.doc, id);
            }
            PageEvent::Blur(id) => {
                if self.doc.focused() == Some(id) {
                    self.doc.set_focus(None);
                }
                self.detector.on_blur(id, now);
            }
            PageEvent::Input { field, text } => {
                self.doc.set_text(field, text);
                self.detector.on_input(&mut self.doc, field);
            }
            PageEvent::ButtonPressed(id) => self.invoke_field(id),
            PageEvent::SelectionChanged(selection) => {
                self.selection
                    .on_selection_changed(&mut self.doc, selection.as_ref(), &self.settings);
            }
            PageEvent::SelectionAffordanceClicked => {
                if let Some(text) = self.selection.click(&mut self.doc) {
                    self.chat.open();
                    self.submit_chat(&text);
                }
            }
            PageEvent::LauncherClicked => {
                if self.launcher.is_some() {
                    self.chat.open();
                }
            }
            PageEvent::ChatSubmit(text) => self.submit_chat(&text),
            PageEvent::SetDisplayMode(mode) => {
                self.chat.set_display_mode(mode);
                if let Some(rendered) = self.chat.render_latest(self.render_options()) {
                    self.output.push(rendered);
                }
            }
            PageEvent::SettingsChanged(settings) => self.apply_settings(settings),
            PageEvent::Tick => {}
        }

        let mutations = self.doc.take_mutations();
        self.detector.observe(&mutations, now);
        self.detector.tick(&mut self.doc, now);
    }

    fn invoke_field(&mut self, id: NodeId) {
        let field = self.detector.field_for_button(id).unwrap_or(id);
        match self.detector.invoke(&mut self.doc, field) {
            Ok(ticket) => {
                let request = ticket.request(self.settings.mode);
                tracing::debug!(field = %field, action = %request.action(), "Field analysis started");
                let port = self.port.clone();
                self.pending.push(Box::pin(async move {
                    let result = port.send(request).await.into_result();
                    Completion::Field { ticket, result }
                }));
            }
            Err(InvokeRejected::TooShort { len }) => {
                tracing::debug!(field = %field, len, "Field text too short to analyse");
                self.output.push(format!(
                    "Write at least {MIN_TEXT_LENGTH} characters to analyse.\n"
                ));
            }
            Err(rejected) => {
                tracing::debug!(field = %field, "Field invocation ignored: {rejected}");
            }
        }
    }

    fn submit_chat(&mut self, text: &str) {
        if !self.settings.chatbot_active() || !self.chat.is_open() {
            tracing::debug!("Chat submission ignored while the chat is closed");
            self.output.push("The chat is closed.\n".to_string());
            return;
        }
        match self.chat.begin_submit(text) {
            Ok(submission) => {
                let port = self.port.clone();
                let id = submission.id;
                let request = submission.request();
                self.pending.push(Box::pin(async move {
                    let result = decode_dual(port.send(request).await);
                    Completion::Chat { id, result }
                }));
            }
            Err(err @ SubmitError::TooShort { .. }) => {
                self.output.push(format!("{err}\n"));
            }
            Err(SubmitError::Busy) => {
                self.output
                    .push("Still waiting for the previous analysis.\n".to_string());
            }
        }
    }

    fn apply_settings(&mut self, settings: Settings) {
        if settings == self.settings {
            return;
        }
        self.settings = settings;
        self.detector
            .set_enabled(&mut self.doc, settings.detection_active());
        self.selection.on_settings(&mut self.doc, &settings);
        if !settings.chatbot_active() {
            self.chat.close();
        }
        self.sync_launcher();
    }

    fn sync_launcher(&mut self) {
        match (self.settings.chatbot_active(), self.launcher) {
            (true, None) => {
                let root = self.doc.root();
                self.launcher = self.doc.append_injected(
                    root,
                    NodeSpec::new("button")
                        .attr(LAUNCHER_ATTR, "")
                        .attr("aria-label", "Open Dialectic chat")
                        .text("Dialectic"),
                );
            }
            (false, Some(launcher)) => {
                self.doc.remove(launcher);
                self.launcher = None;
            }
            _ => {}
        }
    }

    /// Wait for the next queued gateway call. `None` when nothing is queued.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.pending.next().await
    }

    pub fn apply_completion(&mut self, completion: Completion, now: Instant) {
        match completion {
            Completion::Field { ticket, result } => {
                let outcome = result.as_ref().map(|_| ()).map_err(|e| e.kind);
                if !self.detector.complete(&mut self.doc, &ticket, outcome, now) {
                    tracing::debug!(field = %ticket.field, "Discarding stale field analysis");
                    return;
                }
                let rendered = match result {
                    Ok(value) => match serde_json::from_value::<AnalysisPayload>(value) {
                        Ok(payload) => {
                            render_payload(&payload, DisplayMode::Support, self.render_options())
                        }
                        Err(e) => format!(
                            "{}\n",
                            user_message(&GatewayError::unknown(format!("unexpected payload: {e}")))
                        ),
                    },
                    Err(err) => format!("{}\n", user_message(&err)),
                };
                self.output.push(rendered);
            }
            Completion::Chat { id, result } => {
                if self.chat.settle(id, result)
                    && let Some(entry) = self.chat.entries().last()
                {
                    let rendered = self.chat.render_entry(entry, self.render_options());
                    self.output.push(rendered);
                }
            }
        }
        let mutations = self.doc.take_mutations();
        self.detector.observe(&mutations, now);
    }

    /// Drive every queued call to completion.
    pub async fn settle_all(&mut self) {
        while let Some(completion) = self.next_completion().await {
            self.apply_completion(completion, Instant::now());
        }
    }
}
