//! Field detector: discovery of editable fields and their activation buttons.
//!
//! Each tracked field runs a small state machine:
//!
//! ```text
//! (untracked) ──discover──▶ Idle ──focus──▶ Active ──invoke──▶ Analyzing
//!                            ▲               │  ▲                  │
//!                            └──blur/empty───┘  └────success───────┤
//!                                                                  ▼
//!                                                                Error
//! ```
//!
//! A button exists exactly while the state is `Active`, `Analyzing` or `Error`,
//! and every button is created from `Idle`, so a field never has more than one.
//!
//! Discovery is event-sourced: document mutations only mark the candidate set
//! dirty, and [`FieldDetector::tick`] reconciles once the page has been quiet
//! for the debounce interval, or once the set has stayed dirty for
//! [`MAX_WAIT_FACTOR`] debounce intervals on a page that never goes quiet.
//! Reconciliation is idempotent.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use dialectic_types::{
    AnalysisContext, AnalysisRequest, DetectRequest, ErrorKind, MIN_TEXT_LENGTH, Mode,
    ReplyRequest, Request, Tone, text_length,
};

use crate::PageConfig;
use crate::context::derive_context;
use crate::dom::{Document, Mutation, NodeId, NodeSpec};
use crate::platform::{FieldKind, PlatformProfile};

/// Attribute linking a button to the field it belongs to.
pub const BUTTON_FOR_ATTR: &str = "data-dialectic-for";
pub const BUTTON_STATE_ATTR: &str = "data-state";

/// A dirty candidate set is reconciled after at most this many debounce
/// intervals, however busy the page is.
pub const MAX_WAIT_FACTOR: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Idle,
    Active { button: NodeId },
    Analyzing { button: NodeId },
    Error { button: NodeId, kind: ErrorKind },
}

impl FieldState {
    #[must_use]
    pub const fn button(&self) -> Option<NodeId> {
        match self {
            FieldState::Idle => None,
            FieldState::Active { button }
            | FieldState::Analyzing { button }
            | FieldState::Error { button, .. } => Some(*button),
        }
    }
}

#[derive(Debug)]
struct TrackedField {
    kind: FieldKind,
    state: FieldState,
    focused: bool,
    /// Set on blur; the button goes away at this instant unless clicked.
    hide_at: Option<Instant>,
    generation: u64,
}

/// Everything needed to issue and later settle one field analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisTicket {
    pub field: NodeId,
    generation: u64,
    pub text: String,
    pub context: AnalysisContext,
}

impl AnalysisTicket {
    /// The gateway request for this ticket under the current mode.
    #[must_use]
    pub fn request(&self, mode: Mode) -> Request {
        let text = self.text.clone();
        match mode {
            Mode::Writing => Request::AnalyzeText(AnalysisRequest {
                text,
                context: self.context.clone(),
            }),
            Mode::Reading => Request::DetectFallacies(DetectRequest {
                text,
                use_local_only: true,
            }),
            Mode::Reply => {
                let (original_post, draft_reply) = match &self.context.original_post {
                    Some(post) => (post.clone(), text),
                    None => (text, String::new()),
                };
                Request::GenerateReply(ReplyRequest {
                    original_post,
                    draft_reply,
                    tone: Tone::Neutral,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvokeRejected {
    #[error("field has no active button")]
    NotActive,
    #[error("analysis already in progress")]
    AlreadyAnalyzing,
    #[error("text is too short to analyse ({len} characters, minimum {MIN_TEXT_LENGTH})")]
    TooShort { len: usize },
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub attached: usize,
    pub detached: usize,
}

#[derive(Debug)]
pub struct FieldDetector {
    profile: &'static PlatformProfile,
    debounce: Duration,
    blur_grace: Duration,
    enabled: bool,
    fields: BTreeMap<NodeId, TrackedField>,
    last_mutation: Option<Instant>,
    dirty_since: Option<Instant>,
    next_generation: u64,
}

impl FieldDetector {
    #[must_use]
    pub fn new(profile: &'static PlatformProfile, config: &PageConfig, enabled: bool) -> Self {
        Self {
            profile,
            debounce: config.debounce,
            blur_grace: config.blur_grace,
            enabled,
            fields: BTreeMap::new(),
            last_mutation: None,
            dirty_since: None,
            next_generation: 0,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &'static PlatformProfile {
        self.profile
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn tracked(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.fields.keys().copied()
    }

    #[must_use]
    pub fn state(&self, field: NodeId) -> Option<FieldState> {
        self.fields.get(&field).map(|f| f.state)
    }

    #[must_use]
    pub fn button_for(&self, field: NodeId) -> Option<NodeId> {
        self.fields.get(&field).and_then(|f| f.state.button())
    }

    /// The field owning `button`, if it is one of ours.
    #[must_use]
    pub fn field_for_button(&self, button: NodeId) -> Option<NodeId> {
        self.fields
            .iter()
            .find(|(_, f)| f.state.button() == Some(button))
            .map(|(id, _)| *id)
    }

    /// Note page mutations. Changes inside our own UI are ignored.
    /// Returns whether the candidate set was marked dirty.
    pub fn observe(&mut self, mutations: &[Mutation], now: Instant) -> bool {
        if mutations.iter().all(Mutation::is_injected) {
            return false;
        }
        self.last_mutation = Some(now);
        self.dirty_since.get_or_insert(now);
        true
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.last_mutation.is_some()
    }

    /// Drive time-based transitions: debounced reconciliation and blur grace.
    pub fn tick(&mut self, doc: &mut Document, now: Instant) {
        if self.reconcile_due(now) {
            self.last_mutation = None;
            self.dirty_since = None;
            let report = self.reconcile(doc);
            if report.attached > 0 || report.detached > 0 {
                tracing::debug!(
                    attached = report.attached,
                    detached = report.detached,
                    tracked = self.fields.len(),
                    "Reconciled editable fields"
                );
            }
        }

        let expired: Vec<NodeId> = self
            .fields
            .iter()
            .filter(|(_, f)| !f.focused && f.hide_at.is_some_and(|at| at <= now))
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            let Some(field) = self.fields.get_mut(&id) else {
                continue;
            };
            field.hide_at = None;
            if let FieldState::Active { button } | FieldState::Error { button, .. } = field.state {
                doc.remove(button);
                field.state = FieldState::Idle;
            }
        }
    }

    fn reconcile_due(&self, now: Instant) -> bool {
        let (Some(last), Some(since)) = (self.last_mutation, self.dirty_since) else {
            return false;
        };
        now.saturating_duration_since(last) >= self.debounce
            || now.saturating_duration_since(since) >= self.debounce * MAX_WAIT_FACTOR
    }

    /// Bring the tracked set in line with the document's current candidates.
    pub fn reconcile(&mut self, doc: &mut Document) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let candidates: BTreeMap<NodeId, FieldKind> = doc
            .all_nodes()
            .into_iter()
            .filter(|id| !doc.is_injected(*id))
            .filter_map(|id| {
                let kind = self.profile.field_kind(doc.node(id)?)?;
                Some((id, kind))
            })
            .collect();

        let gone: Vec<NodeId> = self
            .fields
            .keys()
            .filter(|id| !candidates.contains_key(id))
            .copied()
            .collect();
        for id in gone {
            if let Some(field) = self.fields.remove(&id)
                && let Some(button) = field.state.button()
            {
                doc.remove(button);
            }
            report.detached += 1;
        }

        for (id, kind) in candidates {
            if self.fields.contains_key(&id) {
                continue;
            }
            let field = self.new_field(kind);
            self.fields.insert(id, field);
            report.attached += 1;
            if doc.focused() == Some(id) {
                self.activate_if_ready(doc, id);
            }
        }
        report
    }

    fn new_field(&mut self, kind: FieldKind) -> TrackedField {
        TrackedField {
            kind,
            state: FieldState::Idle,
            focused: false,
            hide_at: None,
            generation: self.bump_generation(),
        }
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Track `id` now if it is a candidate the debounced pass has not reached yet.
    fn ensure_tracked(&mut self, doc: &Document, id: NodeId) -> bool {
        if self.fields.contains_key(&id) {
            return true;
        }
        if doc.is_injected(id) {
            return false;
        }
        let Some(kind) = doc.node(id).and_then(|n| self.profile.field_kind(n)) else {
            return false;
        };
        let field = self.new_field(kind);
        self.fields.insert(id, field);
        true
    }

    pub fn on_focus(&mut self, doc: &mut Document, id: NodeId) {
        if !self.ensure_tracked(doc, id) {
            return;
        }
        if let Some(field) = self.fields.get_mut(&id) {
            field.focused = true;
            field.hide_at = None;
        }
        self.activate_if_ready(doc, id);
    }

    pub fn on_blur(&mut self, id: NodeId, now: Instant) {
        let grace = self.blur_grace;
        let Some(field) = self.fields.get_mut(&id) else {
            return;
        };
        field.focused = false;
        if matches!(field.state, FieldState::Active { .. } | FieldState::Error { .. }) {
            field.hide_at = Some(now + grace);
        }
    }

    /// Content changed. Only rich-editable fields react: they gain a button on
    /// the first non-empty content and lose it when emptied.
    pub fn on_input(&mut self, doc: &mut Document, id: NodeId) {
        let Some(field) = self.fields.get(&id) else {
            return;
        };
        if field.kind != FieldKind::RichEditable {
            return;
        }
        let state = field.state;
        let empty = field_text(doc, id, field.kind).trim().is_empty();

        match state {
            FieldState::Idle if !empty => self.activate_if_ready(doc, id),
            FieldState::Active { button } | FieldState::Error { button, .. } if empty => {
                doc.remove(button);
                if let Some(field) = self.fields.get_mut(&id) {
                    field.state = FieldState::Idle;
                    field.hide_at = None;
                }
            }
            _ => {}
        }
    }

    fn activate_if_ready(&mut self, doc: &mut Document, id: NodeId) {
        if !self.enabled {
            return;
        }
        let Some(field) = self.fields.get(&id) else {
            return;
        };
        if !field.focused && doc.focused() != Some(id) {
            return;
        }
        if field.state != FieldState::Idle {
            return;
        }
        if field.kind == FieldKind::RichEditable && field_text(doc, id, field.kind).trim().is_empty()
        {
            return;
        }

        let Some(button) = insert_button(doc, id) else {
            return;
        };
        if let Some(field) = self.fields.get_mut(&id) {
            field.focused = true;
            field.state = FieldState::Active { button };
        }
    }

    /// The user pressed the field's button.
    pub fn invoke(&mut self, doc: &mut Document, id: NodeId) -> Result<AnalysisTicket, InvokeRejected> {
        let generation = self.bump_generation();
        let profile = self.profile;
        let field = self.fields.get_mut(&id).ok_or(InvokeRejected::NotActive)?;

        let button = match field.state {
            FieldState::Active { button } | FieldState::Error { button, .. } => button,
            FieldState::Analyzing { .. } => return Err(InvokeRejected::AlreadyAnalyzing),
            FieldState::Idle => return Err(InvokeRejected::NotActive),
        };

        let text = field_text(doc, id, field.kind).trim().to_string();
        let len = text_length(&text);
        if len < MIN_TEXT_LENGTH {
            return Err(InvokeRejected::TooShort { len });
        }

        field.state = FieldState::Analyzing { button };
        field.hide_at = None;
        field.generation = generation;
        doc.set_attr(button, BUTTON_STATE_ATTR, "analyzing");

        Ok(AnalysisTicket {
            field: id,
            generation,
            text,
            context: derive_context(doc, id, profile),
        })
    }

    /// Settle a ticket. Stale tickets (field gone, detector toggled, or a newer
    /// invocation) are ignored and return `false`.
    pub fn complete(
        &mut self,
        doc: &mut Document,
        ticket: &AnalysisTicket,
        outcome: Result<(), ErrorKind>,
        now: Instant,
    ) -> bool {
        let grace = self.blur_grace;
        let Some(field) = self.fields.get_mut(&ticket.field) else {
            return false;
        };
        let FieldState::Analyzing { button } = field.state else {
            return false;
        };
        if field.generation != ticket.generation {
            return false;
        }

        match outcome {
            Ok(()) if field.focused => {
                doc.set_attr(button, BUTTON_STATE_ATTR, "idle");
                field.state = FieldState::Active { button };
            }
            Ok(()) => {
                doc.remove(button);
                field.state = FieldState::Idle;
            }
            Err(kind) => {
                doc.set_attr(button, BUTTON_STATE_ATTR, "error");
                field.state = FieldState::Error { button, kind };
                if !field.focused {
                    field.hide_at = Some(now + grace);
                }
            }
        }
        true
    }

    /// Toggle detection. Disabling removes every button and orphans any
    /// in-flight analysis; enabling restores the focused field's button.
    pub fn set_enabled(&mut self, doc: &mut Document, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;

        if enabled {
            if let Some(id) = doc.focused() {
                self.on_focus(doc, id);
            }
            return;
        }

        let ids: Vec<NodeId> = self.fields.keys().copied().collect();
        for id in ids {
            let generation = self.bump_generation();
            if let Some(field) = self.fields.get_mut(&id) {
                if let Some(button) = field.state.button() {
                    doc.remove(button);
                }
                field.state = FieldState::Idle;
                field.hide_at = None;
                field.generation = generation;
            }
        }
    }
}

fn field_text(doc: &Document, id: NodeId, kind: FieldKind) -> String {
    match kind {
        FieldKind::PlainInput => doc.node(id).map(|n| n.text().to_string()).unwrap_or_default(),
        FieldKind::RichEditable => doc.text_content(id),
    }
}

fn insert_button(doc: &mut Document, field: NodeId) -> Option<NodeId> {
    let root = doc.root();
    doc.append_injected(
        root,
        NodeSpec::new("button")
            .attr(BUTTON_FOR_ATTR, field.raw().to_string())
            .attr(BUTTON_STATE_ATTR, "idle")
            .attr("aria-label", "Analyze argument")
            .text("Analyze"),
    )
}

/// Buttons in `doc` bound to `field`.
#[must_use]
pub fn live_buttons_for(doc: &Document, field: NodeId) -> usize {
    let target = field.raw().to_string();
    doc.all_nodes()
        .into_iter()
        .filter_map(|id| doc.node(id))
        .filter(|n| n.attr(BUTTON_FOR_ATTR) == Some(target.as_str()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::classify;
    use dialectic_types::PostType;

    const LONG: &str = "All politicians lie, so none can be trusted.";

    fn config() -> PageConfig {
        PageConfig {
            debounce: Duration::from_millis(100),
            blur_grace: Duration::from_millis(200),
        }
    }

    fn setup(spec: NodeSpec) -> (Document, FieldDetector, NodeId) {
        let mut doc = Document::new("example.org");
        let field = doc.append(doc.root(), spec).unwrap();
        let mut detector = FieldDetector::new(classify(doc.host()), &config(), true);
        detector.reconcile(&mut doc);
        (doc, detector, field)
    }

    fn focus(doc: &mut Document, detector: &mut FieldDetector, id: NodeId) {
        doc.set_focus(Some(id));
        detector.on_focus(doc, id);
    }

    #[test]
    fn plain_field_gets_button_on_focus() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea"));
        assert_eq!(detector.state(field), Some(FieldState::Idle));

        focus(&mut doc, &mut detector, field);
        assert!(matches!(detector.state(field), Some(FieldState::Active { .. })));
        assert_eq!(live_buttons_for(&doc, field), 1);

        // Refocusing never creates a second button.
        focus(&mut doc, &mut detector, field);
        assert_eq!(live_buttons_for(&doc, field), 1);
    }

    #[test]
    fn rich_field_needs_content() {
        let (mut doc, mut detector, field) =
            setup(NodeSpec::new("div").attr("contenteditable", "true"));
        focus(&mut doc, &mut detector, field);
        assert_eq!(detector.state(field), Some(FieldState::Idle));

        doc.set_text(field, "Some opinion");
        detector.on_input(&mut doc, field);
        assert!(matches!(detector.state(field), Some(FieldState::Active { .. })));

        doc.set_text(field, "   ");
        detector.on_input(&mut doc, field);
        assert_eq!(detector.state(field), Some(FieldState::Idle));
        assert_eq!(live_buttons_for(&doc, field), 0);
    }

    #[test]
    fn blur_hides_after_grace_unless_refocused() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea"));
        let t0 = Instant::now();
        focus(&mut doc, &mut detector, field);

        detector.on_blur(field, t0);
        detector.tick(&mut doc, t0 + Duration::from_millis(100));
        assert_eq!(live_buttons_for(&doc, field), 1, "still within grace");

        detector.tick(&mut doc, t0 + Duration::from_millis(200));
        assert_eq!(detector.state(field), Some(FieldState::Idle));
        assert_eq!(live_buttons_for(&doc, field), 0);

        focus(&mut doc, &mut detector, field);
        detector.on_blur(field, t0);
        focus(&mut doc, &mut detector, field);
        detector.tick(&mut doc, t0 + Duration::from_secs(1));
        assert_eq!(live_buttons_for(&doc, field), 1);
    }

    #[test]
    fn click_during_grace_starts_analysis() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea").text(LONG));
        let t0 = Instant::now();
        focus(&mut doc, &mut detector, field);
        detector.on_blur(field, t0);

        let ticket = detector.invoke(&mut doc, field).unwrap();
        assert_eq!(ticket.text, LONG);
        detector.tick(&mut doc, t0 + Duration::from_secs(1));
        assert!(matches!(detector.state(field), Some(FieldState::Analyzing { .. })));
        assert_eq!(live_buttons_for(&doc, field), 1);
    }

    #[test]
    fn second_invocation_while_analyzing_is_rejected() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea").text(LONG));
        focus(&mut doc, &mut detector, field);
        detector.invoke(&mut doc, field).unwrap();
        assert_eq!(
            detector.invoke(&mut doc, field),
            Err(InvokeRejected::AlreadyAnalyzing)
        );
    }

    #[test]
    fn short_text_is_rejected_without_state_change() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea").text("too short"));
        focus(&mut doc, &mut detector, field);
        assert_eq!(
            detector.invoke(&mut doc, field),
            Err(InvokeRejected::TooShort { len: 9 })
        );
        assert!(matches!(detector.state(field), Some(FieldState::Active { .. })));
    }

    #[test]
    fn completion_returns_to_idle_affordance_or_error() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea").text(LONG));
        let now = Instant::now();
        focus(&mut doc, &mut detector, field);

        let ticket = detector.invoke(&mut doc, field).unwrap();
        assert!(detector.complete(&mut doc, &ticket, Ok(()), now));
        let button = detector.button_for(field).unwrap();
        assert_eq!(detector.state(field), Some(FieldState::Active { button }));
        assert_eq!(doc.node(button).unwrap().attr(BUTTON_STATE_ATTR), Some("idle"));

        let ticket = detector.invoke(&mut doc, field).unwrap();
        assert!(detector.complete(&mut doc, &ticket, Err(ErrorKind::NetworkError), now));
        assert!(matches!(
            detector.state(field),
            Some(FieldState::Error { kind: ErrorKind::NetworkError, .. })
        ));

        // A settled ticket cannot settle twice.
        assert!(!detector.complete(&mut doc, &ticket, Ok(()), now));
    }

    #[test]
    fn success_after_blur_removes_button() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea").text(LONG));
        let now = Instant::now();
        focus(&mut doc, &mut detector, field);
        let ticket = detector.invoke(&mut doc, field).unwrap();
        doc.set_focus(None);
        detector.on_blur(field, now);

        assert!(detector.complete(&mut doc, &ticket, Ok(()), now));
        assert_eq!(detector.state(field), Some(FieldState::Idle));
        assert_eq!(live_buttons_for(&doc, field), 0);
    }

    #[test]
    fn dynamic_insertion_is_debounced_and_injected_ui_ignored() {
        let mut doc = Document::new("example.org");
        let mut detector = FieldDetector::new(classify(doc.host()), &config(), true);
        let t0 = Instant::now();

        let wrapper = doc
            .append(
                doc.root(),
                NodeSpec::new("section").child(NodeSpec::new("div").child(NodeSpec::new("textarea"))),
            )
            .unwrap();
        let injected = doc
            .append_injected(doc.root(), NodeSpec::new("div").child(NodeSpec::new("textarea")))
            .unwrap();
        assert!(detector.observe(&doc.take_mutations(), t0));

        detector.tick(&mut doc, t0 + Duration::from_millis(50));
        assert_eq!(detector.tracked().count(), 0, "debounce not yet elapsed");

        detector.tick(&mut doc, t0 + Duration::from_millis(100));
        let tracked: Vec<_> = detector.tracked().collect();
        assert_eq!(tracked.len(), 1);
        assert!(doc.subtree(wrapper).contains(&tracked[0]));
        assert!(!doc.subtree(injected).contains(&tracked[0]));

        // Our own UI changing does not dirty the candidate set.
        let field = tracked[0];
        focus(&mut doc, &mut detector, field);
        assert!(!detector.observe(&doc.take_mutations(), t0));
    }

    #[test]
    fn constant_mutations_cannot_starve_discovery() {
        let mut doc = Document::new("example.org");
        let mut detector = FieldDetector::new(classify(doc.host()), &config(), true);
        let ticker = doc.append(doc.root(), NodeSpec::new("div")).unwrap();
        doc.take_mutations();
        let t0 = Instant::now();

        let field = doc.append(doc.root(), NodeSpec::new("textarea")).unwrap();
        detector.observe(&doc.take_mutations(), t0);

        // A mutation every 60ms never leaves a quiet 100ms window.
        let step = Duration::from_millis(60);
        let mut discovered_at = None;
        for i in 1..=50u32 {
            let now = t0 + step * i;
            doc.set_text(ticker, format!("tick {i}"));
            detector.observe(&doc.take_mutations(), now);
            detector.tick(&mut doc, now);
            if discovered_at.is_none() && detector.tracked().any(|id| id == field) {
                discovered_at = Some(now);
            }
        }
        let discovered_at = discovered_at.expect("field discovered under churn");
        assert!(discovered_at - t0 <= config().debounce * MAX_WAIT_FACTOR + step);

        // Removal during the same churn releases the field and its button.
        focus(&mut doc, &mut detector, field);
        let button = detector.button_for(field).unwrap();
        doc.remove(field);
        let t1 = t0 + step * 51;
        detector.observe(&doc.take_mutations(), t1);
        for i in 1..=10u32 {
            let now = t1 + step * i;
            doc.set_text(ticker, format!("tock {i}"));
            detector.observe(&doc.take_mutations(), now);
            detector.tick(&mut doc, now);
        }
        assert_eq!(detector.tracked().count(), 0);
        assert!(doc.node(button).is_none());
    }

    #[test]
    fn reconcile_is_idempotent_and_releases_removed_fields() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea"));
        focus(&mut doc, &mut detector, field);
        let button = detector.button_for(field).unwrap();

        assert_eq!(detector.reconcile(&mut doc), ReconcileReport::default());

        doc.remove(field);
        let report = detector.reconcile(&mut doc);
        assert_eq!(report.detached, 1);
        assert!(detector.state(field).is_none());
        assert!(!doc.contains(button));
    }

    #[test]
    fn disabling_removes_buttons_and_orphans_tickets() {
        let (mut doc, mut detector, field) = setup(NodeSpec::new("textarea").text(LONG));
        focus(&mut doc, &mut detector, field);
        let ticket = detector.invoke(&mut doc, field).unwrap();

        detector.set_enabled(&mut doc, false);
        assert_eq!(live_buttons_for(&doc, field), 0);
        assert!(!detector.complete(&mut doc, &ticket, Ok(()), Instant::now()));

        focus(&mut doc, &mut detector, field);
        assert_eq!(live_buttons_for(&doc, field), 0);

        detector.set_enabled(&mut doc, true);
        assert_eq!(live_buttons_for(&doc, field), 1);
    }

    #[test]
    fn focus_before_discovery_attaches_immediately() {
        let mut doc = Document::new("example.org");
        let mut detector = FieldDetector::new(classify(doc.host()), &config(), true);
        let field = doc.append(doc.root(), NodeSpec::new("textarea")).unwrap();
        focus(&mut doc, &mut detector, field);
        assert_eq!(live_buttons_for(&doc, field), 1);
    }

    #[test]
    fn ticket_request_follows_mode() {
        let (_, _, field) = setup(NodeSpec::new("textarea"));
        let ticket = AnalysisTicket {
            field,
            generation: 1,
            text: LONG.into(),
            context: AnalysisContext {
                post_type: PostType::Reply,
                original_post: Some("Remote work is strictly better.".into()),
                ..AnalysisContext::default()
            },
        };
        assert!(matches!(ticket.request(Mode::Writing), Request::AnalyzeText(_)));
        assert!(matches!(ticket.request(Mode::Reading), Request::DetectFallacies(_)));
        let Request::GenerateReply(reply) = ticket.request(Mode::Reply) else {
            panic!("expected generateReply");
        };
        assert_eq!(reply.original_post, "Remote work is strictly better.");
        assert_eq!(reply.draft_reply, LONG);
    }
}
