//! Floating "analyze selection" affordance.

use dialectic_types::{MIN_TEXT_LENGTH, Settings, text_length};

use crate::dom::{Document, NodeId, NodeSpec};

/// Viewport rectangle of a selection, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub text: String,
    pub rect: Rect,
    /// Node the selection starts in, when known.
    pub anchor: Option<NodeId>,
}

impl Selection {
    pub fn new(text: impl Into<String>, rect: Rect) -> Self {
        Self {
            text: text.into(),
            rect,
            anchor: None,
        }
    }

    #[must_use]
    pub fn anchored(mut self, anchor: NodeId) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

#[derive(Debug)]
struct Affordance {
    node: NodeId,
    text: String,
}

#[derive(Debug, Default)]
pub struct SelectionMonitor {
    affordance: Option<Affordance>,
}

impl SelectionMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.affordance.is_some()
    }

    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.affordance.as_ref().map(|a| a.node)
    }

    /// Text the affordance would submit, if shown.
    #[must_use]
    pub fn pending_text(&self) -> Option<&str> {
        self.affordance.as_ref().map(|a| a.text.as_str())
    }

    /// React to a selection change. The affordance is shown iff the chatbot
    /// is active, the selection is long enough, and it does not start inside
    /// our own UI.
    pub fn on_selection_changed(
        &mut self,
        doc: &mut Document,
        selection: Option<&Selection>,
        settings: &Settings,
    ) {
        self.hide(doc);

        let Some(selection) = selection else {
            return;
        };
        if !settings.chatbot_active() {
            return;
        }
        let text = selection.text.trim();
        if text_length(text) < MIN_TEXT_LENGTH {
            return;
        }
        if selection.anchor.is_some_and(|anchor| doc.is_injected(anchor)) {
            return;
        }

        let rect = selection.rect;
        let root = doc.root();
        let node = doc.append_injected(
            root,
            NodeSpec::new("button")
                .attr("data-dialectic-selection", "")
                .attr(
                    "style",
                    format!("left:{}px;top:{}px", rect.x, rect.y + rect.height),
                )
                .text("Analyze selection"),
        );
        if let Some(node) = node {
            self.affordance = Some(Affordance {
                node,
                text: text.to_string(),
            });
        }
    }

    /// The user clicked the affordance: hide it and hand back the text to submit.
    pub fn click(&mut self, doc: &mut Document) -> Option<String> {
        let affordance = self.affordance.take()?;
        doc.remove(affordance.node);
        Some(affordance.text)
    }

    /// Settings changed. Turning the chatbot off removes the affordance.
    pub fn on_settings(&mut self, doc: &mut Document, settings: &Settings) {
        if !settings.chatbot_active() {
            self.hide(doc);
        }
    }

    pub fn hide(&mut self, doc: &mut Document) {
        if let Some(affordance) = self.affordance.take() {
            doc.remove(affordance.node);
        }
    }
}
