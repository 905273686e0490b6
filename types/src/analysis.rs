//! Analysis payloads returned by the upstream service.
//!
//! Upstream responses vary by action and are only loosely typed, so every
//! field here is optional or defaults to empty. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::message::Tone;

/// One Toulmin element with its strength on a 0–10 scale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub strength: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToulminElements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warrant: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebuttal: Option<Element>,
}

impl ToulminElements {
    /// Present elements in canonical Toulmin order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Element)> {
        [
            ("claim", self.claim.as_ref()),
            ("data", self.data.as_ref()),
            ("warrant", self.warrant.as_ref()),
            ("backing", self.backing.as_ref()),
            ("qualifier", self.qualifier.as_ref()),
            ("rebuttal", self.rebuttal.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, element)| element.map(|e| (name, e)))
    }
}

/// Classifier output: a fallacy label with a 0–1 score.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FallacyDetail {
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fallacy {
    #[serde(rename = "type", alias = "name")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Percentage, 0–100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Upstream sends fallacies either as bare names or as objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FallacyEntry {
    Name(String),
    Detailed(Fallacy),
}

impl FallacyEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            FallacyEntry::Name(name) => name,
            FallacyEntry::Detailed(f) => &f.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Suggestion {
    Text(String),
    Structured {
        #[serde(alias = "suggestion")]
        text: String,
    },
}

impl Suggestion {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Suggestion::Text(text) | Suggestion::Structured { text } => text,
        }
    }
}

/// One drafted reply in a given tone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplyOption {
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub text: String,
}

/// A single analysis as produced by any analysis action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<ToulminElements>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallacies: Vec<FallacyEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallacies_present: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallacy_details: Vec<FallacyDetail>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(
        default,
        rename = "overallAssessment",
        skip_serializing_if = "Option::is_none"
    )]
    pub overall_assessment: Option<String>,
    /// Free-form counter-argument text, used by the defence view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Drafted replies, from `generateReply`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<ReplyOption>,
    #[serde(
        default,
        rename = "counterArgument",
        skip_serializing_if = "Option::is_none"
    )]
    pub counter_argument: Option<String>,
    /// Rewritten input, from `rewriteText`.
    #[serde(
        default,
        rename = "rewrittenText",
        skip_serializing_if = "Option::is_none"
    )]
    pub rewritten_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallacy_resistance_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_consistency_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarity_score: Option<f64>,
}

impl AnalysisPayload {
    /// Names of every fallacy mentioned anywhere in the payload, de-duplicated
    /// in first-seen order.
    #[must_use]
    pub fn fallacy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let candidates = self
            .fallacies
            .iter()
            .map(FallacyEntry::name)
            .chain(self.fallacies_present.iter().map(String::as_str))
            .chain(self.fallacy_details.iter().map(|d| d.label.as_str()));
        for name in candidates {
            if !name.trim().is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        names
    }
}

/// Supportive and adversarial analyses of the same input, fetched together.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DualResponse {
    pub support: AnalysisPayload,
    pub defence: AnalysisPayload,
}

impl DualResponse {
    #[must_use]
    pub fn view(&self, mode: DisplayMode) -> &AnalysisPayload {
        match mode {
            DisplayMode::Support => &self.support,
            DisplayMode::Defence => &self.defence,
        }
    }
}

/// Which half of a [`DualResponse`] the chat panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Support,
    Defence,
}

impl DisplayMode {
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            DisplayMode::Support => DisplayMode::Defence,
            DisplayMode::Defence => DisplayMode::Support,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DisplayMode::Support => "support",
            DisplayMode::Defence => "defence",
        }
    }
}
