//! Context-to-context message contract.
//!
//! Every page surface talks to the gateway with a [`Request`] that serializes
//! as `{action, data}` and receives a [`Reply`] shaped as `{success, data?, error?}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::settings::SettingsPatch;

/// Site classifier used to pick selectors and to describe where text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Reddit,
    Facebook,
    LinkedIn,
    YouTube,
    #[default]
    Generic,
}

impl Platform {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Reddit => "reddit",
            Platform::Facebook => "facebook",
            Platform::LinkedIn => "linkedin",
            Platform::YouTube => "youtube",
            Platform::Generic => "generic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Post,
    Reply,
}

/// Read-only description of where a field sits on the page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub platform: Platform,
    pub post_type: PostType,
    /// Text of the post being replied to, when the field sits inside one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_post: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub text: String,
    #[serde(default)]
    pub context: AnalysisContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Neutral,
    Polite,
    Assertive,
}

impl Tone {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Tone::Neutral => "neutral",
            Tone::Polite => "polite",
            Tone::Assertive => "assertive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub original_post: String,
    #[serde(default)]
    pub draft_reply: String,
    #[serde(default)]
    pub tone: Tone,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectRequest {
    pub text: String,
    /// Ask upstream to skip the language model and use its local classifier only.
    #[serde(default = "default_true")]
    pub use_local_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    pub text: String,
    #[serde(default)]
    pub preserve_length: bool,
}

/// A typed gateway request. Serializes as `{"action": "...", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "camelCase")]
pub enum Request {
    AnalyzeText(AnalysisRequest),
    AnalyzeDualMode(TextRequest),
    GenerateReply(ReplyRequest),
    DetectFallacies(DetectRequest),
    RewriteText(RewriteRequest),
    GetModels,
    GetSettings,
    UpdateSettings(SettingsPatch),
    CheckHealth,
}

/// Payload-free action names, for logging and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    AnalyzeText,
    AnalyzeDualMode,
    GenerateReply,
    DetectFallacies,
    RewriteText,
    GetModels,
    GetSettings,
    UpdateSettings,
    CheckHealth,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::AnalyzeText => "analyzeText",
            Action::AnalyzeDualMode => "analyzeDualMode",
            Action::GenerateReply => "generateReply",
            Action::DetectFallacies => "detectFallacies",
            Action::RewriteText => "rewriteText",
            Action::GetModels => "getModels",
            Action::GetSettings => "getSettings",
            Action::UpdateSettings => "updateSettings",
            Action::CheckHealth => "checkHealth",
        }
    }

    /// Analysis actions whose successful responses may be served from cache.
    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        matches!(
            self,
            Action::AnalyzeText
                | Action::AnalyzeDualMode
                | Action::GenerateReply
                | Action::DetectFallacies
                | Action::RewriteText
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Request {
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Request::AnalyzeText(_) => Action::AnalyzeText,
            Request::AnalyzeDualMode(_) => Action::AnalyzeDualMode,
            Request::GenerateReply(_) => Action::GenerateReply,
            Request::DetectFallacies(_) => Action::DetectFallacies,
            Request::RewriteText(_) => Action::RewriteText,
            Request::GetModels => Action::GetModels,
            Request::GetSettings => Action::GetSettings,
            Request::UpdateSettings(_) => Action::UpdateSettings,
            Request::CheckHealth => Action::CheckHealth,
        }
    }

    /// The user text carried by an analysis request, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Request::AnalyzeText(r) => Some(&r.text),
            Request::AnalyzeDualMode(r) => Some(&r.text),
            Request::GenerateReply(r) => Some(&r.original_post),
            Request::DetectFallacies(r) => Some(&r.text),
            Request::RewriteText(r) => Some(&r.text),
            Request::GetModels
            | Request::GetSettings
            | Request::UpdateSettings(_)
            | Request::CheckHealth => None,
        }
    }

    pub fn analyze_dual(text: impl Into<String>) -> Self {
        Request::AnalyzeDualMode(TextRequest { text: text.into() })
    }
}

/// Discriminated outcome returned to every caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GatewayError>,
}

impl Reply {
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn err(error: GatewayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Collapse back into a `Result`. A failed reply without an error body is
    /// still a failure.
    pub fn into_result(self) -> Result<Value, GatewayError> {
        if self.success {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        Err(self
            .error
            .unwrap_or_else(|| GatewayError::unknown("request failed without detail")))
    }
}

impl From<Result<Value, GatewayError>> for Reply {
    fn from(result: Result<Value, GatewayError>) -> Self {
        match result {
            Ok(data) => Reply::ok(data),
            Err(err) => Reply::err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn request_serializes_as_action_and_data() {
        let req = Request::analyze_dual("All politicians lie, so none can be trusted.");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "action": "analyzeDualMode",
                "data": {"text": "All politicians lie, so none can be trusted."}
            })
        );
    }

    #[test]
    fn unit_actions_round_trip_without_data() {
        let req: Request =
            serde_json::from_value(serde_json::json!({"action": "getSettings"})).unwrap();
        assert_eq!(req, Request::GetSettings);
        assert_eq!(req.action().as_str(), "getSettings");
    }

    #[test]
    fn reply_request_uses_camel_case_fields() {
        let req: Request = serde_json::from_value(serde_json::json!({
            "action": "generateReply",
            "data": {"originalPost": "Cats are better than dogs, everyone knows it.", "tone": "polite"}
        }))
        .unwrap();
        let Request::GenerateReply(reply) = req else {
            panic!("expected generateReply");
        };
        assert_eq!(reply.tone, Tone::Polite);
        assert!(reply.draft_reply.is_empty());
    }

    #[test]
    fn detect_defaults_to_local_only() {
        let req: Request = serde_json::from_value(serde_json::json!({
            "action": "detectFallacies",
            "data": {"text": "some text"}
        }))
        .unwrap();
        assert!(matches!(req, Request::DetectFallacies(DetectRequest { use_local_only: true, .. })));
    }

    #[test]
    fn analysis_context_serializes_platform_lowercase() {
        let ctx = AnalysisContext {
            platform: Platform::LinkedIn,
            post_type: PostType::Reply,
            original_post: None,
        };
        assert_eq!(
            serde_json::to_value(&ctx).unwrap(),
            serde_json::json!({"platform": "linkedin", "postType": "reply"})
        );
    }

    #[test]
    fn only_analysis_actions_are_cacheable() {
        assert!(Action::AnalyzeDualMode.is_cacheable());
        assert!(Action::RewriteText.is_cacheable());
        assert!(!Action::GetSettings.is_cacheable());
        assert!(!Action::UpdateSettings.is_cacheable());
        assert!(!Action::CheckHealth.is_cacheable());
        assert!(!Action::GetModels.is_cacheable());
    }

    #[test]
    fn reply_shapes() {
        let ok = Reply::ok(serde_json::json!({"a": 1}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"success": true, "data": {"a": 1}})
        );

        let err = Reply::err(GatewayError::network("offline"));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "NetworkError");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn failed_reply_without_error_is_unknown() {
        let reply = Reply {
            success: false,
            data: None,
            error: None,
        };
        assert_eq!(reply.into_result().unwrap_err().kind, ErrorKind::UnknownError);
    }
}
