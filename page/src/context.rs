//! Read-only derivation of a field's [`AnalysisContext`] from its position.

use dialectic_types::{AnalysisContext, MAX_TEXT_LENGTH, PostType, truncate_with_ellipsis};

use crate::dom::{Document, INJECTED_ATTR, NodeId};
use crate::platform::PlatformProfile;

/// Describe where `field` sits. Never mutates the document.
#[must_use]
pub fn derive_context(doc: &Document, field: NodeId, profile: &PlatformProfile) -> AnalysisContext {
    let is_reply = doc.ancestors(field).any(|n| profile.is_reply_marker(n));

    let original_post = doc
        .ancestors(field)
        .find(|n| profile.is_post_container(n))
        .map(|container| {
            doc.text_content_filtered(container.id(), |n| {
                n.has_attr(INJECTED_ATTR) || profile.field_kind(n).is_some()
            })
        })
        .filter(|text| !text.trim().is_empty())
        .map(|text| truncate_with_ellipsis(text.trim(), MAX_TEXT_LENGTH));

    AnalysisContext {
        platform: profile.platform,
        post_type: if is_reply {
            PostType::Reply
        } else {
            PostType::Post
        },
        original_post,
    }
}
