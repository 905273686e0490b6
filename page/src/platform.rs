//! Per-site heuristics as a static lookup table.
//!
//! Each [`PlatformProfile`] maps a site classifier to the selectors used for
//! field discovery, reply detection and post extraction. Supporting a new site
//! is adding a row to [`PROFILES`]; every profile also falls through to the
//! generic field rules.

use dialectic_types::Platform;

use crate::dom::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrMatch {
    Present,
    Absent,
    Equals(&'static str),
    /// Substring match, as used for class lists and labels.
    Contains(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Selector {
    pub tag: Option<&'static str>,
    pub attrs: &'static [(&'static str, AttrMatch)],
}

impl Selector {
    pub const fn tag(tag: &'static str) -> Self {
        Self {
            tag: Some(tag),
            attrs: &[],
        }
    }

    #[must_use]
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = self.tag
            && !node.tag().eq_ignore_ascii_case(tag)
        {
            return false;
        }
        self.attrs
            .iter()
            .all(|(name, rule)| rule.matches(node.attr(name)))
    }
}

impl AttrMatch {
    #[must_use]
    pub fn matches(self, value: Option<&str>) -> bool {
        match (self, value) {
            (AttrMatch::Present, value) => value.is_some(),
            (AttrMatch::Absent, value) => value.is_none(),
            (AttrMatch::Equals(expected), Some(value)) => value.eq_ignore_ascii_case(expected),
            (AttrMatch::Contains(needle), Some(value)) => value.contains(needle),
            (AttrMatch::Equals(_) | AttrMatch::Contains(_), None) => false,
        }
    }
}

/// How a field's content is read and when its button appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `<input>` / `<textarea>`: button on focus.
    PlainInput,
    /// Content-editable surface: button on focus with non-empty content.
    RichEditable,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub selector: Selector,
    pub kind: FieldKind,
}

#[derive(Debug)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Hostnames (and their subdomains) this profile applies to.
    pub hosts: &'static [&'static str],
    pub fields: &'static [FieldRule],
    /// A field inside any of these is composing a reply.
    pub reply_markers: &'static [Selector],
    /// Nearest matching ancestor holds the post being replied to.
    pub post_containers: &'static [Selector],
}

const fn rule(selector: Selector, kind: FieldKind) -> FieldRule {
    FieldRule { selector, kind }
}

const GENERIC_FIELDS: &[FieldRule] = &[
    rule(Selector::tag("textarea"), FieldKind::PlainInput),
    rule(
        Selector {
            tag: Some("input"),
            attrs: &[("type", AttrMatch::Absent)],
        },
        FieldKind::PlainInput,
    ),
    rule(
        Selector {
            tag: Some("input"),
            attrs: &[("type", AttrMatch::Equals("text"))],
        },
        FieldKind::PlainInput,
    ),
    rule(
        Selector {
            tag: Some("input"),
            attrs: &[("type", AttrMatch::Equals("search"))],
        },
        FieldKind::PlainInput,
    ),
    rule(
        Selector {
            tag: None,
            attrs: &[("contenteditable", AttrMatch::Equals("true"))],
        },
        FieldKind::RichEditable,
    ),
    rule(
        Selector {
            tag: None,
            attrs: &[("contenteditable", AttrMatch::Equals(""))],
        },
        FieldKind::RichEditable,
    ),
    rule(
        Selector {
            tag: None,
            attrs: &[("role", AttrMatch::Equals("textbox"))],
        },
        FieldKind::RichEditable,
    ),
];

/// Attributes that disqualify an otherwise matching field.
const EXCLUDED_ATTRS: &[(&str, AttrMatch)] = &[
    ("readonly", AttrMatch::Present),
    ("disabled", AttrMatch::Present),
    ("aria-hidden", AttrMatch::Equals("true")),
];

pub static PROFILES: &[PlatformProfile] = &[
    PlatformProfile {
        platform: Platform::Twitter,
        hosts: &["twitter.com", "x.com"],
        fields: &[rule(
            Selector {
                tag: None,
                attrs: &[("data-testid", AttrMatch::Contains("tweetTextarea"))],
            },
            FieldKind::RichEditable,
        )],
        reply_markers: &[Selector {
            tag: None,
            attrs: &[("data-testid", AttrMatch::Equals("inline_reply_offscreen"))],
        }],
        post_containers: &[Selector {
            tag: Some("article"),
            attrs: &[("data-testid", AttrMatch::Equals("tweet"))],
        }],
    },
    PlatformProfile {
        platform: Platform::Reddit,
        hosts: &["reddit.com"],
        fields: &[rule(
            Selector {
                tag: Some("textarea"),
                attrs: &[("name", AttrMatch::Equals("comment"))],
            },
            FieldKind::PlainInput,
        )],
        reply_markers: &[
            Selector::tag("shreddit-comment"),
            Selector {
                tag: None,
                attrs: &[("data-testid", AttrMatch::Equals("comment"))],
            },
        ],
        post_containers: &[
            Selector::tag("shreddit-post"),
            Selector {
                tag: None,
                attrs: &[("data-testid", AttrMatch::Equals("post-container"))],
            },
        ],
    },
    PlatformProfile {
        platform: Platform::Facebook,
        hosts: &["facebook.com"],
        fields: &[rule(
            Selector {
                tag: Some("div"),
                attrs: &[
                    ("role", AttrMatch::Equals("textbox")),
                    ("contenteditable", AttrMatch::Equals("true")),
                ],
            },
            FieldKind::RichEditable,
        )],
        reply_markers: &[Selector {
            tag: None,
            attrs: &[("aria-label", AttrMatch::Contains("comment"))],
        }],
        post_containers: &[Selector {
            tag: None,
            attrs: &[("role", AttrMatch::Equals("article"))],
        }],
    },
    PlatformProfile {
        platform: Platform::LinkedIn,
        hosts: &["linkedin.com"],
        fields: &[rule(
            Selector {
                tag: None,
                attrs: &[("class", AttrMatch::Contains("ql-editor"))],
            },
            FieldKind::RichEditable,
        )],
        reply_markers: &[Selector {
            tag: None,
            attrs: &[("class", AttrMatch::Contains("comments-comment-box"))],
        }],
        post_containers: &[Selector {
            tag: None,
            attrs: &[("data-urn", AttrMatch::Present)],
        }],
    },
    PlatformProfile {
        platform: Platform::YouTube,
        hosts: &["youtube.com"],
        fields: &[rule(
            Selector {
                tag: None,
                attrs: &[("id", AttrMatch::Equals("contenteditable-root"))],
            },
            FieldKind::RichEditable,
        )],
        reply_markers: &[Selector::tag("ytd-comment-replies-renderer")],
        post_containers: &[
            Selector::tag("ytd-comment-thread-renderer"),
            Selector::tag("ytd-comment-view-model"),
        ],
    },
];

pub static GENERIC: PlatformProfile = PlatformProfile {
    platform: Platform::Generic,
    hosts: &[],
    fields: &[],
    reply_markers: &[Selector {
        tag: None,
        attrs: &[("class", AttrMatch::Contains("reply"))],
    }],
    post_containers: &[Selector::tag("article")],
};

/// Pick the profile for `host`, falling back to [`GENERIC`].
#[must_use]
pub fn classify(host: &str) -> &'static PlatformProfile {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    PROFILES
        .iter()
        .find(|profile| {
            profile.hosts.iter().any(|h| {
                host == *h
                    || host
                        .strip_suffix(h)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
        })
        .unwrap_or(&GENERIC)
}

impl PlatformProfile {
    /// Field kind for `node`, or `None` if it is not an analysable field.
    #[must_use]
    pub fn field_kind(&self, node: &Node) -> Option<FieldKind> {
        let excluded = EXCLUDED_ATTRS
            .iter()
            .any(|(name, rule)| rule.matches(node.attr(name)));
        if excluded {
            return None;
        }
        self.fields
            .iter()
            .chain(GENERIC_FIELDS)
            .find(|r| r.selector.matches(node))
            .map(|r| r.kind)
    }

    #[must_use]
    pub fn is_reply_marker(&self, node: &Node) -> bool {
        self.reply_markers.iter().any(|s| s.matches(node))
    }

    #[must_use]
    pub fn is_post_container(&self, node: &Node) -> bool {
        self.post_containers.iter().any(|s| s.matches(node))
    }
}
