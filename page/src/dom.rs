//! In-memory document model.
//!
//! A small arena of element nodes standing in for a live page. It supports the
//! operations the page context needs: structural insertion and removal,
//! attributes, text, focus, and a mutation log that observers drain.
//!
//! Nodes inserted by Dialectic itself carry [`INJECTED_ATTR`]; every node
//! beneath such a node counts as injected UI.

use std::collections::{BTreeMap, HashMap};

/// Marker attribute on every root of Dialectic's own UI.
pub const INJECTED_ATTR: &str = "data-dialectic-ui";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// The node's own text (for inputs, its value).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Declarative description of a subtree to insert.
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// One observed change. `injected` is true when the change happened inside
/// Dialectic's own UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Added { root: NodeId, injected: bool },
    Removed { ids: Vec<NodeId>, injected: bool },
    Text { node: NodeId, injected: bool },
    Attr { node: NodeId, name: String, injected: bool },
}

impl Mutation {
    #[must_use]
    pub fn is_injected(&self) -> bool {
        match self {
            Mutation::Added { injected, .. }
            | Mutation::Removed { injected, .. }
            | Mutation::Text { injected, .. }
            | Mutation::Attr { injected, .. } => *injected,
        }
    }
}

#[derive(Debug)]
pub struct Document {
    host: String,
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    focused: Option<NodeId>,
    mutations: Vec<Mutation>,
}

impl Document {
    /// An empty document with a `body` root.
    pub fn new(host: impl Into<String>) -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                tag: "body".into(),
                attrs: BTreeMap::new(),
                text: String::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            host: host.into(),
            root,
            nodes,
            next_id: 1,
            focused: None,
            mutations: Vec::new(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Insert `spec` as the last child of `parent`. Returns the new subtree root.
    pub fn append(&mut self, parent: NodeId, spec: NodeSpec) -> Option<NodeId> {
        let injected = self.is_injected(parent);
        let root = self.insert_subtree(parent, spec)?;
        self.mutations.push(Mutation::Added { root, injected });
        Some(root)
    }

    /// Insert Dialectic UI. The subtree root is marked with [`INJECTED_ATTR`].
    pub fn append_injected(&mut self, parent: NodeId, spec: NodeSpec) -> Option<NodeId> {
        let root = self.insert_subtree(parent, spec.attr(INJECTED_ATTR, ""))?;
        self.mutations.push(Mutation::Added {
            root,
            injected: true,
        });
        Some(root)
    }

    fn insert_subtree(&mut self, parent: NodeId, spec: NodeSpec) -> Option<NodeId> {
        if !self.contains(parent) {
            return None;
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;

        let NodeSpec {
            tag,
            attrs,
            text,
            children,
        } = spec;
        self.nodes.insert(
            id,
            Node {
                id,
                tag,
                attrs,
                text,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        for child in children {
            self.insert_subtree(id, child);
        }
        Some(id)
    }

    /// Remove `id` and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == self.root || !self.contains(id) {
            return Vec::new();
        }
        let injected = self.is_injected(id);
        let ids = self.subtree(id);

        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent)
            && let Some(p) = self.nodes.get_mut(&parent)
        {
            p.children.retain(|c| *c != id);
        }
        for removed in &ids {
            self.nodes.remove(removed);
        }
        if self.focused.is_some_and(|f| ids.contains(&f)) {
            self.focused = None;
        }

        self.mutations.push(Mutation::Removed {
            ids: ids.clone(),
            injected,
        });
        ids
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> bool {
        let injected = self.is_injected(id);
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.text = text.into();
        self.mutations.push(Mutation::Text { node: id, injected });
        true
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> bool {
        let injected = self.is_injected(id);
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.attrs.insert(name.to_string(), value.into());
        self.mutations.push(Mutation::Attr {
            node: id,
            name: name.to_string(),
            injected,
        });
        true
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> bool {
        let injected = self.is_injected(id);
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        if node.attrs.remove(name).is_none() {
            return false;
        }
        self.mutations.push(Mutation::Attr {
            node: id,
            name: name.to_string(),
            injected,
        });
        true
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &Node> + '_ {
        let mut next = self.nodes.get(&id).and_then(|n| n.parent);
        std::iter::from_fn(move || {
            let node = self.nodes.get(&next?)?;
            next = node.parent;
            Some(node)
        })
    }

    /// `id` and every node beneath it, in document order.
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Every node in document order.
    #[must_use]
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.subtree(self.root)
    }

    /// Whether `id` is, or sits inside, Dialectic's own UI.
    #[must_use]
    pub fn is_injected(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        node.has_attr(INJECTED_ATTR) || self.ancestors(id).any(|n| n.has_attr(INJECTED_ATTR))
    }

    /// Concatenated text of `id`'s subtree, skipping any subtree for which
    /// `skip` returns true. Pieces are joined with single spaces.
    pub fn text_content_filtered(&self, id: NodeId, skip: impl Fn(&Node) -> bool) -> String {
        let mut parts = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            if current != id && skip(node) {
                continue;
            }
            let text = node.text.trim();
            if !text.is_empty() {
                parts.push(text);
            }
            stack.extend(node.children.iter().rev());
        }
        parts.join(" ")
    }

    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        self.text_content_filtered(id, |_| false)
    }

    #[must_use]
    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Move focus. Focusing a node that is not in the document clears focus.
    pub fn set_focus(&mut self, id: Option<NodeId>) {
        self.focused = id.filter(|id| self.contains(*id));
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }
}
