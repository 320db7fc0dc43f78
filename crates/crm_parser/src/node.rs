use serde::{Deserialize, Serialize};

/// Index into a [`Tree`]'s node arena. Nodes never hold owning pointers to each other, only
/// indices — this sidesteps the cyclic parent-reference problem the original implementation's
/// tree had, at the cost of needing an explicit stack for traversals that care about ancestry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// The scalar a node may hold. `Sentinel` marks structural-only nodes (the root, key-only
/// mapping/list nodes) and must never be surfaced to a caller as a real value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    MultilineString(Vec<String>),
    Sentinel,
}

impl NodeValue {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, NodeValue::Sentinel)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NodeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NodeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The value rendered to a single logical string, joining multiline variants with `\n`.
    /// Used by search/substitution, which operate over "the stringified leaf value".
    pub fn to_search_string(&self) -> String {
        match self {
            NodeValue::Null => String::new(),
            NodeValue::Bool(b) => b.to_string(),
            NodeValue::Int(i) => i.to_string(),
            NodeValue::Float(f) => f.to_string(),
            NodeValue::String(s) => s.clone(),
            NodeValue::MultilineString(lines) => lines.join("\n"),
            NodeValue::Sentinel => String::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            NodeValue::Null | NodeValue::Sentinel => serde_json::Value::Null,
            NodeValue::Bool(b) => serde_json::Value::Bool(*b),
            NodeValue::Int(i) => serde_json::Value::Number((*i).into()),
            NodeValue::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
            NodeValue::String(s) => serde_json::Value::String(s.clone()),
            NodeValue::MultilineString(lines) => serde_json::Value::String(lines.join("\n")),
        }
    }

    pub fn from_json_scalar(value: &serde_json::Value) -> Option<NodeValue> {
        Some(match value {
            serde_json::Value::Null => NodeValue::Null,
            serde_json::Value::Bool(b) => NodeValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    NodeValue::Int(i)
                } else {
                    NodeValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => NodeValue::String(s.clone()),
            _ => return None,
        })
    }
}

/// The multiline block-scalar marker retained on a node purely for round-tripping; see
/// YAML's chomping-indicator convention (`|`, `|+`, `|-`, `>`, `>+`, `>-`) plus the two rarer
/// forms this grammar also recognizes (`<` and its variants, and a backslash-continued
/// double-quoted string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultilineVariant {
    None,
    Literal,
    LiteralKeep,
    LiteralStrip,
    Folded,
    FoldedKeep,
    FoldedStrip,
    AngleBracket,
    AngleBracketKeep,
    AngleBracketStrip,
    BackslashQuote,
}

impl MultilineVariant {
    pub fn marker(self) -> &'static str {
        match self {
            MultilineVariant::None => "",
            MultilineVariant::Literal => "|",
            MultilineVariant::LiteralKeep => "|+",
            MultilineVariant::LiteralStrip => "|-",
            MultilineVariant::Folded => ">",
            MultilineVariant::FoldedKeep => ">+",
            MultilineVariant::FoldedStrip => ">-",
            MultilineVariant::AngleBracket => "<",
            MultilineVariant::AngleBracketKeep => "<+",
            MultilineVariant::AngleBracketStrip => "<-",
            MultilineVariant::BackslashQuote => "\"",
        }
    }

    pub fn from_marker(marker: &str) -> Option<MultilineVariant> {
        Some(match marker {
            "|" => MultilineVariant::Literal,
            "|+" => MultilineVariant::LiteralKeep,
            "|-" => MultilineVariant::LiteralStrip,
            ">" => MultilineVariant::Folded,
            ">+" => MultilineVariant::FoldedKeep,
            ">-" => MultilineVariant::FoldedStrip,
            "<" => MultilineVariant::AngleBracket,
            "<+" => MultilineVariant::AngleBracketKeep,
            "<-" => MultilineVariant::AngleBracketStrip,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentPosition {
    Default,
    TopOfFile,
}

/// The atomic unit of the parse tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub value: NodeValue,
    pub children: Vec<NodeId>,
    pub comment: Option<String>,
    pub comment_position: CommentPosition,
    pub key_flag: bool,
    pub list_member_flag: bool,
    pub multiline_variant: MultilineVariant,
    /// Recovered source line number, 1-based; used for duplicate-key and parse-error messages.
    pub line: usize,
}

impl Node {
    pub fn sentinel() -> Self {
        Node {
            value: NodeValue::Sentinel,
            children: Vec::new(),
            comment: None,
            comment_position: CommentPosition::Default,
            key_flag: false,
            list_member_flag: false,
            multiline_variant: MultilineVariant::None,
            line: 0,
        }
    }

    pub fn scalar(value: NodeValue) -> Self {
        Node {
            value,
            ..Node::sentinel()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && !self.value.is_sentinel()
    }
}

/// Arena owning every [`Node`] in a parsed recipe, addressed by [`NodeId`]. `NodeId(0)` is
/// always the sentinel root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Tree { nodes: vec![Node::sentinel()] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Finds the child of `parent` whose key matches `key`. Mapping keys are represented as a
    /// child node flagged `key_flag` whose own single child (if any) is the value, or whose
    /// children are a nested mapping/list.
    pub fn find_key_child(&self, parent: NodeId, key: &str) -> Option<NodeId> {
        self.children(parent).iter().copied().find(|&child| {
            let node = self.get(child);
            node.key_flag && node.value.as_str() == Some(key)
        })
    }

    /// Iterative pre-order traversal (no recursion, explicit stack — the teacher's own arena
    /// crates favour this shape over recursive tree walks to avoid stack depth concerns on
    /// deeply nested recipes).
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
