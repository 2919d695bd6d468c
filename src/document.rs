//! Rich-text message content as a closed set of node kinds.
//!
//! Guilded stores message bodies as a Slate.js value:
//!
//! ```json
//! {"object": "value", "document": {"object": "document", "nodes": [
//!     {"object": "block", "type": "paragraph", "nodes": [
//!         {"object": "text", "leaves": [{"text": "hi", "marks": [{"type": "bold"}]}]}
//!     ]}
//! ]}}
//! ```
//!
//! Parsing never fails. Anything that does not match a known shape becomes
//! [`Node::Unknown`] carrying the plain text found beneath it.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
    /// Raw node objects, kept for fields the tree does not model (e.g. embeds).
    raw_nodes: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Block(Block),
    Text(Text),
    Inline(Inline),
    Unknown { text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: String,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Text {
    pub leaves: Vec<Leaf>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Leaf {
    pub text: String,
    pub marks: Vec<Mark>,
}

/// Formatting marks. Declaration order is the nesting order used when
/// rendering: earlier marks wrap later ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Other(String),
}

impl Mark {
    fn from_kind(kind: &str) -> Self {
        match kind {
            "bold" => Mark::Bold,
            "italic" => Mark::Italic,
            "underline" => Mark::Underline,
            "strikethrough" => Mark::Strikethrough,
            "inline-code-v2" | "code" => Mark::Code,
            other => Mark::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Link { href: String, nodes: Vec<Node> },
    Mention(Mention),
    Reaction(Reaction),
    Other { kind: String, nodes: Vec<Node> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mention {
    pub target: MentionTarget,
    /// Best available display name.
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MentionTarget {
    Person(String),
    Role(String),
    Channel(String),
    Other { kind: String, id: String },
}

impl Mention {
    /// `everyone` and `here` mentions ping the whole channel.
    pub fn is_broadcast(&self) -> bool {
        matches!(&self.target, MentionTarget::Other { kind, .. } if kind == "everyone" || kind == "here")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reaction {
    pub id: String,
    pub custom: Option<CustomEmoji>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomEmoji {
    pub id: String,
    pub name: String,
    pub animated: bool,
}

impl Document {
    /// Parse a message `content` value. Missing or malformed content yields an
    /// empty document.
    pub fn from_content(content: &Value) -> Self {
        let raw_nodes = content
            .get("document")
            .and_then(|d| d.get("nodes"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let nodes = raw_nodes.iter().map(Node::from_value).collect();
        Self { nodes, raw_nodes }
    }

    /// `data.embeds` of every top-level node, in document order.
    pub fn embeds(&self) -> impl Iterator<Item = &Value> {
        self.raw_nodes.iter().flat_map(|node| {
            node.get("data")
                .and_then(|d| d.get("embeds"))
                .and_then(Value::as_array)
                .map(|a| a.as_slice())
                .unwrap_or_default()
        })
    }

    /// Every mention in the tree, depth-first.
    pub fn mentions(&self) -> Vec<&Mention> {
        let mut out = Vec::new();
        collect_mentions(&self.nodes, &mut out);
        out
    }
}

fn collect_mentions<'a>(nodes: &'a [Node], out: &mut Vec<&'a Mention>) {
    for node in nodes {
        match node {
            Node::Block(b) => collect_mentions(&b.nodes, out),
            Node::Inline(Inline::Mention(m)) => out.push(m),
            Node::Inline(Inline::Link { nodes, .. }) | Node::Inline(Inline::Other { nodes, .. }) => {
                collect_mentions(nodes, out)
            }
            Node::Inline(Inline::Reaction(_)) | Node::Text(_) | Node::Unknown { .. } => {}
        }
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Document::from_content(&value))
    }
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = value;
    for key in path {
        cur = cur.get(*key)?;
    }
    cur.as_str()
}

fn children(value: &Value) -> Vec<Node> {
    value
        .get("nodes")
        .and_then(Value::as_array)
        .map(|nodes| nodes.iter().map(Node::from_value).collect())
        .unwrap_or_default()
}

impl Node {
    pub fn from_value(value: &Value) -> Node {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
        match value.get("object").and_then(Value::as_str) {
            Some("block") => Node::Block(Block {
                kind: kind.to_string(),
                nodes: children(value),
            }),
            Some("text") => Node::Text(parse_text(value)),
            Some("inline") => Node::Inline(parse_inline(kind, value)),
            _ => Node::Unknown {
                text: plain_text(value),
            },
        }
    }
}

fn parse_text(value: &Value) -> Text {
    let leaves = match value.get("leaves").and_then(Value::as_array) {
        Some(leaves) => leaves.iter().map(parse_leaf).collect(),
        // Newer Slate versions put the text directly on the node.
        None => vec![parse_leaf(value)],
    };
    Text { leaves }
}

fn parse_leaf(value: &Value) -> Leaf {
    let text = value
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let marks = value
        .get("marks")
        .and_then(Value::as_array)
        .map(|marks| {
            marks
                .iter()
                .filter_map(|m| m.get("type").and_then(Value::as_str))
                .map(Mark::from_kind)
                .collect()
        })
        .unwrap_or_default();
    Leaf { text, marks }
}

fn parse_inline(kind: &str, value: &Value) -> Inline {
    let data = value.get("data").unwrap_or(&Value::Null);
    match kind {
        "link" => Inline::Link {
            href: str_at(data, &["href"]).unwrap_or_default().to_string(),
            nodes: children(value),
        },
        "mention" => Inline::Mention(parse_mention(data)),
        "reaction" => Inline::Reaction(parse_reaction(data)),
        other => Inline::Other {
            kind: other.to_string(),
            nodes: children(value),
        },
    }
}

fn parse_mention(data: &Value) -> Mention {
    let mention = data.get("mention").unwrap_or(&Value::Null);
    let kind = str_at(mention, &["type"]).unwrap_or_default();
    let id = match mention.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let name = str_at(mention, &["name"])
        .or_else(|| str_at(mention, &["nickname"]))
        .or_else(|| str_at(data, &["name"]))
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let target = match kind {
        "person" => MentionTarget::Person(id),
        "role" => MentionTarget::Role(id),
        "channel" => {
            let channel_id = str_at(data, &["channel", "id"])
                .map(str::to_string)
                .unwrap_or(id);
            MentionTarget::Channel(channel_id)
        }
        other => MentionTarget::Other {
            kind: other.to_string(),
            id,
        },
    };
    Mention { target, name }
}

fn parse_reaction(data: &Value) -> Reaction {
    let reaction = data.get("reaction").unwrap_or(&Value::Null);
    let id = match reaction.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let custom = reaction
        .get("customReaction")
        .filter(|c| c.as_object().is_some_and(|o| !o.is_empty()))
        .map(|c| CustomEmoji {
            id: match c.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            },
            name: str_at(c, &["name"]).unwrap_or("emoji").to_string(),
            animated: c.get("apng").is_some_and(|a| !a.is_null()),
        });
    Reaction { id, custom }
}

/// Best-effort text beneath an arbitrary JSON node.
fn plain_text(value: &Value) -> String {
    let mut out = String::new();
    collect_text(value, &mut out);
    out
}

fn collect_text(value: &Value, out: &mut String) {
    if let Some(leaves) = value.get("leaves").and_then(Value::as_array) {
        for leaf in leaves {
            if let Some(t) = leaf.get("text").and_then(Value::as_str) {
                out.push_str(t);
            }
        }
    } else if let Some(t) = value.get("text").and_then(Value::as_str) {
        out.push_str(t);
    }
    if let Some(nodes) = value.get("nodes").and_then(Value::as_array) {
        for node in nodes {
            collect_text(node, out);
        }
    }
}
