//! Renders a [`Document`] as Discord-flavoured markdown.

use crate::document::{Block, Document, Inline, Leaf, Mark, Mention, MentionTarget, Node, Reaction};

pub fn render(doc: &Document) -> String {
    render_nodes(&doc.nodes)
}

/// Blocks go on their own lines; consecutive text/inline nodes share a line.
fn render_nodes(nodes: &[Node]) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut run: Option<String> = None;

    for node in nodes {
        match node {
            Node::Block(block) => {
                if let Some(line) = run.take() {
                    lines.push(line);
                }
                lines.push(render_block(block));
            }
            other => run
                .get_or_insert_with(String::new)
                .push_str(&render_inline_level(other)),
        }
    }
    if let Some(line) = run {
        lines.push(line);
    }
    lines.join("\n")
}

fn render_block(block: &Block) -> String {
    let content = render_nodes(&block.nodes);
    match block.kind.as_str() {
        "code-line" => format!("`{content}`"),
        _ => content,
    }
}

fn render_inline_level(node: &Node) -> String {
    match node {
        Node::Text(text) => text.leaves.iter().map(render_leaf).collect(),
        Node::Inline(inline) => render_inline(inline),
        Node::Unknown { text } => text.clone(),
        Node::Block(block) => render_block(block),
    }
}

/// Marks are applied in a fixed nesting order regardless of source order:
/// bold outermost, then italic, underline, strikethrough, inline code.
fn render_leaf(leaf: &Leaf) -> String {
    if leaf.text.is_empty() {
        return String::new();
    }
    let mut marks: Vec<&Mark> = leaf.marks.iter().collect();
    marks.sort();
    marks.dedup();

    let mut out = leaf.text.clone();
    for mark in marks.into_iter().rev() {
        let delim = match mark {
            Mark::Bold => "**",
            Mark::Italic => "*",
            Mark::Underline => "__",
            Mark::Strikethrough => "~~",
            Mark::Code => "`",
            Mark::Other(_) => continue,
        };
        out = format!("{delim}{out}{delim}");
    }
    out
}

fn render_inline(inline: &Inline) -> String {
    match inline {
        Inline::Link { href, nodes } => {
            let label = nodes
                .first()
                .and_then(|n| match n {
                    Node::Text(t) => t.leaves.first().map(|l| l.text.as_str()),
                    _ => None,
                })
                .filter(|t| !t.is_empty())
                .unwrap_or(href.as_str());
            format!("[{label}]({href})")
        }
        Inline::Mention(mention) => render_mention(mention),
        Inline::Reaction(reaction) => render_reaction(reaction),
        Inline::Other { nodes, .. } => render_nodes(nodes),
    }
}

fn render_mention(mention: &Mention) -> String {
    match &mention.target {
        MentionTarget::Person(id) => format!("<@{id}>"),
        MentionTarget::Role(id) => format!("<@&{id}>"),
        MentionTarget::Channel(id) => format!("<#{id}>"),
        MentionTarget::Other { id, .. } => {
            format!("@{}", mention.name.as_deref().unwrap_or(id))
        }
    }
}

fn render_reaction(reaction: &Reaction) -> String {
    match &reaction.custom {
        Some(emoji) => {
            let prefix = if emoji.animated { "a" } else { "" };
            format!("<{prefix}:{}:{}>", emoji.name, emoji.id)
        }
        None => format!(":{}:", reaction.id),
    }
}
