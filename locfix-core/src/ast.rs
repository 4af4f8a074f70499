use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::span::Span;

/// A token or syntax-tree element together with the location it reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The producer's `type` tag, if it had one.
    pub kind: Option<String>,
    /// Location as reported by the lexer/parser, with missing parts defaulted.
    pub span: Span,
    /// The element as it came out of the producer.
    pub raw: Value,
}

impl Node {
    pub fn new(kind: Option<String>, span: Span, raw: Value) -> Self {
        Self { kind, span, raw }
    }

    /// Upper-cased `type` tag, or `UNDEFINED` when the element has none.
    pub fn label(&self) -> String {
        match self.kind.as_deref() {
            Some(kind) if !kind.is_empty() => kind.to_uppercase(),
            _ => "UNDEFINED".to_string(),
        }
    }
}

/// How many nodes a child field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    One,
    Many,
}

/// A field of an AST node that holds child nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildField {
    pub name: &'static str,
    pub arity: Arity,
}

const fn one(name: &'static str) -> ChildField {
    ChildField {
        name,
        arity: Arity::One,
    }
}

const fn many(name: &'static str) -> ChildField {
    ChildField {
        name,
        arity: Arity::Many,
    }
}

/// Every parser node type, with the fields its children live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    NamedBlock,
    Block,
    Filter,
    Tag,
    Case,
    When,
    Code,
    Mixin,
    InterpolatedTag,
    While,
    Each,
    Conditional,
    Include,
    Extends,
    RawInclude,
    Attrs,
    Attr,
    BlockComment,
    Comment,
    Doctype,
    IncludeFilter,
    MixinBlock,
    YieldBlock,
    Text,
    FileReference,
}

impl NodeKind {
    pub const ALL: [NodeKind; 25] = [
        NodeKind::NamedBlock,
        NodeKind::Block,
        NodeKind::Filter,
        NodeKind::Tag,
        NodeKind::Case,
        NodeKind::When,
        NodeKind::Code,
        NodeKind::Mixin,
        NodeKind::InterpolatedTag,
        NodeKind::While,
        NodeKind::Each,
        NodeKind::Conditional,
        NodeKind::Include,
        NodeKind::Extends,
        NodeKind::RawInclude,
        NodeKind::Attrs,
        NodeKind::Attr,
        NodeKind::BlockComment,
        NodeKind::Comment,
        NodeKind::Doctype,
        NodeKind::IncludeFilter,
        NodeKind::MixinBlock,
        NodeKind::YieldBlock,
        NodeKind::Text,
        NodeKind::FileReference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::NamedBlock => "NamedBlock",
            NodeKind::Block => "Block",
            NodeKind::Filter => "Filter",
            NodeKind::Tag => "Tag",
            NodeKind::Case => "Case",
            NodeKind::When => "When",
            NodeKind::Code => "Code",
            NodeKind::Mixin => "Mixin",
            NodeKind::InterpolatedTag => "InterpolatedTag",
            NodeKind::While => "While",
            NodeKind::Each => "Each",
            NodeKind::Conditional => "Conditional",
            NodeKind::Include => "Include",
            NodeKind::Extends => "Extends",
            NodeKind::RawInclude => "RawInclude",
            NodeKind::Attrs => "Attrs",
            NodeKind::Attr => "Attr",
            NodeKind::BlockComment => "BlockComment",
            NodeKind::Comment => "Comment",
            NodeKind::Doctype => "Doctype",
            NodeKind::IncludeFilter => "IncludeFilter",
            NodeKind::MixinBlock => "MixinBlock",
            NodeKind::YieldBlock => "YieldBlock",
            NodeKind::Text => "Text",
            NodeKind::FileReference => "FileReference",
        }
    }

    /// Child fields in walk order.
    pub fn children(&self) -> &'static [ChildField] {
        const NODES: &[ChildField] = &[many("nodes")];
        const ATTRS: &[ChildField] = &[many("attrs")];
        const TAG: &[ChildField] = &[many("attrs"), one("block")];
        const BLOCK: &[ChildField] = &[one("block")];
        const EACH: &[ChildField] = &[one("block"), one("alternate")];
        const CONDITIONAL: &[ChildField] = &[one("consequent"), one("alternate")];
        const INCLUDE: &[ChildField] = &[one("block"), one("file")];
        const FILE: &[ChildField] = &[one("file")];
        const RAW_INCLUDE: &[ChildField] = &[many("filters"), one("file")];
        const AST: &[ChildField] = &[one("ast")];

        match self {
            NodeKind::NamedBlock | NodeKind::Block => NODES,
            NodeKind::Filter => ATTRS,
            NodeKind::Tag => TAG,
            NodeKind::Case
            | NodeKind::When
            | NodeKind::Code
            | NodeKind::Mixin
            | NodeKind::InterpolatedTag
            | NodeKind::While => BLOCK,
            NodeKind::Each => EACH,
            NodeKind::Conditional => CONDITIONAL,
            NodeKind::Include => INCLUDE,
            NodeKind::Extends => FILE,
            NodeKind::RawInclude => RAW_INCLUDE,
            NodeKind::FileReference => AST,
            NodeKind::Attrs
            | NodeKind::Attr
            | NodeKind::BlockComment
            | NodeKind::Comment
            | NodeKind::Doctype
            | NodeKind::IncludeFilter
            | NodeKind::MixinBlock
            | NodeKind::YieldBlock
            | NodeKind::Text => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
