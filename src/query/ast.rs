//! Query AST
//!
//! Intermediate representation of a store query. Compilers build these
//! values; [`super::render`] is the only place that turns them into text,
//! and the in-memory store evaluates them directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Uid;

/// Bound query variables (`$offset` → `"0"`)
pub type QueryVars = BTreeMap<String, String>;

/// Reference to a set of nodes inside `uid(...)`
#[derive(Debug, Clone, PartialEq)]
pub enum UidRef {
    /// A uid variable bound by another block
    Var(String),
    /// A literal node
    Node(Uid),
}

/// Root function selecting a block's starting nodes
#[derive(Debug, Clone, PartialEq)]
pub enum Func {
    /// `eq(predicate, value)`; an array value matches any element
    Eq { predicate: String, value: Value },
    Has(String),
    Uid(Vec<UidRef>),
    Type(String),
}

impl Func {
    pub fn eq(predicate: impl Into<String>, value: impl Into<Value>) -> Self {
        Func::Eq {
            predicate: predicate.into(),
            value: value.into(),
        }
    }

    pub fn uid_var(name: impl Into<String>) -> Self {
        Func::Uid(vec![UidRef::Var(name.into())])
    }

    pub fn uid(uid: Uid) -> Self {
        Func::Uid(vec![UidRef::Node(uid)])
    }
}

/// Node filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Equality; an array value matches any element
    Eq { predicate: String, value: Value },
    /// Greater or equal
    Ge { predicate: String, value: Value },
    Regex {
        predicate: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// Node is a member of the referenced sets
    Uid(Vec<UidRef>),
    Has(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(predicate: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            predicate: predicate.into(),
            value: value.into(),
        }
    }

    pub fn ge(predicate: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ge {
            predicate: predicate.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive regex
    pub fn regex(predicate: impl Into<String>, pattern: impl Into<String>) -> Self {
        Filter::Regex {
            predicate: predicate.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        }
    }

    pub fn uid_var(name: impl Into<String>) -> Self {
        Filter::Uid(vec![UidRef::Var(name.into())])
    }

    /// Conjunction; `None` when empty, the filter itself when single
    pub fn all(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        }
    }

    /// Disjunction; `None` when empty, the filter itself when single
    pub fn any(mut filters: Vec<Filter>) -> Option<Filter> {
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Filter::Or(filters)),
        }
    }
}

/// An edge, optionally followed backwards (`~predicate`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub predicate: String,
    pub reverse: bool,
}

impl Edge {
    pub fn forward(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            reverse: false,
        }
    }

    pub fn reverse(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            reverse: true,
        }
    }
}

/// An edge hop inside a block; used to bind variables
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    pub edge: Edge,
    pub filter: Option<Filter>,
    /// Variable collecting the nodes reached
    pub bind: Option<String>,
    pub children: Vec<Traversal>,
}

impl Traversal {
    pub fn new(edge: Edge) -> Self {
        Self {
            edge,
            filter: None,
            bind: None,
            children: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn bind_as(mut self, var: impl Into<String>) -> Self {
        self.bind = Some(var.into());
        self
    }

    pub fn then(mut self, child: Traversal) -> Self {
        self.children.push(child);
        self
    }
}

/// Output selection of a named block
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// `alias: predicate`; the predicate `uid` yields the node id
    Field { alias: String, predicate: String },
    /// `alias: count(uid)` over the block's nodes
    Count { alias: String },
    /// Nested objects reached over an edge
    Edge {
        alias: String,
        edge: Edge,
        selections: Vec<Selection>,
    },
}

impl Selection {
    pub fn field(alias: impl Into<String>, predicate: impl Into<String>) -> Self {
        Selection::Field {
            alias: alias.into(),
            predicate: predicate.into(),
        }
    }

    pub fn count(alias: impl Into<String>) -> Self {
        Selection::Count {
            alias: alias.into(),
        }
    }

    pub fn edge(alias: impl Into<String>, edge: Edge, selections: Vec<Selection>) -> Self {
        Selection::Edge {
            alias: alias.into(),
            edge,
            selections,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub predicate: String,
    pub direction: SortDirection,
}

/// Pagination argument, literal or bound variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageArg {
    Literal(u64),
    Var(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub first: Option<PageArg>,
    pub offset: Option<PageArg>,
}

/// Recursive expansion of a block's traversals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurse {
    /// Maximum number of hops
    pub depth: u32,
    pub allow_loop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    /// `var(...)`: only binds variables, returns nothing
    Var,
    /// Result block returned under this name
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    /// Variable bound to the block's root nodes
    pub bind: Option<String>,
    pub root: Func,
    pub filter: Option<Filter>,
    pub order: Option<Order>,
    pub page: Page,
    pub recurse: Option<Recurse>,
    pub traversals: Vec<Traversal>,
    pub selections: Vec<Selection>,
}

impl Block {
    pub fn var(root: Func) -> Self {
        Self::with_kind(BlockKind::Var, root)
    }

    pub fn named(name: impl Into<String>, root: Func) -> Self {
        Self::with_kind(BlockKind::Named(name.into()), root)
    }

    fn with_kind(kind: BlockKind, root: Func) -> Self {
        Self {
            kind,
            bind: None,
            root,
            filter: None,
            order: None,
            page: Page::default(),
            recurse: None,
            traversals: Vec::new(),
            selections: Vec::new(),
        }
    }

    pub fn bind_as(mut self, var: impl Into<String>) -> Self {
        self.bind = Some(var.into());
        self
    }

    pub fn with_filter(mut self, filter: Option<Filter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn order_by(mut self, predicate: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some(Order {
            predicate: predicate.into(),
            direction,
        });
        self
    }

    pub fn paginate(mut self, first: PageArg, offset: PageArg) -> Self {
        self.page = Page {
            first: Some(first),
            offset: Some(offset),
        };
        self
    }

    pub fn recurse(mut self, depth: u32) -> Self {
        self.recurse = Some(Recurse {
            depth,
            allow_loop: false,
        });
        self
    }

    pub fn traverse(mut self, traversal: Traversal) -> Self {
        self.traversals.push(traversal);
        self
    }

    pub fn select(mut self, selection: Selection) -> Self {
        self.selections.push(selection);
        self
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Var => None,
            BlockKind::Named(name) => Some(name),
        }
    }
}

/// Declared query parameter, e.g. `$offset: int`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: String,
    pub kind: String,
}

/// A complete query: parameters plus ordered blocks
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub name: String,
    pub params: Vec<QueryParam>,
    pub blocks: Vec<Block>,
}

impl Query {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.params.push(QueryParam {
            name: name.into(),
            kind: kind.into(),
        });
        self
    }

    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn find_block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name() == Some(name))
    }
}
