//! Tree visualization for patterns.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;
use std::io;
use std::rc::Rc;

use ptree::{Style, TreeItem};

use super::{Pattern, PatternId, PatternKind};
use crate::graph::OpKey;

/// Compact rendering: a sub-pattern shared by several parents is expanded
/// once and shown as `[id] → (see above)` afterwards.
#[derive(Clone)]
pub struct PatternTreeCompact {
    pattern: Pattern,
    id: PatternId,
    visited: Rc<RefCell<HashSet<PatternId>>>,
    /// True if this node was already visited when write_self was called
    is_backref: RefCell<bool>,
}

impl PatternTreeCompact {
    pub fn new(pattern: &Pattern) -> Self {
        Self::at(pattern.clone(), pattern.root(), Rc::new(RefCell::new(HashSet::new())))
    }

    fn at(pattern: Pattern, id: PatternId, visited: Rc<RefCell<HashSet<PatternId>>>) -> Self {
        Self { pattern, id, visited, is_backref: RefCell::new(false) }
    }
}

impl TreeItem for PatternTreeCompact {
    type Child = PatternTreeCompact;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        let mut visited = self.visited.borrow_mut();
        if visited.insert(self.id) {
            write!(f, "{}", format_entry(&self.pattern, self.id))
        } else {
            *self.is_backref.borrow_mut() = true;
            write!(f, "[{}] → (see above)", self.id)
        }
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        if *self.is_backref.borrow() {
            return Cow::Borrowed(&[]);
        }
        let children = self
            .pattern
            .kind(self.id)
            .children()
            .into_iter()
            .map(|child| PatternTreeCompact::at(self.pattern.clone(), child, self.visited.clone()))
            .collect::<Vec<_>>();
        Cow::Owned(children)
    }
}

/// Full rendering: shared sub-patterns are expanded at every occurrence.
#[derive(Clone)]
pub struct PatternTreeFull {
    pattern: Pattern,
    id: PatternId,
}

impl PatternTreeFull {
    pub fn new(pattern: &Pattern) -> Self {
        Self { pattern: pattern.clone(), id: pattern.root() }
    }
}

impl TreeItem for PatternTreeFull {
    type Child = PatternTreeFull;

    fn write_self<W: io::Write>(&self, f: &mut W, _style: &Style) -> io::Result<()> {
        write!(f, "{}", format_entry(&self.pattern, self.id))
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        let children = self
            .pattern
            .kind(self.id)
            .children()
            .into_iter()
            .map(|id| PatternTreeFull { pattern: self.pattern.clone(), id })
            .collect::<Vec<_>>();
        Cow::Owned(children)
    }
}

/// Output format: `[id] KIND 'name'`.
fn format_entry(pattern: &Pattern, id: PatternId) -> String {
    let kind = match pattern.kind(id) {
        PatternKind::Wildcard => "WILDCARD".to_string(),
        PatternKind::Constant => "CONSTANT".to_string(),
        PatternKind::GraphInput => "GRAPH_INPUT".to_string(),
        PatternKind::Node { op_type, domain, optional, attrs, .. } => {
            let mut s = format!("NODE({})", OpKey::new(domain.clone(), op_type.clone()));
            if optional.iter().any(|o| *o) {
                s.push_str(&format!(" optional={optional:?}"));
            }
            for (name, value) in attrs {
                s.push_str(&format!(" {name}={value}"));
            }
            s
        }
        PatternKind::Commutable { op_type, domain, .. } => {
            format!("COMMUTABLE({})", OpKey::new(domain.clone(), op_type.clone()))
        }
        PatternKind::Or(_) => "OR".to_string(),
        PatternKind::Sequence(_) => "SEQUENCE".to_string(),
    };
    match pattern.name_of(id) {
        Some(name) => format!("[{id}] {kind} '{name}'"),
        None => format!("[{id}] {kind}"),
    }
}

impl Pattern {
    /// Compact ASCII tree with back-references for shared sub-patterns.
    pub fn tree(&self) -> String {
        render(&PatternTreeCompact::new(self))
    }

    /// ASCII tree expanding shared sub-patterns every time.
    pub fn tree_full(&self) -> String {
        render(&PatternTreeFull::new(self))
    }
}

fn render<T: TreeItem>(tree: &T) -> String {
    let mut buf = Vec::new();
    ptree::write_tree(tree, &mut buf).expect("tree rendering failed");
    String::from_utf8(buf).expect("invalid utf8 in tree")
}
