/*!
 * ===============================================================================
 * Node model: the YAML document the path engine walks
 * ===============================================================================
 *
 * This module stands in for "the underlying YAML document library" that the
 * path engine treats as an external collaborator: a loader, a node type with
 * kind/children/scalar-text/key-value iteration, and reference-counted shared
 * subtrees. It is deliberately thin — a real deployment could swap this out
 * for any YAML library's node type, as long as it offers the same handful of
 * operations.
 *
 * NODE ARCHITECTURE:
 * ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
 * │  YAML text  │ -> │ serde_yml   │ -> │    Node     │
 * │  (&str)     │    │ (Value)     │    │ (Rc<..>)    │
 * └─────────────┘    └─────────────┘    └─────────────┘
 *
 * NODE KINDS:
 * - Null: explicitly present, empty value
 * - Scalar: a string-shaped leaf (numbers/bools are kept as their source text)
 * - Sequence: ordered list of nodes
 * - Map: ordered (key, value) pairs — a Vec, not a HashMap, to preserve
 *   source order the same way a YAML mapping's key order is preserved
 */

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// The kind of a [`Node`]; drives every node-kind–dependent branch in `ops`/`resolver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Scalar,
    Sequence,
    Map,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Null => "(null)",
            NodeKind::Scalar => "scalar",
            NodeKind::Sequence => "sequence",
            NodeKind::Map => "map",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
enum NodeValue {
    Null,
    Scalar(String),
    Sequence(Vec<Node>),
    Map(Vec<(Node, Node)>),
}

/// A handle into a shared YAML document tree.
///
/// Cloning a `Node` aliases the same underlying subtree (`Rc<RefCell<_>>`), so
/// `let b = a.clone(); b.reset(other);` does not change what `a` points to —
/// exactly as `node.reset(result)` in the original only rebinds the local
/// handle, not every alias of it. `Node` is intentionally `!Send`/`!Sync`.
#[derive(Clone)]
pub struct Node(Option<Rc<RefCell<NodeValue>>>);

impl Node {
    /// The sentinel returned when a selector legitimately found nothing.
    /// Falsy in a boolean context via [`Node::is_defined`].
    pub fn undefined() -> Node {
        Node(None)
    }

    pub fn null() -> Node {
        Node(Some(Rc::new(RefCell::new(NodeValue::Null))))
    }

    pub fn scalar(text: impl Into<String>) -> Node {
        Node(Some(Rc::new(RefCell::new(NodeValue::Scalar(text.into())))))
    }

    pub fn sequence(items: Vec<Node>) -> Node {
        Node(Some(Rc::new(RefCell::new(NodeValue::Sequence(items)))))
    }

    pub fn map(pairs: Vec<(Node, Node)>) -> Node {
        Node(Some(Rc::new(RefCell::new(NodeValue::Map(pairs)))))
    }

    /// True for every node except [`Node::undefined`].
    pub fn is_defined(&self) -> bool {
        self.0.is_some()
    }

    pub fn kind(&self) -> NodeKind {
        match &self.0 {
            None => NodeKind::Null, // callers must check is_defined() first for undefined
            Some(rc) => match &*rc.borrow() {
                NodeValue::Null => NodeKind::Null,
                NodeValue::Scalar(_) => NodeKind::Scalar,
                NodeValue::Sequence(_) => NodeKind::Sequence,
                NodeValue::Map(_) => NodeKind::Map,
            },
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.is_defined() && self.kind() == NodeKind::Scalar
    }

    pub fn is_sequence(&self) -> bool {
        self.is_defined() && self.kind() == NodeKind::Sequence
    }

    pub fn is_map(&self) -> bool {
        self.is_defined() && self.kind() == NodeKind::Map
    }

    pub fn is_null(&self) -> bool {
        self.is_defined() && self.kind() == NodeKind::Null
    }

    /// Scalar text, or `None` if this node isn't a scalar.
    pub fn as_str(&self) -> Option<std::cell::Ref<'_, str>> {
        let rc = self.0.as_ref()?;
        let r = rc.borrow();
        match &*r {
            NodeValue::Scalar(_) => Some(std::cell::Ref::map(r, |v| match v {
                NodeValue::Scalar(s) => s.as_str(),
                _ => unreachable!(),
            })),
            _ => None,
        }
    }

    /// Sequence length; 0 for non-sequences.
    pub fn len(&self) -> usize {
        match &self.0 {
            Some(rc) => match &*rc.borrow() {
                NodeValue::Sequence(items) => items.len(),
                _ => 0,
            },
            None => 0,
        }
    }

    /// Indexed access into a sequence. Returns [`Node::undefined`] out of range
    /// or on non-sequences.
    pub fn get_index(&self, index: usize) -> Node {
        match &self.0 {
            Some(rc) => match &*rc.borrow() {
                NodeValue::Sequence(items) => items.get(index).cloned().unwrap_or_else(Node::undefined),
                _ => Node::undefined(),
            },
            None => Node::undefined(),
        }
    }

    /// Map lookup by string key. Returns [`Node::undefined`] if absent or not a map.
    pub fn get_key(&self, key: &str) -> Node {
        match &self.0 {
            Some(rc) => match &*rc.borrow() {
                NodeValue::Map(pairs) => pairs
                    .iter()
                    .find(|(k, _)| k.as_str().as_deref() == Some(key))
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(Node::undefined),
                _ => Node::undefined(),
            },
            None => Node::undefined(),
        }
    }

    /// Iterate (key, value) pairs of a map. Empty for non-maps.
    pub fn entries(&self) -> Vec<(Node, Node)> {
        match &self.0 {
            Some(rc) => match &*rc.borrow() {
                NodeValue::Map(pairs) => pairs.clone(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    /// Reassigns this handle to point at `other`'s underlying tree, aliasing it.
    /// Matches the original's `node.reset(result)`.
    pub fn reset(&mut self, other: Node) {
        self.0 = other.0;
    }

    /// Appends to a sequence in place; turns a Null node into an empty
    /// sequence first (matching yaml-cpp's `push_back`-on-a-fresh-`Node`
    /// semantics that `SelectByKey`'s sequence-distribution relies on).
    pub fn push(&mut self, item: Node) {
        match &self.0 {
            Some(rc) => {
                let mut borrow = rc.borrow_mut();
                match &mut *borrow {
                    NodeValue::Sequence(items) => {
                        items.push(item);
                        return;
                    }
                    NodeValue::Null => {
                        *borrow = NodeValue::Sequence(vec![item]);
                        return;
                    }
                    _ => {}
                }
            }
            None => {}
        }
        *self = Node::sequence(vec![item]);
    }

    /// Replaces this node's content in place when it already has a backing
    /// cell (mutating every alias of it, not just this handle), or allocates
    /// a fresh cell when `self` is [`Node::undefined`] (nothing to alias yet).
    /// This is what lets `ensure_key`/`ensure_index` promote a `Null` element
    /// sitting inside someone else's sequence or map without detaching it.
    fn set_value(&mut self, value: NodeValue) {
        match &self.0 {
            Some(rc) => *rc.borrow_mut() = value,
            None => self.0 = Some(Rc::new(RefCell::new(value))),
        }
    }

    /// Overwrites this node's content with a scalar, in place.
    /// Used by the `ensure`/`create` construction helper to fill in a
    /// previously-`Null` element.
    pub fn set_scalar(&mut self, text: impl Into<String>) {
        self.set_value(NodeValue::Scalar(text.into()));
    }

    /// Ensures a key exists in a map, creating it with `Null` value if absent.
    /// Used by the `ensure`/`create` construction helper. Panics if called on
    /// a non-map, non-null node — callers in `resolver::ensure` only reach
    /// here after checking the kind.
    pub fn ensure_key(&mut self, key: &str) -> Node {
        if !self.is_defined() || self.is_null() {
            self.set_value(NodeValue::Map(Vec::new()));
        } else if !self.is_map() {
            panic!("ensure_key called on a non-map, non-null node");
        }
        let rc = self.0.as_ref().expect("ensure_key leaves the node defined");
        let mut borrow = rc.borrow_mut();
        let pairs = match &mut *borrow {
            NodeValue::Map(pairs) => pairs,
            _ => unreachable!(),
        };
        if let Some((_, v)) = pairs.iter().find(|(k, _)| k.as_str().as_deref() == Some(key)) {
            return v.clone();
        }
        let value = Node::null();
        pairs.push((Node::scalar(key), value.clone()));
        value
    }

    /// Assigns a value under `key`, overwriting any existing entry.
    pub fn assign_key(&mut self, key: &str, value: Node) {
        if !self.is_defined() || self.is_null() {
            self.set_value(NodeValue::Map(Vec::new()));
        } else if !self.is_map() {
            panic!("assign_key called on a non-map, non-null node");
        }
        let rc = self.0.as_ref().expect("assign_key leaves the node defined");
        let mut borrow = rc.borrow_mut();
        let pairs = match &mut *borrow {
            NodeValue::Map(pairs) => pairs,
            _ => unreachable!(),
        };
        if let Some(entry) = pairs.iter_mut().find(|(k, _)| k.as_str().as_deref() == Some(key)) {
            entry.1 = value;
        } else {
            pairs.push((Node::scalar(key), value));
        }
    }

    /// Pads a sequence with `Null` elements until `index` is valid, turning a
    /// `Null`/undefined node into a fresh sequence first, then returns the
    /// element handle at `index`.
    pub fn ensure_index(&mut self, index: usize) -> Node {
        if !self.is_defined() || self.is_null() {
            self.set_value(NodeValue::Sequence(Vec::new()));
        } else if !self.is_sequence() {
            panic!("ensure_index called on a non-sequence, non-null node");
        }
        let rc = self.0.as_ref().expect("ensure_index leaves the node defined");
        let mut borrow = rc.borrow_mut();
        let items = match &mut *borrow {
            NodeValue::Sequence(items) => items,
            _ => unreachable!(),
        };
        while items.len() <= index {
            items.push(Node::null());
        }
        items[index].clone()
    }

    /// True if `self` and `other` are the same underlying tree (not just
    /// structurally equal) — used by a handful of aliasing tests.
    pub fn same_tree(&self, other: &Node) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_defined() {
            return write!(f, "Node::undefined");
        }
        match self.kind() {
            NodeKind::Null => write!(f, "Node::Null"),
            NodeKind::Scalar => write!(f, "Node::Scalar({:?})", self.as_str().as_deref()),
            NodeKind::Sequence => write!(f, "Node::Sequence(len={})", self.len()),
            NodeKind::Map => write!(f, "Node::Map(len={})", self.entries().len()),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_defined(), other.is_defined()) {
            (false, false) => return true,
            (false, true) | (true, false) => return false,
            (true, true) => {}
        }
        match (self.kind(), other.kind()) {
            (NodeKind::Null, NodeKind::Null) => true,
            (NodeKind::Scalar, NodeKind::Scalar) => self.as_str().as_deref() == other.as_str().as_deref(),
            (NodeKind::Sequence, NodeKind::Sequence) => {
                let (a, b) = (self.len(), other.len());
                a == b && (0..a).all(|i| self.get_index(i) == other.get_index(i))
            }
            (NodeKind::Map, NodeKind::Map) => {
                let (a, b) = (self.entries(), other.entries());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k.as_str().as_deref() == k2.as_str().as_deref() && v == v2)
                    })
            }
            _ => false,
        }
    }
}

/// Parses YAML text into a [`Node`] tree via `serde_yml`. This is the thin
/// loader half of the "external document library" — it performs no path
/// resolution of its own.
pub fn from_str(yaml: &str) -> Result<Node, serde_yml::Error> {
    let value: serde_yml::Value = serde_yml::from_str(yaml)?;
    Ok(from_value(&value))
}

fn from_value(value: &serde_yml::Value) -> Node {
    match value {
        serde_yml::Value::Null => Node::null(),
        serde_yml::Value::Bool(b) => Node::scalar(b.to_string()),
        serde_yml::Value::Number(n) => Node::scalar(n.to_string()),
        serde_yml::Value::String(s) => Node::scalar(s.clone()),
        serde_yml::Value::Sequence(items) => Node::sequence(items.iter().map(from_value).collect()),
        serde_yml::Value::Mapping(map) => Node::map(
            map.iter()
                .map(|(k, v)| (from_value(k), from_value(v)))
                .collect(),
        ),
        #[allow(unreachable_patterns)]
        _ => Node::null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn undefined_is_falsy_and_distinct_from_null() {
        let undef = Node::undefined();
        let null = Node::null();
        assert!(!undef.is_defined());
        assert!(null.is_defined());
        assert!(null.is_null());
    }

    #[test]
    fn map_lookup_roundtrip() {
        let m = Node::map(vec![(Node::scalar("k"), Node::scalar("v"))]);
        assert_eq!(m.get_key("k").as_str().as_deref(), Some("v"));
        assert!(!m.get_key("missing").is_defined());
    }

    #[test]
    fn sequence_index_roundtrip() {
        let s = Node::sequence(vec![Node::scalar("a"), Node::scalar("b")]);
        assert_eq!(s.get_index(0).as_str().as_deref(), Some("a"));
        assert!(!s.get_index(5).is_defined());
    }

    #[test]
    fn clone_aliases_same_tree() {
        let a = Node::map(vec![(Node::scalar("k"), Node::scalar("v"))]);
        let b = a.clone();
        assert!(a.same_tree(&b));
    }

    #[test]
    fn reset_rebinds_only_the_local_handle() {
        let a = Node::scalar("before");
        let mut b = a.clone();
        b.reset(Node::scalar("after"));
        assert_eq!(a.as_str().as_deref(), Some("before"));
        assert_eq!(b.as_str().as_deref(), Some("after"));
    }

    #[test]
    fn ensure_key_promotes_an_aliased_null_in_place() {
        let seq = Node::sequence(vec![Node::null()]);
        let mut el = seq.get_index(0);
        el.ensure_key("a").set_scalar("v");
        assert_eq!(
            seq.get_index(0).get_key("a").as_str().as_deref(),
            Some("v"),
            "promoting el must be visible through the sequence it came from"
        );
    }

    #[test]
    fn loads_fixture_yaml() {
        let yaml = "- name: Joe\n  color: red\n- name: Sina\n  color: blue\n";
        let node = from_str(yaml).expect("valid yaml");
        assert!(node.is_sequence());
        assert_eq!(node.len(), 2);
        assert_eq!(node.get_index(0).get_key("name").as_str().as_deref(), Some("Joe"));
    }
}
