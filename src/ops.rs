//! Key/index selection and map-filter evaluation over a [`Node`] tree.
//!
//! Grounded in `yaml-path.cpp`'s `SelectByKey`/`SelectByIndex`/
//! `ApplyMapFilter`/`StringMatch`/`ValueIsMatch`: the node-kind-dependent
//! fan-out for keys, the identity behaviour of indices on non-sequences, and
//! the length-precheck-then-compare shape of string matching.

use crate::diagnostics::ErrorItem;
use crate::node::{Node, NodeKind};
use crate::selector::{KvOp, KvPair, KvToken};
use crate::ErrorCode;

/// Selects `key` from `node`.
///
/// - Map: ordinary lookup; [`ErrorCode::NodeNotFound`] if absent.
/// - Sequence: distributes — builds a new sequence of `entry.get_key(key)`
///   for every map entry that has it, dropping entries that don't (and
///   entries that aren't maps). [`ErrorCode::NodeNotFound`] if the result is
///   empty.
/// - Scalar/Null: [`ErrorCode::InvalidNodeType`].
pub fn select_by_key(node: &Node, key: &str) -> Result<Node, (ErrorCode, ErrorItem)> {
    match node.kind() {
        NodeKind::Map if node.is_defined() => {
            let found = node.get_key(key);
            if found.is_defined() {
                Ok(found)
            } else {
                Err((ErrorCode::NodeNotFound, ErrorItem::NodeKind(NodeKind::Map)))
            }
        }
        NodeKind::Sequence if node.is_defined() => {
            let mut out = Vec::new();
            for i in 0..node.len() {
                let item = node.get_index(i);
                if item.is_map() {
                    let v = item.get_key(key);
                    if v.is_defined() {
                        out.push(v);
                    }
                }
            }
            if out.is_empty() {
                Err((ErrorCode::NodeNotFound, ErrorItem::NodeKind(NodeKind::Sequence)))
            } else {
                Ok(Node::sequence(out))
            }
        }
        _ => Err((ErrorCode::InvalidNodeType, ErrorItem::NodeKind(node.kind()))),
    }
}

/// Selects element `index` from `node`.
///
/// - Sequence: ordinary indexed access; [`ErrorCode::NodeNotFound`] out of
///   range.
/// - Scalar/Map/Null: identity semantics — index `0` returns `node` itself
///   unchanged (matches a path like `name[0]` being a no-op on a scalar leaf);
///   any other index is [`ErrorCode::NodeNotFound`].
pub fn select_by_index(node: &Node, index: u64) -> Result<Node, (ErrorCode, ErrorItem)> {
    match node.kind() {
        NodeKind::Sequence if node.is_defined() => {
            let idx = usize::try_from(index).unwrap_or(usize::MAX);
            let item = node.get_index(idx);
            if item.is_defined() {
                Ok(item)
            } else {
                Err((ErrorCode::NodeNotFound, ErrorItem::NodeKind(NodeKind::Sequence)))
            }
        }
        _ => {
            if index == 0 {
                Ok(node.clone())
            } else {
                Err((ErrorCode::NodeNotFound, ErrorItem::NodeKind(node.kind())))
            }
        }
    }
}

/// Byte-length precheck (exact for a plain token, "at least" for a starry
/// one), then a prefix/exact byte compare, ASCII case-folded iff `no_case`.
fn string_match(haystack: &str, needle: &KvToken) -> bool {
    let (hay, tok) = (haystack.as_bytes(), needle.token.as_bytes());
    if needle.starry {
        if hay.len() < tok.len() {
            return false;
        }
        let prefix = &hay[..tok.len()];
        if needle.no_case {
            prefix.eq_ignore_ascii_case(tok)
        } else {
            prefix == tok
        }
    } else if needle.no_case {
        hay.len() == tok.len() && hay.eq_ignore_ascii_case(tok)
    } else {
        hay == tok
    }
}

/// Matches a scalar node's text against a [`KvToken`] — used for both key
/// names and condition values, since map keys are always scalar text.
fn scalar_matches(value: &Node, tok: &KvToken) -> bool {
    match value.as_str() {
        Some(s) => tok.is_all_star() || string_match(&s, tok),
        None => false,
    }
}

/// Evaluates one condition's relation against the value found under a
/// matching key (`Exists` admits any defined value, including null).
fn value_is_match(value: &Node, op: KvOp, value_tok: &KvToken) -> bool {
    match op {
        KvOp::Exists => true,
        KvOp::Equal => scalar_matches(value, value_tok),
        KvOp::NotEqual => !scalar_matches(value, value_tok),
        KvOp::Select => unreachable!("Select conditions are skipped before reaching here"),
    }
}

/// Applies a map filter to a single map node.
///
/// Conditions (`Equal`/`NotEqual`/`Exists`, already partitioned ahead of
/// selects by the parser) are OR'd: the filter passes if *any* condition
/// matches. A `required` (`!`) key raises a bar scoped to its *own*
/// condition: once its turn comes, its candidate key(s) must have been found
/// in the map, regardless of whether some other condition already matched —
/// a required key that is simply absent (or non-matching in value) fails the
/// filter even if an earlier condition's match already set `any_match`. With
/// no conditions, every map passes through to the select phase.
///
/// Selects (plain keys with no relational operator) then project: `{*}` (or
/// any all-star select) passes the node through unchanged; otherwise a new
/// map is built from the matching entries, failing if none match.
fn apply_map_filter_to_map(node: &Node, parts: &[KvPair]) -> Node {
    let split = parts.iter().position(|p| p.op == KvOp::Select).unwrap_or(parts.len());
    let (conditions, selects) = parts.split_at(split);

    let mut any_match = false;
    for pair in conditions {
        let scan_keys = pair.key.starry || pair.key.no_case;
        let mut key_matched = false;
        if scan_keys {
            for (k, v) in node.entries() {
                if !scalar_matches(&k, &pair.key) {
                    continue;
                }
                key_matched = true;
                if value_is_match(&v, pair.op, &pair.value) {
                    any_match = true;
                    break;
                }
            }
        } else {
            let el = node.get_key(&pair.key.token);
            key_matched = el.is_defined();
            if key_matched && value_is_match(&el, pair.op, &pair.value) {
                any_match = true;
            }
        }

        if pair.key.required && !key_matched {
            return Node::undefined();
        }
    }

    if !any_match && !conditions.is_empty() {
        return Node::undefined();
    }

    if selects.is_empty() {
        return node.clone();
    }
    if selects.iter().any(|p| p.key.is_all_star()) {
        return node.clone();
    }

    let mut out = Vec::new();
    for pair in selects {
        if pair.key.starry || pair.key.no_case {
            for (k, v) in node.entries() {
                if scalar_matches(&k, &pair.key) {
                    out.push((k, v));
                }
            }
        } else {
            let v = node.get_key(&pair.key.token);
            if v.is_defined() {
                out.push((Node::scalar(pair.key.token.clone()), v));
            }
        }
    }
    if out.is_empty() {
        Node::undefined()
    } else {
        Node::map(out)
    }
}

/// Applies a map filter at the root: maps filter themselves; sequences apply
/// the filter to each element and collect the non-undefined results into a
/// new sequence; anything else is [`ErrorCode::InvalidNodeType`].
pub fn apply_map_filter(node: &Node, parts: &[KvPair]) -> Result<Node, (ErrorCode, ErrorItem)> {
    match node.kind() {
        NodeKind::Map if node.is_defined() => {
            let result = apply_map_filter_to_map(node, parts);
            if result.is_defined() {
                Ok(result)
            } else {
                Err((ErrorCode::NodeNotFound, ErrorItem::NodeKind(NodeKind::Map)))
            }
        }
        NodeKind::Sequence if node.is_defined() => {
            let mut out = Vec::new();
            for i in 0..node.len() {
                let item = node.get_index(i);
                if item.is_map() {
                    let matched = apply_map_filter_to_map(&item, parts);
                    if matched.is_defined() {
                        out.push(matched);
                    }
                }
            }
            if out.is_empty() {
                Err((ErrorCode::NodeNotFound, ErrorItem::NodeKind(NodeKind::Sequence)))
            } else {
                Ok(Node::sequence(out))
            }
        }
        _ => Err((ErrorCode::InvalidNodeType, ErrorItem::NodeKind(node.kind()))),
    }
}
