//! Path resolution: walks a [`Selector`] stream against a [`Node`] tree.
//!
//! Grounded in `yaml-path.cpp`'s `PathResolve`/`Select`/`Require` for the main
//! walk loop and its thin wrappers, and in `Ensure`/`Create`/`EnsureNodeApplyKey`
//! for the supplementary construction helper, which walks the same selector
//! stream against a fan-out of candidate nodes instead of a single one.

use crate::diagnostics::{Diagnostics, ErrorItem};
use crate::node::Node;
use crate::ops;
use crate::selector::{KvOp, Selector, SelectorParser};
use crate::token::BoundArg;
use crate::ErrorCode;

/// Advances `node` and `remainder` as far as a valid, matching path allows.
///
/// `remainder` is committed right after `next_selector` returns, using its
/// post-period, pre-selector position — on failure it names the selector
/// that failed, not the one after it; on success, after the loop, it is
/// empty (or whatever the path's own trailing whitespace leaves behind).
pub fn path_resolve<'a>(
    node: &mut Node,
    remainder: &mut &'a str,
    args: &[BoundArg<'a>],
    mut diags: Option<&mut Diagnostics>,
) -> ErrorCode {
    if let Some(d) = diags.as_deref_mut() {
        d.reset(*remainder);
    }
    let mut parser = SelectorParser::new(*remainder, args);

    loop {
        if !node.is_defined() {
            let code = ErrorCode::NodeNotFound;
            if let Some(d) = diags.as_deref_mut() {
                d.record_error(code, 0, ErrorItem::None);
            }
            return code;
        }

        let selector = parser.next_selector(diags.as_deref_mut());
        *remainder = parser.remainder();

        match selector {
            Selector::None => break,
            Selector::Invalid => return parser.error(),

            Selector::Key(key) => match ops::select_by_key(node, &key) {
                Ok(n) => *node = n,
                Err((code, item)) => return fail(diags.as_deref_mut(), code, item),
            },

            Selector::Index(index) => match ops::select_by_index(node, index) {
                Ok(n) => *node = n,
                Err((code, item)) => return fail(diags.as_deref_mut(), code, item),
            },

            Selector::MapFilter(parts) => match ops::apply_map_filter(node, &parts) {
                Ok(n) => *node = n,
                Err((code, item)) => return fail(diags.as_deref_mut(), code, item),
            },
        }
    }

    *remainder = parser.remainder();
    ErrorCode::Ok
}

fn fail(diags: Option<&mut Diagnostics>, code: ErrorCode, item: ErrorItem) -> ErrorCode {
    if let Some(d) = diags {
        d.record_error(code, 0, item);
    }
    code
}

/// Selects a node by path. Returns [`Node::undefined`] if the path was
/// well-formed but nothing matched; raises (returns `Err`) on a malformed path.
pub fn select(mut node: Node, path: &str, args: &[BoundArg]) -> Result<Node, Diagnostics> {
    let mut diags = Diagnostics::new();
    let mut remainder = path;
    let code = path_resolve(&mut node, &mut remainder, args, Some(&mut diags));
    if code == ErrorCode::Ok {
        Ok(node)
    } else if code.is_node_error() {
        Ok(Node::undefined())
    } else {
        Err(diags)
    }
}

/// Like [`select`], but raises on any failure, including node-not-found.
pub fn require(mut node: Node, path: &str, args: &[BoundArg]) -> Result<Node, Diagnostics> {
    let mut diags = Diagnostics::new();
    let mut remainder = path;
    let code = path_resolve(&mut node, &mut remainder, args, Some(&mut diags));
    if code == ErrorCode::Ok {
        Ok(node)
    } else {
        Err(diags)
    }
}

/// Parses `path` without resolving against any node. Returns the error code
/// (`Ok` iff well-formed), the resolved prefix, and the offset of the error.
pub fn path_validate(path: &str) -> (ErrorCode, String, usize) {
    let mut diags = Diagnostics::new();
    diags.reset(path);
    let args: Vec<BoundArg> = Vec::new();
    let mut parser = SelectorParser::new(path, &args);
    loop {
        match parser.next_selector(Some(&mut diags)) {
            Selector::None | Selector::Invalid => break,
            _ => {}
        }
    }
    (parser.error(), diags.resolved_path().to_string(), diags.error_offset())
}

/// For each candidate that is `Null` or a `Map`, ensures `key` exists
/// (creating it as `Null` if absent) and yields its value handle. A
/// `Sequence` candidate recurses into its elements one level (matching the
/// original's `recurse` flag, threaded non-recursively past the first level).
fn ensure_apply_key_one(result: &mut Vec<Node>, start: &mut Node, key: &str, recurse: bool) {
    if !start.is_defined() || start.is_null() || start.is_map() {
        result.push(start.ensure_key(key));
    } else if start.is_sequence() && recurse {
        for i in 0..start.len() {
            let mut el = start.get_index(i);
            if el.is_null() || el.is_map() {
                ensure_apply_key_one(result, &mut el, key, false);
            }
        }
    }
}

fn ensure_apply_key(next: &mut [Node], key: &str) -> Vec<Node> {
    let mut result = Vec::new();
    for el in next.iter_mut() {
        if el.is_null() || el.is_map() {
            ensure_apply_key_one(&mut result, el, key, true);
        }
    }
    result
}

/// For each candidate that is absent/`Null`/a `Sequence`, pads the sequence
/// with `Null` elements until `index` is valid, then yields the element handle.
fn ensure_apply_index(next: &mut [Node], index: usize) -> Vec<Node> {
    let mut result = Vec::new();
    for el in next.iter_mut() {
        if !el.is_defined() || el.is_null() || el.is_sequence() {
            result.push(el.ensure_index(index));
        }
    }
    result
}

/// Walks `path` against a fan-out of candidate nodes seeded from `node`,
/// creating intermediate `Null`s and map/sequence slots instead of failing on
/// a missing key or short sequence. Mutates `node` in place via aliasing (if
/// it already has a backing cell) and returns the accumulated result as a
/// sequence of every surviving candidate (even when there's only one).
///
/// Only `Select`/`Equal`/`Exists` map-filter parts are supported, and only
/// without `required`/`no_case`/`starry`/`NotEqual` on either side — anything
/// else is [`ErrorCode::SelectorNotSupported`], matching the restricted
/// sub-grammar this helper accepts.
pub fn ensure(node: &mut Node, path: &str, args: &[BoundArg]) -> Result<Node, Diagnostics> {
    let mut diags = Diagnostics::new();
    diags.reset(path);
    let mut parser = SelectorParser::new(path, args);
    let mut next = vec![node.clone()];

    loop {
        match parser.next_selector(Some(&mut diags)) {
            Selector::None => break,

            Selector::Key(key) => {
                let result = ensure_apply_key(&mut next, &key);
                if result.is_empty() {
                    diags.record_error(ErrorCode::Internal, 0, ErrorItem::None);
                    return Err(diags);
                }
                next = result;
            }

            Selector::Index(index) => {
                let idx = usize::try_from(index).unwrap_or(usize::MAX);
                let result = ensure_apply_index(&mut next, idx);
                if result.is_empty() {
                    diags.record_error(ErrorCode::Internal, 0, ErrorItem::None);
                    return Err(diags);
                }
                next = result;
            }

            Selector::MapFilter(parts) => {
                let mut have_assignment = false;
                let mut result = Vec::new();
                for kvp in &parts {
                    if kvp.op == KvOp::NotEqual
                        || kvp.key.starry
                        || kvp.key.no_case
                        || kvp.key.required
                        || kvp.value.starry
                        || kvp.value.no_case
                        || kvp.value.required
                    {
                        diags.record_error(ErrorCode::SelectorNotSupported, 0, ErrorItem::None);
                        return Err(diags);
                    }
                    if kvp.op == KvOp::Select {
                        result.extend(ensure_apply_key(&mut next, &kvp.key.token));
                    } else {
                        let mut assign_to = ensure_apply_key(&mut next, &kvp.key.token);
                        have_assignment = !assign_to.is_empty();
                        for candidate in assign_to.iter_mut() {
                            if kvp.op != KvOp::Exists && (!candidate.is_defined() || candidate.is_null()) {
                                candidate.set_scalar(kvp.value.token.clone());
                            }
                        }
                    }
                }
                if result.is_empty() {
                    if have_assignment {
                        return Ok(Node::undefined());
                    }
                    diags.record_error(ErrorCode::InvalidNodeType, 0, ErrorItem::None);
                    return Err(diags);
                }
                next = result;
            }

            // Every other selector kind (in practice, just `Invalid`) is
            // unsupported by this restricted construction grammar.
            Selector::Invalid => {
                diags.record_error(ErrorCode::SelectorNotSupported, 0, ErrorItem::None);
                return Err(diags);
            }
        }
    }

    if next.is_empty() {
        return Ok(Node::null());
    }
    Ok(Node::sequence(next))
}

/// `ensure`, starting from a fresh `Null` node.
pub fn create(path: &str, args: &[BoundArg]) -> Result<Node, Diagnostics> {
    let mut root = Node::null();
    ensure(&mut root, path, args)?;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = "\
- name: Joe
  color: red
  friends: ~
- name: Sina
  color: blue
- name: Estragon
  color: red
  friends:
    Wladimir: good
    Godot: unreliable
";

    fn fixture() -> Node {
        node::from_str(FIXTURE).expect("valid fixture yaml")
    }

    #[test]
    fn scenario_1_plain_key_over_sequence() {
        let result = select(fixture(), "name", &[]).unwrap();
        assert!(result.is_sequence());
        assert_eq!(result.len(), 3);
        assert_eq!(result.get_index(0).as_str().as_deref(), Some("Joe"));
        assert_eq!(result.get_index(2).as_str().as_deref(), Some("Estragon"));
    }

    #[test]
    fn scenario_2_index_then_key() {
        let result = select(fixture(), "[1].name", &[]).unwrap();
        assert_eq!(result.as_str().as_deref(), Some("Sina"));
    }

    #[test]
    fn scenario_3_brace_filter_equal() {
        let result = select(fixture(), "{color=red}", &[]).unwrap();
        assert!(result.is_sequence());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn scenario_4_brace_filter_exists() {
        let result = select(fixture(), "{friends=}", &[]).unwrap();
        assert!(result.is_sequence());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn scenario_5_nested_friends_lookup() {
        let result = select(fixture(), "[2].friends.Wladimir", &[]).unwrap();
        assert_eq!(result.as_str().as_deref(), Some("good"));
    }

    #[test]
    fn scenario_6_node_not_found_reports_resolved_prefix() {
        let mut diags = Diagnostics::new();
        let mut node = fixture();
        let mut remainder = "[1].wealth";
        let code = path_resolve(&mut node, &mut remainder, &[], Some(&mut diags));
        assert_eq!(code, ErrorCode::NodeNotFound);
        assert_eq!(remainder, "wealth");
        assert_eq!(diags.resolved_path(), "[1]");
    }

    #[test]
    fn scenario_7_leading_period_is_invalid_token_at_offset_zero() {
        let err = select(fixture(), ".a", &[]).unwrap_err();
        assert_eq!(err.error(), ErrorCode::InvalidToken);
        assert_eq!(err.error_offset(), 0);
    }

    #[test]
    fn scenario_8_trailing_period_is_unexpected_end() {
        let err = select(fixture(), "a.", &[]).unwrap_err();
        assert_eq!(err.error(), ErrorCode::UnexpectedEnd);
        assert_eq!(err.resolved_path(), "a");
    }

    #[test]
    fn scenario_9_index_overflow_is_invalid_index() {
        let err = select(fixture(), "[2222222222222222222222]", &[]).unwrap_err();
        assert_eq!(err.error(), ErrorCode::InvalidIndex);
    }

    #[test]
    fn scenario_10_bound_args_substitute_positionally() {
        let args: Vec<BoundArg> = vec!["name".into(), 2u64.into()];
        let result = select(fixture(), "%.[%]", &args).unwrap();
        assert_eq!(result.as_str().as_deref(), Some("Estragon"));
    }

    #[test]
    fn require_raises_on_node_not_found() {
        assert!(require(fixture(), "[1].wealth", &[]).is_err());
    }

    #[test]
    fn empty_path_returns_input_node_unchanged() {
        let original = fixture();
        let result = select(original.clone(), "", &[]).unwrap();
        assert!(result.same_tree(&original));
    }

    #[test]
    fn index_zero_is_identity_on_scalar_and_map() {
        let leaf = Node::scalar("x");
        assert_eq!(select(leaf, "[0]", &[]).unwrap().as_str().as_deref(), Some("x"));
        let m = Node::map(vec![(Node::scalar("k"), Node::scalar("v"))]);
        assert!(select(m, "[0]", &[]).unwrap().is_map());
    }

    #[test]
    fn path_validate_matches_resolve_for_malformed_path() {
        let (code, prefix, offset) = path_validate("a.");
        assert_eq!(code, ErrorCode::UnexpectedEnd);
        assert_eq!(prefix, "a");
        assert_eq!(offset, 2);

        let mut node = fixture();
        let mut remainder = "a.";
        let resolve_code = path_resolve(&mut node, &mut remainder, &[], None);
        assert_eq!(resolve_code.is_path_error(), code.is_path_error());
    }

    #[test]
    fn path_validate_ok_for_well_formed_path() {
        let (code, _, _) = path_validate("name.[0]");
        assert_eq!(code, ErrorCode::Ok);
    }

    #[test]
    fn create_builds_missing_map_keys() {
        let result = create("a.b", &[]).unwrap();
        assert!(result.is_map());
        assert_eq!(result.get_key("a").get_key("b"), Node::null());
    }

    #[test]
    fn ensure_mutates_the_passed_in_node_in_place() {
        let mut root = Node::null();
        ensure(&mut root, "x.y", &[]).unwrap();
        assert!(root.is_map());
        assert!(root.get_key("x").is_map());
        assert_eq!(root.get_key("x").get_key("y"), Node::null());
    }

    #[test]
    fn ensure_index_pads_sequence() {
        let mut root = Node::null();
        ensure(&mut root, "[2]", &[]).unwrap();
        assert!(root.is_sequence());
        assert_eq!(root.len(), 3);
    }

    #[test]
    fn ensure_map_filter_assigns_missing_value() {
        let mut root = Node::null();
        ensure(&mut root, "{color=red}", &[]).unwrap();
        assert!(root.is_map());
        assert_eq!(root.get_key("color").as_str().as_deref(), Some("red"));
    }

    #[test]
    fn ensure_map_filter_exists_leaves_value_null() {
        let mut root = Node::null();
        ensure(&mut root, "{flag=}", &[]).unwrap();
        assert_eq!(root.get_key("flag"), Node::null());
    }

    #[test]
    fn ensure_rejects_not_equal_and_wildcards() {
        let mut root = Node::null();
        let err = ensure(&mut root, "{color~=red}", &[]).unwrap_err();
        assert_eq!(err.error(), ErrorCode::SelectorNotSupported);

        let mut root2 = Node::null();
        let err2 = ensure(&mut root2, "{col*=red}", &[]).unwrap_err();
        assert_eq!(err2.error(), ErrorCode::SelectorNotSupported);
    }
}
