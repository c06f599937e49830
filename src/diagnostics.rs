//! Error codes and the diagnostics value object that accumulates scan state.
//!
//! An enum gives every failure kind a generic one-line message (via
//! `thiserror`), and a separate struct accumulates the richer, per-call
//! context a caller can ask for on demand.

use std::fmt;

use crate::node::NodeKind;
use crate::token::TokenKind;

/// Error code returned by every public operation. Variants from
/// `InvalidNodeType` onward are *node errors*; everything else except `Ok` is
/// a *path error* (see [`ErrorCode::is_path_error`]/[`ErrorCode::is_node_error`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    #[error("(OK)")]
    Ok,
    #[error("internal error, please report")]
    Internal,

    // path errors
    #[error("invalid token")]
    InvalidToken,
    #[error("invalid index")]
    InvalidIndex,
    #[error("unexpected end of path")]
    UnexpectedEnd,
    #[error("selector not supported by this operation")]
    SelectorNotSupported,

    // node errors
    #[error("selector cannot match node type")]
    InvalidNodeType,
    #[error("no node matches selector")]
    NodeNotFound,
}

impl ErrorCode {
    /// True for malformed-path failures (everything before the
    /// `InvalidNodeType` boundary, excluding `Ok`).
    pub fn is_path_error(self) -> bool {
        !matches!(self, ErrorCode::Ok) && !self.is_node_error()
    }

    /// True for well-formed-path-but-no-match failures.
    pub fn is_node_error(self) -> bool {
        matches!(self, ErrorCode::InvalidNodeType | ErrorCode::NodeNotFound)
    }
}

/// What kind of "thing" was being scanned when a token/selector error fired.
/// Also the item half of the `(ErrorCode, ErrorItem)` pair the `ops` module's
/// per-selector primitives return, alongside rendering a human name in
/// detailed diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorItem {
    Token(TokenKind),
    NodeKind(NodeKind),
    None,
}

/// Accumulates scan/selector offsets, the offending token or node-kind, the
/// expected-token/node-kind bitmask, and bound-argument provenance for one
/// call into the engine. Cleared at the start of every `path_resolve`.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    error: ErrorCode,
    full_path: String,
    scan_offset: usize,
    selector_offset: usize,
    from_bound_arg: Option<usize>,
    valid_tokens: u64,
    pub(crate) error_item: ErrorItem,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            error: ErrorCode::Ok,
            full_path: String::new(),
            scan_offset: 0,
            selector_offset: 0,
            from_bound_arg: None,
            valid_tokens: 0,
            error_item: ErrorItem::None,
        }
    }
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn is_path_error(&self) -> bool {
        self.error.is_path_error()
    }

    pub fn is_node_error(&self) -> bool {
        self.error.is_node_error()
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// The part of the path that was resolved correctly before the error.
    pub fn resolved_path(&self) -> &str {
        let end = self.selector_offset.min(self.full_path.len());
        &self.full_path[..end]
    }

    /// Byte offset into the full path where the error occurred.
    pub fn error_offset(&self) -> usize {
        self.scan_offset
    }

    /// If the offending token was taken from a bound argument, its index.
    pub fn bound_arg(&self) -> Option<usize> {
        self.from_bound_arg
    }

    pub(crate) fn reset(&mut self, full_path: &str) {
        *self = Diagnostics {
            full_path: full_path.to_string(),
            ..Diagnostics::default()
        };
    }

    pub(crate) fn set_scan_offset(&mut self, offset: usize) {
        self.scan_offset = offset;
    }

    pub(crate) fn set_selector_offset(&mut self, offset: usize) {
        self.selector_offset = offset;
    }

    pub(crate) fn set_bound_arg(&mut self, index: usize) {
        self.from_bound_arg = Some(index);
    }

    pub(crate) fn record_error(&mut self, error: ErrorCode, valid_tokens: u64, item: ErrorItem) {
        self.error = error;
        self.valid_tokens = valid_tokens;
        self.error_item = item;
        log::debug!(
            "path error {:?} at offset {} (resolved prefix {:?})",
            error,
            self.scan_offset,
            self.resolved_path()
        );
    }

    fn error_item_name(&self) -> &'static str {
        match self.error_item {
            ErrorItem::Token(t) => t.name(),
            ErrorItem::NodeKind(k) => match k {
                NodeKind::Map => "key",
                NodeKind::Sequence => "index",
                NodeKind::Scalar => "map filter",
                NodeKind::Null => "(none)",
            },
            ErrorItem::None => "",
        }
    }

    /// Generic, single-line message for `self.error()`.
    pub fn short_message(&self) -> String {
        self.error.to_string()
    }

    /// A single-line message, or (if `detailed`) a multi-line report with
    /// offsets, the expected-token set, the offending item, the full path,
    /// and the resolved prefix — mirrors `PathException::What`.
    pub fn what(&self, detailed: bool) -> String {
        let short = self.short_message();
        if !detailed || self.error == ErrorCode::Ok {
            return short;
        }

        let mut out = String::new();
        out.push_str(&short);
        out.push('\n');
        out.push_str(&format!("  error at path offset: {}\n", self.scan_offset));

        if let Some(idx) = self.from_bound_arg {
            out.push_str(&format!("  token taken from bound arg #{}\n", idx));
        }

        if self.error.is_path_error() {
            if self.valid_tokens != 0 {
                out.push_str(&format!("  allowed tokens: {}\n", crate::token::describe_bitmask(self.valid_tokens)));
            }
            if self.error_item != ErrorItem::None {
                out.push_str(&format!("  token found: {}\n", self.error_item_name()));
            }
        } else if self.error.is_node_error() {
            if self.error_item != ErrorItem::None {
                out.push_str(&format!("  for selector: {}\n", self.error_item_name()));
            }
        }

        if !self.full_path.is_empty() {
            out.push_str(&format!("  path to parse: {}\n", self.full_path));
        }
        out.push_str(&format!("  resolved path: {}\n", self.resolved_path()));
        out
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.what(true))
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundary() {
        assert!(ErrorCode::InvalidToken.is_path_error());
        assert!(!ErrorCode::InvalidToken.is_node_error());
        assert!(ErrorCode::NodeNotFound.is_node_error());
        assert!(!ErrorCode::NodeNotFound.is_path_error());
        assert!(!ErrorCode::Ok.is_path_error());
        assert!(!ErrorCode::Ok.is_node_error());
    }

    #[test]
    fn resolved_path_is_prefix() {
        let mut d = Diagnostics::new();
        d.reset("[1].wealth");
        d.set_selector_offset(3);
        assert_eq!(d.resolved_path(), "[1]");
    }

    #[test]
    fn detailed_message_includes_offsets() {
        let mut d = Diagnostics::new();
        d.reset("a.");
        d.set_scan_offset(2);
        d.set_selector_offset(2);
        d.record_error(ErrorCode::UnexpectedEnd, 0, ErrorItem::None);
        let msg = d.what(true);
        assert!(msg.contains("error at path offset: 2"));
        assert!(msg.contains("resolved path: a"));
    }
}
