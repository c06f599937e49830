/*!
 * ===============================================================================
 * yaml_path_engine: a path-expression engine over a shared-subtree YAML node
 * ===============================================================================
 *
 * A path string like `friends.{color=red}.name` walks a document tree one
 * selector at a time — key lookup, index lookup, or a `{...}` map filter —
 * either to read a value out of an existing document or (via `ensure`/
 * `create`) to build the intermediate structure a write needs.
 *
 * PIPELINE:
 * ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
 * │  path text  │ -> │    token    │ -> │  selector   │ -> │  resolver   │
 * │  (&str)     │    │ (Lexer)     │    │ (Selector)  │    │ (walk loop) │
 * └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
 *                                              |                  |
 *                                              v                  v
 *                                         map-filter          ops (select_by_key,
 *                                         grammar             select_by_index,
 *                                                              apply_map_filter)
 *
 * Every step beyond the lexer carries a [`diagnostics::Diagnostics`] sink that
 * accumulates offsets and the offending token/node-kind, so a caller can
 * render a precise error without the engine doing any string formatting on
 * the success path.
 */

pub mod diagnostics;
pub mod node;
pub mod ops;
pub mod resolver;
pub mod selector;
pub mod token;

pub use diagnostics::{Diagnostics, ErrorCode, ErrorItem};
pub use node::{Node, NodeKind};
pub use ops::{apply_map_filter, select_by_index, select_by_key};
pub use resolver::{create, ensure, path_resolve, path_validate, require, select};
pub use selector::{KvOp, KvPair, KvToken, Selector};
pub use token::BoundArg;
