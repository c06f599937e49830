//! Selector parser: the re-entrant grammar of keys, indices, and map filters.
//!
//! Grounded in `yaml-path.cpp`'s `PathScanner::NextSelectorToken`/
//! `ReadKVToken`/`NextSelector` almost one-to-one: the expected-token bitmask
//! on every fetch, `%` argument-binding substitution, the `AsIndex` overflow
//! check, and the brace sub-grammar's exact transitions. Expressed here as an
//! explicit state enum (see [`ParserState`]) per this engine's own design
//! notes, rather than the original's two boolean lookahead flags — though
//! `token_pending` survives as the one-slot pushback it was always used for.

use crate::diagnostics::{Diagnostics, ErrorItem};
use crate::token::{bits_contain, bits_of, error_item_for, BoundArg, Lexer, Token, TokenKind};
use crate::ErrorCode;

/// A string fragment inside a map filter, with its `!`/`^`/`*` modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KvToken {
    pub token: String,
    pub required: bool,
    pub no_case: bool,
    pub starry: bool,
}

impl KvToken {
    /// True for the bare `*` wildcard (empty token text, trailing star).
    pub fn is_all_star(&self) -> bool {
        self.starry && self.token.is_empty()
    }
}

/// The relation a [`KvPair`] tests or projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvOp {
    Equal,
    NotEqual,
    Exists,
    Select,
}

/// One entry of a `{...}` map filter: a key and (for conditions) a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: KvToken,
    pub value: KvToken,
    pub op: KvOp,
}

/// One structural step in a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Key(String),
    Index(u64),
    MapFilter(Vec<KvPair>),
    None,
    Invalid,
}

/// Parser-internal state driving `next_selector`'s dispatch; exists mostly to
/// document the grammar's shape — the actual control flow below still reads
/// top-to-bottom like the original, since the states rarely loop back on
/// themselves outside of the map-filter sub-grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Start,
    AfterSelector,
    Error,
}

/// Walks a path string, producing [`Selector`]s. Holds the bound-argument
/// list and (optionally) a [`Diagnostics`] sink that gets stamped on every
/// state change.
pub struct SelectorParser<'a> {
    lexer: Lexer<'a>,
    args: &'a [BoundArg<'a>],
    arg_idx: usize,
    token_pending: Option<Token<'a>>,
    period_allowed: bool,
    selector_required: bool,
    state: ParserState,
    error: ErrorCode,
    /// Byte offset of the post-period, pre-selector position last reached by
    /// `next_selector` — what `remainder()` reports. Distinct from the
    /// pre-period offset stamped into `Diagnostics::selector_offset`, which
    /// drives `resolved_path()` and does not include a trailing separator.
    remainder_start: usize,
}

const START_TOKENS: &[TokenKind] = &[
    TokenKind::FetchArg,
    TokenKind::None,
    TokenKind::OpenBracket,
    TokenKind::OpenBrace,
    TokenKind::QuotedIdentifier,
    TokenKind::UnquotedIdentifier,
];

impl<'a> SelectorParser<'a> {
    pub fn new(path: &'a str, args: &'a [BoundArg<'a>]) -> SelectorParser<'a> {
        SelectorParser {
            lexer: Lexer::new(path),
            args,
            arg_idx: 0,
            token_pending: None,
            period_allowed: false,
            selector_required: false,
            state: ParserState::Start,
            error: ErrorCode::Ok,
            remainder_start: 0,
        }
    }

    /// The error code recorded by the sticky-error state, or `Ok` if none.
    pub(crate) fn error(&self) -> ErrorCode {
        self.error
    }

    /// The unconsumed suffix of the path, at the post-period, pre-selector
    /// position last recorded by `next_selector` — on failure this is the
    /// start of the selector that failed, not the one after it.
    pub fn remainder(&self) -> &'a str {
        &self.lexer.full()[self.remainder_start..]
    }

    fn current_offset(&self) -> usize {
        match self.token_pending {
            Some(tok) => tok.offset,
            None => self.lexer.offset(),
        }
    }

    fn fetch_raw(&mut self) -> Token<'a> {
        if let Some(tok) = self.token_pending.take() {
            return tok;
        }
        self.lexer.next_token()
    }

    /// Fetches the next token, applying `%` substitution and (when `valid`
    /// includes `Index`) unquoted-identifier-to-integer coercion, then
    /// verifies it against `valid`. On mismatch, records `on_mismatch` (or
    /// `UnexpectedEnd` if the token was `None`) and returns `None`.
    fn next_selector_token(
        &mut self,
        diags: Option<&mut Diagnostics>,
        valid: u64,
        on_mismatch: ErrorCode,
    ) -> Option<Token<'a>> {
        let mut diags = diags;
        let mut tok = self.fetch_raw();

        if tok.kind == TokenKind::FetchArg {
            if let Some(d) = diags.as_deref_mut() {
                d.set_bound_arg(self.arg_idx);
            }
            let Some(arg) = self.args.get(self.arg_idx) else {
                self.fail(diags, ErrorCode::Internal, 0, ErrorItem::None);
                return None;
            };
            self.arg_idx += 1;
            tok = match *arg {
                BoundArg::Index(i) => Token { kind: TokenKind::Index, offset: tok.offset, text: "", index: i },
                BoundArg::Str(s) => Token { kind: TokenKind::QuotedIdentifier, offset: tok.offset, text: s, index: 0 },
            };
        }

        if tok.kind == TokenKind::UnquotedIdentifier && bits_contain(valid, TokenKind::Index) {
            match as_index(tok.text) {
                AsIndex::Ok(value) => tok = Token { kind: TokenKind::Index, index: value, ..tok },
                AsIndex::Overflow => {
                    self.fail(diags, ErrorCode::InvalidIndex, 0, ErrorItem::None);
                    return None;
                }
                AsIndex::NotAnIndex => {}
            }
        }

        if bits_contain(valid, tok.kind) {
            if let Some(d) = diags.as_deref_mut() {
                d.set_scan_offset(tok.offset);
            }
            return Some(tok);
        }

        let code = if tok.kind == TokenKind::None { ErrorCode::UnexpectedEnd } else { on_mismatch };
        self.fail(diags, code, valid, error_item_for(tok.kind));
        None
    }

    fn fail(&mut self, diags: Option<&mut Diagnostics>, code: ErrorCode, valid_tokens: u64, item: ErrorItem) {
        self.error = code;
        self.state = ParserState::Error;
        if let Some(d) = diags {
            d.record_error(code, valid_tokens, item);
        }
    }

    fn read_kv_token(&mut self, mut diags: Option<&mut Diagnostics>, end_tokens: u64) -> Option<KvToken> {
        let mut kv = KvToken::default();
        let name_tokens = bits_of(&[TokenKind::FetchArg, TokenKind::QuotedIdentifier, TokenKind::UnquotedIdentifier]);
        let mut valid = bits_of(&[TokenKind::Exclamation, TokenKind::Caret, TokenKind::Asterisk]) | name_tokens;

        loop {
            let tok = self.next_selector_token(diags.as_deref_mut(), valid, ErrorCode::InvalidToken)?;
            match tok.kind {
                TokenKind::Exclamation => {
                    valid &= !TokenKind::Exclamation.bit();
                    kv.required = true;
                }
                TokenKind::Caret => {
                    valid &= !TokenKind::Caret.bit();
                    kv.no_case = true;
                }
                TokenKind::QuotedIdentifier | TokenKind::UnquotedIdentifier | TokenKind::FetchArg => {
                    valid &= !(name_tokens | TokenKind::Caret.bit() | TokenKind::Exclamation.bit());
                    valid |= end_tokens;
                    kv.token = tok.text.to_string();
                }
                TokenKind::Asterisk => {
                    valid = end_tokens;
                    kv.starry = true;
                }
                _ => {
                    // terminator: stuff it back for the caller to re-fetch.
                    self.token_pending = Some(tok);
                    return bits_contain(end_tokens, tok.kind).then_some(kv);
                }
            }
        }
    }

    /// Advances one selector. Returns [`Selector::Invalid`] forever once the
    /// parser has entered its sticky error state.
    pub fn next_selector(&mut self, mut diags: Option<&mut Diagnostics>) -> Selector {
        if self.state == ParserState::Error {
            return Selector::Invalid;
        }

        if let Some(d) = diags.as_deref_mut() {
            d.set_selector_offset(self.current_offset());
        }

        if self.period_allowed {
            let valid = bits_of(START_TOKENS) | TokenKind::Period.bit();
            let Some(tok) = self.next_selector_token(diags.as_deref_mut(), valid, ErrorCode::InvalidToken) else {
                return Selector::Invalid;
            };
            self.period_allowed = false;
            if tok.kind == TokenKind::Period {
                self.selector_required = true;
            } else {
                self.token_pending = Some(tok);
            }
        }

        self.remainder_start = self.current_offset();

        let valid = bits_of(START_TOKENS);
        let Some(tok) = self.next_selector_token(diags.as_deref_mut(), valid, ErrorCode::InvalidToken) else {
            return Selector::Invalid;
        };

        match tok.kind {
            TokenKind::None => {
                if self.selector_required {
                    self.fail(diags, ErrorCode::UnexpectedEnd, valid, ErrorItem::None);
                    return Selector::Invalid;
                }
                self.state = ParserState::AfterSelector;
                Selector::None
            }

            TokenKind::QuotedIdentifier | TokenKind::UnquotedIdentifier => {
                self.period_allowed = true;
                self.state = ParserState::AfterSelector;
                Selector::Key(tok.text.to_string())
            }

            TokenKind::OpenBracket => {
                let Some(idx_tok) =
                    self.next_selector_token(diags.as_deref_mut(), TokenKind::Index.bit(), ErrorCode::InvalidIndex)
                else {
                    return Selector::Invalid;
                };
                let index = idx_tok.index;
                if self
                    .next_selector_token(diags.as_deref_mut(), TokenKind::CloseBracket.bit(), ErrorCode::InvalidToken)
                    .is_none()
                {
                    return Selector::Invalid;
                }
                self.period_allowed = true;
                self.state = ParserState::AfterSelector;
                Selector::Index(index)
            }

            TokenKind::OpenBrace => self.parse_map_filter(diags),

            _ => unreachable!("next_selector_token only returns tokens within `valid`"),
        }
    }

    fn parse_map_filter(&mut self, mut diags: Option<&mut Diagnostics>) -> Selector {
        let mut parts = Vec::new();
        let kv_end = bits_of(&[TokenKind::Tilde, TokenKind::Equal, TokenKind::Comma, TokenKind::CloseBrace]);

        loop {
            let Some(key) = self.read_kv_token(diags.as_deref_mut(), kv_end) else {
                return Selector::Invalid;
            };

            let Some(sep) = self.next_selector_token(diags.as_deref_mut(), kv_end, ErrorCode::InvalidToken) else {
                return Selector::Invalid;
            };

            let mut pair = KvPair { key, value: KvToken::default(), op: KvOp::Select };
            let mut at_end = false;

            match sep.kind {
                TokenKind::Tilde => {
                    if self
                        .next_selector_token(diags.as_deref_mut(), TokenKind::Equal.bit(), ErrorCode::InvalidToken)
                        .is_none()
                    {
                        return Selector::Invalid;
                    }
                    pair.op = KvOp::NotEqual;
                }
                TokenKind::Equal => pair.op = KvOp::Equal,
                TokenKind::Comma => {
                    pair.op = KvOp::Select;
                    parts.push(pair);
                    continue;
                }
                TokenKind::CloseBrace => {
                    pair.op = KvOp::Select;
                    parts.push(pair);
                    at_end = true;
                }
                _ => unreachable!(),
            }
            if at_end {
                break;
            }

            // An `=` (or `~=`) immediately followed by a terminator means no
            // value was given: `{friends=}` is an Exists check, `{x~=}` is
            // not a legal shorthand (there's no "not exists").
            let end_after_value = bits_of(&[TokenKind::Comma, TokenKind::CloseBrace]);
            let lookahead = self.fetch_raw();
            self.token_pending = Some(lookahead);
            if bits_contain(end_after_value, lookahead.kind) {
                match pair.op {
                    KvOp::Equal => pair.op = KvOp::Exists,
                    KvOp::NotEqual => {
                        self.fail(diags, ErrorCode::InvalidToken, 0, ErrorItem::None);
                        return Selector::Invalid;
                    }
                    _ => unreachable!("pair.op is Equal or NotEqual at this point"),
                }
            } else {
                let Some(value) = self.read_kv_token(diags.as_deref_mut(), end_after_value) else {
                    return Selector::Invalid;
                };
                pair.value = value;
            }

            let Some(term) = self.next_selector_token(diags.as_deref_mut(), end_after_value, ErrorCode::InvalidToken)
            else {
                return Selector::Invalid;
            };
            parts.push(pair);
            if term.kind == TokenKind::Comma {
                continue;
            }
            break;
        }

        // stable partition: conditions (op != Select) before selects
        let (mut conditions, selects): (Vec<_>, Vec<_>) = parts.into_iter().partition(|p| p.op != KvOp::Select);
        conditions.extend(selects);

        self.period_allowed = true;
        self.state = ParserState::AfterSelector;
        Selector::MapFilter(conditions)
    }
}

enum AsIndex {
    Ok(u64),
    NotAnIndex,
    Overflow,
}

fn as_index(text: &str) -> AsIndex {
    let mut value: u64 = 0;
    for b in text.bytes() {
        if !b.is_ascii_digit() {
            return AsIndex::NotAnIndex;
        }
        let prev = value;
        value = value.wrapping_mul(10).wrapping_add((b - b'0') as u64);
        if value < prev {
            return AsIndex::Overflow;
        }
    }
    if text.is_empty() {
        return AsIndex::NotAnIndex;
    }
    AsIndex::Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn selectors(path: &str) -> (Vec<Selector>, ErrorCode) {
        let args: Vec<BoundArg> = Vec::new();
        let mut parser = SelectorParser::new(path, &args);
        let mut out = Vec::new();
        loop {
            let sel = parser.next_selector(None);
            match sel {
                Selector::None => {
                    out.push(sel);
                    break;
                }
                Selector::Invalid => {
                    out.push(sel);
                    break;
                }
                other => out.push(other),
            }
        }
        (out, parser.error)
    }

    #[test]
    fn empty_path_is_ok() {
        let (sels, err) = selectors("");
        assert_eq!(sels, vec![Selector::None]);
        assert_eq!(err, ErrorCode::Ok);
    }

    #[test]
    fn key_chain() {
        let (sels, err) = selectors("name");
        assert_eq!(sels, vec![Selector::Key("name".into()), Selector::None]);
        assert_eq!(err, ErrorCode::Ok);
    }

    #[test]
    fn index_selector() {
        let (sels, _) = selectors("[1].name");
        assert_eq!(sels, vec![Selector::Index(1), Selector::Key("name".into()), Selector::None]);
    }

    #[test]
    fn leading_period_is_invalid_token() {
        let (sels, err) = selectors(".a");
        assert_eq!(sels.last(), Some(&Selector::Invalid));
        assert_eq!(err, ErrorCode::InvalidToken);
    }

    #[test]
    fn trailing_period_is_unexpected_end() {
        let (sels, err) = selectors("a.");
        assert_eq!(sels, vec![Selector::Key("a".into()), Selector::Invalid]);
        assert_eq!(err, ErrorCode::UnexpectedEnd);
    }

    #[test]
    fn unclosed_bracket_is_invalid_token() {
        let (_, err) = selectors("[1");
        assert_eq!(err, ErrorCode::InvalidToken);
    }

    #[test]
    fn non_integer_index_is_invalid_index() {
        let (_, err) = selectors("[abc]");
        assert_eq!(err, ErrorCode::InvalidIndex);
    }

    #[test]
    fn index_overflow_is_invalid_index() {
        let (_, err) = selectors("[2222222222222222222222]");
        assert_eq!(err, ErrorCode::InvalidIndex);
    }

    #[test]
    fn bracket_filter_form_is_rejected() {
        let (_, err) = selectors("[color=red]");
        assert_eq!(err, ErrorCode::InvalidIndex);
    }

    #[test]
    fn brace_filter_select_only() {
        let (sels, err) = selectors("{color}");
        assert_eq!(err, ErrorCode::Ok);
        match &sels[0] {
            Selector::MapFilter(parts) => {
                assert_eq!(parts.len(), 1);
                assert_eq!(parts[0].op, KvOp::Select);
                assert_eq!(parts[0].key.token, "color");
            }
            other => panic!("expected MapFilter, got {:?}", other),
        }
    }

    #[test]
    fn brace_filter_equal() {
        let (sels, _) = selectors("{color=red}");
        match &sels[0] {
            Selector::MapFilter(parts) => {
                assert_eq!(parts[0].op, KvOp::Equal);
                assert_eq!(parts[0].key.token, "color");
                assert_eq!(parts[0].value.token, "red");
            }
            other => panic!("expected MapFilter, got {:?}", other),
        }
    }

    #[test]
    fn brace_filter_exists() {
        let (sels, _) = selectors("{friends=}");
        match &sels[0] {
            Selector::MapFilter(parts) => {
                assert_eq!(parts[0].op, KvOp::Exists);
                assert_eq!(parts[0].key.token, "friends");
            }
            other => panic!("expected MapFilter, got {:?}", other),
        }
    }

    #[test]
    fn brace_filter_not_equal() {
        let (sels, _) = selectors("{color~=red}");
        match &sels[0] {
            Selector::MapFilter(parts) => {
                assert_eq!(parts[0].op, KvOp::NotEqual);
                assert_eq!(parts[0].value.token, "red");
            }
            other => panic!("expected MapFilter, got {:?}", other),
        }
    }

    #[test]
    fn brace_filter_not_equal_without_value_is_invalid_token() {
        let (_, err) = selectors("{color~=}");
        assert_eq!(err, ErrorCode::InvalidToken);
    }

    #[test]
    fn brace_filter_conditions_before_selects() {
        let (sels, _) = selectors("{a,b=1,c}");
        match &sels[0] {
            Selector::MapFilter(parts) => {
                assert_eq!(parts[0].op, KvOp::Equal);
                assert_eq!(parts[1].op, KvOp::Select);
                assert_eq!(parts[2].op, KvOp::Select);
                assert_eq!(parts[1].key.token, "a");
                assert_eq!(parts[2].key.token, "c");
            }
            other => panic!("expected MapFilter, got {:?}", other),
        }
    }

    #[test]
    fn kv_token_modifiers() {
        let (sels, _) = selectors("{!^name*=x}");
        match &sels[0] {
            Selector::MapFilter(parts) => {
                let k = &parts[0].key;
                assert!(k.required);
                assert!(k.no_case);
                assert!(k.starry);
                assert_eq!(k.token, "name");
            }
            other => panic!("expected MapFilter, got {:?}", other),
        }
    }

    #[test]
    fn all_star_wildcard() {
        let (sels, _) = selectors("{*}");
        match &sels[0] {
            Selector::MapFilter(parts) => assert!(parts[0].key.is_all_star()),
            other => panic!("expected MapFilter, got {:?}", other),
        }
    }

    #[test]
    fn bound_args_substitute() {
        let args = vec![BoundArg::Str("name"), BoundArg::Index(2)];
        let mut parser = SelectorParser::new("%.[%]", &args);
        assert_eq!(parser.next_selector(None), Selector::Key("name".into()));
        assert_eq!(parser.next_selector(None), Selector::Index(2));
        assert_eq!(parser.next_selector(None), Selector::None);
    }

    #[test]
    fn sticky_error_after_invalid() {
        let args: Vec<BoundArg> = Vec::new();
        let mut parser = SelectorParser::new(".a", &args);
        assert_eq!(parser.next_selector(None), Selector::Invalid);
        assert_eq!(parser.next_selector(None), Selector::Invalid);
    }
}
