//! Text encoding for value tokens.
//!
//! Tokens travel through the model file and back out of the engine's
//! tab-separated output, so anything outside a conservative printable set
//! is escaped as `_$0xHH` per UTF-8 byte. The escape is injective, which is
//! all the lookup needs: tokens are only ever matched, never decoded.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ValidationError;

/// Punctuation that passes through unescaped.
const SAFE_PUNCTUATION: &str = "-._+/:;=@!?*#%&^'";

fn is_safe(c: char, edge: bool) -> bool {
    c.is_ascii_alphanumeric() || SAFE_PUNCTUATION.contains(c) || (c == ' ' && !edge)
}

/// Escape `text` into the safe token alphabet.
///
/// Spaces survive only in the interior; the engine trims values.
pub(crate) fn escape(text: &str) -> String {
    let last = text.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        if is_safe(c, i == 0 || i == last) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "_$0x{byte:02X}");
            }
        }
    }
    out
}

/// Enum member text: flag separators become `;` before escaping.
pub(crate) fn enum_text(name: &str) -> String {
    escape(&name.replace(',', ";"))
}

fn weight_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(\s*\d+\s*\)\s*$").unwrap())
}

/// Delimiters a token must stay clear of.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Delimiters {
    pub value: char,
    pub alias: char,
    pub negative: char,
}

/// Reject tokens the engine could split, re-negate, or read as weighted.
///
/// `token` is the escaped text before any negative prefix is applied.
pub(crate) fn check_token(token: &str, delimiters: Delimiters) -> Result<(), ValidationError> {
    let reject = |reason: &str| {
        Err(ValidationError::InvalidTokenCharacters {
            token: token.to_string(),
            reason: reason.to_string(),
        })
    };

    if token.is_empty() {
        return reject("empty token");
    }
    if token.contains(delimiters.value) {
        return reject("contains the value delimiter");
    }
    if token.contains(delimiters.alias) {
        return reject("contains the alias delimiter");
    }
    if token.contains('\t') {
        return reject("contains a tab");
    }
    if token.starts_with(delimiters.negative) {
        return reject("starts with the negative prefix");
    }
    if weight_suffix().is_match(token) {
        return reject("ends with a weight suffix");
    }
    Ok(())
}
