// src/core/sparql/scanner.rs

//! A minimal lexical scanner for SPARQL query text.
//!
//! This is deliberately not a full SPARQL grammar — the rest of the system
//! only needs to know where whitespace and comments fall (so it can
//! canonicalize them away), where string and IRI literals are (so their
//! contents are never mistaken for keywords or punctuation), and where `{`
//! and `}` fall (so brace depth can tell a top-level `LIMIT`/`OFFSET`/`ORDER
//! BY` from one nested inside a sub-`SELECT`).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    /// A run of whitespace.
    Ws,
    /// A `#`-to-end-of-line comment.
    Comment,
    /// A single- or triple-quoted string literal, including its quotes.
    Str,
    /// An IRI reference, including its angle brackets.
    Iri,
    LBrace,
    RBrace,
    /// Anything else: keywords, variables, prefixed names, numbers, and
    /// standalone punctuation that doesn't need its own token kind here.
    Word,
}

#[derive(Debug, Clone, Copy)]
pub struct Tok<'a> {
    pub kind: TokKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Scans `s` into a flat token stream.
pub fn tokenize(s: &str) -> Vec<Tok<'_>> {
    let mut toks = Vec::new();
    let mut chars = s.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            let mut end = start + c.len_utf8();
            chars.next();
            while let Some(&(i, c2)) = chars.peek() {
                if !c2.is_whitespace() {
                    break;
                }
                end = i + c2.len_utf8();
                chars.next();
            }
            toks.push(Tok { kind: TokKind::Ws, text: &s[start..end], start, end });
        } else if c == '#' {
            let mut end = start + 1;
            chars.next();
            while let Some(&(i, c2)) = chars.peek() {
                if c2 == '\n' {
                    break;
                }
                end = i + c2.len_utf8();
                chars.next();
            }
            toks.push(Tok { kind: TokKind::Comment, text: &s[start..end], start, end });
        } else if c == '"' || c == '\'' {
            let end = scan_string_literal(s, start, c);
            for _ in 0..s[start..end].chars().count() {
                chars.next();
            }
            toks.push(Tok { kind: TokKind::Str, text: &s[start..end], start, end });
        } else if c == '<' && looks_like_iri(&s[start..]) {
            let end = start + s[start..].find('>').map(|p| p + 1).unwrap_or(1);
            for _ in 0..s[start..end].chars().count() {
                chars.next();
            }
            toks.push(Tok { kind: TokKind::Iri, text: &s[start..end], start, end });
        } else if c == '{' {
            chars.next();
            toks.push(Tok { kind: TokKind::LBrace, text: &s[start..start + 1], start, end: start + 1 });
        } else if c == '}' {
            chars.next();
            toks.push(Tok { kind: TokKind::RBrace, text: &s[start..start + 1], start, end: start + 1 });
        } else {
            let mut end = start;
            chars.next();
            end = start + c.len_utf8();
            while let Some(&(i, c2)) = chars.peek() {
                if c2.is_whitespace()
                    || c2 == '#'
                    || c2 == '"'
                    || c2 == '\''
                    || c2 == '{'
                    || c2 == '}'
                    || (c2 == '<' && looks_like_iri(&s[i..]))
                {
                    break;
                }
                end = i + c2.len_utf8();
                chars.next();
            }
            toks.push(Tok { kind: TokKind::Word, text: &s[start..end], start, end });
        }
    }
    toks
}

/// An IRIREF is `<` then any run without `<`, whitespace, or `>`, then `>`.
/// Anything else starting with `<` (e.g. the `<` comparison operator inside
/// a `FILTER`) falls through to being scanned as an ordinary [`TokKind::Word`].
fn looks_like_iri(from_lt: &str) -> bool {
    let rest = &from_lt[1..];
    match rest.find(|ch: char| ch == '>' || ch == '<' || ch.is_whitespace()) {
        Some(pos) => rest.as_bytes()[pos] == b'>',
        None => false,
    }
}

/// Scans a string literal (single- or triple-quoted) starting at byte
/// offset `start` (where `s.as_bytes()[start]` is the opening quote char)
/// and returns the byte offset just past its closing quote(s).
fn scan_string_literal(s: &str, start: usize, quote: char) -> usize {
    let triple: String = std::iter::repeat(quote).take(3).collect();
    if s[start..].starts_with(triple.as_str()) {
        let mut i = start + triple.len();
        while i < s.len() {
            if s[i..].starts_with('\\') {
                i += 1;
                if let Some(c) = s[i..].chars().next() {
                    i += c.len_utf8();
                }
                continue;
            }
            if s[i..].starts_with(triple.as_str()) {
                return i + triple.len();
            }
            if let Some(c) = s[i..].chars().next() {
                i += c.len_utf8();
            } else {
                break;
            }
        }
        return s.len();
    }

    let mut i = start + quote.len_utf8();
    while i < s.len() {
        if s[i..].starts_with('\\') {
            i += 1;
            if let Some(c) = s[i..].chars().next() {
                i += c.len_utf8();
            }
            continue;
        }
        if let Some(c) = s[i..].chars().next() {
            i += c.len_utf8();
            if c == quote {
                return i;
            }
        } else {
            break;
        }
    }
    s.len()
}
