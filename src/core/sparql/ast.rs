// src/core/sparql/ast.rs

//! The small, hand-built model of a SPARQL query the rest of the system
//! needs: its top-level operation keyword and, for `SELECT`, its `LIMIT`,
//! `OFFSET`, and whether it carries an `ORDER BY`. Full grammar coverage
//! (property paths, sub-selects beyond brace-depth tracking, federated
//! `SERVICE` clauses, aggregates) is out of scope.

use super::scanner::{tokenize, TokKind};
use crate::core::errors::ProxyError;

/// The four SPARQL query forms; anything else (update operations) is
/// rejected before this type is ever constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Ask,
    Construct,
    Describe,
}

/// Update-operation keywords that must be rejected with `QueryTypeNotAllowed`.
const UPDATE_KEYWORDS: &[&str] = &[
    "INSERT", "DELETE", "LOAD", "CLEAR", "CREATE", "DROP", "COPY", "MOVE", "ADD", "WITH",
];

/// Classifies the first keyword of `remainder` (the query with its preamble
/// already stripped). Returns `QueryTypeNotAllowed` for update keywords and
/// `ParseError` if no recognizable operation keyword is found at all.
pub fn classify_operation(remainder: &str) -> Result<Operation, ProxyError> {
    let toks = tokenize(remainder);
    let first_word = toks
        .iter()
        .find(|t| !matches!(t.kind, TokKind::Ws | TokKind::Comment));

    let Some(tok) = first_word else {
        return Err(ProxyError::ParseError("empty query".to_string()));
    };
    if tok.kind != TokKind::Word {
        return Err(ProxyError::ParseError(format!(
            "expected a query keyword, found '{}'",
            tok.text
        )));
    }

    if tok.text.eq_ignore_ascii_case("SELECT") {
        Ok(Operation::Select)
    } else if tok.text.eq_ignore_ascii_case("ASK") {
        Ok(Operation::Ask)
    } else if tok.text.eq_ignore_ascii_case("CONSTRUCT") {
        Ok(Operation::Construct)
    } else if tok.text.eq_ignore_ascii_case("DESCRIBE") {
        Ok(Operation::Describe)
    } else if UPDATE_KEYWORDS.iter().any(|kw| tok.text.eq_ignore_ascii_case(kw)) {
        Err(ProxyError::QueryTypeNotAllowed)
    } else {
        Err(ProxyError::ParseError(format!(
            "unrecognized query keyword '{}'",
            tok.text
        )))
    }
}

/// The solution modifiers of a top-level `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectModifiers {
    pub limit: Option<u64>,
    pub offset: u64,
    pub has_order_by: bool,
    /// `remainder` with its top-level `LIMIT`/`OFFSET` clauses removed, so
    /// the chunk executor can append its own without duplicating them.
    pub stripped: String,
}

/// Scans `remainder` for a top-level (brace-depth 0) `LIMIT`, `OFFSET`, and
/// `ORDER BY`, in whichever order they appear, and strips the `LIMIT`/
/// `OFFSET` clauses out of the text; the chunk executor rewrites them per shard.
pub fn extract_select_modifiers(remainder: &str) -> SelectModifiers {
    let toks = tokenize(remainder);
    let mut depth = 0i32;
    let mut limit = None;
    let mut offset = 0u64;
    let mut has_order_by = false;
    // Byte ranges (within `remainder`) to cut out of the stripped text.
    let mut cuts: Vec<(usize, usize)> = Vec::new();

    let mut i = 0usize;
    while i < toks.len() {
        match toks[i].kind {
            TokKind::LBrace => depth += 1,
            TokKind::RBrace => depth -= 1,
            TokKind::Word if depth == 0 => {
                if toks[i].text.eq_ignore_ascii_case("LIMIT") {
                    if let Some((value, end, next_i)) = parse_following_integer(&toks, i) {
                        limit = Some(value);
                        cuts.push((toks[i].start, end));
                        i = next_i;
                        continue;
                    }
                } else if toks[i].text.eq_ignore_ascii_case("OFFSET") {
                    if let Some((value, end, next_i)) = parse_following_integer(&toks, i) {
                        offset = value;
                        cuts.push((toks[i].start, end));
                        i = next_i;
                        continue;
                    }
                } else if toks[i].text.eq_ignore_ascii_case("ORDER") {
                    has_order_by = true;
                }
            }
            _ => {}
        }
        i += 1;
    }

    SelectModifiers {
        limit,
        offset,
        has_order_by,
        stripped: remove_ranges(remainder, &cuts),
    }
}

/// If token `i` is a `LIMIT`/`OFFSET` keyword followed (skipping
/// whitespace/comments) by an integer literal, returns its value, the end
/// byte offset of that integer, and the index of the token after it.
fn parse_following_integer(
    toks: &[super::scanner::Tok<'_>],
    i: usize,
) -> Option<(u64, usize, usize)> {
    let mut j = i + 1;
    while j < toks.len() && matches!(toks[j].kind, TokKind::Ws | TokKind::Comment) {
        j += 1;
    }
    let tok = toks.get(j)?;
    if tok.kind != TokKind::Word || !tok.text.bytes().all(|b| b.is_ascii_digit()) || tok.text.is_empty() {
        return None;
    }
    let value: u64 = tok.text.parse().ok()?;
    Some((value, tok.end, j + 1))
}

/// Removes the given byte ranges from `text` and collapses the whitespace
/// left behind so the result never has two consecutive `LIMIT`/`OFFSET`-less
/// spaces.
fn remove_ranges(text: &str, cuts: &[(usize, usize)]) -> String {
    if cuts.is_empty() {
        return text.to_string();
    }
    let mut sorted = cuts.to_vec();
    sorted.sort_by_key(|&(start, _)| start);

    let mut out = String::with_capacity(text.len());
    let mut last_end = 0usize;
    for (start, end) in sorted {
        out.push_str(&text[last_end..start]);
        last_end = end;
    }
    out.push_str(&text[last_end..]);

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_all_four_query_forms() {
        assert_eq!(classify_operation("SELECT * WHERE {}").unwrap(), Operation::Select);
        assert_eq!(classify_operation("ask { ?s ?p ?o }").unwrap(), Operation::Ask);
        assert_eq!(classify_operation("CONSTRUCT { ?s ?p ?o } WHERE {}").unwrap(), Operation::Construct);
        assert_eq!(classify_operation("DESCRIBE <http://example.org/a>").unwrap(), Operation::Describe);
    }

    #[test]
    fn rejects_update_operations() {
        assert!(matches!(
            classify_operation("INSERT DATA { <a> <b> <c> }"),
            Err(ProxyError::QueryTypeNotAllowed)
        ));
        assert!(matches!(
            classify_operation("DELETE WHERE { ?s ?p ?o }"),
            Err(ProxyError::QueryTypeNotAllowed)
        ));
    }

    #[test]
    fn rejects_garbage_with_parse_error() {
        assert!(matches!(classify_operation("SELEKT ?x"), Err(ProxyError::ParseError(_))));
        assert!(matches!(classify_operation("   "), Err(ProxyError::ParseError(_))));
    }

    #[test]
    fn extracts_top_level_limit_offset_and_order_by() {
        let m = extract_select_modifiers("SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?s LIMIT 5 OFFSET 10");
        assert_eq!(m.limit, Some(5));
        assert_eq!(m.offset, 10);
        assert!(m.has_order_by);
        assert!(!m.stripped.contains("LIMIT"));
        assert!(!m.stripped.contains("OFFSET"));
        assert!(m.stripped.contains("ORDER BY"));
    }

    #[test]
    fn ignores_limit_nested_inside_a_sub_select() {
        let m = extract_select_modifiers(
            "SELECT * WHERE { { SELECT ?s WHERE { ?s ?p ?o } LIMIT 5 } } LIMIT 10",
        );
        assert_eq!(m.limit, Some(10));
        assert!(m.stripped.contains("LIMIT 5"), "nested LIMIT must survive stripping");
    }

    #[test]
    fn defaults_when_no_modifiers_present() {
        let m = extract_select_modifiers("SELECT * WHERE { ?s ?p ?o }");
        assert_eq!(m.limit, None);
        assert_eq!(m.offset, 0);
        assert!(!m.has_order_by);
    }
}
