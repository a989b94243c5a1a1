// src/core/sparql/preamble.rs

//! Splits the leading `PREFIX`/`BASE` declarations off a SPARQL query.
//! The preamble is preserved verbatim and excluded from parsing; only the
//! remainder is type-gated and canonicalized.

use super::scanner::{tokenize, TokKind};

/// Splits `query` into `(preamble, remainder)`. The preamble is the exact
/// original substring spanning every leading `PREFIX iri:<...>` / `BASE
/// <...>` declaration (plus the whitespace/comments between and after
/// them); the remainder starts at the first non-preamble token.
pub fn split(query: &str) -> (&str, &str) {
    let toks = tokenize(query);
    let mut cursor = 0usize;
    let mut i = 0usize;

    loop {
        // Skip insignificant tokens to find the next keyword candidate.
        let mut j = i;
        while j < toks.len() && matches!(toks[j].kind, TokKind::Ws | TokKind::Comment) {
            j += 1;
        }
        let Some(kw_tok) = toks.get(j) else {
            cursor = query.len();
            break;
        };
        let is_prefix = kw_tok.kind == TokKind::Word && kw_tok.text.eq_ignore_ascii_case("PREFIX");
        let is_base = kw_tok.kind == TokKind::Word && kw_tok.text.eq_ignore_ascii_case("BASE");
        if !is_prefix && !is_base {
            cursor = toks.get(i).map(|t| t.start).unwrap_or(query.len());
            break;
        }

        // Consume the declaration: keyword, then (for PREFIX) a prefixed
        // name ending in ':', then an IRIREF.
        let mut k = j + 1;
        while k < toks.len() && matches!(toks[k].kind, TokKind::Ws | TokKind::Comment) {
            k += 1;
        }
        if is_prefix {
            // PNAME_NS token (e.g. "foaf:"), already scanned as one Word.
            if k >= toks.len() || toks[k].kind != TokKind::Word {
                cursor = toks.get(i).map(|t| t.start).unwrap_or(query.len());
                break;
            }
            k += 1;
            while k < toks.len() && matches!(toks[k].kind, TokKind::Ws | TokKind::Comment) {
                k += 1;
            }
        }
        if k >= toks.len() || toks[k].kind != TokKind::Iri {
            cursor = toks.get(i).map(|t| t.start).unwrap_or(query.len());
            break;
        }
        cursor = toks[k].end;
        i = k + 1;
    }

    query.split_at(cursor)
}
