// src/core/sparql/mod.rs

//! SPARQL normalizer: strips and preserves the `PREFIX`/`BASE`
//! preamble, classifies the query's top-level operation, canonicalizes
//! whitespace and comments so textually different but semantically
//! identical queries collapse to the same cache key, and extracts the
//! `LIMIT`/`OFFSET`/`ORDER BY` modifiers the chunk executor needs.

mod ast;
mod preamble;
mod scanner;

pub use ast::{Operation, SelectModifiers};

use crate::core::errors::ProxyError;
use scanner::{tokenize, TokKind};
use sha2::{Digest, Sha256};

/// A query after preamble extraction, type gating, and canonicalization.
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    pub preamble: String,
    pub operation: Operation,
    /// The operation body, canonicalized: comments stripped and every run of
    /// whitespace collapsed to a single space, with surrounding whitespace
    /// trimmed. Never has whitespace inserted where none existed, so
    /// adjacency-sensitive constructs like `"lit"^^xsd:type` survive intact.
    pub canonical_remainder: String,
    /// Present only for `SELECT`; the modifiers the chunk executor rewrites
    /// per shard.
    pub select: Option<SelectModifiers>,
}

impl NormalizedQuery {
    /// Parses and normalizes a raw SPARQL query string.
    pub fn parse(query: &str) -> Result<Self, ProxyError> {
        if query.trim().is_empty() {
            return Err(ProxyError::MissingQuery);
        }
        let (preamble, remainder) = preamble::split(query);
        let operation = ast::classify_operation(remainder)?;
        let canonical_remainder = canonicalize(remainder);
        let select = match operation {
            Operation::Select => Some(ast::extract_select_modifiers(&canonical_remainder)),
            _ => None,
        };

        Ok(Self {
            preamble: preamble.to_string(),
            operation,
            canonical_remainder,
            select,
        })
    }

    /// The full canonical query text: preamble verbatim, then the
    /// canonicalized remainder, separated by a single space.
    pub fn canonical_text(&self) -> String {
        if self.preamble.trim().is_empty() {
            self.canonical_remainder.clone()
        } else {
            format!("{} {}", canonicalize(&self.preamble), self.canonical_remainder)
        }
    }

    /// The cache-key fingerprint: a hex SHA-256 digest of the canonical
    /// query text and the negotiated `Accept` header, which must be part of
    /// the key since the same query can be served as JSON or another
    /// result format, using SHA-256 rather than a weaker legacy hash.
    pub fn fingerprint(&self, accept: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_text().as_bytes());
        hasher.update([0u8]);
        hasher.update(accept.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The full cache key: fingerprint suffixed with the compressor id, so
    /// switching compressors can never return bytes encoded under another
    /// compressor's scheme.
    pub fn cache_key(&self, accept: &str, compressor_id: &str) -> String {
        format!("{}.{}", self.fingerprint(accept), compressor_id)
    }
}

/// Collapses every run of whitespace and every comment to a single space,
/// trims the ends, and leaves string and IRI literals untouched. Never
/// inserts a separator where the source had none.
fn canonicalize(text: &str) -> String {
    let toks = tokenize(text);
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for tok in &toks {
        match tok.kind {
            TokKind::Ws | TokKind::Comment => {
                if !out.is_empty() {
                    pending_space = true;
                }
            }
            _ => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push_str(tok.text);
            }
        }
    }
    out
}
