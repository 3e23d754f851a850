//! Cache keys of primitive steps.
//!
//! A key identifies a step by what it computes, not by how it was written: labels are renamed to their first-occurrence rank and pairwise operands are ordered by identity, so `ab,bc->ac` over `(x, y)` and `ji,kj->ik` over `(y, x)` share one key.

use std::fmt;

use einshare_basic::id::IdentityToken;
use einshare_core::subscripts::Label;

/// Kind of cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    /// A base array kept alive by the cache.
    Array,
    /// A pairwise contraction.
    Contract,
    /// A single-operand reduction or permutation.
    Reduce,
}

/// Structural identity of a cached entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: OpKind,
    backend: String,
    // input terms followed by the output term, labels as ranks
    terms: Vec<Vec<u32>>,
    tokens: Vec<IdentityToken>,
}

impl CacheKey {
    /// Key under which a base array is registered.
    pub fn array(token: IdentityToken) -> Self {
        Self {
            kind: OpKind::Array,
            backend: String::new(),
            terms: Vec::new(),
            tokens: vec![token],
        }
    }

    /// Key of a pairwise contraction `lhs, rhs -> out`.
    pub fn contract(
        backend: &str,
        lhs: (&[Label], IdentityToken),
        rhs: (&[Label], IdentityToken),
        out: &[Label],
    ) -> Self {
        let (lhs, rhs) = if rhs.1 < lhs.1 { (rhs, lhs) } else { (lhs, rhs) };
        let mut terms = canonicalize(&[lhs.0, rhs.0, out]);
        if lhs.1 == rhs.1 {
            // same object on both sides: either order is the same computation
            terms = terms.min(canonicalize(&[rhs.0, lhs.0, out]));
        }
        Self {
            kind: OpKind::Contract,
            backend: backend.to_owned(),
            terms,
            tokens: vec![lhs.1, rhs.1],
        }
    }

    /// Key of a reduction `input -> out`.
    pub fn reduce(backend: &str, input: (&[Label], IdentityToken), out: &[Label]) -> Self {
        Self {
            kind: OpKind::Reduce,
            backend: backend.to_owned(),
            terms: canonicalize(&[input.0, out]),
            tokens: vec![input.1],
        }
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }
    pub fn tokens(&self) -> &[IdentityToken] {
        &self.tokens
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if !self.backend.is_empty() {
            write!(f, "[{}]", self.backend)?;
        }
        if let Some((out, inputs)) = self.terms.split_last() {
            let render = |t: &Vec<u32>| {
                t.iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(".")
            };
            let inputs: Vec<String> = inputs.iter().map(render).collect();
            write!(f, " {}->{}", inputs.join(","), render(out))?;
        }
        Ok(())
    }
}

/// Renames every label to the rank of its first occurrence across `terms`.
fn canonicalize(terms: &[&[Label]]) -> Vec<Vec<u32>> {
    let mut seen: Vec<Label> = Vec::new();
    terms
        .iter()
        .map(|term| {
            term.iter()
                .map(|l| match seen.iter().position(|s| s == l) {
                    Some(r) => r as u32,
                    None => {
                        seen.push(*l);
                        (seen.len() - 1) as u32
                    }
                })
                .collect()
        })
        .collect()
}
