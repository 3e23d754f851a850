//! Einsum subscripts: parsing and the per-step index specs handed to backends.
//!
//! Only explicit labels are supported: each label is a single ASCII letter, terms are separated by `,`, and the output (if any) follows `->`.
//! A label may appear at most once inside a single term; traces and diagonals are rejected at parse time.

use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::fmt;
use thiserror::Error;

/// A single index label.
pub type Label = char;

/// Errors raised while parsing subscripts or checking them against operand shapes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptsError {
    /// `->` appears more than once.
    #[error("subscripts contain more than one '->'")]
    TooManyArrows,
    /// A character which is neither an ASCII letter nor a separator.
    #[error("invalid character {0:?} in subscripts")]
    InvalidChar(char),
    /// A label repeated inside one input term.
    #[error("label {label:?} repeated in input term {term}")]
    RepeatedLabel {
        /// position of the term
        term: usize,
        /// offending label
        label: Label,
    },
    /// A label repeated in the output term.
    #[error("label {0:?} repeated in output")]
    RepeatedOutput(Label),
    /// An output label that no input carries.
    #[error("output label {0:?} does not appear in any input")]
    UnknownOutput(Label),
    /// The number of operands differs from the number of input terms.
    #[error("expected {expected} operands, found {found}")]
    OperandCount {
        /// number of input terms
        expected: usize,
        /// number of operands supplied
        found: usize,
    },
    /// An operand rank differs from the length of its term.
    #[error("term {term} has {expected} labels but its operand has {found} axes")]
    RankMismatch {
        /// position of the term
        term: usize,
        /// labels in the term
        expected: usize,
        /// axes of the operand
        found: usize,
    },
    /// Two occurrences of one label have different sizes.
    #[error("label {label:?} has size {first} and size {second}")]
    SizeMismatch {
        /// offending label
        label: Label,
        /// size seen first
        first: usize,
        /// conflicting size
        second: usize,
    },
}

/// Parsed einsum subscripts, e.g. `ab,bc->ac`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscripts {
    inputs: Vec<Vec<Label>>,
    output: Vec<Label>,
}

impl Subscripts {
    /// Parses subscripts. Whitespace is ignored. Without `->`, the output is every label occurring exactly once, sorted.
    pub fn parse(expr: &str) -> Result<Self, SubscriptsError> {
        let expr: String = expr.chars().filter(|c| !c.is_whitespace()).collect();

        let mut parts = expr.split("->");
        let lhs = parts.next().unwrap_or("");
        let rhs = parts.next();
        if parts.next().is_some() {
            return Err(SubscriptsError::TooManyArrows);
        }

        let inputs = lhs
            .split(',')
            .enumerate()
            .map(|(term, s)| parse_term(s, |label| SubscriptsError::RepeatedLabel { term, label }))
            .collect::<Result<Vec<_>, _>>()?;

        let output = match rhs {
            Some(s) => {
                let output = parse_term(s, SubscriptsError::RepeatedOutput)?;
                if let Some(&l) = output.iter().find(|l| !inputs.iter().any(|t| t.contains(l))) {
                    return Err(SubscriptsError::UnknownOutput(l));
                }
                output
            }
            None => {
                let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
                for l in inputs.iter().flatten() {
                    *counts.entry(*l).or_default() += 1;
                }
                counts
                    .into_iter()
                    .filter_map(|(l, n)| (n == 1).then_some(l))
                    .collect()
            }
        };

        Ok(Self { inputs, output })
    }

    /// Input terms, one per operand.
    pub fn inputs(&self) -> &[Vec<Label>] {
        &self.inputs
    }
    /// Output term.
    pub fn output(&self) -> &[Label] {
        &self.output
    }
    /// Number of operands expected.
    pub fn noperands(&self) -> usize {
        self.inputs.len()
    }

    /// Checks operand shapes against the terms and returns the size of each label.
    pub fn check_shapes(
        &self,
        shapes: &[Vec<usize>],
    ) -> Result<BTreeMap<Label, usize>, SubscriptsError> {
        if shapes.len() != self.inputs.len() {
            return Err(SubscriptsError::OperandCount {
                expected: self.inputs.len(),
                found: shapes.len(),
            });
        }
        let mut sizes = BTreeMap::new();
        for (term, (labels, shape)) in self.inputs.iter().zip(shapes).enumerate() {
            if labels.len() != shape.len() {
                return Err(SubscriptsError::RankMismatch {
                    term,
                    expected: labels.len(),
                    found: shape.len(),
                });
            }
            for (&label, &n) in labels.iter().zip(shape) {
                let first = *sizes.entry(label).or_insert(n);
                if first != n {
                    return Err(SubscriptsError::SizeMismatch {
                        label,
                        first,
                        second: n,
                    });
                }
            }
        }
        Ok(sizes)
    }
}

fn parse_term(
    s: &str,
    repeated: impl Fn(Label) -> SubscriptsError,
) -> Result<Vec<Label>, SubscriptsError> {
    let mut term = Vec::with_capacity(s.len());
    for c in s.chars() {
        if !c.is_ascii_alphabetic() {
            return Err(SubscriptsError::InvalidChar(c));
        }
        if term.contains(&c) {
            return Err(repeated(c));
        }
        term.push(c);
    }
    Ok(term)
}

fn render(inputs: &[Vec<Label>], output: &[Label]) -> String {
    let mut s = String::new();
    for (i, t) in inputs.iter().enumerate() {
        if i != 0 {
            s.push(',');
        }
        s.extend(t.iter());
    }
    s.push_str("->");
    s.extend(output.iter());
    s
}

impl fmt::Display for Subscripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(&self.inputs, &self.output))
    }
}

/// Index spec of a single pairwise contraction step.
///
/// Every label of `lhs` or `rhs` missing from `out` is summed over. Labels shared by both inputs and kept in `out` are batch labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairSpec {
    /// labels of the left operand
    pub lhs: Vec<Label>,
    /// labels of the right operand
    pub rhs: Vec<Label>,
    /// labels of the result
    pub out: Vec<Label>,
}

impl PairSpec {
    /// Labels summed over by this step, in first-occurrence order.
    pub fn summed(&self) -> Vec<Label> {
        let mut summed: Vec<Label> = Vec::new();
        for &l in self.lhs.iter().chain(self.rhs.iter()) {
            if !self.out.contains(&l) && !summed.contains(&l) {
                summed.push(l);
            }
        }
        summed
    }
    /// The same step with its operands swapped.
    pub fn swapped(&self) -> Self {
        Self {
            lhs: self.rhs.clone(),
            rhs: self.lhs.clone(),
            out: self.out.clone(),
        }
    }
}

impl fmt::Display for PairSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            render(&[self.lhs.clone(), self.rhs.clone()], &self.out)
        )
    }
}

/// Index spec of a single-operand step: sums every label missing from `out`, then orders the rest as `out`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReduceSpec {
    /// labels of the operand
    pub input: Vec<Label>,
    /// labels of the result
    pub out: Vec<Label>,
}

impl ReduceSpec {
    /// Labels summed over by this step.
    pub fn summed(&self) -> Vec<Label> {
        self.input
            .iter()
            .filter(|l| !self.out.contains(l))
            .copied()
            .collect()
    }
}

impl fmt::Display for ReduceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(&[self.input.clone()], &self.out))
    }
}
