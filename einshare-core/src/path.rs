//! Contraction path planning.
//!
//! A path is an ordered list of primitive steps over a working list of terms. Each step removes its inputs from the list and appends its result to the end, so the positions in later steps refer to the list as it is at that point.
//!
//! Planning is deliberately simple: first every input is reduced over the labels nobody else needs, then terms are contracted pairwise, and a final reduction puts the remaining term in output order.

use alloc::{collections::BTreeMap, format, string::String, vec::Vec};
use core::fmt;
use itertools::Itertools;

use crate::subscripts::{Label, PairSpec, ReduceSpec, Subscripts, SubscriptsError};

/// How pairwise steps are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathStrategy {
    /// Contract the pair whose result is smallest relative to its inputs, ties to the lowest positions.
    #[default]
    Greedy,
    /// Always contract the first two terms of the working list.
    Sequential,
}

/// A single primitive step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Reduce the term at `operand`.
    Reduce {
        /// position in the working list
        operand: usize,
        /// index spec of the step
        spec: ReduceSpec,
    },
    /// Contract the terms at `operands.0 < operands.1`.
    Contract {
        /// positions in the working list
        operands: (usize, usize),
        /// index spec of the step
        spec: PairSpec,
    },
}

impl Step {
    fn labels(&self) -> Vec<Label> {
        match self {
            Step::Reduce { spec, .. } => spec.input.clone(),
            Step::Contract { spec, .. } => union(&spec.lhs, &spec.rhs),
        }
    }
    fn out(&self) -> &[Label] {
        match self {
            Step::Reduce { spec, .. } => &spec.out,
            Step::Contract { spec, .. } => &spec.out,
        }
    }
    fn nterms(&self) -> u128 {
        match self {
            Step::Reduce { .. } => 1,
            Step::Contract { .. } => 2,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Reduce { spec, .. } => write!(f, "{}", spec),
            Step::Contract { spec, .. } => write!(f, "{}", spec),
        }
    }
}

/// Summary of a planned path, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    subscripts: String,
    naive_scaling: usize,
    opt_scaling: usize,
    naive_cost: u128,
    opt_cost: u128,
    largest_intermediate: u128,
    rows: Vec<(usize, String, String)>,
}

impl PathInfo {
    /// Estimated multiply-adds of evaluating the expression in one go.
    pub fn naive_cost(&self) -> u128 {
        self.naive_cost
    }
    /// Estimated multiply-adds of the planned path.
    pub fn opt_cost(&self) -> u128 {
        self.opt_cost
    }
    /// Number of elements of the largest intermediate.
    pub fn largest_intermediate(&self) -> u128 {
        self.largest_intermediate
    }
    /// `naive_cost / opt_cost`.
    pub fn speedup(&self) -> f64 {
        self.naive_cost as f64 / self.opt_cost.max(1) as f64
    }
}

impl fmt::Display for PathInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(80);
        writeln!(f, "  Complete contraction:  {}", self.subscripts)?;
        writeln!(f, "         Naive scaling:  {}", self.naive_scaling)?;
        writeln!(f, "     Optimized scaling:  {}", self.opt_scaling)?;
        writeln!(f, "      Naive FLOP count:  {:.3e}", self.naive_cost as f64)?;
        writeln!(f, "  Optimized FLOP count:  {:.3e}", self.opt_cost as f64)?;
        writeln!(f, "   Theoretical speedup:  {:.3}", self.speedup())?;
        writeln!(
            f,
            "  Largest intermediate:  {:.3e} elements",
            self.largest_intermediate as f64
        )?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "{:>6}  {:<30} {:<40}", "scaling", "current", "remaining")?;
        write!(f, "{}", rule)?;
        for (scaling, current, remaining) in self.rows.iter() {
            write!(f, "\n{:>6}   {:<30} {:<40}", scaling, current, remaining)?;
        }
        Ok(())
    }
}

/// A planned path: the steps to execute plus their summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractionPath {
    steps: Vec<Step>,
    info: PathInfo,
}

impl ContractionPath {
    /// Steps in execution order. There is always at least one.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
    /// Summary of the path.
    pub fn info(&self) -> &PathInfo {
        &self.info
    }
    /// Decomposes the path into its steps.
    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

impl fmt::Display for ContractionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

/// Plans the evaluation of `subscripts` over operands of the given shapes.
pub fn plan(
    subscripts: &Subscripts,
    shapes: &[Vec<usize>],
    strategy: PathStrategy,
) -> Result<ContractionPath, SubscriptsError> {
    let sizes = subscripts.check_shapes(shapes)?;
    let output = subscripts.output();
    let mut terms: Vec<Vec<Label>> = subscripts.inputs().to_vec();
    let mut steps = Vec::new();
    let mut rows = Vec::new();

    // reduce private labels first
    let private: Vec<usize> = (0..terms.len())
        .filter(|&i| kept_labels(&terms, &[i], output).len() != terms[i].len())
        .collect();
    for (removed, i) in private.into_iter().enumerate() {
        let pos = i - removed;
        let out = kept_labels(&terms, &[pos], output);
        let input = terms.remove(pos);
        push_step(
            &mut steps,
            &mut rows,
            Step::Reduce {
                operand: pos,
                spec: ReduceSpec {
                    input,
                    out: out.clone(),
                },
            },
            &mut terms,
            out,
            output,
        );
    }

    while terms.len() > 1 {
        let (i, j) = match strategy {
            PathStrategy::Sequential => (0, 1),
            PathStrategy::Greedy => (0..terms.len())
                .tuple_combinations::<(usize, usize)>()
                .min_by_key(|&(i, j)| {
                    let kept = kept_labels(&terms, &[i, j], output);
                    signed_size(&kept, &sizes)
                        .saturating_sub(signed_size(&terms[i], &sizes))
                        .saturating_sub(signed_size(&terms[j], &sizes))
                })
                .unwrap_or((0, 1)),
        };
        let mut out = kept_labels(&terms, &[i, j], output);
        if terms.len() == 2 && out.len() == output.len() {
            // last pair: produce the output order directly
            out = output.to_vec();
        }
        let rhs = terms.remove(j);
        let lhs = terms.remove(i);
        push_step(
            &mut steps,
            &mut rows,
            Step::Contract {
                operands: (i, j),
                spec: PairSpec {
                    lhs,
                    rhs,
                    out: out.clone(),
                },
            },
            &mut terms,
            out,
            output,
        );
    }

    if terms[0] != output || steps.is_empty() {
        let input = terms.remove(0);
        push_step(
            &mut steps,
            &mut rows,
            Step::Reduce {
                operand: 0,
                spec: ReduceSpec {
                    input,
                    out: output.to_vec(),
                },
            },
            &mut terms,
            output.to_vec(),
            output,
        );
    }

    let all_labels: Vec<Label> = sizes.keys().copied().collect();
    let inner = all_labels.iter().any(|l| !output.contains(l));
    let naive_cost = flop_count(
        &all_labels,
        inner,
        subscripts.noperands() as u128,
        &sizes,
    );
    let opt_cost = steps
        .iter()
        .map(|s| {
            let labels = s.labels();
            let inner = labels.iter().any(|l| !s.out().contains(l));
            flop_count(&labels, inner, s.nterms(), &sizes)
        })
        .fold(0, u128::saturating_add);
    let largest_intermediate = steps
        .iter()
        .map(|s| size_of(s.out(), &sizes))
        .max()
        .unwrap_or(1);
    let opt_scaling = steps.iter().map(|s| s.labels().len()).max().unwrap_or(0);

    let info = PathInfo {
        subscripts: format!("{}", subscripts),
        naive_scaling: all_labels.len(),
        opt_scaling,
        naive_cost,
        opt_cost,
        largest_intermediate,
        rows,
    };
    Ok(ContractionPath { steps, info })
}

fn push_step(
    steps: &mut Vec<Step>,
    rows: &mut Vec<(usize, String, String)>,
    step: Step,
    terms: &mut Vec<Vec<Label>>,
    out: Vec<Label>,
    output: &[Label],
) {
    terms.push(out);
    let remaining = format!(
        "{}->{}",
        terms.iter().map(|t| t.iter().collect::<String>()).join(","),
        output.iter().collect::<String>()
    );
    rows.push((step.labels().len(), format!("{}", step), remaining));
    steps.push(step);
}

/// Labels of the terms at `picked` (in order, deduplicated) that the output or any other term still needs.
fn kept_labels(terms: &[Vec<Label>], picked: &[usize], output: &[Label]) -> Vec<Label> {
    let mut kept: Vec<Label> = Vec::new();
    for &l in picked.iter().flat_map(|&i| terms[i].iter()) {
        if kept.contains(&l) {
            continue;
        }
        let needed = output.contains(&l)
            || terms
                .iter()
                .enumerate()
                .any(|(k, t)| !picked.contains(&k) && t.contains(&l));
        if needed {
            kept.push(l);
        }
    }
    kept
}

fn union(a: &[Label], b: &[Label]) -> Vec<Label> {
    a.iter()
        .chain(b.iter().filter(|l| !a.contains(l)))
        .copied()
        .collect()
}

/// Number of elements over `labels`, saturating at `u128::MAX`.
fn size_of(labels: &[Label], sizes: &BTreeMap<Label, usize>) -> u128 {
    labels
        .iter()
        .map(|l| sizes.get(l).copied().unwrap_or(1) as u128)
        .fold(1, u128::saturating_mul)
}

fn signed_size(labels: &[Label], sizes: &BTreeMap<Label, usize>) -> i128 {
    i128::try_from(size_of(labels, sizes)).unwrap_or(i128::MAX)
}

fn flop_count(
    labels: &[Label],
    inner: bool,
    nterms: u128,
    sizes: &BTreeMap<Label, usize>,
) -> u128 {
    let overall = size_of(labels, sizes);
    overall
        .saturating_mul(nterms.saturating_sub(1).max(1))
        .saturating_mul(if inner { 2 } else { 1 })
}
