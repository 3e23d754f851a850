//! Einsum-style contraction over a planned path of primitive steps.

use einshare_basic::id::{Operand, SharedArray};
use einshare_core::{
    backend::{Backend, ContractCtxImpl, ReduceCtxImpl},
    path::{ContractionPath, PathStrategy, Step, plan},
    repr::{AxisSizeRepr, AxisSizeReprImpl},
    subscripts::{Subscripts, SubscriptsError},
};
use einshare_sharing::eval::{ShareError, cached_contract, cached_reduce};
use thiserror::Error;

/// Options of a contraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContractOptions {
    pub strategy: PathStrategy,
}

impl ContractOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn strategy(self, strategy: PathStrategy) -> Self {
        Self { strategy }
    }
}

/// Error type of `contract`.
#[derive(Debug, Error)]
pub enum ContractError<E> {
    #[error(transparent)]
    Subscripts(#[from] SubscriptsError),
    #[error(transparent)]
    Share(#[from] ShareError<E>),
}

/// Evaluates `expr` over `operands` with the default options.
///
/// Inside a sharing scope every step goes through the scope's cache, and every operand must then be a shared handle.
pub fn contract<R, B>(
    expr: &str,
    operands: &[Operand<'_, R>],
    backend: &B,
) -> Result<SharedArray<R>, ContractError<<B as Backend<R>>::Err>>
where
    R: AxisSizeReprImpl + Send + Sync + 'static,
    B: Backend<R> + ContractCtxImpl<R> + ReduceCtxImpl<R>,
{
    contract_with(expr, operands, backend, &ContractOptions::default())
}

/// Evaluates `expr` over `operands`.
pub fn contract_with<R, B>(
    expr: &str,
    operands: &[Operand<'_, R>],
    backend: &B,
    options: &ContractOptions,
) -> Result<SharedArray<R>, ContractError<<B as Backend<R>>::Err>>
where
    R: AxisSizeReprImpl + Send + Sync + 'static,
    B: Backend<R> + ContractCtxImpl<R> + ReduceCtxImpl<R>,
{
    let subscripts = Subscripts::parse(expr)?;
    let shapes: Vec<Vec<usize>> = operands.iter().map(|o| o.repr().shape()).collect();
    let path = plan(&subscripts, &shapes, options.strategy)?;
    tracing::debug!(
        %subscripts,
        backend = backend.name(),
        steps = path.steps().len(),
        "planned contraction"
    );

    let mut work: Vec<Operand<'_, R>> = operands.to_vec();
    for step in path.into_steps() {
        let result = match step {
            Step::Reduce { operand, spec } => {
                let a = work.remove(operand);
                cached_reduce(backend, &a, &spec)?
            }
            Step::Contract {
                operands: (i, j),
                spec,
            } => {
                let rhs = work.remove(j);
                let lhs = work.remove(i);
                cached_contract(backend, &lhs, &rhs, &spec)?
            }
        };
        work.push(Operand::Shared(result));
    }

    match (work.pop(), work.is_empty()) {
        (Some(Operand::Shared(result)), true) => Ok(result),
        _ => panic!("a contraction path must end with a single computed term"),
    }
}

/// Plans `expr` over operands of the given shapes without evaluating anything.
pub fn contract_path(
    expr: &str,
    shapes: &[Vec<usize>],
) -> Result<ContractionPath, SubscriptsError> {
    contract_path_with(expr, shapes, &ContractOptions::default())
}

pub fn contract_path_with(
    expr: &str,
    shapes: &[Vec<usize>],
    options: &ContractOptions,
) -> Result<ContractionPath, SubscriptsError> {
    let subscripts = Subscripts::parse(expr)?;
    plan(&subscripts, shapes, options.strategy)
}
