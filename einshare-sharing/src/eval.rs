//! Cached evaluation of primitive steps.

use std::{any::Any, sync::Arc};

use einshare_basic::id::{IdentityToken, Operand, SharedArray};
use einshare_core::{
    backend::{ContractCtx, ContractCtxImpl, ReduceCtx, ReduceCtxImpl},
    repr::TensorRepr,
    subscripts::{PairSpec, ReduceSpec},
};
use thiserror::Error;

use crate::{
    key::CacheKey,
    registry::{IdentityError, identify},
    scope,
    store::SharedValue,
};

/// Error type of cached evaluation.
#[derive(Debug, Error)]
pub enum ShareError<E> {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("backend failed: {0}")]
    Backend(E),
    #[error("cached value {0} is not of the requested representation")]
    TypeMismatch(IdentityToken),
}

/// Contracts `lhs` and `rhs` through the active sharing scope, if any.
pub fn cached_contract<R, B>(
    backend: &B,
    lhs: &Operand<'_, R>,
    rhs: &Operand<'_, R>,
    spec: &PairSpec,
) -> Result<SharedArray<R>, ShareError<B::Err>>
where
    R: TensorRepr + Send + Sync + 'static,
    B: ContractCtxImpl<R>,
{
    cached(
        &[lhs, rhs],
        |t| {
            CacheKey::contract(
                backend.name(),
                (spec.lhs.as_slice(), t[0]),
                (spec.rhs.as_slice(), t[1]),
                &spec.out,
            )
        },
        || backend.contract(lhs.repr(), rhs.repr(), spec),
    )
}

/// Reduces `a` through the active sharing scope, if any.
pub fn cached_reduce<R, B>(
    backend: &B,
    a: &Operand<'_, R>,
    spec: &ReduceSpec,
) -> Result<SharedArray<R>, ShareError<B::Err>>
where
    R: TensorRepr + Send + Sync + 'static,
    B: ReduceCtxImpl<R>,
{
    cached(
        &[a],
        |t| CacheKey::reduce(backend.name(), (spec.input.as_slice(), t[0]), &spec.out),
        || backend.reduce(a.repr(), spec),
    )
}

fn cached<R, E>(
    operands: &[&Operand<'_, R>],
    key: impl FnOnce(&[IdentityToken]) -> CacheKey,
    compute: impl FnOnce() -> Result<R, E>,
) -> Result<SharedArray<R>, ShareError<E>>
where
    R: Send + Sync + 'static,
{
    let Some((cache, owner)) = scope::current() else {
        return compute().map(SharedArray::new).map_err(ShareError::Backend);
    };
    let tokens = operands
        .iter()
        .map(|&o| identify(o))
        .collect::<Result<Vec<_>, _>>()?;
    let key = key(&tokens);

    let mut inner = cache.lock();
    if let Some((token, value)) = inner.lookup(owner, &key) {
        tracing::trace!(%key, "sharing cache hit");
        let value = value
            .downcast::<R>()
            .map_err(|_| ShareError::TypeMismatch(token))?;
        return Ok(unsafe { SharedArray::from_raw_unchecked(token, value) });
    }
    tracing::trace!(%key, "sharing cache miss");

    let result = SharedArray::new(compute().map_err(ShareError::Backend)?);
    for (operand, token) in operands.iter().zip(tokens) {
        if let Some(shared) = operand.shared() {
            inner.register_operand(owner, token, erase(shared.arc()));
        }
    }
    inner.insert(owner, key, result.token(), erase(result.arc()));
    Ok(result)
}

fn erase<R: Any + Send + Sync>(value: &Arc<R>) -> SharedValue {
    value.clone()
}
