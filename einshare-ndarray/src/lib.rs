#![no_std]
extern crate alloc;
#[cfg(test)]
extern crate std;

mod tenalg;

pub mod error {
    pub use crate::tenalg::error::*;
}

use core::{fmt, str::FromStr};

use alloc::{string::String, vec::Vec};
use einshare_core::{
    backend::{Backend, ContractCtxImpl, ReduceCtxImpl},
    repr::{AxisSizeReprImpl, TensorRepr},
    subscripts::{PairSpec, ReduceSpec},
};
use ndarray::{ArrayD, IxDyn, LinalgScalar};
use num_traits::Zero;
use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};
use thiserror::Error;

use crate::tenalg::{contract_dot, contract_loop, error::TenalgError, reduce};

/// Dense array backed by `ndarray`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NdDenseRepr<E> {
    data: ArrayD<E>,
}

impl<E> NdDenseRepr<E> {
    pub fn new(data: ArrayD<E>) -> Self {
        Self { data }
    }
    pub fn from_shape_vec(
        sizes: impl IntoIterator<Item = usize>,
        v: Vec<E>,
    ) -> Result<Self, TenalgError> {
        let sizes: Vec<usize> = sizes.into_iter().collect();
        Ok(Self {
            data: ArrayD::from_shape_vec(IxDyn(&sizes), v)?,
        })
    }
    pub fn zeros(sizes: impl IntoIterator<Item = usize>) -> Self
    where
        E: Clone + Zero,
    {
        let sizes: Vec<usize> = sizes.into_iter().collect();
        Self {
            data: ArrayD::zeros(sizes),
        }
    }
    /// Fills every element from the standard distribution of `E`.
    pub fn random_using(sizes: impl IntoIterator<Item = usize>, rng: &mut impl Rng) -> Self
    where
        StandardUniform: Distribution<E>,
    {
        let sizes: Vec<usize> = sizes.into_iter().collect();
        Self {
            data: ArrayD::from_shape_simple_fn(sizes, || rng.random()),
        }
    }
    pub fn map<E2, F: FnMut(&E) -> E2>(&self, f: F) -> NdDenseRepr<E2> {
        NdDenseRepr {
            data: self.data.map(f),
        }
    }
    pub fn data(&self) -> &ArrayD<E> {
        &self.data
    }
    pub fn into_data(self) -> ArrayD<E> {
        self.data
    }
}

impl<E> From<ArrayD<E>> for NdDenseRepr<E> {
    fn from(data: ArrayD<E>) -> Self {
        Self { data }
    }
}

unsafe impl<E> TensorRepr for NdDenseRepr<E> {
    fn naxes(&self) -> usize {
        self.data.shape().len()
    }
}

impl<E> AxisSizeReprImpl for NdDenseRepr<E> {
    unsafe fn axis_size_unchecked(&self, i: usize) -> usize {
        self.data.shape()[i]
    }
}

/// Numeric backends over `NdDenseRepr`, selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NdBackend {
    /// permute, reshape to matrices and multiply
    #[default]
    Dot,
    /// explicit index loops
    Loop,
}

impl NdBackend {
    pub const ALL: [NdBackend; 2] = [NdBackend::Dot, NdBackend::Loop];

    pub fn as_str(&self) -> &'static str {
        match self {
            NdBackend::Dot => "dot",
            NdBackend::Loop => "loop",
        }
    }
}

impl fmt::Display for NdBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown backend {0:?}, expected \"dot\" or \"loop\"")]
pub struct UnknownBackend(pub String);

impl FromStr for NdBackend {
    type Err = UnknownBackend;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dot" => Ok(NdBackend::Dot),
            "loop" => Ok(NdBackend::Loop),
            _ => Err(UnknownBackend(s.into())),
        }
    }
}

impl<E> Backend<NdDenseRepr<E>> for NdBackend {
    type Err = TenalgError;
    fn name(&self) -> &str {
        self.as_str()
    }
}

unsafe impl<E: LinalgScalar> ContractCtxImpl<NdDenseRepr<E>> for NdBackend {
    unsafe fn contract_unchecked(
        &self,
        lhs: &NdDenseRepr<E>,
        rhs: &NdDenseRepr<E>,
        spec: &PairSpec,
    ) -> Result<NdDenseRepr<E>, Self::Err> {
        let z = match self {
            NdBackend::Dot => contract_dot(lhs.data.view(), rhs.data.view(), spec)?,
            NdBackend::Loop => contract_loop(lhs.data.view(), rhs.data.view(), spec)?,
        };
        Ok(NdDenseRepr { data: z })
    }
}

unsafe impl<E: LinalgScalar> ReduceCtxImpl<NdDenseRepr<E>> for NdBackend {
    unsafe fn reduce_unchecked(
        &self,
        a: &NdDenseRepr<E>,
        spec: &ReduceSpec,
    ) -> Result<NdDenseRepr<E>, Self::Err> {
        let z = reduce(a.data.view(), &spec.input, &spec.out)?;
        Ok(NdDenseRepr { data: z })
    }
}
