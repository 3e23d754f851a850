use einshare_core::subscripts::Label;
use ndarray::ShapeError;
use thiserror::Error;

/// Error type of the ndarray kernels.
#[derive(Debug, Clone, Error)]
pub enum TenalgError {
    /// Labels and axes disagree, or one label has two sizes.
    #[error("labels do not match the operand axes")]
    InvalidInput,
    #[error("label {0:?} is not an axis of the operand")]
    UnknownLabel(Label),
    #[error("reshape failed: {0}")]
    Shape(#[from] ShapeError),
}
