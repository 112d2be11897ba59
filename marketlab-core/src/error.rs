//! Evaluation errors shared by the signal engine, backtester and optimizer.

use thiserror::Error;

use crate::data::DataError;

/// Errors raised by an evaluation operation.
///
/// `Validation` covers bad parameters (fast >= slow, insufficient bars,
/// out-of-range grid values). `Data` wraps provider failures, including
/// [`DataError::NoData`] for symbols without history.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl EvalError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EvalError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, EvalError::Validation(_))
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, EvalError::Data(DataError::NoData { .. }))
    }
}
