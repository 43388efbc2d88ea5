use serde::Serialize;
use thiserror::Error;

use crate::listing::ListingStep;
use crate::TableKind;

/// Failures surfaced by the analysis, forecast and restock operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("source table `{table}` is unavailable")]
    SourceUnavailable { table: TableKind },
    #[error("{stage} failed: {message}")]
    Computation { stage: String, message: String },
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl PipelineError {
    pub fn computation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Computation {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Missing non-catalog tables read as empty; every other failure stops the request.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::SourceUnavailable { table } => *table == TableKind::Catalog,
            Self::Computation { .. } | Self::InvalidRequest { .. } => true,
        }
    }
}

/// A column expected by the pipeline but absent from a source table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SchemaGap {
    pub table: TableKind,
    pub column: String,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ListingFlowError {
    #[error("no listing session `{0}`")]
    UnknownSession(String),
    #[error("empty input while {0:?}")]
    EmptyInput(ListingStep),
    #[error("`{0}` is not an image file")]
    NotAnImage(String),
    #[error("`{0}` is not a valid price")]
    InvalidPrice(String),
    #[error("listing is already complete")]
    AlreadyListed,
}
