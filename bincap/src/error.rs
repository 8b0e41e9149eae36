//! Domain errors raised by the case study.
//!
//! Library functions return `anyhow::Result` and attach context at each call
//! site. The variants below are the failures a caller may want to tell apart,
//! so they are raised as `CaseStudyError` inside the `anyhow::Error` and can be
//! recovered with `downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseStudyError {
    #[error("layer '{layer}' is missing required field '{field}' (feature {index})")]
    MissingField {
        layer: String,
        field: String,
        index: usize,
    },

    #[error("layer '{layer}' has no '{field}' column in its attribute table")]
    MissingColumn { layer: String, field: String },

    #[error("layer '{layer}' field '{field}' is not numeric (feature {index}): {value}")]
    NotNumeric {
        layer: String,
        field: String,
        index: usize,
        value: String,
    },

    #[error("layer '{layer}' has unsupported geometry '{kind}' (feature {index})")]
    UnsupportedGeometry {
        layer: String,
        kind: String,
        index: usize,
    },

    #[error("unsupported input format: {0:?} (expected .geojson, .json or .shp)")]
    UnsupportedFormat(PathBuf),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("nothing to plot: the joined dataset is empty")]
    EmptyPlot,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
