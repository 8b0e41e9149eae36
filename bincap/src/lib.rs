pub mod case_study;
pub mod collect;
pub mod commons;
pub mod config;
pub mod error;
pub mod geo_core;
pub mod geometric;
pub mod render;

pub use case_study::{analyze, CaseStudy, CaseStudyResult};
pub use config::CaseStudyConfig;
pub use error::CaseStudyError;
