//! Claimlens: Insurance Portfolio Analysis Library
//!
//! Loss-ratio exploration, segment hypothesis testing with FDR control,
//! claim occurrence and severity models, and TreeSHAP explanations for
//! policy-level insurance data.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
