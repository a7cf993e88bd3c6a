//! Report module - terminal output and exported artifacts of an analysis run

pub mod charts;
pub mod export;
pub mod summary;
pub mod tables;

pub use charts::*;
pub use export::*;
pub use summary::*;
pub use tables::*;
