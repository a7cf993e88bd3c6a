//! Pipeline module - the analysis steps from raw extract to explained models

pub mod charts;
pub mod classification;
pub mod cleaning;
pub mod columns;
pub mod correlation;
pub mod error;
pub mod evaluation;
pub mod explain;
pub mod features;
pub mod hypothesis;
pub mod loader;
pub mod metrics;
pub mod missing;
pub mod models;
pub mod severity;
pub mod stats;

pub use charts::*;
pub use classification::*;
pub use cleaning::*;
pub use correlation::*;
pub use error::*;
pub use evaluation::*;
pub use explain::*;
pub use features::*;
pub use hypothesis::*;
pub use loader::*;
pub use metrics::*;
pub use missing::*;
pub use models::{ModelSettings, TreeEnsemble};
pub use severity::*;
