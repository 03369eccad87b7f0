pub mod hyperparams;
pub mod trajectory;
pub mod metrics;
pub mod tables;
pub mod errors;

pub use hyperparams::*;
pub use trajectory::*;
pub use metrics::*;
pub use tables::*;
pub use errors::*;
