pub mod aggregate;
pub mod config;
pub mod extract;
pub mod levels;
pub mod normalize;
pub mod penalty;
pub mod pipeline;
pub mod quantile;
pub mod release;

pub use aggregate::*;
pub use config::*;
pub use extract::*;
pub use levels::*;
pub use normalize::*;
pub use penalty::*;
pub use pipeline::*;
pub use quantile::*;
pub use release::*;
