//! Pipeline module - parameter sweep and model fit.

mod fit;
mod output;
mod sweep;

pub use fit::*;
pub use output::*;
pub use sweep::*;
