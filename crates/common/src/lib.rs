//! Shared foundation for the tally workspace: error type, the supported
//! chain table, universal data types, and the collaborator traits that the
//! valuation engine consumes.

pub mod chains;
pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use chains::Chain;
pub use error::{TallyError, TallyResult};
