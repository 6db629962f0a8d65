pub mod config;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod sink;
pub mod source;
pub mod types;

pub use config::*;
pub use error::*;
pub use ledger::*;
pub use matcher::*;
pub use sink::*;
pub use source::*;
pub use types::*;
