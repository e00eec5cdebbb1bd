//! Core types shared by every generator stage

pub mod types;
pub mod error;
pub mod logging;

pub use types::*;
pub use error::Error;
