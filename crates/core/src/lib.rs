//! Syncwire Core - Fundamental types and utilities

mod error;
mod types;
mod vec;

pub use error::*;
pub use types::*;
pub use vec::*;
