#[macro_use]
pub extern crate failure;

pub mod errors;

pub use errors::{Error, Result};
