pub mod error;
pub mod logging;
pub mod normalization;
pub mod validators;

pub use error::*;
