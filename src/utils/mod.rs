//! Utilities Module
//!
//! Common utilities used across the crate.

pub mod encoding;
pub mod logging;
pub mod settings;

pub use encoding::*;
pub use settings::*;
