//! Transaction Module
//!
//! Builds, signs and finalizes Bitcoin transactions whose key lives behind
//! a remote signer.

mod builder;
mod finalizer;
mod signer;

pub use builder::*;
pub use finalizer::*;
pub use signer::*;
