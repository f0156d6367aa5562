// Thin re-export module: implementation lives in `blockchain/core` to keep
// chain management, balance derivation and validation separable.

pub mod core;
pub use core::*;
