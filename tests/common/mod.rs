//! Common test utilities for novel-dl end-to-end tests

#[allow(dead_code)]
pub mod config;
#[allow(dead_code)]
pub mod origin;

pub use config::*;
#[allow(unused_imports)]
pub use origin::*;
