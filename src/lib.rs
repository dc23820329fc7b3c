#[cfg(test)]
#[macro_use]
extern crate store_test;

pub mod capture;
pub mod config;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod session;
pub mod verifier;

pub use config::Config;
pub use error::{Error, Result};
