//! A terminal chat client over a remote chat backend.
//!
//! The crate includes a CLI tool for using in the terminal. And you can
//! also use it as a library: [`Session`] drives a [`ChatStore`] with the
//! same commands the CLI accepts.
//!
//! [`ChatStore`]: parley_core::ChatStore

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod command;
mod config;
mod session;

pub use config::{Config, ConfigError};
pub use session::{Outcome, Session};

/// Re-exports of [`parley_core`] crate.
pub mod core {
    pub use parley_core::*;
}

/// Re-exports of [`parley_model`] crate.
pub mod model {
    pub use parley_model::*;
}
