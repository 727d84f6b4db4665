//! Shared types for talking to a remote chat API.
//!
//! The crate defines the conversation data model and the [`ChatApi`]
//! protocol that backends implement. It carries no behavior of its own:
//! the store in `parley-core` decides what to do with these values, and
//! transport crates decide how they travel.

#![deny(missing_docs)]

mod api;
mod conversation;
mod error;
mod id;
mod request;

pub use api::*;
pub use conversation::*;
pub use error::*;
pub use id::*;
pub use request::*;
