//! Client-side chat state: conversations, messages, loading flags and
//! errors, kept consistent with a remote chat backend.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod api_client;
mod error;
pub mod lifecycle;
mod reconcile;
mod state;
mod store;

pub use error::Error;
pub use lifecycle::{LoadingScope, Operation};
pub use state::ChatState;
pub use store::{ChatStore, ChatStoreBuilder};
