//! A lightweight actor runtime with observable state.
//!
//! An actor owns its state exclusively. Every mutation arrives as a
//! [`Message`] and is handled on the actor's own task, one at a time.
//! After each message the actor publishes a snapshot of its state, so
//! observers can render from a consistent view without locking.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod scheduler;

pub use error::ActorDeadError;
pub use handle::Actor;
pub use mailbox::Message;

/// State that can be owned by an [`Actor`].
///
/// The snapshot is what observers see. It is compared against the last
/// published one after every message, and only a changed snapshot wakes
/// subscribers.
pub trait Observable: Send + 'static {
    /// The observable view of the state.
    type Snapshot: Clone + PartialEq + Send + Sync + 'static;

    /// Takes a snapshot of the current state.
    fn snapshot(&self) -> Self::Snapshot;
}
