use std::sync::Arc;

use tokio::sync::watch;
use tracing::Instrument;

use crate::mailbox::{Mailbox, MailboxParts};
use crate::scheduler::run_actor;
use crate::{ActorDeadError, Message, Observable};

/// Handle to an actor.
///
/// Handles are cheap to clone. The actor keeps running as long as at
/// least one handle is alive and it has not been killed.
pub struct Actor<S: Observable> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: Observable> Actor<S> {
    /// Spawns a new actor with the specified state and an optional label.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let MailboxParts {
            mailbox,
            msg_rx,
            kill_rx,
            snapshot_tx,
        } = Mailbox::new(state.snapshot());
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(
                Arc::downgrade(&mailbox),
                state,
                msg_rx,
                kill_rx,
                snapshot_tx,
            )
            .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    #[inline]
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<S>>) -> Self {
        Self { mailbox }
    }

    /// Sends a message to the actor.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), ActorDeadError> {
        self.mailbox.send(Box::new(msg))
    }

    /// Attempts to kill the actor.
    ///
    /// The actor is not guaranteed to be killed immediately, but it
    /// will stop handling further messages and quit soon.
    #[inline]
    pub fn try_kill(&self) {
        self.mailbox.try_kill();
    }

    /// Returns a receiver that observes every published snapshot.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<S::Snapshot> {
        self.mailbox.subscribe()
    }

    /// Returns the most recently published snapshot.
    #[inline]
    pub fn snapshot(&self) -> S::Snapshot {
        self.mailbox.snapshot()
    }
}

impl<S: Observable> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}
