use std::fmt::Debug;

use tokio::sync::{mpsc, watch};

use crate::{Actor, ActorDeadError, Observable};

/// Helper trait for handling boxed messages.
pub trait BoxMessage<S: Observable>: Send + Debug + 'static {
    fn handle_box(self: Box<Self>, state: &mut S, handle: &Actor<S>);
}

/// A message that an actor can handle.
///
/// Messages are the only way to mutate the actor's state, and they are
/// handled one at a time in the order they were sent.
pub trait Message<S: Observable>: BoxMessage<S> {
    /// Handles the message with mutable access to the actor's state.
    fn handle(self, state: &mut S, handle: &Actor<S>);
}

impl<S: Observable, M: Message<S>> BoxMessage<S> for M {
    #[inline]
    fn handle_box(self: Box<Self>, state: &mut S, handle: &Actor<S>) {
        (*self).handle(state, handle)
    }
}

impl<S: Observable, M: Message<S> + ?Sized> Message<S> for Box<M> {
    #[inline]
    fn handle(self, state: &mut S, handle: &Actor<S>) {
        self.handle_box(state, handle)
    }
}

pub type BoxedMessage<S> = Box<dyn Message<S>>;

pub struct MailboxParts<S: Observable> {
    pub mailbox: Mailbox<S>,
    pub msg_rx: mpsc::UnboundedReceiver<BoxedMessage<S>>,
    pub kill_rx: watch::Receiver<bool>,
    pub snapshot_tx: watch::Sender<S::Snapshot>,
}

pub struct Mailbox<S: Observable> {
    msg_tx: mpsc::UnboundedSender<BoxedMessage<S>>,
    kill_tx: watch::Sender<bool>,
    snapshot_rx: watch::Receiver<S::Snapshot>,
}

impl<S: Observable> Mailbox<S> {
    #[inline]
    pub fn new(initial: S::Snapshot) -> MailboxParts<S> {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        MailboxParts {
            mailbox: Mailbox {
                msg_tx,
                kill_tx,
                snapshot_rx,
            },
            msg_rx,
            kill_rx,
            snapshot_tx,
        }
    }

    #[inline]
    pub fn send(&self, msg: BoxedMessage<S>) -> Result<(), ActorDeadError> {
        self.msg_tx.send(msg).map_err(|_| ActorDeadError)
    }

    #[inline]
    pub fn try_kill(&self) {
        self.kill_tx.send(true).ok();
    }

    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<S::Snapshot> {
        self.snapshot_rx.clone()
    }

    #[inline]
    pub fn snapshot(&self) -> S::Snapshot {
        self.snapshot_rx.borrow().clone()
    }
}
