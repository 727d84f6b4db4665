use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};

use crate::mailbox::{BoxedMessage, Mailbox};
use crate::{Actor, Message, Observable};

pub async fn run_actor<S: Observable>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<BoxedMessage<S>>,
    mut kill_rx: watch::Receiver<bool>,
    snapshot_tx: watch::Sender<S::Snapshot>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("received message: {msg:?}");

        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last handle has been dropped, discard the message");
            break;
        };

        let proc_span = trace_span!("proc msg");
        proc_span.in_scope(|| {
            msg.handle(&mut state, &Actor::from_mailbox(mailbox));
            publish(&state, &snapshot_tx);
            trace!("finished");
        });
    }
    debug!("will terminate");
}

/// Publishes the state's snapshot, waking subscribers only when it
/// differs from the last published one.
fn publish<S: Observable>(state: &S, snapshot_tx: &watch::Sender<S::Snapshot>) {
    let next = state.snapshot();
    let changed = snapshot_tx.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        *current = next;
        true
    });
    if changed {
        trace!("published a new snapshot");
    }
}
