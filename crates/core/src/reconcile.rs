//! Provisional messages and their reconciliation with server replies.

use chrono::{DateTime, Utc};
use parley_model::{Delivery, Message, ProvisionalId, SendReceipt};

/// Issues provisional ids from a wall clock, keeping them strictly
/// increasing even when the clock stalls or steps back.
#[derive(Clone, Debug, Default)]
pub(crate) struct ProvisionalClock {
    last: u64,
}

impl ProvisionalClock {
    pub fn issue(&mut self, now: DateTime<Utc>) -> ProvisionalId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        self.last = millis.max(self.last + 1);
        ProvisionalId::from_millis(self.last)
    }
}

pub(crate) fn position(messages: &[Message], id: ProvisionalId) -> Option<usize> {
    messages
        .iter()
        .position(|msg| msg.id.as_provisional() == Some(id))
}

/// Replaces the provisional message `id` with the server's answer.
///
/// The confirmed echo of the user message, when present, takes the
/// provisional message's slot; the reply is appended at the end. If the
/// provisional message is gone (discarded, or never shown), the answer
/// is still appended. Returns `true` if the provisional message was
/// found.
pub(crate) fn confirm(
    messages: &mut Vec<Message>,
    id: ProvisionalId,
    receipt: &SendReceipt,
) -> bool {
    let found = position(messages, id);
    match (found, &receipt.echoed) {
        (Some(idx), Some(echoed)) => messages[idx] = echoed.clone(),
        (Some(idx), None) => {
            messages.remove(idx);
        }
        (None, Some(echoed)) => messages.push(echoed.clone()),
        (None, None) => {}
    }
    messages.push(receipt.reply.clone());
    found.is_some()
}

/// Marks the provisional message `id` as rejected. The message stays in
/// place.
pub(crate) fn mark_failed(
    messages: &mut [Message],
    id: ProvisionalId,
    reason: &str,
) -> bool {
    let Some(idx) = position(messages, id) else {
        return false;
    };
    messages[idx].delivery = Delivery::Failed(reason.to_owned());
    true
}

/// Puts a failed provisional message back into the sending state and
/// returns its content.
pub(crate) fn resend(
    messages: &mut [Message],
    id: ProvisionalId,
) -> Option<String> {
    let idx = position(messages, id)?;
    let msg = &mut messages[idx];
    if !matches!(msg.delivery, Delivery::Failed(_)) {
        return None;
    }
    msg.delivery = Delivery::Sending;
    Some(msg.content.clone())
}

/// Removes a failed provisional message.
pub(crate) fn discard(messages: &mut Vec<Message>, id: ProvisionalId) -> bool {
    match position(messages, id) {
        Some(idx) if matches!(messages[idx].delivery, Delivery::Failed(_)) => {
            messages.remove(idx);
            true
        }
        _ => false,
    }
}
