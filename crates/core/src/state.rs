//! The observable chat state and the mutations applied to it.

use chrono::{DateTime, Utc};
use parley_model::{Conversation, Message, ProvisionalId, SendReceipt};

use crate::lifecycle::{Lifecycle, Operation};
use crate::reconcile;

/// A snapshot of the client-side chat state.
///
/// Every mutation happens on the store's task; this type is what
/// observers receive after each of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatState {
    conversations: Vec<Conversation>,
    current: Option<Conversation>,
    lifecycle: Lifecycle,
    // Bumped whenever the open slot is re-targeted. Replies issued under
    // an older generation must not touch the open conversation.
    generation: u64,
    // Issue order of conversation loads; only the latest one may land.
    latest_open: u64,
}

/// What an in-flight conversation load needs to land.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct OpenTicket {
    pub sequence: u64,
    pub generation: u64,
}

/// What an in-flight send needs to find its way back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SendTicket {
    pub conversation_id: String,
    pub provisional: Option<ProvisionalId>,
    pub generation: u64,
}

impl ChatState {
    /// Returns every known conversation, most recently created first.
    #[inline]
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Returns the open conversation.
    #[inline]
    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.current.as_ref()
    }

    /// Returns `true` while a conversation request is in flight.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.lifecycle.is_loading()
    }

    /// Returns `true` while a message is being sent.
    #[inline]
    pub fn is_message_loading(&self) -> bool {
        self.lifecycle.is_message_loading()
    }

    /// Returns the last error.
    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.lifecycle.error()
    }

    /// Returns the most recent failed message of the open conversation.
    pub fn last_failed_message(&self) -> Option<&Message> {
        self.current
            .as_ref()?
            .messages
            .iter()
            .rev()
            .find(|msg| msg.failure().is_some())
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    fn navigate(&mut self) {
        self.generation += 1;
    }

    fn current_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        self.current.as_mut().filter(|c| c.id == conversation_id)
    }

    fn listed_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
    }

    // ---------
    // Lifecycle
    // ---------

    pub(crate) fn begin(&mut self, op: Operation) {
        self.lifecycle.begin(op);
    }

    pub(crate) fn succeed(&mut self, op: Operation) {
        self.lifecycle.succeed(op);
    }

    pub(crate) fn fail(&mut self, op: Operation, server_message: Option<&str>) -> String {
        self.lifecycle.fail(op, server_message).to_owned()
    }

    pub(crate) fn clear_error(&mut self) {
        self.lifecycle.clear_error();
    }

    // ---------------------
    // Conversation mutation
    // ---------------------

    pub(crate) fn conversations_loaded(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Starts loading a conversation into the open slot. The open slot
    /// keeps its conversation until the load lands.
    pub(crate) fn open_requested(&mut self) -> OpenTicket {
        self.latest_open += 1;
        OpenTicket {
            sequence: self.latest_open,
            generation: self.generation,
        }
    }

    /// Opens a loaded conversation, unless a newer load was issued or
    /// the open slot was re-targeted since `ticket` was taken.
    pub(crate) fn conversation_loaded(
        &mut self,
        conversation: Conversation,
        ticket: OpenTicket,
    ) -> bool {
        if ticket.sequence != self.latest_open || ticket.generation != self.generation {
            debug!(
                "drop stale conversation {} (load {}, latest {})",
                conversation.id, ticket.sequence, self.latest_open
            );
            return false;
        }
        self.current = Some(conversation);
        self.navigate();
        true
    }

    pub(crate) fn conversation_created(&mut self, conversation: Conversation) {
        self.conversations.insert(0, conversation.clone());
        self.current = Some(conversation);
        self.navigate();
    }

    pub(crate) fn conversation_deleted(&mut self, conversation_id: &str) {
        self.conversations.retain(|c| c.id != conversation_id);
        if self.current.as_ref().is_some_and(|c| c.id == conversation_id) {
            self.current = None;
            self.navigate();
        }
    }

    pub(crate) fn context_updated(&mut self, updated: &Conversation) {
        let file_context = &updated.file_context;
        if let Some(current) = self.current_mut(&updated.id) {
            current.file_context = file_context.clone();
        }
        if let Some(listed) = self.listed_mut(&updated.id) {
            listed.file_context = file_context.clone();
        }
    }

    pub(crate) fn clear_current(&mut self) {
        if self.current.take().is_some() {
            self.navigate();
        }
    }

    // ----------------
    // Message mutation
    // ----------------

    /// Shows a provisional message in the open conversation, if it is
    /// the target. Returns `false` if it is not open.
    pub(crate) fn provision(
        &mut self,
        id: ProvisionalId,
        conversation_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(current) = self.current_mut(conversation_id) else {
            return false;
        };
        current
            .messages
            .push(Message::provisional(id, conversation_id, content, now));
        true
    }

    pub(crate) fn message_sent(
        &mut self,
        ticket: &SendTicket,
        receipt: &SendReceipt,
        now: DateTime<Utc>,
    ) {
        let generation = self.generation;
        if let Some(listed) = self.listed_mut(&ticket.conversation_id) {
            listed.touch(now);
        }
        let Some(current) = self.current_mut(&ticket.conversation_id) else {
            return;
        };
        let shown = ticket
            .provisional
            .is_some_and(|id| reconcile::position(&current.messages, id).is_some());
        if ticket.generation != generation && !shown {
            debug!(
                "drop reply for {}: navigated away since it was sent",
                ticket.conversation_id
            );
            return;
        }
        match ticket.provisional {
            Some(id) => {
                reconcile::confirm(&mut current.messages, id, receipt);
            }
            None => {
                current.messages.extend(receipt.echoed.iter().cloned());
                current.messages.push(receipt.reply.clone());
            }
        }
        current.touch(now);
    }

    /// Marks a provisional message failed. Returns `false` if it is no
    /// longer shown.
    pub(crate) fn message_failed(&mut self, id: ProvisionalId, reason: &str) -> bool {
        match &mut self.current {
            Some(current) => reconcile::mark_failed(&mut current.messages, id, reason),
            None => false,
        }
    }

    /// Puts a failed message of the open conversation back into flight.
    /// Returns the conversation id and the content to send.
    pub(crate) fn resend(&mut self, id: ProvisionalId) -> Option<(String, String)> {
        let current = self.current.as_mut()?;
        let content = reconcile::resend(&mut current.messages, id)?;
        Some((current.id.clone(), content))
    }

    pub(crate) fn discard(&mut self, id: ProvisionalId) -> bool {
        match &mut self.current {
            Some(current) => reconcile::discard(&mut current.messages, id),
            None => false,
        }
    }
}
