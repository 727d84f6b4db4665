use std::fmt::{self, Debug};

use chrono::Utc;
use parley_actor::{Actor, Message};
use parley_model::{
    ContextUpdate, Conversation, FileContext, NewConversation, OutgoingMessage,
    ProvisionalId, SendReceipt,
};

use super::{Reply, StoreState};
use crate::api_client::{ApiResult, BoxedApiFuture};
use crate::error::Error;
use crate::lifecycle::Operation;
use crate::state::{OpenTicket, SendTicket};

/// Applies a fulfilled result to the state.
type Apply<T> = fn(&mut StoreState, &Ticket, &T);

/// What a request carries through its flight.
#[derive(Clone, Debug)]
struct Ticket {
    op: Operation,
    generation: u64,
    conversation_id: Option<String>,
    provisional: Option<ProvisionalId>,
    open: Option<OpenTicket>,
}

impl Ticket {
    #[inline]
    fn new(op: Operation, generation: u64) -> Self {
        Self {
            op,
            generation,
            conversation_id: None,
            provisional: None,
            open: None,
        }
    }

    #[inline]
    fn targeting(mut self, conversation_id: &str) -> Self {
        self.conversation_id = Some(conversation_id.to_owned());
        self
    }
}

impl StoreState {
    /// Enters the pending phase of `ticket.op` and runs `fut` on its own
    /// task. The outcome comes back as a [`RequestFinished`] message.
    fn dispatch<T: Send + 'static>(
        &mut self,
        ticket: Ticket,
        fut: BoxedApiFuture<T>,
        apply: Apply<T>,
        reply: Reply<T>,
        handle: &Actor<Self>,
    ) {
        self.chat.begin(ticket.op);
        let handle_clone = handle.clone();
        self.spawn_task(
            |_| async move {
                let result = fut.await;
                handle_clone
                    .send(RequestFinished {
                        ticket,
                        result,
                        apply,
                        reply,
                    })
                    .ok();
            },
            handle,
        );
    }

    fn spawn_task<F, Fut>(&mut self, f: F, handle: &Actor<Self>)
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let handle = handle.clone();
        let fut = f(task_id);
        let task = tokio::spawn(async move {
            fut.await;
            handle.send(TaskEndedMessage(task_id)).ok();
        });
        self.running_tasks.insert(task_id, task);
    }

    fn send_message(
        &mut self,
        req: OutgoingMessage,
        provisional: Option<ProvisionalId>,
        reply: Reply<SendReceipt>,
        handle: &Actor<Self>,
    ) {
        if let (Some(id), Some(file_context)) = (provisional, &req.file_context) {
            self.send_contexts.insert(id, file_context.clone());
        }
        let fut = self.api.send_message(&req);
        let ticket = Ticket {
            provisional,
            ..Ticket::new(Operation::SendMessage, self.chat.generation())
                .targeting(&req.conversation_id)
        };
        self.dispatch(ticket, fut, message_sent, reply, handle);
    }
}

// ----------------
// Fulfilled phases
// ----------------

fn conversations_loaded(
    state: &mut StoreState,
    _ticket: &Ticket,
    conversations: &Vec<Conversation>,
) {
    state.chat.conversations_loaded(conversations.clone());
}

fn conversation_loaded(
    state: &mut StoreState,
    ticket: &Ticket,
    conversation: &Conversation,
) {
    if let Some(open) = ticket.open {
        state.chat.conversation_loaded(conversation.clone(), open);
    }
}

fn conversation_created(
    state: &mut StoreState,
    _ticket: &Ticket,
    conversation: &Conversation,
) {
    state.chat.conversation_created(conversation.clone());
}

fn message_sent(state: &mut StoreState, ticket: &Ticket, receipt: &SendReceipt) {
    if let Some(id) = ticket.provisional {
        state.send_contexts.remove(&id);
    }
    let Some(conversation_id) = ticket.conversation_id.clone() else {
        return;
    };
    let send = SendTicket {
        conversation_id,
        provisional: ticket.provisional,
        generation: ticket.generation,
    };
    state.chat.message_sent(&send, receipt, Utc::now());
}

fn context_updated(
    state: &mut StoreState,
    _ticket: &Ticket,
    conversation: &Conversation,
) {
    state.chat.context_updated(conversation);
}

// --------
// Messages
// --------

#[derive(Debug)]
pub struct FetchConversations(pub Reply<Vec<Conversation>>);

impl Message<StoreState> for FetchConversations {
    fn handle(self, state: &mut StoreState, handle: &Actor<StoreState>) {
        let ticket = Ticket::new(Operation::FetchConversations, state.chat.generation());
        let fut = state.api.list_conversations();
        state.dispatch(ticket, fut, conversations_loaded, self.0, handle);
    }
}

#[derive(Debug)]
pub struct FetchConversation {
    pub conversation_id: String,
    pub reply: Reply<Conversation>,
}

impl Message<StoreState> for FetchConversation {
    fn handle(self, state: &mut StoreState, handle: &Actor<StoreState>) {
        let open = state.chat.open_requested();
        let ticket = Ticket {
            open: Some(open),
            ..Ticket::new(Operation::FetchConversation, open.generation)
        };
        let fut = state.api.get_conversation(&self.conversation_id);
        state.dispatch(ticket, fut, conversation_loaded, self.reply, handle);
    }
}

#[derive(Debug)]
pub struct CreateConversation {
    pub title: String,
    pub file_context: Option<FileContext>,
    pub reply: Reply<Conversation>,
}

impl Message<StoreState> for CreateConversation {
    fn handle(self, state: &mut StoreState, handle: &Actor<StoreState>) {
        let req = NewConversation {
            title: self.title,
            file_context: self.file_context,
        };
        let ticket = Ticket::new(Operation::CreateConversation, state.chat.generation());
        let fut = state.api.create_conversation(&req);
        state.dispatch(ticket, fut, conversation_created, self.reply, handle);
    }
}

#[derive(Debug)]
pub struct SendMessage {
    pub conversation_id: String,
    pub content: String,
    pub file_context: Option<FileContext>,
    pub reply: Reply<SendReceipt>,
}

impl Message<StoreState> for SendMessage {
    fn handle(self, state: &mut StoreState, handle: &Actor<StoreState>) {
        let now = Utc::now();
        let id = state.clock.issue(now);
        let shown = state
            .chat
            .provision(id, &self.conversation_id, &self.content, now);
        if !shown {
            debug!(
                "{} is not open, sending without a provisional message",
                self.conversation_id
            );
        }
        let req = OutgoingMessage {
            conversation_id: self.conversation_id,
            content: self.content,
            file_context: self.file_context,
        };
        state.send_message(req, shown.then_some(id), self.reply, handle);
    }
}

#[derive(Debug)]
pub struct RetryMessage {
    pub id: ProvisionalId,
    pub reply: Reply<SendReceipt>,
}

impl Message<StoreState> for RetryMessage {
    fn handle(self, state: &mut StoreState, handle: &Actor<StoreState>) {
        let Some((conversation_id, content)) = state.chat.resend(self.id) else {
            self.reply
                .send(Err(Error::InvalidInput("No failed message to retry")))
                .ok();
            return;
        };
        // Replay the request as it was first sent.
        let req = OutgoingMessage {
            conversation_id,
            content,
            file_context: state.send_contexts.get(&self.id).cloned(),
        };
        state.send_message(req, Some(self.id), self.reply, handle);
    }
}

#[derive(Debug)]
pub struct DiscardMessage {
    pub id: ProvisionalId,
    pub reply: Reply<bool>,
}

impl Message<StoreState> for DiscardMessage {
    #[inline]
    fn handle(self, state: &mut StoreState, _handle: &Actor<StoreState>) {
        let discarded = state.chat.discard(self.id);
        if discarded {
            state.send_contexts.remove(&self.id);
        }
        self.reply.send(Ok(discarded)).ok();
    }
}

#[derive(Debug)]
pub struct DeleteConversation {
    pub conversation_id: String,
    pub reply: Reply<()>,
}

impl Message<StoreState> for DeleteConversation {
    fn handle(self, state: &mut StoreState, handle: &Actor<StoreState>) {
        let ticket = Ticket::new(Operation::DeleteConversation, state.chat.generation())
            .targeting(&self.conversation_id);
        let fut = state.api.delete_conversation(&self.conversation_id);
        state.dispatch(ticket, fut, conversation_deleted, self.reply, handle);
    }
}

fn conversation_deleted(state: &mut StoreState, ticket: &Ticket, _: &()) {
    if let Some(conversation_id) = &ticket.conversation_id {
        state.chat.conversation_deleted(conversation_id);
    }
}

#[derive(Debug)]
pub struct UpdateContext {
    pub conversation_id: String,
    pub file_context: FileContext,
    pub reply: Reply<Conversation>,
}

impl Message<StoreState> for UpdateContext {
    fn handle(self, state: &mut StoreState, handle: &Actor<StoreState>) {
        let req = ContextUpdate {
            conversation_id: self.conversation_id,
            file_context: self.file_context,
        };
        let ticket = Ticket::new(Operation::UpdateContext, state.chat.generation());
        let fut = state.api.update_context(&req);
        state.dispatch(ticket, fut, context_updated, self.reply, handle);
    }
}

#[derive(Debug)]
pub struct ClearCurrent;

impl Message<StoreState> for ClearCurrent {
    #[inline]
    fn handle(self, state: &mut StoreState, _handle: &Actor<StoreState>) {
        state.chat.clear_current();
    }
}

#[derive(Debug)]
pub struct ClearError;

impl Message<StoreState> for ClearError {
    #[inline]
    fn handle(self, state: &mut StoreState, _handle: &Actor<StoreState>) {
        state.chat.clear_error();
    }
}

struct RequestFinished<T> {
    ticket: Ticket,
    result: ApiResult<T>,
    apply: Apply<T>,
    reply: Reply<T>,
}

impl<T> Debug for RequestFinished<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFinished")
            .field("ticket", &self.ticket)
            .field("ok", &self.result.is_ok())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Message<StoreState> for RequestFinished<T> {
    fn handle(self, state: &mut StoreState, _handle: &Actor<StoreState>) {
        let Self {
            ticket,
            result,
            apply,
            reply,
        } = self;
        let outcome = match result {
            Ok(value) => {
                state.chat.succeed(ticket.op);
                apply(state, &ticket, &value);
                Ok(value)
            }
            Err(failure) => {
                debug!("{} failed with {}", ticket.op, failure.kind);
                let message = state
                    .chat
                    .fail(ticket.op, failure.server_message.as_deref());
                if let Some(id) = ticket.provisional {
                    if !state.chat.message_failed(id, &message) {
                        state.send_contexts.remove(&id);
                    }
                }
                if let Some(on_error) = &state.on_error {
                    on_error(&message);
                }
                Err(Error::Rejected {
                    operation: ticket.op,
                    message,
                })
            }
        };
        // The caller may have stopped waiting.
        reply.send(outcome).ok();
    }
}

#[derive(Debug)]
struct TaskEndedMessage(u64);

impl Message<StoreState> for TaskEndedMessage {
    #[inline]
    fn handle(self, state: &mut StoreState, _handle: &Actor<StoreState>) {
        if state.running_tasks.remove(&self.0).is_none() {
            warn!("task {} ended but was never tracked", self.0);
        }
    }
}
