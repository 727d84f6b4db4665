use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, ProvisionalId};

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    User,
    /// Text produced by the assistant.
    Assistant,
}

impl Role {
    /// Returns the wire name of the role.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference from an assistant message to the document it drew from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCitation {
    /// The cited file.
    pub file_id: String,
    /// Display name of the cited file, if the server provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Page number within the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// The cited text.
    pub snippet: String,
}

/// An ordered set of file identifiers that grounds assistant replies.
///
/// Duplicates are dropped on construction, keeping the first occurrence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FileContext(Vec<String>);

impl FileContext {
    /// Creates an empty context.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file id, returning `false` if it was already present.
    pub fn insert<S: Into<String>>(&mut self, file_id: S) -> bool {
        let file_id = file_id.into();
        if self.contains(&file_id) {
            return false;
        }
        self.0.push(file_id);
        true
    }

    /// Returns `true` if the file id is part of the context.
    #[inline]
    pub fn contains(&self, file_id: &str) -> bool {
        self.0.iter().any(|id| id == file_id)
    }

    /// Returns the number of files.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no file is in the context.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the file ids in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for FileContext {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut context = FileContext::new();
        for file_id in iter {
            context.insert(file_id);
        }
        context
    }
}

impl From<Vec<String>> for FileContext {
    #[inline]
    fn from(ids: Vec<String>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<FileContext> for Vec<String> {
    #[inline]
    fn from(context: FileContext) -> Self {
        context.0
    }
}

/// Where a message stands with respect to the server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// The server has issued this message.
    Confirmed,
    /// A local message whose send request is in flight.
    Sending,
    /// A local message whose send request was rejected.
    Failed(String),
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
    /// Identifier of the message.
    pub id: MessageId,
    /// The conversation this message belongs to.
    pub conversation_id: String,
    /// Who wrote the message.
    pub role: Role,
    /// Text of the message.
    pub content: String,
    /// When the message was written.
    pub timestamp: DateTime<Utc>,
    /// Citations backing the content, in display order.
    pub sources: Vec<SourceCitation>,
    /// Delivery state of the message.
    pub delivery: Delivery,
}

impl Message {
    /// Creates a message that the server has confirmed.
    pub fn confirmed<ID, C, S>(
        id: ID,
        conversation_id: C,
        role: Role,
        content: S,
        timestamp: DateTime<Utc>,
    ) -> Self
    where
        ID: Into<String>,
        C: Into<String>,
        S: Into<String>,
    {
        Self {
            id: MessageId::Confirmed(id.into()),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            timestamp,
            sources: vec![],
            delivery: Delivery::Confirmed,
        }
    }

    /// Creates a local user message that is about to be sent.
    pub fn provisional<C, S>(
        id: ProvisionalId,
        conversation_id: C,
        content: S,
        timestamp: DateTime<Utc>,
    ) -> Self
    where
        C: Into<String>,
        S: Into<String>,
    {
        Self {
            id: MessageId::Provisional(id),
            conversation_id: conversation_id.into(),
            role: Role::User,
            content: content.into(),
            timestamp,
            sources: vec![],
            delivery: Delivery::Sending,
        }
    }

    /// Attaches citations to the message.
    #[inline]
    pub fn with_sources(mut self, sources: Vec<SourceCitation>) -> Self {
        self.sources = sources;
        self
    }

    /// Returns `true` if the message is a local one awaiting the server.
    #[inline]
    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }

    /// Returns the failure reason of a rejected local message.
    #[inline]
    pub fn failure(&self) -> Option<&str> {
        match &self.delivery {
            Delivery::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A titled, ordered sequence of chat messages.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Conversation {
    /// Server-issued identifier.
    pub id: String,
    /// Title shown in conversation lists.
    pub title: String,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation last changed. Never earlier than
    /// `created_at`.
    pub updated_at: DateTime<Utc>,
    /// Messages in chronological order.
    pub messages: Vec<Message>,
    /// Files that ground the assistant's replies.
    pub file_context: FileContext,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new<ID, T>(id: ID, title: T, created_at: DateTime<Utc>) -> Self
    where
        ID: Into<String>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            title: title.into(),
            created_at,
            updated_at: created_at,
            messages: vec![],
            file_context: FileContext::default(),
        }
    }

    /// Marks the conversation as changed at `now`.
    ///
    /// The timestamp is clamped so `updated_at` never precedes
    /// `created_at`, and never moves backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at).max(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_file_context_dedup() {
        let context: FileContext = ["a", "b", "a", "c", "b"].into_iter().collect();
        assert_eq!(context.iter().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(context.len(), 3);
    }

    #[test]
    fn test_file_context_serde() {
        let context: FileContext =
            serde_json::from_str(r#"["f1", "f2", "f1"]"#).unwrap();
        assert_eq!(context.len(), 2);
        let json = serde_json::to_string(&context).unwrap();
        assert_eq!(json, r#"["f1","f2"]"#);
    }

    #[test]
    fn test_touch_keeps_invariant() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut conversation = Conversation::new("c1", "Notes", created);

        conversation.touch(created - Duration::hours(1));
        assert_eq!(conversation.updated_at, created);

        let later = created + Duration::minutes(5);
        conversation.touch(later);
        assert_eq!(conversation.updated_at, later);

        conversation.touch(created);
        assert_eq!(conversation.updated_at, later);
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
        let role: Role = serde_json::from_str(r#""user""#).unwrap();
        assert_eq!(role, Role::User);
    }
}
