use std::fmt::{self, Display};

/// Prefix used when a provisional identifier is rendered as a string.
pub const PROVISIONAL_PREFIX: &str = "temp-";

/// A client-generated identifier for a message that the server has not
/// confirmed yet.
///
/// The value is an epoch-millisecond timestamp. Generators must keep it
/// strictly increasing so two sends within the same millisecond still
/// get distinct identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProvisionalId(u64);

impl ProvisionalId {
    /// Creates an identifier from an epoch-millisecond value.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the epoch-millisecond value.
    #[inline]
    pub const fn millis(self) -> u64 {
        self.0
    }
}

impl Display for ProvisionalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PROVISIONAL_PREFIX}{}", self.0)
    }
}

/// Identifier of a message.
///
/// Server identifiers and local identifiers never mix: a server id that
/// happens to look like `temp-1` is still [`MessageId::Confirmed`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// A permanent identifier issued by the server.
    Confirmed(String),
    /// A local identifier pending server confirmation.
    Provisional(ProvisionalId),
}

impl MessageId {
    /// Returns `true` if the id is a local one.
    #[inline]
    pub fn is_provisional(&self) -> bool {
        matches!(self, MessageId::Provisional(_))
    }

    /// Returns the provisional id, if this is one.
    #[inline]
    pub fn as_provisional(&self) -> Option<ProvisionalId> {
        match self {
            MessageId::Provisional(id) => Some(*id),
            MessageId::Confirmed(_) => None,
        }
    }

    /// Returns the server-issued id, if this is one.
    #[inline]
    pub fn as_confirmed(&self) -> Option<&str> {
        match self {
            MessageId::Confirmed(id) => Some(id),
            MessageId::Provisional(_) => None,
        }
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Confirmed(id) => f.write_str(id),
            MessageId::Provisional(id) => Display::fmt(id, f),
        }
    }
}

impl From<String> for MessageId {
    #[inline]
    fn from(id: String) -> Self {
        MessageId::Confirmed(id)
    }
}

impl From<&str> for MessageId {
    #[inline]
    fn from(id: &str) -> Self {
        MessageId::Confirmed(id.to_owned())
    }
}

impl From<ProvisionalId> for MessageId {
    #[inline]
    fn from(id: ProvisionalId) -> Self {
        MessageId::Provisional(id)
    }
}
