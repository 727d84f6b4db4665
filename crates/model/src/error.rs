use std::fmt::{self, Display};

/// The kind of error that occurred while calling the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request never got a response (connection, timeout, etc.).
    Transport,
    /// The server refused the bearer token.
    Unauthorized,
    /// The addressed conversation does not exist.
    NotFound,
    /// The server rejected the request as invalid.
    Rejected,
    /// The server failed to handle the request.
    Server,
    /// The response could not be understood.
    InvalidResponse,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transport => "transport error",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not found",
            ErrorKind::Rejected => "request rejected",
            ErrorKind::Server => "server error",
            ErrorKind::InvalidResponse => "invalid response",
        };
        f.write_str(s)
    }
}
