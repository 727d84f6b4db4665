//! Commands typed at the prompt.

use std::error::Error as StdError;
use std::fmt::{self, Display};

use parley_model::FileContext;

/// Usage text shown by `/help`.
pub const HELP: &str = "\
/list                        list conversations
/open <id>                   open a conversation
/new <title> [| file,file]   create a conversation
/delete [id]                 delete a conversation (the open one by default)
/context file,file           replace the file context of the open conversation
/retry                       resend the last failed message
/discard                     drop the last failed message
/close                       close the open conversation
/help                        show this help
/quit                        exit
anything else                send it to the open conversation";

/// A parsed prompt line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `/list`
    List,
    /// `/open <id>`
    Open(String),
    /// `/new <title> [| file,file]`
    New {
        /// Title of the new conversation.
        title: String,
        /// Files to attach, if any were given.
        file_context: Option<FileContext>,
    },
    /// `/delete [id]`
    Delete(Option<String>),
    /// `/context file,file`
    Context(FileContext),
    /// `/retry`
    Retry,
    /// `/discard`
    Discard,
    /// `/close`
    Close,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// Plain text to send as a message.
    Send(String),
}

impl Command {
    /// Parses a prompt line. Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(Command::Send(line.to_owned())));
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let arg = Some(arg).filter(|arg| !arg.is_empty());

        let command = match (name, arg) {
            ("list", _) => Command::List,
            ("open", Some(id)) => Command::Open(id.to_owned()),
            ("open", None) => return Err(ParseError::MissingArgument("/open <id>")),
            ("new", Some(arg)) => parse_new(arg)?,
            ("new", None) => {
                return Err(ParseError::MissingArgument("/new <title> [| file,file]"));
            }
            ("delete", id) => Command::Delete(id.map(ToOwned::to_owned)),
            ("context", arg) => Command::Context(parse_files(arg.unwrap_or_default())),
            ("retry", _) => Command::Retry,
            ("discard", _) => Command::Discard,
            ("close", _) => Command::Close,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            (name, _) => return Err(ParseError::UnknownCommand(name.to_owned())),
        };
        Ok(Some(command))
    }
}

fn parse_new(arg: &str) -> Result<Command, ParseError> {
    let (title, files) = match arg.split_once('|') {
        Some((title, files)) => (title.trim(), Some(parse_files(files))),
        None => (arg, None),
    };
    if title.is_empty() {
        return Err(ParseError::MissingArgument("/new <title> [| file,file]"));
    }
    Ok(Command::New {
        title: title.to_owned(),
        file_context: files.filter(|files| !files.is_empty()),
    })
}

fn parse_files(list: &str) -> FileContext {
    list.split(',')
        .map(str::trim)
        .filter(|file| !file.is_empty())
        .collect()
}

/// Error returned for a malformed command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The command does not exist.
    UnknownCommand(String),
    /// The command needs an argument; carries its usage.
    MissingArgument(&'static str),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownCommand(name) => {
                write!(f, "unknown command /{name}, try /help")
            }
            ParseError::MissingArgument(usage) => write!(f, "usage: {usage}"),
        }
    }
}

impl StdError for ParseError {}
