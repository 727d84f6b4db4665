//! A terminal chat client built on the `parley` library.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use parley::command::{Command, HELP};
use parley::core::{Error, Operation};
use parley::model::{Conversation, Delivery, Message, Role};
use parley::{Config, Outcome, Session};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };
    let session = Session::connect(&config);

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    println!("Type /help for the list of commands.");
    loop {
        print_prompt(&session);
        let Some(line) = read_line().await else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{}", err.bright_red());
                continue;
            }
        };

        let spinner_message = match &command {
            Command::Send(_) | Command::Retry => "🤔 Thinking...",
            _ => "Loading...",
        };
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message(spinner_message);

        let execution = session.execute(command);
        tokio::pin!(execution);
        let result = loop {
            select! {
                result = &mut execution => break result,
                _ = sleep(Duration::from_millis(100)) => progress_bar.inc(1),
            }
        };
        // Finish the progress bar before printing anything else.
        progress_bar.finish_and_clear();

        match result {
            Ok(Outcome::Quit) => break,
            Ok(outcome) => render_outcome(outcome),
            Err(err) => render_error(&err),
        }
    }
    session.store().shutdown();
}

fn print_prompt(session: &Session) {
    let state = session.state();
    match state.current_conversation() {
        Some(conversation) => print!("{}> ", conversation.title.bright_white()),
        None => print!("> "),
    }
    std::io::stdout().flush().ok();
}

fn render_outcome(outcome: Outcome) {
    match outcome {
        Outcome::Listed(conversations) => {
            if conversations.is_empty() {
                println!("No conversations yet. Create one with /new <title>.");
            }
            for conversation in &conversations {
                render_summary(conversation);
            }
        }
        Outcome::Opened(conversation) | Outcome::Created(conversation) => {
            render_summary(&conversation);
            for msg in &conversation.messages {
                render_message(msg);
            }
        }
        Outcome::Deleted(id) => println!("Deleted {id}."),
        Outcome::ContextUpdated(conversation) => {
            let files: Vec<_> = conversation.file_context.iter().collect();
            println!("Context: {}", files.join(", "));
        }
        Outcome::Replied(msg) => render_message(&msg),
        Outcome::Discarded => println!("Discarded."),
        Outcome::Closed => println!("Closed."),
        Outcome::Help => println!("{HELP}"),
        Outcome::Quit => {}
    }
}

fn render_summary(conversation: &Conversation) {
    println!(
        "{} {} {}",
        conversation.id.bright_black(),
        conversation.title.bright_white().bold(),
        conversation
            .updated_at
            .format("%Y-%m-%d %H:%M")
            .bright_black(),
    );
}

fn render_message(msg: &Message) {
    match (&msg.role, &msg.delivery) {
        (_, Delivery::Failed(reason)) => {
            println!("{}{} ({reason})", BAR_CHAR.bright_red(), msg.content);
        }
        (Role::User, _) => {
            println!("{}🙂 {}", BAR_CHAR.bright_green(), msg.content);
        }
        (Role::Assistant, _) => {
            println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                msg.content.bright_white()
            );
            for source in &msg.sources {
                let name = source.file_name.as_deref().unwrap_or(&source.file_id);
                println!("{}   ↳ {name}", BAR_CHAR.bright_cyan());
            }
        }
    }
}

fn render_error(err: &Error) {
    let bar = BAR_CHAR.bright_red();
    println!("{bar}{}", err.bright_red());
    if let Error::Rejected {
        operation: Operation::SendMessage,
        ..
    } = err
    {
        println!("{bar}Use /retry or /discard for a failed message.");
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
