//! A terminal front end for the triage engine.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::select;
use tokio::sync::watch;
use tokio::time::sleep;
use triage::SessionBuilder;
use triage::core::conversation::{ConversationView, Message, Sender};

const BAR_CHAR: &str = "▎";

enum Command<'a> {
    Query(&'a str),
    Resolved,
    NotResolved,
    Rephrase,
    NewQuery,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        match line {
            "/yes" | "/y" => Self::Resolved,
            "/no" | "/n" => Self::NotResolved,
            "/rephrase" => Self::Rephrase,
            "/new" => Self::NewQuery,
            "/quit" | "/exit" => Self::Quit,
            _ if line.starts_with('/') => Self::Unknown(line),
            _ => Self::Query(line),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let engine = SessionBuilder::from_env().build();
    let mut view_rx = engine.subscribe();
    let mut view = engine.view();
    print_messages(view.messages_since(0));

    if view.configuration_error.is_some() {
        println!(
            "{}{}",
            BAR_CHAR.bright_red(),
            "The agent cannot start until the configuration is fixed."
                .bright_red()
                .bold()
        );
        return;
    }

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print_actions(&view);
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut lines).await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let sent = match Command::parse(line) {
            Command::Quit => break,
            Command::Unknown(command) => {
                println!("Unknown command: {command}");
                continue;
            }
            Command::Query(text) if view.input_enabled => engine.submit(text),
            Command::Resolved if view.show_resolution_actions => {
                engine.confirm_resolved()
            }
            Command::NotResolved if view.show_resolution_actions => {
                engine.confirm_not_resolved()
            }
            Command::Rephrase if view.show_rephrase => {
                engine.rephrase_after_unknown()
            }
            Command::NewQuery if !view.is_loading => engine.start_new_query(),
            _ => {
                println!("{}", "That is not available right now.".dimmed());
                continue;
            }
        };
        if sent.is_err() {
            error!("the engine has stopped");
            break;
        }

        let printed = view.messages.len();
        let Some(next) =
            wait_settled(&mut view_rx, view.revision, &progress_style).await
        else {
            break;
        };
        view = next;
        print_messages(view.messages_since(printed));
    }

    engine.shutdown();
}

/// Waits for the engine to publish a newer view with nothing left running,
/// spinning meanwhile.
async fn wait_settled(
    view_rx: &mut watch::Receiver<ConversationView>,
    revision: u64,
    progress_style: &ProgressStyle,
) -> Option<ConversationView> {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style.clone());
    progress_bar.set_message("🤔 Thinking...");

    let view = loop {
        progress_bar.inc(1);

        let sleep = sleep(Duration::from_millis(100));
        select! {
            view = view_rx.wait_for(|view| {
                view.revision > revision && view.is_settled()
            }) => {
                break view.ok().map(|view| view.clone());
            },
            _ = sleep => {
                continue;
            }
        }
    };

    // Finish the progress bar before printing anything else.
    progress_bar.finish_and_clear();
    view
}

fn print_messages(messages: &[Message]) {
    for msg in messages {
        match msg.sender() {
            // Already on screen as typed.
            Sender::User => {}
            Sender::Agent => {
                println!(
                    "{}🤖 {}",
                    BAR_CHAR.bright_cyan(),
                    msg.text().bright_white()
                );
            }
            Sender::System => {
                println!("{}{}", BAR_CHAR.bright_yellow(), msg.text().dimmed());
            }
        }
    }
}

fn print_actions(view: &ConversationView) {
    let hint = if view.show_resolution_actions {
        "/yes resolved · /no not resolved · /new new query"
    } else if view.show_rephrase {
        "/rephrase try again · /new new query"
    } else if view.show_start_new_query {
        "/new start a new query"
    } else {
        return;
    };
    println!("{}", hint.dimmed());
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
