//! `ispyctl chat` - line REPL over the assistant.
//!
//! A line typed while a reply is pending cancels that reply, the same as
//! sending from the dashboard would.

use crate::display;
use crate::session::Session;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use ispy_engine::{ChatAssistant, SendOutcome};
use owo_colors::OwoColorize;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Quit,
    Clear,
    Stop,
    Message(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "/quit" | "/exit" => Self::Quit,
            "/clear" => Self::Clear,
            "/stop" => Self::Stop,
            text => Self::Message(text.to_string()),
        }
    }
}

pub async fn run(session: &Session) -> Result<()> {
    let assistant = &session.assistant;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    display::print_header("iSpy assistant");
    println!("{}", "/clear resets, /stop cancels a reply, /quit exits".dimmed());
    for message in assistant.transcript().await {
        display::print_chat_message(&message);
    }

    // Input read while waiting for a reply, handled before the next prompt
    let mut carried: Option<String> = None;

    loop {
        let line = match carried.take() {
            Some(line) => line,
            None => {
                print!("{} ", ">".bright_blue());
                std::io::stdout().flush()?;
                match lines.next_line().await? {
                    Some(line) => line,
                    None => break,
                }
            }
        };

        let text = match ReplInput::parse(&line) {
            ReplInput::Quit => break,
            ReplInput::Clear => {
                assistant.clear_chat().await;
                println!("{}", "Conversation cleared".dimmed());
                continue;
            }
            ReplInput::Stop => {
                if assistant.stop_processing().await {
                    println!("{}", "Reply cancelled".dimmed());
                }
                continue;
            }
            ReplInput::Message(text) => text,
        };

        match assistant.send_message(&text).await {
            SendOutcome::Ignored => continue,
            SendOutcome::Cancelled => {
                println!("{}", "Reply cancelled".dimmed());
                continue;
            }
            SendOutcome::Queued => {}
        }

        let spinner = thinking_spinner();
        tokio::select! {
            _ = assistant.wait_until_idle() => {
                spinner.finish_and_clear();
                print_latest_reply(assistant).await;
            }
            next = lines.next_line() => {
                spinner.finish_and_clear();
                match next? {
                    Some(line) => carried = Some(line),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.magenta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("ispy (thinking)...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

async fn print_latest_reply(assistant: &ChatAssistant) {
    if let Some(message) = assistant.transcript().await.last() {
        if !message.is_user() {
            display::print_chat_message(message);
        }
    }
}
