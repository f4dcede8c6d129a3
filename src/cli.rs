//! Terminal chat — stdin/stdout REPL that talks to a running gateway.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::Result;
use crate::intake::{ActivePanel, IntakeField, SiteSurface};
use crate::llm::ModelSelector;
use crate::orchestrator::{Orchestrator, RejectReason, SendOutcome};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Reset,
    /// Show the model, or switch to the named one.
    Model(Option<ModelSelector>),
    /// Print the intake form.
    Form,
    /// Mark the service online again after an outage.
    Online,
    /// Pick a suggestion chip (zero-based).
    Chip(usize),
    Message(String),
}

/// Interpret a line of input. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let cmd = match parts.next() {
            Some("quit") | Some("exit") => Command::Quit,
            Some("reset") => Command::Reset,
            Some("form") => Command::Form,
            Some("online") => Command::Online,
            Some("model") => Command::Model(parts.next().and_then(|m| m.parse().ok())),
            _ => Command::Message(line.to_string()),
        };
        return Some(cmd);
    }

    // A bare digit picks a chip; 1-based on screen.
    match line.parse::<usize>() {
        Ok(n) if (1..=9).contains(&n) => Some(Command::Chip(n - 1)),
        _ => Some(Command::Message(line.to_string())),
    }
}

/// Run the REPL until EOF or `/quit`.
pub async fn run(orchestrator: Arc<Orchestrator>, surface: Arc<SiteSurface>) -> Result<()> {
    surface.set_chat_open(true).await;

    let history = orchestrator.history().await;
    if let Some(welcome) = history.first() {
        println!("\n{}\n", welcome.content);
    }
    print_chips(&orchestrator.chips().await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            eprint!("> ");
            continue;
        };

        match command {
            Command::Quit => break,
            Command::Reset => {
                orchestrator.reset_conversation().await;
                surface.set_chat_open(true).await;
                println!("\n{}\n", crate::orchestrator::WELCOME_MESSAGE);
                print_chips(&orchestrator.chips().await);
            }
            Command::Model(Some(model)) => {
                orchestrator.set_model(model).await;
                eprintln!("Model: {}", model.display_name());
            }
            Command::Model(None) => {
                eprintln!("Model: {}", orchestrator.model().await.display_name());
            }
            Command::Form => print_form(&surface).await,
            Command::Online => {
                orchestrator.set_service_online(true).await;
                eprintln!("Service marked online.");
            }
            Command::Chip(index) => {
                let outcome = orchestrator.select_chip(index).await;
                render(outcome, &surface).await;
            }
            Command::Message(text) => {
                let outcome = orchestrator.send_message(&text).await;
                render(outcome, &surface).await;
            }
        }
        eprint!("> ");
    }

    Ok(())
}

async fn render(outcome: SendOutcome, surface: &SiteSurface) {
    match outcome {
        SendOutcome::Replied {
            text,
            chips,
            handoff,
        } => {
            println!("\n{text}\n");
            match handoff {
                Some(task) => {
                    eprintln!("Opening the project intake form...");
                    task.wait().await;
                    print_form(surface).await;
                }
                None => print_chips(&chips),
            }
        }
        SendOutcome::Failed { message } | SendOutcome::WentOffline { message } => {
            println!("\n{message}\n");
        }
        SendOutcome::Rejected(RejectReason::Offline) => {
            eprintln!("The assistant is offline. Use /online once it is back.");
        }
        SendOutcome::Rejected(RejectReason::Busy) => eprintln!("Still waiting for a reply."),
        SendOutcome::Rejected(RejectReason::NoSuchChip) => eprintln!("No such suggestion."),
        SendOutcome::Rejected(RejectReason::EmptyMessage) | SendOutcome::Discarded => {}
    }
}

fn print_chips(chips: &[String]) {
    for (i, chip) in chips.iter().enumerate() {
        eprintln!("  [{}] {}", i + 1, chip);
    }
}

async fn print_form(surface: &SiteSurface) {
    if surface.active_panel().await != ActivePanel::IntakeForm {
        eprintln!("The intake form is closed.");
        return;
    }

    let form = surface.form().await;
    eprintln!("── Project intake ──");
    for field in IntakeField::ALL {
        let value = form.value(field).unwrap_or("");
        let marker = if form.is_ai_sourced(field) { " (from chat)" } else { "" };
        eprintln!("  {:<16} {}{}", field.as_str(), value, marker);
    }
}
