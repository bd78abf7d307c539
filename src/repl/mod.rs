//! Line-oriented interactive chat over a [`ChatSession`].
//!
//! Sends run as background tasks so `/cancel` and other commands stay
//! usable while a reply is pending. Replies and notices are printed by a
//! task draining the session's event channel.

pub mod commands;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::HttpBackend;
use crate::api::types::FeedbackKind;
use crate::config::Config;
use crate::events::SessionEvent;
use crate::session::{
    ChatSession, ConversationId, ConversationSummary, Message, Role, SendOutcome, SessionContext,
    SessionOptions,
};

use commands::{ParsedCommand, SlashCommand, help_text, parse_slash_command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Repl {
    session: ChatSession,
    backend: HttpBackend,
    ctx: SessionContext,
}

/// Run the interactive chat over `backend` until `/quit` or end of input.
pub async fn run(config: &Config, backend: HttpBackend) -> Result<()> {
    let ctx = config.session_context()?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let session = ChatSession::new(Arc::new(backend.clone()), SessionOptions::from_config(config))
        .with_events(events_tx);
    let printer = tokio::spawn(print_events(events_rx));

    let repl = Repl::new(session, backend, ctx);
    let result = repl.run().await;

    printer.abort();
    result
}

impl Repl {
    pub fn new(session: ChatSession, backend: HttpBackend, ctx: SessionContext) -> Self {
        Self {
            session,
            backend,
            ctx,
        }
    }

    async fn run(&self) -> Result<()> {
        println!("Brainyx chat. Type a message, or /help for commands.");

        // Failures were already reported as notices.
        if self.session.open(&self.ctx).await.is_ok() {
            self.print_conversations();
            for message in self.session.messages() {
                println!("{}", render_message(&message));
            }
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush().ok();

            let Some(line) = lines.next_line().await.context("Failed to read input")? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(parsed) = parse_slash_command(line) {
                if self.handle_command(parsed).await == Flow::Quit {
                    break;
                }
                continue;
            }
            if line.starts_with('/') {
                eprintln!("Unknown command. Type /help to see available commands.");
                continue;
            }

            self.spawn_send(line.to_string());
        }

        println!("Bye!");
        Ok(())
    }

    fn spawn_send(&self, content: String) {
        let session = self.session.clone();
        let ctx = self.ctx.clone();

        tokio::spawn(async move {
            let mut outcome = session.send(&ctx, &content).await;
            if let Ok(SendOutcome::Bootstrapped(id)) = &outcome {
                debug!("created conversation {} for the first message", id);
                outcome = session.send(&ctx, &content).await;
            }

            match outcome {
                Ok(SendOutcome::Ignored) => {
                    eprintln!("* Still waiting for the previous reply. Use /cancel to stop waiting.");
                }
                Ok(SendOutcome::Detached(_)) => {
                    eprintln!("* A reply arrived for a conversation you left. Open it again to see it.");
                }
                Ok(SendOutcome::Cancelled) => eprintln!("* Stopped waiting for the reply."),
                Ok(_) => {}
                Err(error) => debug!("send failed: {}", error),
            }
        });
    }

    async fn handle_command(&self, parsed: ParsedCommand) -> Flow {
        let command = parsed.command;
        if command.requires_argument() && parsed.argument().is_none() {
            eprintln!("Usage: /{} <number|id>", command.command());
            return Flow::Continue;
        }

        match command {
            SlashCommand::New => {
                if self.session.create_conversation(&self.ctx).await.is_ok() {
                    println!("Started a new conversation.");
                }
            }
            SlashCommand::List => {
                if self.session.refresh_conversations(&self.ctx).await.is_ok() {
                    self.print_conversations();
                }
            }
            SlashCommand::Open => {
                let Some(id) = self.resolve(parsed.argument()) else {
                    return Flow::Continue;
                };
                if let Ok(history) = self.session.select_conversation(&self.ctx, &id).await {
                    if history.is_empty() {
                        println!("(no messages yet)");
                    }
                    for message in &history {
                        println!("{}", render_message(message));
                    }
                }
            }
            SlashCommand::Delete => {
                let Some(id) = self.resolve(parsed.argument()) else {
                    return Flow::Continue;
                };
                let _ = self.session.delete_conversation(&self.ctx, &id).await;
            }
            SlashCommand::Good => self.rate(FeedbackKind::Positive, None).await,
            SlashCommand::Bad => self.rate(FeedbackKind::Negative, parsed.argument()).await,
            SlashCommand::Usage => match self.backend.usage(&self.ctx).await {
                Ok(usage) => println!("{} credits left on the {} plan.", usage.credits, usage.plan),
                Err(error) => eprintln!("! {}", error.user_message()),
            },
            SlashCommand::Cancel => {
                let cancelled = self
                    .session
                    .active_conversation()
                    .is_some_and(|id| self.session.cancel_send(&id));
                if !cancelled {
                    eprintln!("* Nothing to cancel.");
                }
            }
            SlashCommand::Help => println!("{}", help_text()),
            SlashCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn resolve(&self, reference: Option<&str>) -> Option<ConversationId> {
        let reference = reference?;
        let id = self.session.resolve_conversation(reference);
        if id.is_none() {
            eprintln!("No conversation matches '{}'. Use /list to see them.", reference);
        }
        id
    }

    async fn rate(&self, kind: FeedbackKind, correction: Option<&str>) {
        let Some(reply) = self.session.last_assistant_message() else {
            eprintln!("* There is no reply to rate yet.");
            return;
        };
        match self.backend.submit_feedback(&self.ctx, &reply.id, kind, correction).await {
            Ok(()) => println!("Thanks for the feedback."),
            Err(error) => eprintln!("! Could not send feedback: {}", error.user_message()),
        }
    }

    fn print_conversations(&self) {
        let list = self.session.conversations();
        let active = self.session.active_conversation();
        print!("{}", render_conversations(&list, active.as_ref()));
    }
}

/// Numbered conversation list, the active one marked with `*`.
pub fn render_conversations(list: &[ConversationSummary], active: Option<&ConversationId>) -> String {
    if list.is_empty() {
        return "No conversations yet. Type a message to start one.\n".to_string();
    }

    let mut out = String::new();
    for (index, summary) in list.iter().enumerate() {
        let marker = if Some(&summary.id) == active { '*' } else { ' ' };
        out.push_str(&format!("{} {:>2}. {}  [{}]\n", marker, index + 1, summary.preview(), summary.id));
    }
    out
}

pub fn render_message(message: &Message) -> String {
    let suffix = if message.is_pending() { " (sending...)" } else { "" };
    format!("{}: {}{}", message.role.display_name(), message.content, suffix)
}

async fn print_events(mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::MessageAppended { message, .. } if message.role == Role::Assistant => {
                println!("\n{}", render_message(&message));
            }
            SessionEvent::Notice(notice) => {
                let marker = if notice.is_error() { '!' } else { '*' };
                eprintln!("{} {}", marker, notice.text);
            }
            other => debug!("session event: {:?}", other),
        }
    }
}
