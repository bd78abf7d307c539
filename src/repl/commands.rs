use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a line with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Start a new conversation
    New,
    /// List conversations
    List,
    /// Open a conversation by list position or id
    Open,
    /// Delete a conversation by list position or id
    Delete,
    /// Rate the last reply as helpful
    Good,
    /// Rate the last reply as unhelpful, optionally with a correction
    Bad,
    /// Show remaining credits
    Usage,
    /// Stop waiting for the in-flight reply
    Cancel,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new conversation",
            SlashCommand::List => "list your conversations",
            SlashCommand::Open => "open a conversation: /open <number|id>",
            SlashCommand::Delete => "delete a conversation: /delete <number|id>",
            SlashCommand::Good => "mark the last reply as helpful",
            SlashCommand::Bad => "mark the last reply as unhelpful: /bad [better answer]",
            SlashCommand::Usage => "show remaining credits and plan",
            SlashCommand::Cancel => "stop waiting for the current reply",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether the command needs an argument to do anything.
    pub fn requires_argument(self) -> bool {
        matches!(self, SlashCommand::Open | SlashCommand::Delete)
    }
}

/// Return all built-in commands paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim_start().strip_prefix('/')?;

    let mut parts = rest.split_whitespace();
    let head = parts.next()?.to_lowercase();
    let tail: Vec<&str> = parts.collect();

    let command = SlashCommand::from_str(&head).ok().or_else(|| match head.as_str() {
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        "ls" => Some(SlashCommand::List),
        "rm" => Some(SlashCommand::Delete),
        "h" | "?" => Some(SlashCommand::Help),
        _ => None,
    })?;

    let argument = if tail.is_empty() {
        None
    } else {
        Some(tail.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }
    help.push_str("\nAliases: /q and /exit for /quit, /ls for /list, /rm for /delete.");
    help.push_str("\nAnything else you type is sent to the active conversation.");
    help
}
