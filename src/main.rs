use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use brainyx::repl::{self, render_conversations, render_message};
use brainyx::session::ConversationId;
use brainyx::{ChatSession, Config, HttpBackend, SessionOptions};

#[derive(Parser)]
#[command(name = "brainyx")]
#[command(version)]
#[command(about = "Chat with Brainyx from the terminal", long_about = None)]
struct Cli {
    /// Config file to use instead of ~/.brainyx/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// List conversations
    List,
    /// Print one conversation
    Show { id: String },
    /// Delete a conversation
    Delete { id: String },
    /// One-shot question through the developer API (uses the API key)
    Ask {
        message: String,
        #[arg(long)]
        system_prompt: Option<String>,
    },
    /// Remaining credits and plan
    Usage,
    /// Available credit plans
    Plans,
    /// Store a credential in the config file
    Login {
        /// Session token from a web login
        #[arg(long, required_unless_present = "api_key")]
        token: Option<String>,
        /// Developer API key
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Show or change the signed-in account
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Manage developer API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Show or change the system prompt
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Start a checkout for a plan and print the payment page
    Checkout {
        plan: String,
        #[arg(long, default_value = "http://localhost:3000")]
        origin: String,
    },
    /// Check that the backend is reachable
    Health,
}

#[derive(Subcommand)]
enum ProfileAction {
    Show,
    Set { name: String },
}

#[derive(Subcommand)]
enum KeysAction {
    List,
    Create { name: String },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set { prompt: String },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    // stdout belongs to the conversation
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    init_tracing(&config);
    tracing::debug!("using API at {}", config.api_base_url);

    let backend = HttpBackend::new(&config)?;
    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => repl::run(&config, backend).await?,
        Commands::List => {
            let session = ChatSession::new(Arc::new(backend), SessionOptions::from_config(&config));
            let list = session.refresh_conversations(&config.session_context()?).await?;
            print!("{}", render_conversations(&list, None));
        }
        Commands::Show { id } => {
            let session = ChatSession::new(Arc::new(backend), SessionOptions::from_config(&config));
            let id = ConversationId::from(id);
            let history = session.select_conversation(&config.session_context()?, &id).await?;
            for message in &history {
                println!("{}", render_message(message));
            }
        }
        Commands::Delete { id } => {
            let session = ChatSession::new(Arc::new(backend), SessionOptions::from_config(&config));
            session
                .delete_conversation(&config.session_context()?, &ConversationId::from(id))
                .await?;
            println!("Conversation deleted.");
        }
        Commands::Ask { message, system_prompt } => {
            let reply = backend
                .direct_chat(&config.api_key_context()?, &message, system_prompt.as_deref())
                .await?;
            println!("{}", reply.response);
            if let Some(credits) = reply.credits_remaining {
                eprintln!("({} credits remaining)", credits);
            }
        }
        Commands::Usage => {
            let usage = backend.usage(&config.session_context()?).await?;
            println!("{} credits left on the {} plan.", usage.credits, usage.plan);
        }
        Commands::Plans => {
            for plan in backend.plans().await? {
                println!("{:<12} {:<16} ${:>7.2}  {} credits", plan.key, plan.name, plan.price, plan.credits);
            }
        }
        Commands::Login { token, api_key } => {
            // start from the file itself so environment overrides are not persisted
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => Config::default_path()?,
            };
            let mut stored = Config::read_file(&path)?;
            stored.set_credentials(token, api_key);
            stored.session_context()?;
            match &cli.config {
                Some(path) => stored.save_to(path)?,
                None => stored.save()?,
            }
            println!("Credentials saved to {}.", path.display());
        }
        Commands::Profile { action } => {
            let ctx = config.session_context()?;
            let profile = match action {
                ProfileAction::Show => backend.profile(&ctx).await?,
                ProfileAction::Set { name } => backend.update_profile(&ctx, &name).await?,
            };
            println!("{} <{}>", profile.name, profile.masked_email);
            if let (Some(credits), Some(plan)) = (profile.credits, profile.plan.as_deref()) {
                println!("{} credits on the {} plan", credits, plan);
            }
        }
        Commands::Keys { action } => {
            let ctx = config.session_context()?;
            match action {
                KeysAction::List => {
                    let keys = backend.api_keys(&ctx).await?;
                    if keys.is_empty() {
                        println!("No API keys yet. Create one with `brainyx keys create <name>`.");
                    }
                    for key in keys {
                        let state = if key.is_active.unwrap_or(true) { "active" } else { "revoked" };
                        println!("{}  {}  ({})", key.id, key.name, state);
                    }
                }
                KeysAction::Create { name } => {
                    let key = backend.create_api_key(&ctx, &name).await?;
                    println!("Created API key '{}'.", key.name);
                    if let Some(secret) = key.key {
                        println!("{}", secret);
                        eprintln!("Store it now: it will not be shown again.");
                    }
                }
            }
        }
        Commands::Settings { action } => {
            let ctx = config.session_context()?;
            let settings = match action {
                SettingsAction::Show => backend.settings(&ctx).await?,
                SettingsAction::Set { prompt } => backend.update_settings(&ctx, &prompt).await?,
            };
            println!("{}", settings.system_prompt);
        }
        Commands::Checkout { plan, origin } => {
            let checkout = backend
                .create_checkout(&config.session_context()?, &plan, &origin)
                .await?;
            println!("Complete your purchase at: {}", checkout.url);
        }
        Commands::Health => {
            let health = backend.health().await?;
            println!("{}", health.status);
        }
    }

    Ok(())
}
