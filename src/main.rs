use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskboard::config::{CliOverrides, ClientConfig, ENV_TOKEN};
use taskboard::logging::{LogFormat, init_logging};

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Collaborative task board client")]
pub struct Cli {
    /// Path to taskboard.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8080
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Event stream URL (derived from --api-url when omitted)
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = ENV_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Log format: json, compact, pretty
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Reconnect attempts after the event stream drops (0 disables)
    #[arg(long, global = true)]
    pub reconnect_attempts: Option<u32>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the boards you can see
    Boards,
    /// Print a board with its lists and cards
    Show {
        board: u64,
        /// Also fetch each card's comments
        #[arg(long)]
        comments: bool,
    },
    /// Print a board, then follow its live changes
    Watch { board: u64 },
    /// Append a list to a board
    AddList { board: u64, name: String },
    /// Add a card to a list
    AddCard {
        board: u64,
        list: u64,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Move a card to a list and position
    MoveCard {
        board: u64,
        card: u64,
        /// Target list
        #[arg(long)]
        to: u64,
        /// 1-based position in the target list (0 appends)
        #[arg(long, default_value = "0")]
        position: u32,
    },
    /// Move a list to a 1-based position
    MoveList { board: u64, list: u64, position: u32 },
    /// Comment on a card
    Comment {
        board: u64,
        card: u64,
        text: String,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default taskboard.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = ClientConfig::load(cli.config.as_deref())?.with_overrides(CliOverrides {
        api_url: cli.api_url.clone(),
        ws_url: cli.ws_url.clone(),
        token: cli.token.clone(),
        log_format: cli.log_format,
        reconnect_attempts: cli.reconnect_attempts,
    });
    init_logging(config.log_format, &config.log_level);

    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(cli.config.as_deref(), &config, command.clone());
    }

    let session = cmd::Session::open(config)?;
    match &cli.command {
        Commands::Boards => cmd::cmd_boards(&session).await?,
        Commands::Show { board, comments } => cmd::cmd_show(&session, *board, *comments).await?,
        Commands::Watch { board } => cmd::cmd_watch(&session, *board).await?,
        Commands::AddList { board, name } => cmd::cmd_add_list(&session, *board, name).await?,
        Commands::AddCard {
            board,
            list,
            title,
            description,
        } => {
            cmd::cmd_add_card(&session, *board, *list, title, description.as_deref()).await?;
        }
        Commands::MoveCard {
            board,
            card,
            to,
            position,
        } => cmd::cmd_move_card(&session, *board, *card, *to, *position).await?,
        Commands::MoveList {
            board,
            list,
            position,
        } => cmd::cmd_move_list(&session, *board, *list, *position).await?,
        Commands::Comment { board, card, text } => {
            cmd::cmd_comment(&session, *board, *card, text).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}
