//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                                          |
//! |-----------|-----------------------------------------------------------|
//! | `boards`  | `Boards`                                                  |
//! | `board`   | `Show`, `AddList`, `AddCard`, `MoveCard`, `MoveList`, `Comment` |
//! | `watch`   | `Watch`                                                   |
//! | `config`  | `Config`                                                  |

pub mod board;
pub mod boards;
pub mod config;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use taskboard::backend::RestClient;
use taskboard::commands::BoardCommands;
use taskboard::config::ClientConfig;
use taskboard::store::StoreHandle;
use taskboard_common::{Board, BoardId};

pub use board::{cmd_add_card, cmd_add_list, cmd_comment, cmd_move_card, cmd_move_list, cmd_show};
pub use boards::cmd_boards;
pub use config::cmd_config;
pub use watch::cmd_watch;

/// Everything one invocation needs to talk to the backend.
pub struct Session {
    pub config: ClientConfig,
    pub commands: BoardCommands,
}

impl Session {
    pub fn open(config: ClientConfig) -> Result<Self> {
        let backend = RestClient::new(
            &config.api_url,
            config.credential.clone(),
            config.request_timeout,
        )
        .context("Failed to build HTTP client")?;
        let commands = BoardCommands::new(StoreHandle::default(), Arc::new(backend));
        Ok(Self { config, commands })
    }

    /// Make `board_id` resident.
    pub async fn load_board(&self, board_id: BoardId) -> Result<Board> {
        self.commands
            .fetch_board_details(board_id)
            .await
            .with_context(|| format!("Failed to load board #{}", board_id))
    }

    pub fn resident(&self) -> Result<Board> {
        self.commands
            .store()
            .snapshot()
            .context("No board is loaded")
    }
}
