//! Board directory listing: `taskboard boards`.

use anyhow::{Context, Result};
use taskboard::ui::render_board_directory;

use super::Session;

pub async fn cmd_boards(session: &Session) -> Result<()> {
    let boards = session
        .commands
        .fetch_user_boards()
        .await
        .context("Failed to fetch boards")?;
    print!("{}", render_board_directory(&boards));
    Ok(())
}
