//! Live board view: `taskboard watch <board>`.
//!
//! Loads the board, opens its event stream and prints one line per store
//! change until Ctrl-C, the board is deleted, or the stream is lost.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use taskboard::config::ENV_TOKEN;
use taskboard::store::StoreChange;
use taskboard::supervisor::{ConnectionExit, ConnectionState, ConnectionSupervisor, TungsteniteTransport};
use taskboard::ui::{describe_change, render_board, render_connection};
use taskboard_common::BoardId;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use super::Session;

pub async fn cmd_watch(session: &Session, board_id: BoardId) -> Result<()> {
    let credential = session
        .config
        .credential
        .clone()
        .with_context(|| format!("watch needs a credential; set {}", ENV_TOKEN))?;
    let stream_url = session.config.stream_url()?;

    let store = session.commands.store().clone();
    let mut changes = store.subscribe();
    let board = session.load_board(board_id).await?;
    print!("{}", render_board(&board));
    println!();

    let mut supervisor = ConnectionSupervisor::new(
        stream_url,
        Arc::new(TungsteniteTransport),
        store.clone(),
        session.config.reconnect,
    )
    .with_resync(Arc::new(session.commands.clone()));
    supervisor
        .sync(store.current_board_id(), Some(&credential))
        .context("Failed to open event stream")?;
    let mut state = supervisor
        .watch_state()
        .context("Event stream did not start")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                supervisor.shutdown().await;
                return Ok(());
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                println!("{}", render_connection(current));
                if current == ConnectionState::Closed {
                    break;
                }
            }
            change = changes.recv() => match change {
                Ok(StoreChange::BoardLoaded { .. }) => {}
                Ok(change) => {
                    if let Some(line) = store.read(|s| describe_change(s, &change)) {
                        println!("  {}", line);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "watch output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    match supervisor.take_handle() {
        Some(handle) => match handle.join().await {
            ConnectionExit::Lost(reason) => bail!("Event stream lost: {}", reason),
            ConnectionExit::BoardDeleted => {
                println!("Board #{} was deleted.", board_id);
                Ok(())
            }
            ConnectionExit::Evicted | ConnectionExit::Requested => Ok(()),
        },
        None => Ok(()),
    }
}
