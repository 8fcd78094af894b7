//! Commands against one board: show it, add to it, rearrange it.

use anyhow::{Context, Result, bail};
use taskboard::planner::{DragSource, DropTarget, plan_drop};
use taskboard::ui::icons::CHECK;
use taskboard::ui::render_board;
use taskboard_common::{BoardId, CardId, ListId, NewCard};

use super::Session;

/// `taskboard show <board>`.
pub async fn cmd_show(session: &Session, board_id: BoardId, with_comments: bool) -> Result<()> {
    let board = session.load_board(board_id).await?;
    if with_comments {
        for card in board.lists().iter().flat_map(|l| l.cards()) {
            session
                .commands
                .fetch_card_comments(card.id)
                .await
                .with_context(|| format!("Failed to fetch comments for card #{}", card.id))?;
        }
    }
    print!("{}", render_board(&session.resident()?));
    Ok(())
}

/// `taskboard add-list <board> <name>`. The list goes last.
pub async fn cmd_add_list(session: &Session, board_id: BoardId, name: &str) -> Result<()> {
    session.load_board(board_id).await?;
    let list = session
        .commands
        .create_list(name)
        .await
        .context("Failed to create list")?;
    println!(
        "{}Created list '{}' (#{}) at position {}",
        CHECK, list.name, list.id, list.position
    );
    Ok(())
}

/// `taskboard add-card <board> <list> <title>`.
pub async fn cmd_add_card(
    session: &Session,
    board_id: BoardId,
    list_id: ListId,
    title: &str,
    description: Option<&str>,
) -> Result<()> {
    session.load_board(board_id).await?;
    let card = NewCard {
        description: description.map(str::to_string),
        ..NewCard::titled(title)
    };
    let card = session
        .commands
        .create_card(list_id, card)
        .await
        .context("Failed to create card")?;
    println!(
        "{}Created card '{}' (#{}) in list #{} at position {}",
        CHECK, card.title, card.id, card.list_id, card.position
    );
    Ok(())
}

/// `taskboard move-card <board> <card> --to <list> [--position N]`.
///
/// Position 0 (the default) appends to the target list.
pub async fn cmd_move_card(
    session: &Session,
    board_id: BoardId,
    card_id: CardId,
    to_list_id: ListId,
    position: u32,
) -> Result<()> {
    let board = session.load_board(board_id).await?;
    let Some(from_list_id) = board.list_of_card(card_id) else {
        bail!("Card #{} is not on board #{}", card_id, board_id);
    };
    let target_len = board
        .list(to_list_id)
        .map(|l| l.cards().len())
        .with_context(|| format!("List #{} is not on board #{}", to_list_id, board_id))?;

    if from_list_id == to_list_id {
        let position = if position == 0 { target_len as u32 } else { position };
        session
            .commands
            .reorder_card(card_id, position)
            .await
            .context("Failed to reorder card")?;
    } else {
        let position = if position == 0 { target_len as u32 + 1 } else { position };
        session
            .commands
            .move_card(card_id, to_list_id, position)
            .await
            .context("Failed to move card")?;
    }
    print!("{}", render_board(&session.resident()?));
    Ok(())
}

/// `taskboard move-list <board> <list> <position>`: drop the list onto
/// whichever list currently holds `position`.
pub async fn cmd_move_list(
    session: &Session,
    board_id: BoardId,
    list_id: ListId,
    position: u32,
) -> Result<()> {
    let board = session.load_board(board_id).await?;
    if board.list(list_id).is_none() {
        bail!("List #{} is not on board #{}", list_id, board_id);
    }
    let index = (position.max(1) as usize - 1).min(board.lists().len().saturating_sub(1));
    let target = board.lists()[index].id;

    match plan_drop(&board, DragSource::List(list_id), DropTarget::List(target)) {
        Some(plan) => {
            session
                .commands
                .apply_plan(&plan)
                .await
                .context("Failed to move list")?;
            print!("{}", render_board(&session.resident()?));
        }
        None => println!("List #{} is already at position {}", list_id, index + 1),
    }
    Ok(())
}

/// `taskboard comment <board> <card> <text>`.
pub async fn cmd_comment(session: &Session, board_id: BoardId, card_id: CardId, text: &str) -> Result<()> {
    let board = session.load_board(board_id).await?;
    if board.card(card_id).is_none() {
        bail!("Card #{} is not on board #{}", card_id, board_id);
    }
    let comment = session
        .commands
        .add_comment(card_id, text)
        .await
        .context("Failed to add comment")?;
    println!("{}Added comment #{} to card #{}", CHECK, comment.id, card_id);
    Ok(())
}
