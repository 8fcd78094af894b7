//! Plain-text rendering of boards for the CLI.
//!
//! Every function returns a `String` so callers decide where it goes.
//! Styling uses `console`, which drops colors when stdout is not a tty.

use std::fmt::Write as _;

use console::style;
use taskboard_common::{Board, Card, CardStatus, List};

use super::icons::{BOARD, COMMENT, LIST, LIVE, OFFLINE, PEOPLE, RETRY};
use crate::store::{BoardStore, OpStatus, StoreChange};
use crate::supervisor::ConnectionState;

/// The whole resident board: lists in order, cards in order.
pub fn render_board(board: &Board) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}{} {}", BOARD, style(&board.name).bold(), style(format!("#{}", board.id)).dim());
    if !board.description.is_empty() {
        let _ = writeln!(out, "   {}", style(&board.description).dim());
    }
    if board.lists().is_empty() {
        let _ = writeln!(out, "   {}", style("(no lists)").dim());
    }
    for list in board.lists() {
        out.push('\n');
        render_list(&mut out, list);
    }
    out
}

fn render_list(out: &mut String, list: &List) {
    let _ = writeln!(
        out,
        "{}{}. {} {}",
        LIST,
        list.position,
        style(&list.name).cyan().bold(),
        style(format!("#{} ({} cards)", list.id, list.cards().len())).dim()
    );
    for card in list.cards() {
        let _ = writeln!(out, "     {}", card_line(card));
    }
}

fn card_line(card: &Card) -> String {
    let mut line = format!(
        "{}. {} {} {}",
        card.position,
        card.title,
        status_label(card.status),
        style(format!("#{}", card.id)).dim()
    );
    if let Some(users) = card.collaborators.users() {
        let _ = write!(line, " {}{}", PEOPLE, users.len());
    }
    if !card.comments().is_empty() {
        let _ = write!(line, " {}{}", COMMENT, card.comments().len());
    }
    line
}

fn status_label(status: CardStatus) -> String {
    let label = format!("[{}]", status.as_str());
    match status {
        CardStatus::Done => style(label).green().to_string(),
        CardStatus::Pending => style(label).yellow().to_string(),
        CardStatus::ToDo | CardStatus::Undone => style(label).dim().to_string(),
    }
}

/// The dashboard's board directory.
pub fn render_board_directory(boards: &[Board]) -> String {
    if boards.is_empty() {
        return format!("{}\n", style("No boards.").dim());
    }
    let mut out = String::new();
    for board in boards {
        let _ = write!(out, "{} {}", style(format!("{:>5}", board.id)).dim(), style(&board.name).bold());
        if !board.description.is_empty() {
            let _ = write!(out, "  {}", style(&board.description).dim());
        }
        out.push('\n');
    }
    out
}

pub fn render_connection(state: ConnectionState) -> String {
    match state {
        ConnectionState::Open => format!("{}{}", LIVE, style("live").green()),
        ConnectionState::Connecting => format!("{}{}", RETRY, style("connecting").yellow()),
        ConnectionState::Disconnected | ConnectionState::Closed => {
            format!("{}{}", OFFLINE, style("offline").red())
        }
    }
}

/// One line describing a store change, read against the store after the
/// change. `None` for changes not worth printing.
pub fn describe_change(store: &BoardStore, change: &StoreChange) -> Option<String> {
    let line = match change {
        StoreChange::BoardLoaded { board_id } => format!("board #{board_id} loaded"),
        StoreChange::BoardUpdated { board_id } => match store.current() {
            Some(board) if board.id == *board_id => format!("board renamed to '{}'", board.name),
            _ => return None,
        },
        StoreChange::BoardEvicted { board_id } => {
            format!("{}", style(format!("board #{board_id} was deleted")).red())
        }
        StoreChange::ListChanged { list_id } => {
            let list = store.list(*list_id)?;
            format!("list '{}' at {}", list.name, list.position)
        }
        StoreChange::ListRemoved { list_id } => format!("list #{list_id} removed"),
        StoreChange::CardChanged { card_id, list_id } => {
            let card = store.card(*card_id)?;
            let list = store.list(*list_id)?;
            format!("card '{}' in '{}' at {}", card.title, list.name, card.position)
        }
        StoreChange::CardRemoved { card_id } => format!("card #{card_id} removed"),
        StoreChange::CommentsChanged { card_id } => {
            let card = store.card(*card_id)?;
            format!("card '{}' has {} comments", card.title, card.comments().len())
        }
        StoreChange::CollaboratorsChanged { card_id } => {
            let card = store.card(*card_id)?;
            match card.collaborators.users() {
                Some(users) => format!("card '{}' has {} collaborators", card.title, users.len()),
                None => return None,
            }
        }
        StoreChange::StatusChanged { category } => match store.status(*category) {
            OpStatus::Failed(message) => {
                format!("{} {}", style(format!("{} failed:", category.as_str())).red(), message)
            }
            _ => return None,
        },
        StoreChange::UserBoardsChanged => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OpCategory;
    use console::strip_ansi_codes;
    use taskboard_common::{Collaborators, User};

    fn board() -> Board {
        let mut done = Card::new(11, 1, "Ship it", 2);
        done.status = CardStatus::Done;
        done.collaborators = Collaborators::Known(vec![User::with_id(1, "ana")]);
        let mut board = Board::new(4, "Sprint").with_lists(vec![
            List::new(1, 4, "Doing", 1).with_cards(vec![Card::new(10, 1, "Write docs", 1), done]),
            List::new(2, 4, "Done", 2).with_cards(vec![]),
        ]);
        board.description = "Q3 work".into();
        board
    }

    #[test]
    fn test_render_board_lists_cards_in_order() {
        let text = strip_ansi_codes(&render_board(&board())).to_string();
        assert!(text.contains("Sprint #4"));
        assert!(text.contains("Q3 work"));
        let docs = text.find("1. Write docs [TO_DO] #10").unwrap();
        let ship = text.find("2. Ship it [DONE] #11").unwrap();
        assert!(docs < ship);
        assert!(text.contains("Done #2 (0 cards)"));
    }

    #[test]
    fn test_render_empty_directory() {
        let text = strip_ansi_codes(&render_board_directory(&[])).to_string();
        assert_eq!(text, "No boards.\n");
    }

    #[test]
    fn test_render_directory_rows() {
        let text = strip_ansi_codes(&render_board_directory(&[board()])).to_string();
        assert!(text.contains("    4 Sprint  Q3 work"));
    }

    #[test]
    fn test_describe_card_change() {
        let mut store = BoardStore::new();
        store.load_board(board());
        let line = describe_change(&store, &StoreChange::CardChanged { card_id: 11, list_id: 1 }).unwrap();
        assert_eq!(line, "card 'Ship it' in 'Doing' at 2");
        assert!(describe_change(&store, &StoreChange::CardChanged { card_id: 99, list_id: 1 }).is_none());
    }

    #[test]
    fn test_describe_failure_status() {
        let mut store = BoardStore::new();
        store.set_status(OpCategory::ListCard, OpStatus::Failed("Card not found".into()));
        let line = describe_change(
            &store,
            &StoreChange::StatusChanged {
                category: OpCategory::ListCard,
            },
        )
        .unwrap();
        assert!(strip_ansi_codes(&line).ends_with("failed: Card not found"));
    }
}
