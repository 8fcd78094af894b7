//! Drag-reorder planning.
//!
//! Turns a drop (what was dragged, what it was dropped on) into the
//! commands that realize it. Planning is pure: it reads the resident board
//! and returns a [`ReorderPlan`]; the command layer applies each planned
//! command's optimistic phase before any confirmation is awaited.

use taskboard_common::{Board, CardId, ListId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragSource {
    List(ListId),
    Card(CardId),
}

/// Where the pointer was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    /// A list, or the empty area of one.
    List(ListId),
    /// Another card, used as an insert-before anchor.
    Card(CardId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedCommand {
    /// Give a list its corrected 1-based position.
    UpdateListPosition { list_id: ListId, position: u32 },
    /// Reorder within one list, confirmed with a card update.
    ReorderCard {
        card_id: CardId,
        list_id: ListId,
        position: u32,
    },
    /// Move to another list, confirmed with a move request.
    MoveCard {
        card_id: CardId,
        from_list_id: ListId,
        to_list_id: ListId,
        position: u32,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderPlan {
    /// In application order.
    pub commands: Vec<PlannedCommand>,
}

impl ReorderPlan {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Plan a drop. Returns `None` when the drop changes nothing or names
/// something not on the board.
pub fn plan_drop(board: &Board, source: DragSource, target: DropTarget) -> Option<ReorderPlan> {
    let plan = match (source, target) {
        (DragSource::List(list_id), DropTarget::List(over_id)) => {
            plan_list_reorder(board, list_id, over_id)?
        }
        // Lists only reorder among lists.
        (DragSource::List(_), DropTarget::Card(_)) => return None,
        (DragSource::Card(card_id), target) => plan_card_drop(board, card_id, target)?,
    };
    (!plan.is_empty()).then_some(plan)
}

/// Move the source list to the target list's index and renumber the whole
/// sequence, emitting an update for every list whose position changes.
fn plan_list_reorder(board: &Board, list_id: ListId, over_id: ListId) -> Option<ReorderPlan> {
    let lists = board.lists();
    let old_index = lists.iter().position(|l| l.id == list_id)?;
    let new_index = lists.iter().position(|l| l.id == over_id)?;
    if old_index == new_index {
        return None;
    }

    let mut order: Vec<(ListId, u32)> = lists.iter().map(|l| (l.id, l.position)).collect();
    let moved = order.remove(old_index);
    order.insert(new_index, moved);

    let commands = order
        .into_iter()
        .enumerate()
        .filter(|(index, (_, position))| *position != *index as u32 + 1)
        .map(|(index, (list_id, _))| PlannedCommand::UpdateListPosition {
            list_id,
            position: index as u32 + 1,
        })
        .collect();
    Some(ReorderPlan { commands })
}

fn plan_card_drop(board: &Board, card_id: CardId, target: DropTarget) -> Option<ReorderPlan> {
    let source_list = board.list(board.list_of_card(card_id)?)?;

    let (dest_list, requested) = match target {
        DropTarget::Card(over_card) => {
            let dest = board.list(board.list_of_card(over_card)?)?;
            let index = dest.cards().iter().position(|c| c.id == over_card)?;
            (dest, index as u32 + 1)
        }
        DropTarget::List(over_list) => {
            let dest = board.list(over_list)?;
            (dest, dest.cards().len() as u32 + 1)
        }
    };

    let command = if dest_list.id == source_list.id {
        let current = source_list.cards().iter().position(|c| c.id == card_id)? as u32 + 1;
        // The card leaves the list before it is re-inserted, so the last
        // reachable slot is the list length.
        let position = requested.min(source_list.cards().len() as u32);
        if position == current {
            return None;
        }
        PlannedCommand::ReorderCard {
            card_id,
            list_id: source_list.id,
            position,
        }
    } else {
        PlannedCommand::MoveCard {
            card_id,
            from_list_id: source_list.id,
            to_list_id: dest_list.id,
            position: requested,
        }
    };
    Some(ReorderPlan {
        commands: vec![command],
    })
}
