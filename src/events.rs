//! Event ingestion: decode stream messages and merge them into the store.
//!
//! Each message is a `{type, payload}` envelope describing one mutation the
//! backend has already confirmed, possibly originated by this client. Events
//! are applied strictly in arrival order; there is no sequence number to
//! reorder by, so correctness rests on every store merge being idempotent.

use serde::Deserialize;
use serde_json::Value;
use taskboard_common::{Board, BoardId, Card, CardId, List, ListId, User, UserId};
use tracing::debug;

use crate::errors::EventError;
use crate::store::{BoardStore, StoreHandle};

/// A decoded stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    BoardUpdated(Board),
    BoardDeleted(BoardRef),
    ListCreated(List),
    ListUpdated(List),
    ListDeleted(ListRef),
    CardCreated(Card),
    CardUpdated(Card),
    CardDeleted(CardRef),
    CardMoved(CardMove),
    CollaboratorAdded(CollaboratorChange),
    CollaboratorRemoved(CollaboratorChange),
    /// A well-formed message of a kind this client does not act on.
    Unhandled(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BoardRef {
    pub id: BoardId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ListRef {
    pub id: ListId,
    #[serde(rename = "boardId", alias = "boardID", default)]
    pub board_id: Option<BoardId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CardRef {
    pub id: CardId,
    #[serde(rename = "listId", alias = "listID", default)]
    pub list_id: ListId,
    #[serde(rename = "boardId", alias = "boardID", default)]
    pub board_id: Option<BoardId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMove {
    pub card_id: CardId,
    #[serde(default)]
    pub old_list_id: ListId,
    pub new_list_id: ListId,
    #[serde(default)]
    pub old_position: u32,
    pub new_position: u32,
    #[serde(default)]
    pub board_id: Option<BoardId>,
    /// Sibling positions recomputed by the server, when it sends them.
    #[serde(default)]
    pub updated_cards: Vec<PositionUpdate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionUpdate {
    pub id: CardId,
    pub position: u32,
    pub list_id: ListId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorChange {
    pub card_id: CardId,
    pub user_id: UserId,
    #[serde(default)]
    pub board_id: Option<BoardId>,
    #[serde(default)]
    pub user_name: String,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

fn payload<T: serde::de::DeserializeOwned>(kind: &str, value: Value) -> Result<T, EventError> {
    serde_json::from_value(value).map_err(|source| EventError::Payload {
        kind: kind.to_string(),
        source,
    })
}

/// Decode one text message.
pub fn decode(text: &str) -> Result<RemoteEvent, EventError> {
    let Envelope { kind, payload: body } =
        serde_json::from_str(text).map_err(EventError::Envelope)?;

    let event = match kind.as_str() {
        "BOARD_UPDATED" => RemoteEvent::BoardUpdated(payload(&kind, body)?),
        "BOARD_DELETED" => RemoteEvent::BoardDeleted(payload(&kind, body)?),
        "LIST_CREATED" => RemoteEvent::ListCreated(payload(&kind, body)?),
        "LIST_UPDATED" => RemoteEvent::ListUpdated(payload(&kind, body)?),
        "LIST_DELETED" => RemoteEvent::ListDeleted(payload(&kind, body)?),
        "CARD_CREATED" => RemoteEvent::CardCreated(payload(&kind, body)?),
        "CARD_UPDATED" => RemoteEvent::CardUpdated(payload(&kind, body)?),
        "CARD_DELETED" => RemoteEvent::CardDeleted(payload(&kind, body)?),
        "CARD_MOVED" => RemoteEvent::CardMoved(payload(&kind, body)?),
        "CARD_COLLABORATOR_ADDED" => RemoteEvent::CollaboratorAdded(payload(&kind, body)?),
        "CARD_COLLABORATOR_REMOVED" => RemoteEvent::CollaboratorRemoved(payload(&kind, body)?),
        _ => RemoteEvent::Unhandled(kind),
    };
    Ok(event)
}

/// What ingesting one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Dispatched to the store. The merge itself may still have been a
    /// no-op if its target was missing.
    Applied,
    /// Scoped to a board other than the resident one, or no board is
    /// resident.
    OutOfScope,
    Unhandled,
    /// The resident board was deleted; the view should navigate away.
    BoardDeleted,
}

impl RemoteEvent {
    /// The board this event names, when its payload carries one.
    pub fn board_id(&self) -> Option<BoardId> {
        let id = match self {
            Self::BoardUpdated(board) => Some(board.id),
            Self::BoardDeleted(board) => Some(board.id),
            Self::ListCreated(list) | Self::ListUpdated(list) => Some(list.board_id),
            Self::ListDeleted(list) => list.board_id,
            Self::CardDeleted(card) => card.board_id,
            Self::CardMoved(mv) => mv.board_id,
            Self::CollaboratorAdded(c) | Self::CollaboratorRemoved(c) => c.board_id,
            Self::CardCreated(_) | Self::CardUpdated(_) | Self::Unhandled(_) => None,
        };
        // The backend zero-fills missing ids.
        id.filter(|id| *id != 0)
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::BoardUpdated(_) => "BOARD_UPDATED",
            Self::BoardDeleted(_) => "BOARD_DELETED",
            Self::ListCreated(_) => "LIST_CREATED",
            Self::ListUpdated(_) => "LIST_UPDATED",
            Self::ListDeleted(_) => "LIST_DELETED",
            Self::CardCreated(_) => "CARD_CREATED",
            Self::CardUpdated(_) => "CARD_UPDATED",
            Self::CardDeleted(_) => "CARD_DELETED",
            Self::CardMoved(_) => "CARD_MOVED",
            Self::CollaboratorAdded(_) => "CARD_COLLABORATOR_ADDED",
            Self::CollaboratorRemoved(_) => "CARD_COLLABORATOR_REMOVED",
            Self::Unhandled(kind) => kind.as_str(),
        }
    }
}

/// Apply one event to the store.
///
/// Events naming another board are discarded before touching anything,
/// except `BOARD_UPDATED`, whose header still refreshes the matching
/// directory entry. Card create/update payloads carry no board id; they are
/// scoped by their list, which the store only holds for the resident board.
pub fn ingest(store: &mut BoardStore, event: RemoteEvent) -> IngestOutcome {
    if let RemoteEvent::Unhandled(kind) = &event {
        debug!(kind = %kind, "ignoring unhandled event");
        return IngestOutcome::Unhandled;
    }
    let resident = store.current_board_id();
    let foreign = resident.is_none() || event.board_id().is_some_and(|id| Some(id) != resident);
    if foreign {
        if let RemoteEvent::BoardUpdated(board) = &event {
            if store.user_boards().iter().any(|b| b.id == board.id) {
                store.apply_board_update(board);
                return IngestOutcome::Applied;
            }
        }
        debug!(kind = event.kind(), ?resident, "event for another board");
        return IngestOutcome::OutOfScope;
    }

    match event {
        RemoteEvent::BoardUpdated(board) => store.apply_board_update(&board),
        RemoteEvent::BoardDeleted(board) => {
            store.evict_board(board.id);
            return IngestOutcome::BoardDeleted;
        }
        RemoteEvent::ListCreated(list) | RemoteEvent::ListUpdated(list) => {
            store.apply_list_upsert(list)
        }
        RemoteEvent::ListDeleted(list) => store.remove_list(list.id),
        RemoteEvent::CardCreated(card) | RemoteEvent::CardUpdated(card) => {
            store.apply_card_upsert(card)
        }
        RemoteEvent::CardDeleted(card) => store.remove_card(card.id, card.list_id),
        RemoteEvent::CardMoved(mv) => apply_move(store, mv),
        RemoteEvent::CollaboratorAdded(change) => store.add_card_collaborator(
            change.card_id,
            User::with_id(change.user_id, change.user_name),
        ),
        RemoteEvent::CollaboratorRemoved(change) => {
            store.remove_card_collaborator(change.card_id, change.user_id)
        }
        RemoteEvent::Unhandled(_) => return IngestOutcome::Unhandled,
    }
    IngestOutcome::Applied
}

/// A move payload only carries ids and positions, so it is realized as an
/// upsert of the resident card with its new placement.
fn apply_move(store: &mut BoardStore, mv: CardMove) {
    let Some(mut card) = store.card(mv.card_id).cloned() else {
        debug!(card_id = mv.card_id, "move for unknown card");
        return;
    };
    card.list_id = mv.new_list_id;
    card.position = mv.new_position;
    store.apply_card_upsert(card);

    for update in mv.updated_cards {
        let Some(mut sibling) = store.card(update.id).cloned() else {
            continue;
        };
        if sibling.list_id == update.list_id && sibling.position == update.position {
            continue;
        }
        sibling.list_id = update.list_id;
        sibling.position = update.position;
        store.apply_card_upsert(sibling);
    }
}

/// Decodes and ingests raw stream messages against a shared store.
#[derive(Clone)]
pub struct EventIngestor {
    store: StoreHandle,
}

impl EventIngestor {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    pub fn handle_message(&self, text: &str) -> Result<IngestOutcome, EventError> {
        let event = decode(text)?;
        Ok(self.store.update(|store| ingest(store, event)))
    }
}
