//! Entity store: the single in-memory copy of the resident board.
//!
//! ## Overview
//!
//! `BoardStore` owns the board currently being viewed (lists ordered by
//! position, cards ordered by position within each list) plus the
//! dashboard's board directory and per-category operation status. The
//! command layer and the event ingestor only ever mutate it through the
//! methods below; nothing else keeps a copy that could diverge.
//!
//! Every mutation is synchronous and total. A merge that names a board,
//! list or card the store does not hold is dropped with a `debug!` line:
//! remote events and optimistic edits race by nature and absence is
//! expected, not an error. Every merge is also idempotent so that an event
//! echoing a command this client already applied collapses into the same
//! state.
//!
//! Observers subscribe to a `broadcast` channel of [`StoreChange`]s and
//! re-read the state through a [`StoreHandle`].

mod ordering;
mod status;

use std::sync::{Arc, Mutex, PoisonError};

use taskboard_common::{Board, BoardId, Card, CardId, Comment, CommentId, List, ListId, User, UserId};
use tokio::sync::broadcast;
use tracing::debug;

pub(crate) use ordering::clamp_position;
pub use status::{OpCategory, OpStatus, OperationStatuses};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// What changed in the store. Observers re-read state; the payload only
/// says where to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    BoardLoaded { board_id: BoardId },
    BoardUpdated { board_id: BoardId },
    /// The resident board was deleted; the view should navigate away.
    BoardEvicted { board_id: BoardId },
    ListChanged { list_id: ListId },
    ListRemoved { list_id: ListId },
    CardChanged { card_id: CardId, list_id: ListId },
    CardRemoved { card_id: CardId },
    CommentsChanged { card_id: CardId },
    CollaboratorsChanged { card_id: CardId },
    UserBoardsChanged,
    StatusChanged { category: OpCategory },
}

pub struct BoardStore {
    current: Option<Board>,
    user_boards: Vec<Board>,
    statuses: OperationStatuses,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for BoardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardStore {
    pub fn new() -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            current: None,
            user_boards: Vec::new(),
            statuses: OperationStatuses::default(),
            changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn emit(&self, change: StoreChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn current(&self) -> Option<&Board> {
        self.current.as_ref()
    }

    pub fn current_board_id(&self) -> Option<BoardId> {
        self.current.as_ref().map(|b| b.id)
    }

    pub fn user_boards(&self) -> &[Board] {
        &self.user_boards
    }

    pub fn statuses(&self) -> &OperationStatuses {
        &self.statuses
    }

    pub fn status(&self, category: OpCategory) -> &OpStatus {
        self.statuses.get(category)
    }

    pub fn list(&self, list_id: ListId) -> Option<&List> {
        self.current.as_ref()?.list(list_id)
    }

    pub fn card(&self, card_id: CardId) -> Option<&Card> {
        self.current.as_ref()?.card(card_id)
    }

    /// True when every list and every card sequence is numbered `1..=N`.
    pub fn is_settled(&self) -> bool {
        self.current.as_ref().is_none_or(|board| {
            ordering::is_dense(board.lists())
                && board.lists().iter().all(|l| ordering::is_dense(l.cards()))
        })
    }

    // ── Board ───────────────────────────────────────────────────────────

    /// Replace the resident board wholesale.
    ///
    /// Lists are sorted by position, each list's cards are sorted by
    /// position, both are renumbered densely, and a list without a `cards`
    /// field gets an empty collection.
    pub fn load_board(&mut self, mut board: Board) {
        let lists = board.lists_mut();
        for list in lists.iter_mut() {
            let cards = list.cards_mut();
            ordering::normalize(cards);
        }
        ordering::normalize(lists);

        let board_id = board.id;
        debug!(board_id, lists = board.lists().len(), "loaded board");
        self.current = Some(board);
        self.emit(StoreChange::BoardLoaded { board_id });
    }

    /// Merge name, description and ownership from `patch` into the resident
    /// board and the directory entry with the same id. Lists are untouched.
    pub fn apply_board_update(&mut self, patch: &Board) {
        let mut changed = false;
        if let Some(board) = self.current.as_mut().filter(|b| b.id == patch.id) {
            board.merge_header(patch);
            changed = true;
        }
        if let Some(entry) = self.user_boards.iter_mut().find(|b| b.id == patch.id) {
            entry.merge_header(patch);
            self.emit(StoreChange::UserBoardsChanged);
        }
        if changed {
            self.emit(StoreChange::BoardUpdated { board_id: patch.id });
        } else {
            debug!(board_id = patch.id, "board update for non-resident board");
        }
    }

    /// Remove a deleted board from the directory and, if it is resident,
    /// evict it. Returns true when the resident board was evicted.
    pub fn evict_board(&mut self, board_id: BoardId) -> bool {
        self.remove_user_board(board_id);
        if self.current_board_id() == Some(board_id) {
            self.current = None;
            self.emit(StoreChange::BoardEvicted { board_id });
            true
        } else {
            false
        }
    }

    /// Clone of the resident board, for explicit rollback.
    pub fn snapshot(&self) -> Option<Board> {
        self.current.clone()
    }

    /// Put back a snapshot taken earlier. Ignored if a different board has
    /// become resident since.
    pub fn restore(&mut self, snapshot: Board) {
        if self.current_board_id().is_some_and(|id| id != snapshot.id) {
            debug!(board_id = snapshot.id, "not restoring snapshot of non-resident board");
            return;
        }
        self.load_board(snapshot);
    }

    // ── Lists ───────────────────────────────────────────────────────────

    /// Insert or merge a list and re-place it by position.
    ///
    /// An existing list keeps its cards unless the incoming list carries a
    /// `cards` field. A new list without cards gets an empty collection.
    pub fn apply_list_upsert(&mut self, list: List) {
        let Some(board) = self.current.as_mut() else {
            debug!(list_id = list.id, "list upsert with no resident board");
            return;
        };
        if list.board_id != 0 && list.board_id != board.id {
            debug!(list_id = list.id, board_id = list.board_id, "list upsert for another board");
            return;
        }

        let board_id = board.id;
        let lists = board.lists_mut();
        let mut merged = match ordering::take(lists, list.id) {
            Some(mut existing) => {
                existing.name = list.name;
                existing.position = list.position;
                if let Some(cards) = list.cards {
                    existing.cards = Some(cards);
                }
                if list.updated_at.is_some() {
                    existing.updated_at = list.updated_at;
                }
                existing
            }
            None => list,
        };
        merged.board_id = board_id;
        ordering::normalize(merged.cards_mut());

        let list_id = merged.id;
        ordering::place(lists, merged);
        self.emit(StoreChange::ListChanged { list_id });
    }

    /// Remove a list and every card in it. No-op if absent.
    pub fn remove_list(&mut self, list_id: ListId) {
        let Some(board) = self.current.as_mut() else {
            return;
        };
        if ordering::take(board.lists_mut(), list_id).is_some() {
            self.emit(StoreChange::ListRemoved { list_id });
        }
    }

    // ── Cards ───────────────────────────────────────────────────────────

    /// Insert, merge or move a card.
    ///
    /// The card's `list_id` names its target list. If the card already sits
    /// anywhere on the board it is taken out first, which is how a move
    /// happens. Fields the incoming card does not carry (comments,
    /// collaborators, expanded user records) are kept from the resident
    /// copy. An upsert naming a list the store does not hold is dropped:
    /// the list's own creation event may simply not have arrived yet.
    pub fn apply_card_upsert(&mut self, card: Card) {
        let Some(board) = self.current.as_mut() else {
            debug!(card_id = card.id, "card upsert with no resident board");
            return;
        };
        if board.list(card.list_id).is_none() {
            debug!(card_id = card.id, list_id = card.list_id, "dropping card upsert for unknown list");
            return;
        }

        let mut previous = None;
        for list in board.lists_mut().iter_mut() {
            if let Some(existing) = ordering::take(list.cards_mut(), card.id) {
                previous = Some(existing);
                break;
            }
        }

        let merged = merge_card(previous, card);
        let (card_id, list_id) = (merged.id, merged.list_id);
        if let Some(target) = board.list_mut(list_id) {
            ordering::place(target.cards_mut(), merged);
            self.emit(StoreChange::CardChanged { card_id, list_id });
        }
    }

    /// Remove a card. Looks in `list_id` first, then anywhere on the board,
    /// since a local move may have relocated it. No-op if absent.
    pub fn remove_card(&mut self, card_id: CardId, list_id: ListId) {
        let Some(board) = self.current.as_mut() else {
            return;
        };
        let mut removed = board
            .list_mut(list_id)
            .and_then(|list| ordering::take(list.cards_mut(), card_id));
        if removed.is_none() {
            removed = board
                .lists_mut()
                .iter_mut()
                .find_map(|list| ordering::take(list.cards_mut(), card_id));
        }
        if removed.is_some() {
            self.emit(StoreChange::CardRemoved { card_id });
        }
    }

    // ── Comments ────────────────────────────────────────────────────────

    /// Append a comment, or replace one with the same id.
    pub fn append_comment(&mut self, card_id: CardId, comment: Comment) {
        let Some(card) = self.current.as_mut().and_then(|b| b.card_mut(card_id)) else {
            debug!(card_id, comment_id = comment.id, "comment for unknown card");
            return;
        };
        let comments = card.comments.get_or_insert_with(Vec::new);
        match comments.iter_mut().find(|c| c.id == comment.id) {
            Some(existing) => *existing = comment,
            None => comments.push(comment),
        }
        self.emit(StoreChange::CommentsChanged { card_id });
    }

    /// Record a fetched comment thread, replacing whatever was known.
    pub fn set_card_comments(&mut self, card_id: CardId, comments: Vec<Comment>) {
        let Some(card) = self.current.as_mut().and_then(|b| b.card_mut(card_id)) else {
            return;
        };
        card.comments = Some(comments);
        self.emit(StoreChange::CommentsChanged { card_id });
    }

    pub fn remove_comment(&mut self, card_id: CardId, comment_id: CommentId) {
        let Some(comments) = self
            .current
            .as_mut()
            .and_then(|b| b.card_mut(card_id))
            .and_then(|c| c.comments.as_mut())
        else {
            return;
        };
        let before = comments.len();
        comments.retain(|c| c.id != comment_id);
        if comments.len() != before {
            self.emit(StoreChange::CommentsChanged { card_id });
        }
    }

    // ── Collaborators ───────────────────────────────────────────────────

    /// Record a fetched collaborator set, possibly empty.
    pub fn set_card_collaborators(&mut self, card_id: CardId, collaborators: Vec<User>) {
        let Some(card) = self.current.as_mut().and_then(|b| b.card_mut(card_id)) else {
            return;
        };
        let mut deduped: Vec<User> = Vec::with_capacity(collaborators.len());
        for user in collaborators {
            if !deduped.iter().any(|u| u.id == user.id) {
                deduped.push(user);
            }
        }
        card.collaborators = taskboard_common::Collaborators::Known(deduped);
        self.emit(StoreChange::CollaboratorsChanged { card_id });
    }

    pub fn add_card_collaborator(&mut self, card_id: CardId, collaborator: User) {
        let Some(card) = self.current.as_mut().and_then(|b| b.card_mut(card_id)) else {
            return;
        };
        if card.collaborators.insert(collaborator) {
            self.emit(StoreChange::CollaboratorsChanged { card_id });
        }
    }

    pub fn remove_card_collaborator(&mut self, card_id: CardId, user_id: UserId) {
        let Some(card) = self.current.as_mut().and_then(|b| b.card_mut(card_id)) else {
            return;
        };
        if card.collaborators.remove(user_id) {
            self.emit(StoreChange::CollaboratorsChanged { card_id });
        }
    }

    // ── Board directory ─────────────────────────────────────────────────

    pub fn set_user_boards(&mut self, boards: Vec<Board>) {
        self.user_boards = boards;
        self.emit(StoreChange::UserBoardsChanged);
    }

    pub fn upsert_user_board(&mut self, board: Board) {
        match self.user_boards.iter_mut().find(|b| b.id == board.id) {
            Some(existing) => *existing = board,
            None => self.user_boards.push(board),
        }
        self.emit(StoreChange::UserBoardsChanged);
    }

    /// Header of a board, from the resident copy or the directory.
    pub fn board_header(&self, board_id: BoardId) -> Option<Board> {
        let source = self
            .current
            .as_ref()
            .filter(|b| b.id == board_id)
            .or_else(|| self.user_boards.iter().find(|b| b.id == board_id))?;
        let mut header = Board::new(source.id, source.name.clone());
        header.description = source.description.clone();
        header.owner_id = source.owner_id;
        header.owner = source.owner.clone();
        Some(header)
    }

    pub fn remove_user_board(&mut self, board_id: BoardId) {
        let before = self.user_boards.len();
        self.user_boards.retain(|b| b.id != board_id);
        if self.user_boards.len() != before {
            self.emit(StoreChange::UserBoardsChanged);
        }
    }

    // ── Status ──────────────────────────────────────────────────────────

    pub fn set_status(&mut self, category: OpCategory, status: OpStatus) {
        self.statuses.set(category, status);
        self.emit(StoreChange::StatusChanged { category });
    }
}

fn merge_card(previous: Option<Card>, mut incoming: Card) -> Card {
    let Some(previous) = previous else {
        return incoming;
    };
    if incoming.comments.is_none() {
        incoming.comments = previous.comments;
    }
    if incoming.collaborators.is_unfetched() {
        incoming.collaborators = previous.collaborators;
    }
    if incoming.assigned_user.is_none() && incoming.assigned_user_id == previous.assigned_user_id {
        incoming.assigned_user = previous.assigned_user;
    }
    if incoming.supervisor.is_none() && incoming.supervisor_id == previous.supervisor_id {
        incoming.supervisor = previous.supervisor;
    }
    if incoming.created_at.is_none() {
        incoming.created_at = previous.created_at;
    }
    incoming
}

/// Shared handle to the store.
///
/// Mutations run under a short synchronous lock and never across an
/// `.await`, so each one is atomic with respect to every other task.
#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Arc<Mutex<BoardStore>>,
}

impl StoreHandle {
    pub fn new(store: BoardStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run a mutation. Store methods never panic mid-update, so a poisoned
    /// lock still guards a consistent store.
    pub fn update<R>(&self, f: impl FnOnce(&mut BoardStore) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn read<R>(&self, f: impl FnOnce(&BoardStore) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.read(|store| store.subscribe())
    }

    pub fn current_board_id(&self) -> Option<BoardId> {
        self.read(|store| store.current_board_id())
    }

    pub fn snapshot(&self) -> Option<Board> {
        self.read(|store| store.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_common::{Collaborators, Comment};

    fn card(id: CardId, list_id: ListId, position: u32) -> Card {
        Card::new(id, list_id, format!("card {id}"), position)
    }

    /// L1(pos 1) with A(1), B(2); L2(pos 2) empty.
    fn two_list_board() -> Board {
        Board::new(1, "Sprint").with_lists(vec![
            List::new(1, 1, "L1", 1).with_cards(vec![card(100, 1, 1), card(101, 1, 2)]),
            List::new(2, 1, "L2", 2).with_cards(vec![]),
        ])
    }

    fn loaded(board: Board) -> BoardStore {
        let mut store = BoardStore::new();
        store.load_board(board);
        store
    }

    fn card_ids(store: &BoardStore, list_id: ListId) -> Vec<CardId> {
        store.list(list_id).unwrap().cards().iter().map(|c| c.id).collect()
    }

    fn occurrences(store: &BoardStore, card_id: CardId) -> usize {
        store
            .current()
            .unwrap()
            .lists()
            .iter()
            .filter(|l| l.card(card_id).is_some())
            .count()
    }

    #[test]
    fn test_load_board_sorts_and_fills_missing_cards() {
        let board = Board::new(1, "b").with_lists(vec![
            List::new(2, 1, "second", 2),
            List::new(1, 1, "first", 1).with_cards(vec![card(11, 1, 2), card(10, 1, 1)]),
        ]);
        let store = loaded(board);
        let lists = store.current().unwrap().lists();
        assert_eq!(lists[0].id, 1);
        assert_eq!(lists[1].id, 2);
        assert_eq!(lists[1].cards, Some(vec![]));
        assert_eq!(card_ids(&store, 1), vec![10, 11]);
        assert!(store.is_settled());
    }

    #[test]
    fn test_load_board_without_lists_field() {
        let store = loaded(Board::new(3, "empty"));
        assert_eq!(store.current().unwrap().lists, Some(vec![]));
    }

    #[test]
    fn test_list_upsert_is_idempotent() {
        let mut store = loaded(two_list_board());
        let incoming = List::new(3, 1, "L3", 1);
        store.apply_list_upsert(incoming.clone());
        let once = store.snapshot();
        store.apply_list_upsert(incoming);
        assert_eq!(store.snapshot(), once);
        let order: Vec<ListId> = store.current().unwrap().lists().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert!(store.is_settled());
    }

    #[test]
    fn test_list_upsert_preserves_cards_when_field_missing() {
        let mut store = loaded(two_list_board());
        store.apply_list_upsert(List::new(1, 1, "Renamed", 1));
        let list = store.list(1).unwrap();
        assert_eq!(list.name, "Renamed");
        assert_eq!(list.cards().len(), 2);
    }

    #[test]
    fn test_list_upsert_for_other_board_is_ignored() {
        let mut store = loaded(two_list_board());
        store.apply_list_upsert(List::new(9, 77, "foreign", 1));
        assert!(store.list(9).is_none());
    }

    #[test]
    fn test_list_upsert_repositions() {
        let mut store = loaded(two_list_board());
        store.apply_list_upsert(List::new(2, 1, "L2", 1));
        let order: Vec<ListId> = store.current().unwrap().lists().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(store.list(1).unwrap().position, 2);
    }

    #[test]
    fn test_remove_list_drops_its_cards() {
        let mut board = two_list_board();
        board.lists_mut()[0].cards_mut().push(card(102, 1, 3));
        let mut store = loaded(board);

        store.remove_list(1);
        store.remove_list(1);

        assert!(store.list(1).is_none());
        for id in [100, 101, 102] {
            assert!(store.card(id).is_none());
        }
        assert_eq!(store.list(2).unwrap().position, 1);
    }

    #[test]
    fn test_card_upsert_moves_between_lists() {
        let mut store = loaded(two_list_board());
        store.apply_card_upsert(card(100, 2, 1));

        assert_eq!(card_ids(&store, 1), vec![101]);
        assert_eq!(store.card(101).unwrap().position, 1);
        assert_eq!(card_ids(&store, 2), vec![100]);
        assert_eq!(store.card(100).unwrap().position, 1);
        assert_eq!(occurrences(&store, 100), 1);
        assert!(store.is_settled());
    }

    #[test]
    fn test_card_upsert_is_idempotent() {
        let mut store = loaded(two_list_board());
        let incoming = card(100, 2, 1);
        store.apply_card_upsert(incoming.clone());
        let once = store.snapshot();
        store.apply_card_upsert(incoming);
        assert_eq!(store.snapshot(), once);
    }

    #[test]
    fn test_card_upsert_for_unknown_list_is_dropped() {
        let mut store = loaded(two_list_board());
        let before = store.snapshot();
        store.apply_card_upsert(card(200, 99, 1));
        assert_eq!(store.snapshot(), before);

        store.apply_list_upsert(List::new(99, 1, "late", 3));
        store.apply_card_upsert(card(200, 99, 1));
        assert_eq!(card_ids(&store, 99), vec![200]);
    }

    #[test]
    fn test_card_upsert_for_unknown_list_keeps_existing_card() {
        let mut store = loaded(two_list_board());
        store.apply_card_upsert(card(100, 99, 1));
        assert_eq!(occurrences(&store, 100), 1);
        assert_eq!(card_ids(&store, 1), vec![100, 101]);
    }

    #[test]
    fn test_card_upsert_keeps_fields_payload_omits() {
        let mut store = loaded(two_list_board());
        store.set_card_collaborators(100, vec![User::with_id(5, "lee")]);
        store.append_comment(
            100,
            Comment {
                id: 1,
                card_id: 100,
                user_id: 5,
                user: None,
                content: "first".into(),
                created_at: None,
            },
        );

        let mut update = card(100, 1, 1);
        update.title = "retitled".into();
        store.apply_card_upsert(update);

        let merged = store.card(100).unwrap();
        assert_eq!(merged.title, "retitled");
        assert_eq!(merged.comments().len(), 1);
        assert!(merged.collaborators.contains(5));
    }

    #[test]
    fn test_same_list_reorder_via_upsert() {
        let mut store = loaded(two_list_board());
        store.apply_card_upsert(card(101, 1, 1));
        assert_eq!(card_ids(&store, 1), vec![101, 100]);
        assert!(store.is_settled());
    }

    #[test]
    fn test_remove_card_is_idempotent_and_renumbers() {
        let mut store = loaded(two_list_board());
        store.remove_card(100, 1);
        store.remove_card(100, 1);
        assert_eq!(card_ids(&store, 1), vec![101]);
        assert_eq!(store.card(101).unwrap().position, 1);
    }

    #[test]
    fn test_remove_card_finds_relocated_card() {
        let mut store = loaded(two_list_board());
        store.apply_card_upsert(card(100, 2, 1));
        store.remove_card(100, 1);
        assert!(store.card(100).is_none());
    }

    #[test]
    fn test_comments_idempotent_by_id() {
        let mut store = loaded(two_list_board());
        let comment = Comment {
            id: 9,
            card_id: 100,
            user_id: 1,
            user: None,
            content: "hi".into(),
            created_at: None,
        };
        store.append_comment(100, comment.clone());
        store.append_comment(100, comment);
        assert_eq!(store.card(100).unwrap().comments().len(), 1);

        store.remove_comment(100, 9);
        store.remove_comment(100, 9);
        assert!(store.card(100).unwrap().comments().is_empty());
    }

    #[test]
    fn test_collaborators_tri_state() {
        let mut store = loaded(two_list_board());
        store.add_card_collaborator(100, User::with_id(1, "a"));
        assert!(store.card(100).unwrap().collaborators.is_unfetched());

        store.set_card_collaborators(100, vec![]);
        assert_eq!(store.card(100).unwrap().collaborators, Collaborators::Known(vec![]));

        store.add_card_collaborator(100, User::with_id(1, "a"));
        store.add_card_collaborator(100, User::with_id(1, "a"));
        assert_eq!(store.card(100).unwrap().collaborators.users().unwrap().len(), 1);

        store.remove_card_collaborator(100, 1);
        assert_eq!(store.card(100).unwrap().collaborators, Collaborators::Known(vec![]));
    }

    #[test]
    fn test_mutations_without_board_are_noops() {
        let mut store = BoardStore::new();
        store.apply_list_upsert(List::new(1, 1, "x", 1));
        store.apply_card_upsert(card(1, 1, 1));
        store.remove_card(1, 1);
        store.remove_list(1);
        store.remove_comment(1, 1);
        store.add_card_collaborator(1, User::with_id(1, "a"));
        assert!(store.current().is_none());
    }

    #[test]
    fn test_board_update_merges_header_and_directory() {
        let mut store = loaded(two_list_board());
        store.set_user_boards(vec![Board::new(1, "Sprint"), Board::new(2, "Other")]);

        let mut patch = Board::new(1, "Sprint 2");
        patch.description = "next".into();
        store.apply_board_update(&patch);

        assert_eq!(store.current().unwrap().name, "Sprint 2");
        assert_eq!(store.current().unwrap().lists().len(), 2);
        assert_eq!(store.user_boards()[0].name, "Sprint 2");
    }

    #[test]
    fn test_evict_board_only_when_resident() {
        let mut store = loaded(two_list_board());
        store.set_user_boards(vec![Board::new(1, "Sprint"), Board::new(2, "Other")]);
        assert!(!store.evict_board(2));
        assert!(store.current().is_some());
        assert_eq!(store.user_boards().len(), 1);

        assert!(store.evict_board(1));
        assert!(store.current().is_none());
        assert!(store.user_boards().is_empty());
    }

    #[test]
    fn test_restore_snapshot() {
        let mut store = loaded(two_list_board());
        let snapshot = store.snapshot().unwrap();
        store.apply_card_upsert(card(100, 2, 1));
        store.restore(snapshot.clone());
        assert_eq!(store.snapshot(), Some(snapshot));
    }

    #[test]
    fn test_restore_after_eviction() {
        let mut store = loaded(two_list_board());
        let snapshot = store.snapshot().unwrap();
        store.evict_board(1);
        store.restore(snapshot);
        assert_eq!(store.current_board_id(), Some(1));
        assert_eq!(card_ids(&store, 1), vec![100, 101]);
    }

    #[test]
    fn test_board_header_from_directory() {
        let mut store = BoardStore::new();
        let mut entry = Board::new(4, "Ops");
        entry.description = "on call".into();
        store.set_user_boards(vec![entry]);
        let header = store.board_header(4).unwrap();
        assert_eq!(header.description, "on call");
        assert!(header.lists.is_none());
        assert!(store.board_header(5).is_none());
    }

    #[test]
    fn test_restore_ignores_other_board() {
        let mut store = loaded(two_list_board());
        store.restore(Board::new(5, "elsewhere"));
        assert_eq!(store.current_board_id(), Some(1));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let handle = StoreHandle::default();
        let mut rx = handle.subscribe();
        handle.update(|s| s.load_board(two_list_board()));
        handle.update(|s| s.remove_card(100, 1));

        assert_eq!(rx.recv().await.unwrap(), StoreChange::BoardLoaded { board_id: 1 });
        assert_eq!(rx.recv().await.unwrap(), StoreChange::CardRemoved { card_id: 100 });
    }
}
