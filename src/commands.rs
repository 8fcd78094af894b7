//! Command layer: user actions against the resident board.
//!
//! Commands that edit, move or delete run in two phases:
//!
//! 1. **Optimistic** (synchronous): the locally implied state is applied to
//!    the store at once, after a snapshot of the resident board is taken.
//! 2. **Confirmation** (async): the backend request is sent; a success
//!    response is merged through the store's upserts, which may correct the
//!    optimistic guess.
//!
//! Commands that create (lists, cards, comments, collaborators) have no
//! optimistic phase. The server assigns the id, and a local placeholder
//! would be a second copy of the entity once the confirmation or the echoed
//! event arrives.
//!
//! Failure is never rolled back automatically. The per-category status is
//! set to `Failed` with the server's message and the caller receives a
//! [`CommandFailure`] carrying the pre-mutation snapshot, which it may hand
//! to [`BoardCommands::rollback`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use taskboard_common::{
    Board, BoardId, BoardUpdate, Card, CardId, CardUpdate, CollaboratorRequest, Comment,
    CommentId, List, ListId, ListUpdate, MoveCardRequest, NewBoard, NewCard, NewComment, NewList,
    User, UserId,
};
use thiserror::Error;
use tracing::{Instrument, info, warn};

use crate::backend::BoardBackend;
use crate::errors::ClientError;
use crate::logging::command_span;
use crate::planner::{PlannedCommand, ReorderPlan};
use crate::store::{BoardStore, OpCategory, OpStatus, StoreHandle, clamp_position};
use crate::supervisor::BoardResync;

/// A command that did not confirm.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CommandFailure {
    pub category: OpCategory,
    pub error: ClientError,
    /// The resident board as it was before the optimistic phase. `None` for
    /// commands without one.
    pub snapshot: Option<Board>,
    /// The board directory as it was, for commands that edit it
    /// optimistically.
    pub directory: Option<Vec<Board>>,
}

pub type CommandResult<T> = Result<T, CommandFailure>;

#[derive(Clone)]
pub struct BoardCommands {
    store: StoreHandle,
    backend: Arc<dyn BoardBackend>,
}

impl BoardCommands {
    pub fn new(store: StoreHandle, backend: Arc<dyn BoardBackend>) -> Self {
        Self { store, backend }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Put back the board a failed command started from.
    pub fn rollback(&self, failure: &CommandFailure) {
        self.store.update(|s| {
            if let Some(snapshot) = &failure.snapshot {
                s.restore(snapshot.clone());
            }
            if let Some(directory) = &failure.directory {
                s.set_user_boards(directory.clone());
            }
        });
    }

    // ── Phase helpers ───────────────────────────────────────────────────

    /// Mark the category loading, snapshot the resident board, then apply
    /// the optimistic change. All under one lock.
    fn begin(&self, category: OpCategory, optimistic: impl FnOnce(&mut BoardStore)) -> Option<Board> {
        self.store.update(|store| {
            store.set_status(category, OpStatus::Loading);
            let snapshot = store.snapshot();
            optimistic(store);
            snapshot
        })
    }

    /// Like [`Self::begin`], also capturing the board directory.
    fn begin_with_directory(
        &self,
        category: OpCategory,
        optimistic: impl FnOnce(&mut BoardStore),
    ) -> (Option<Board>, Vec<Board>) {
        self.store.update(|store| {
            store.set_status(category, OpStatus::Loading);
            let snapshot = (store.snapshot(), store.user_boards().to_vec());
            optimistic(store);
            snapshot
        })
    }

    fn begin_confirmed_only(&self, category: OpCategory) {
        self.store
            .update(|store| store.set_status(category, OpStatus::Loading));
    }

    fn succeed(&self, category: OpCategory, merge: impl FnOnce(&mut BoardStore)) {
        self.store.update(|store| {
            merge(store);
            store.set_status(category, OpStatus::Succeeded);
        });
    }

    fn fail(&self, category: OpCategory, error: ClientError, snapshot: Option<Board>) -> CommandFailure {
        warn!(category = category.as_str(), error = %error, "command failed");
        let message = error.user_message();
        self.store
            .update(|store| store.set_status(category, OpStatus::Failed(message)));
        CommandFailure {
            category,
            error,
            snapshot,
            directory: None,
        }
    }

    /// A precondition failed before anything was sent.
    fn reject<T>(&self, category: OpCategory, error: ClientError) -> CommandResult<T> {
        Err(self.fail(category, error, None))
    }

    fn resident_board(&self) -> Result<BoardId, ClientError> {
        self.store
            .current_board_id()
            .ok_or(ClientError::NoResidentBoard)
    }

    fn resident_card(&self, card_id: CardId) -> Result<Card, ClientError> {
        self.store
            .read(|s| s.card(card_id).cloned())
            .ok_or(ClientError::CardNotFound { id: card_id })
    }

    fn resident_list(&self, list_id: ListId) -> Result<List, ClientError> {
        self.store
            .read(|s| {
                s.list(list_id).map(|l| List {
                    cards: None,
                    ..l.clone()
                })
            })
            .ok_or(ClientError::ListNotFound { id: list_id })
    }

    // ── Board directory ─────────────────────────────────────────────────

    pub async fn fetch_user_boards(&self) -> CommandResult<Vec<Board>> {
        const CATEGORY: OpCategory = OpCategory::UserBoards;
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.list_boards().await {
                Ok(boards) => {
                    self.succeed(CATEGORY, |s| s.set_user_boards(boards.clone()));
                    Ok(boards)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("fetch_user_boards", None))
        .await
    }

    pub async fn create_board(&self, board: NewBoard) -> CommandResult<Board> {
        const CATEGORY: OpCategory = OpCategory::UserBoards;
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.create_board(&board).await {
                Ok(created) => {
                    info!(board_id = created.id, "board created");
                    self.succeed(CATEGORY, |s| s.upsert_user_board(created.clone()));
                    Ok(created)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("create_board", None))
        .await
    }

    /// Patches the resident board and its directory entry optimistically.
    pub async fn update_board(&self, board_id: BoardId, update: BoardUpdate) -> CommandResult<Board> {
        const CATEGORY: OpCategory = OpCategory::UserBoards;
        async {
            let (snapshot, directory) = self.begin_with_directory(CATEGORY, |s| {
                if let Some(mut header) = s.board_header(board_id) {
                    update.apply(&mut header);
                    s.apply_board_update(&header);
                }
            });
            match self.backend.update_board(board_id, &update).await {
                Ok(board) => {
                    self.succeed(CATEGORY, |s| s.apply_board_update(&board));
                    Ok(board)
                }
                Err(e) => Err(CommandFailure {
                    directory: Some(directory),
                    ..self.fail(CATEGORY, e, snapshot)
                }),
            }
        }
        .instrument(command_span("update_board", Some(board_id)))
        .await
    }

    /// Evicts the board from the directory and, if resident, from the view.
    pub async fn delete_board(&self, board_id: BoardId) -> CommandResult<()> {
        const CATEGORY: OpCategory = OpCategory::UserBoards;
        async {
            let (snapshot, directory) = self.begin_with_directory(CATEGORY, |s| {
                s.evict_board(board_id);
            });
            match self.backend.delete_board(board_id).await {
                Ok(()) => {
                    self.succeed(CATEGORY, |_| {});
                    Ok(())
                }
                Err(e) => Err(CommandFailure {
                    directory: Some(directory),
                    ..self.fail(CATEGORY, e, snapshot.filter(|b| b.id == board_id))
                }),
            }
        }
        .instrument(command_span("delete_board", Some(board_id)))
        .await
    }

    /// Load a board and make it resident.
    pub async fn fetch_board_details(&self, board_id: BoardId) -> CommandResult<Board> {
        const CATEGORY: OpCategory = OpCategory::CurrentBoard;
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.get_board(board_id).await {
                Ok(board) => {
                    let fetched = board.clone();
                    self.succeed(CATEGORY, |s| s.load_board(board));
                    Ok(self.store.snapshot().unwrap_or(fetched))
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("fetch_board_details", Some(board_id)))
        .await
    }

    // ── Lists ───────────────────────────────────────────────────────────

    /// Appends a list to the resident board.
    pub async fn create_list(&self, name: impl Into<String>) -> CommandResult<List> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        let board_id = match self.resident_board() {
            Ok(id) => id,
            Err(e) => return self.reject(CATEGORY, e),
        };
        let position = self.store.read(|s| {
            clamp_position(0, s.current().map_or(0, |b| b.lists().len()))
        });
        let request = NewList {
            name: name.into(),
            position: Some(position),
        };
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.create_list(board_id, &request).await {
                Ok(list) => {
                    self.succeed(CATEGORY, |s| s.apply_list_upsert(list.clone()));
                    Ok(list)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("create_list", Some(board_id)))
        .await
    }

    pub async fn update_list(&self, list_id: ListId, update: ListUpdate) -> CommandResult<List> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        let mut list = match self.resident_list(list_id) {
            Ok(list) => list,
            Err(e) => return self.reject(CATEGORY, e),
        };
        async {
            update.apply(&mut list);
            let snapshot = self.begin(CATEGORY, |s| s.apply_list_upsert(list));
            match self.backend.update_list(list_id, &update).await {
                Ok(confirmed) => {
                    self.succeed(CATEGORY, |s| s.apply_list_upsert(confirmed.clone()));
                    Ok(confirmed)
                }
                Err(e) => Err(self.fail(CATEGORY, e, snapshot)),
            }
        }
        .instrument(command_span("update_list", self.store.current_board_id()))
        .await
    }

    /// Removes the list and its cards.
    pub async fn delete_list(&self, list_id: ListId) -> CommandResult<()> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        async {
            let snapshot = self.begin(CATEGORY, |s| s.remove_list(list_id));
            match self.backend.delete_list(list_id).await {
                Ok(()) => {
                    self.succeed(CATEGORY, |_| {});
                    Ok(())
                }
                Err(e) => Err(self.fail(CATEGORY, e, snapshot)),
            }
        }
        .instrument(command_span("delete_list", self.store.current_board_id()))
        .await
    }

    // ── Cards ───────────────────────────────────────────────────────────

    pub async fn create_card(&self, list_id: ListId, card: NewCard) -> CommandResult<Card> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        if let Err(e) = self.resident_list(list_id) {
            return self.reject(CATEGORY, e);
        }
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.create_card(list_id, &card).await {
                Ok(mut created) => {
                    if created.list_id == 0 {
                        created.list_id = list_id;
                    }
                    self.succeed(CATEGORY, |s| s.apply_card_upsert(created.clone()));
                    Ok(created)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("create_card", self.store.current_board_id()))
        .await
    }

    pub async fn update_card(&self, card_id: CardId, update: CardUpdate) -> CommandResult<Card> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        let mut card = match self.resident_card(card_id) {
            Ok(card) => card,
            Err(e) => return self.reject(CATEGORY, e),
        };
        async {
            update.apply(&mut card);
            let snapshot = self.begin(CATEGORY, |s| s.apply_card_upsert(card));
            match self.backend.update_card(card_id, &update).await {
                Ok(confirmed) => {
                    self.succeed(CATEGORY, |s| s.apply_card_upsert(confirmed.clone()));
                    Ok(confirmed)
                }
                Err(e) => Err(self.fail(CATEGORY, e, snapshot)),
            }
        }
        .instrument(command_span("update_card", self.store.current_board_id()))
        .await
    }

    /// Reorder a card within its own list.
    pub async fn reorder_card(&self, card_id: CardId, position: u32) -> CommandResult<()> {
        let list_id = match self.resident_card(card_id) {
            Ok(card) => card.list_id,
            Err(e) => return self.reject(OpCategory::ListCard, e),
        };
        self.run_planned(
            "reorder_card",
            PlannedCommand::ReorderCard {
                card_id,
                list_id,
                position,
            },
        )
        .await
    }

    /// Move a card to another list at a 1-based position.
    pub async fn move_card(&self, card_id: CardId, to_list_id: ListId, position: u32) -> CommandResult<()> {
        let from_list_id = match self.resident_card(card_id) {
            Ok(card) => card.list_id,
            Err(e) => return self.reject(OpCategory::ListCard, e),
        };
        if let Err(e) = self.resident_list(to_list_id) {
            return self.reject(OpCategory::ListCard, e);
        }
        self.run_planned(
            "move_card",
            PlannedCommand::MoveCard {
                card_id,
                from_list_id,
                to_list_id,
                position,
            },
        )
        .await
    }

    pub async fn delete_card(&self, card_id: CardId) -> CommandResult<()> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        let list_id = match self.resident_card(card_id) {
            Ok(card) => card.list_id,
            Err(e) => return self.reject(CATEGORY, e),
        };
        async {
            let snapshot = self.begin(CATEGORY, |s| s.remove_card(card_id, list_id));
            match self.backend.delete_card(card_id).await {
                Ok(()) => {
                    self.succeed(CATEGORY, |_| {});
                    Ok(())
                }
                Err(e) => Err(self.fail(CATEGORY, e, snapshot)),
            }
        }
        .instrument(command_span("delete_card", self.store.current_board_id()))
        .await
    }

    // ── Collaborators ───────────────────────────────────────────────────

    /// Turns an unfetched collaborator set into a known one.
    pub async fn fetch_card_collaborators(&self, card_id: CardId) -> CommandResult<Vec<User>> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.list_collaborators(card_id).await {
                Ok(users) => {
                    self.succeed(CATEGORY, |s| s.set_card_collaborators(card_id, users.clone()));
                    Ok(users)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("fetch_card_collaborators", self.store.current_board_id()))
        .await
    }

    pub async fn add_card_collaborator(
        &self,
        card_id: CardId,
        request: CollaboratorRequest,
    ) -> CommandResult<User> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.add_collaborator(card_id, &request).await {
                Ok(user) => {
                    self.succeed(CATEGORY, |s| s.add_card_collaborator(card_id, user.clone()));
                    Ok(user)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("add_card_collaborator", self.store.current_board_id()))
        .await
    }

    pub async fn remove_card_collaborator(&self, card_id: CardId, user_id: UserId) -> CommandResult<()> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        async {
            let snapshot = self.begin(CATEGORY, |s| s.remove_card_collaborator(card_id, user_id));
            match self.backend.remove_collaborator(card_id, user_id).await {
                Ok(()) => {
                    self.succeed(CATEGORY, |_| {});
                    Ok(())
                }
                Err(e) => Err(self.fail(CATEGORY, e, snapshot)),
            }
        }
        .instrument(command_span("remove_card_collaborator", self.store.current_board_id()))
        .await
    }

    // ── Comments ────────────────────────────────────────────────────────

    pub async fn fetch_card_comments(&self, card_id: CardId) -> CommandResult<Vec<Comment>> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.list_comments(card_id).await {
                Ok(comments) => {
                    self.succeed(CATEGORY, |s| s.set_card_comments(card_id, comments.clone()));
                    Ok(comments)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("fetch_card_comments", self.store.current_board_id()))
        .await
    }

    pub async fn add_comment(&self, card_id: CardId, content: impl Into<String>) -> CommandResult<Comment> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        let request = NewComment {
            content: content.into(),
        };
        async {
            self.begin_confirmed_only(CATEGORY);
            match self.backend.add_comment(card_id, &request).await {
                Ok(comment) => {
                    self.succeed(CATEGORY, |s| s.append_comment(card_id, comment.clone()));
                    Ok(comment)
                }
                Err(e) => Err(self.fail(CATEGORY, e, None)),
            }
        }
        .instrument(command_span("add_comment", self.store.current_board_id()))
        .await
    }

    pub async fn delete_comment(&self, card_id: CardId, comment_id: CommentId) -> CommandResult<()> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        async {
            let snapshot = self.begin(CATEGORY, |s| s.remove_comment(card_id, comment_id));
            match self.backend.delete_comment(card_id, comment_id).await {
                Ok(()) => {
                    self.succeed(CATEGORY, |_| {});
                    Ok(())
                }
                Err(e) => Err(self.fail(CATEGORY, e, snapshot)),
            }
        }
        .instrument(command_span("delete_comment", self.store.current_board_id()))
        .await
    }

    // ── Drag plans ──────────────────────────────────────────────────────

    /// Apply every optimistic phase of a plan at once, then confirm all of
    /// its commands concurrently. The first failure is returned, carrying
    /// the board as it was before the whole plan.
    pub async fn apply_plan(&self, plan: &ReorderPlan) -> CommandResult<()> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        if plan.is_empty() {
            return Ok(());
        }
        async {
            let snapshot = self.begin(CATEGORY, |s| {
                for command in &plan.commands {
                    apply_optimistic(s, command);
                }
            });
            let results = join_all(plan.commands.iter().map(|c| self.confirm(c))).await;

            let mut merges = Vec::with_capacity(results.len());
            let mut first_error = None;
            for result in results {
                match result {
                    Ok(merge) => merges.push(merge),
                    Err(e) if first_error.is_none() => first_error = Some(e),
                    Err(e) => warn!(error = %e, "additional plan command failed"),
                }
            }
            match first_error {
                None => {
                    self.succeed(CATEGORY, |s| merges.into_iter().for_each(|m| m.apply(s)));
                    Ok(())
                }
                Some(e) => {
                    self.store
                        .update(|s| merges.into_iter().for_each(|m| m.apply(s)));
                    Err(self.fail(CATEGORY, e, snapshot))
                }
            }
        }
        .instrument(command_span("apply_plan", self.store.current_board_id()))
        .await
    }

    async fn run_planned(&self, name: &'static str, command: PlannedCommand) -> CommandResult<()> {
        const CATEGORY: OpCategory = OpCategory::ListCard;
        async {
            let snapshot = self.begin(CATEGORY, |s| apply_optimistic(s, &command));
            match self.confirm(&command).await {
                Ok(merge) => {
                    self.succeed(CATEGORY, |s| merge.apply(s));
                    Ok(())
                }
                Err(e) => Err(self.fail(CATEGORY, e, snapshot)),
            }
        }
        .instrument(command_span(name, self.store.current_board_id()))
        .await
    }

    async fn confirm(&self, command: &PlannedCommand) -> Result<Confirmed, ClientError> {
        match *command {
            PlannedCommand::UpdateListPosition { list_id, position } => self
                .backend
                .update_list(list_id, &ListUpdate::position(position))
                .await
                .map(Confirmed::List),
            PlannedCommand::ReorderCard {
                card_id, position, ..
            } => self
                .backend
                .update_card(card_id, &CardUpdate::position(position))
                .await
                .map(Confirmed::Card),
            PlannedCommand::MoveCard {
                card_id,
                to_list_id,
                position,
                ..
            } => self
                .backend
                .move_card(
                    card_id,
                    &MoveCardRequest {
                        target_list_id: to_list_id,
                        new_position: position,
                    },
                )
                .await
                .map(Confirmed::Card),
        }
    }
}

/// An authoritative entity returned by a confirmation.
enum Confirmed {
    List(List),
    Card(Card),
}

impl Confirmed {
    fn apply(self, store: &mut BoardStore) {
        match self {
            Self::List(list) => store.apply_list_upsert(list),
            Self::Card(card) => store.apply_card_upsert(card),
        }
    }
}

/// The locally implied state of one planned command.
fn apply_optimistic(store: &mut BoardStore, command: &PlannedCommand) {
    match *command {
        PlannedCommand::UpdateListPosition { list_id, position } => {
            if let Some(list) = store.list(list_id) {
                let moved = List {
                    cards: None,
                    position,
                    ..list.clone()
                };
                store.apply_list_upsert(moved);
            }
        }
        PlannedCommand::ReorderCard {
            card_id, position, ..
        } => {
            if let Some(mut card) = store.card(card_id).cloned() {
                card.position = position;
                store.apply_card_upsert(card);
            }
        }
        PlannedCommand::MoveCard {
            card_id,
            to_list_id,
            position,
            ..
        } => {
            if let Some(mut card) = store.card(card_id).cloned() {
                card.list_id = to_list_id;
                card.position = position;
                store.apply_card_upsert(card);
            }
        }
    }
}

#[async_trait]
impl BoardResync for BoardCommands {
    async fn resync(&self, board_id: BoardId) -> Result<(), ClientError> {
        self.fetch_board_details(board_id)
            .await
            .map(|_| ())
            .map_err(|failure| failure.error)
    }
}
