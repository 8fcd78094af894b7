//! Per-category operation status, surfaced to the UI as a banner.

use serde::Serialize;

/// The three operation categories the board view reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpCategory {
    /// The dashboard's board directory.
    UserBoards,
    /// Loading or replacing the resident board.
    CurrentBoard,
    /// Any list, card, comment or collaborator command.
    ListCard,
}

impl OpCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserBoards => "user_boards",
            Self::CurrentBoard => "current_board",
            Self::ListCard => "list_card",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum OpStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed(String),
}

impl OpStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationStatuses {
    pub user_boards: OpStatus,
    pub current_board: OpStatus,
    pub list_card: OpStatus,
}

impl OperationStatuses {
    pub fn get(&self, category: OpCategory) -> &OpStatus {
        match category {
            OpCategory::UserBoards => &self.user_boards,
            OpCategory::CurrentBoard => &self.current_board,
            OpCategory::ListCard => &self.list_card,
        }
    }

    pub fn set(&mut self, category: OpCategory, status: OpStatus) {
        match category {
            OpCategory::UserBoards => self.user_boards = status,
            OpCategory::CurrentBoard => self.current_board = status,
            OpCategory::ListCard => self.list_card = status,
        }
    }
}
