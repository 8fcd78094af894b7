//! Request bodies for the board REST surface.
//!
//! Update bodies are sparse: `None` fields are omitted and leave the server
//! value untouched. Nullable references use `Option<Option<_>>` so that
//! "clear the assignee" (`Some(None)`, sent as `null`) differs from "leave
//! it alone" (`None`, omitted).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{Board, Card, CardStatus, List, ListId, UserId};

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewBoard {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BoardUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BoardUpdate {
    pub fn apply(&self, board: &mut Board) {
        if let Some(name) = &self.name {
            board.name = name.clone();
        }
        if let Some(description) = &self.description {
            board.description = description.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewList {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl ListUpdate {
    pub fn position(position: u32) -> Self {
        Self {
            name: None,
            position: Some(position),
        }
    }

    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            position: None,
        }
    }

    /// The locally implied list after this update. Position is copied as-is;
    /// the store is responsible for re-densifying siblings.
    pub fn apply(&self, list: &mut List) {
        if let Some(name) = &self.name {
            list.name = name.clone();
        }
        if let Some(position) = self.position {
            list.position = position;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewCard {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(rename = "dueDate", default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(rename = "assignedUserID", default, skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<UserId>,
    #[serde(rename = "supervisorID", default, skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NewCard {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CardUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(rename = "dueDate", default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(
        rename = "assignedUserID",
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_user_id: Option<Option<UserId>>,
    #[serde(
        rename = "supervisorID",
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub supervisor_id: Option<Option<UserId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CardStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CardUpdate {
    pub fn position(position: u32) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Patch the fields this update carries onto `card`.
    pub fn apply(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(description) = &self.description {
            card.description = Some(description.clone());
        }
        if let Some(position) = self.position {
            card.position = position;
        }
        if let Some(due_date) = self.due_date {
            card.due_date = Some(due_date);
        }
        if let Some(assigned) = self.assigned_user_id {
            if card.assigned_user_id != assigned {
                card.assigned_user = None;
            }
            card.assigned_user_id = assigned;
        }
        if let Some(supervisor) = self.supervisor_id {
            if card.supervisor_id != supervisor {
                card.supervisor = None;
            }
            card.supervisor_id = supervisor;
        }
        if let Some(status) = self.status {
            card.status = status;
        }
        if let Some(color) = &self.color {
            card.color = Some(color.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveCardRequest {
    #[serde(rename = "targetListId", alias = "targetListID")]
    pub target_list_id: ListId,
    /// 1-based position in the target list.
    #[serde(rename = "newPosition")]
    pub new_position: u32,
}

/// Identify a collaborator either by email or by user id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CollaboratorRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl CollaboratorRequest {
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            user_id: None,
        }
    }

    pub fn by_user_id(user_id: UserId) -> Self {
        Self {
            email: None,
            user_id: Some(user_id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewComment {
    pub content: String,
}
