use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type BoardId = u64;
pub type ListId = u64;
pub type CardId = u64;
pub type CommentId = u64;
pub type UserId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// A user known only by id, as carried by collaborator events.
    pub fn with_id(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: String::new(),
            created_at: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardStatus {
    #[default]
    ToDo,
    Pending,
    Done,
    /// No longer produced by the backend; still accepted so older cards load.
    Undone,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToDo => "TO_DO",
            Self::Pending => "PENDING",
            Self::Done => "DONE",
            Self::Undone => "UNDONE",
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Undone)
    }
}

impl FromStr for CardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TO_DO" => Ok(Self::ToDo),
            "PENDING" => Ok(Self::Pending),
            "DONE" => Ok(Self::Done),
            "UNDONE" => Ok(Self::Undone),
            _ => Err(format!("Invalid card status: {}", s)),
        }
    }
}

impl std::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators of a card.
///
/// Cards arrive without their collaborator set unless it was fetched
/// explicitly, so "not fetched yet" and "fetched, nobody" are different
/// states. On the wire an absent or `null` field is `Unfetched`; any array,
/// including `[]`, is `Known`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Option<Vec<User>>", into = "Option<Vec<User>>")]
pub enum Collaborators {
    #[default]
    Unfetched,
    Known(Vec<User>),
}

impl Collaborators {
    pub fn is_unfetched(&self) -> bool {
        matches!(self, Self::Unfetched)
    }

    pub fn users(&self) -> Option<&[User]> {
        match self {
            Self::Unfetched => None,
            Self::Known(users) => Some(users),
        }
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.users()
            .is_some_and(|users| users.iter().any(|u| u.id == user_id))
    }

    /// Add a user to a known set. Returns true if the set changed.
    ///
    /// An unfetched set stays unfetched: a single known member is not the
    /// full membership.
    pub fn insert(&mut self, user: User) -> bool {
        match self {
            Self::Unfetched => false,
            Self::Known(users) => {
                if users.iter().any(|u| u.id == user.id) {
                    false
                } else {
                    users.push(user);
                    true
                }
            }
        }
    }

    /// Remove a user from a known set. Returns true if the set changed.
    pub fn remove(&mut self, user_id: UserId) -> bool {
        match self {
            Self::Unfetched => false,
            Self::Known(users) => {
                let before = users.len();
                users.retain(|u| u.id != user_id);
                users.len() != before
            }
        }
    }
}

impl From<Option<Vec<User>>> for Collaborators {
    fn from(value: Option<Vec<User>>) -> Self {
        match value {
            Some(users) => Self::Known(users),
            None => Self::Unfetched,
        }
    }
}

impl From<Collaborators> for Option<Vec<User>> {
    fn from(value: Collaborators) -> Self {
        match value {
            Collaborators::Unfetched => None,
            Collaborators::Known(users) => Some(users),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    #[serde(rename = "cardID", alias = "cardId", default)]
    pub card_id: CardId,
    #[serde(rename = "userID", alias = "userId", default)]
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(alias = "text")]
    pub content: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    #[serde(rename = "listID", alias = "listId")]
    pub list_id: ListId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 1-based, dense within the parent list once settled.
    #[serde(default)]
    pub position: u32,
    #[serde(rename = "dueDate", default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: CardStatus,
    #[serde(rename = "assignedUserID", default, skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<UserId>,
    #[serde(rename = "assignedUser", default, skip_serializing_if = "Option::is_none")]
    pub assigned_user: Option<User>,
    #[serde(rename = "supervisorID", default, skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// `None` when the payload did not include comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
    #[serde(default, skip_serializing_if = "Collaborators::is_unfetched")]
    pub collaborators: Collaborators,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Card {
    /// A bare card with defaults for everything but identity, placement and title.
    pub fn new(id: CardId, list_id: ListId, title: impl Into<String>, position: u32) -> Self {
        Self {
            id,
            list_id,
            title: title.into(),
            description: None,
            position,
            due_date: None,
            status: CardStatus::default(),
            assigned_user_id: None,
            assigned_user: None,
            supervisor_id: None,
            supervisor: None,
            color: None,
            comments: None,
            collaborators: Collaborators::Unfetched,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn comments(&self) -> &[Comment] {
        self.comments.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct List {
    pub id: ListId,
    #[serde(rename = "boardID", alias = "boardId", default)]
    pub board_id: BoardId,
    pub name: String,
    /// 1-based, dense within the parent board once settled.
    #[serde(default)]
    pub position: u32,
    /// `None` when the payload did not include cards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl List {
    pub fn new(id: ListId, board_id: BoardId, name: impl Into<String>, position: u32) -> Self {
        Self {
            id,
            board_id,
            name: name.into(),
            position,
            cards: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_cards(mut self, cards: Vec<Card>) -> Self {
        self.cards = Some(cards);
        self
    }

    pub fn cards(&self) -> &[Card] {
        self.cards.as_deref().unwrap_or(&[])
    }

    pub fn cards_mut(&mut self) -> &mut Vec<Card> {
        self.cards.get_or_insert_with(Vec::new)
    }

    pub fn card(&self, card_id: CardId) -> Option<&Card> {
        self.cards().iter().find(|c| c.id == card_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoardMember {
    #[serde(rename = "boardID", alias = "boardId")]
    pub board_id: BoardId,
    #[serde(rename = "userID", alias = "userId")]
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "ownerID", default)]
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lists: Option<Vec<List>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<BoardMember>>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Board {
    pub fn new(id: BoardId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            owner_id: 0,
            owner: None,
            lists: None,
            members: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_lists(mut self, lists: Vec<List>) -> Self {
        self.lists = Some(lists);
        self
    }

    pub fn lists(&self) -> &[List] {
        self.lists.as_deref().unwrap_or(&[])
    }

    pub fn lists_mut(&mut self) -> &mut Vec<List> {
        self.lists.get_or_insert_with(Vec::new)
    }

    pub fn list(&self, list_id: ListId) -> Option<&List> {
        self.lists().iter().find(|l| l.id == list_id)
    }

    pub fn list_mut(&mut self, list_id: ListId) -> Option<&mut List> {
        self.lists_mut().iter_mut().find(|l| l.id == list_id)
    }

    /// Find a card anywhere on the board.
    pub fn card(&self, card_id: CardId) -> Option<&Card> {
        self.lists().iter().find_map(|l| l.card(card_id))
    }

    pub fn card_mut(&mut self, card_id: CardId) -> Option<&mut Card> {
        self.lists_mut()
            .iter_mut()
            .find_map(|l| l.cards_mut().iter_mut().find(|c| c.id == card_id))
    }

    /// The list currently holding `card_id`, if any.
    pub fn list_of_card(&self, card_id: CardId) -> Option<ListId> {
        self.lists()
            .iter()
            .find(|l| l.card(card_id).is_some())
            .map(|l| l.id)
    }

    /// Header fields only: name, description and ownership. Lists and
    /// members are left alone.
    pub fn merge_header(&mut self, other: &Board) {
        self.name = other.name.clone();
        self.description = other.description.clone();
        if other.owner_id != 0 {
            self.owner_id = other.owner_id;
        }
        if other.owner.as_ref().is_some_and(|o| o.id != 0) {
            self.owner = other.owner.clone();
        }
        if other.updated_at.is_some() {
            self.updated_at = other.updated_at;
        }
    }
}
