//! Shared board types for the taskboard client.
//!
//! These mirror the JSON the board backend sends and accepts. They carry no
//! I/O and no merge policy; reconciliation lives in the `taskboard` crate.

pub mod models;
pub mod requests;

pub use models::{
    Board, BoardId, BoardMember, Card, CardId, CardStatus, Collaborators, Comment, CommentId,
    List, ListId, User, UserId,
};
pub use requests::{
    BoardUpdate, CardUpdate, CollaboratorRequest, ListUpdate, MoveCardRequest, NewBoard, NewCard,
    NewComment, NewList,
};
