//! REST surface of the board backend.
//!
//! [`BoardBackend`] is the seam the command layer talks through; tests swap
//! in an in-memory fake. [`RestClient`] is the reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskboard_common::{
    Board, BoardId, BoardUpdate, Card, CardId, CardUpdate, CollaboratorRequest, Comment, CommentId,
    List, ListId, ListUpdate, MoveCardRequest, NewBoard, NewCard, NewComment, NewList, User, UserId,
};
use tracing::debug;

use crate::config::Credential;
use crate::errors::ClientError;

#[async_trait]
pub trait BoardBackend: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<Board>, ClientError>;
    async fn create_board(&self, board: &NewBoard) -> Result<Board, ClientError>;
    async fn get_board(&self, board_id: BoardId) -> Result<Board, ClientError>;
    async fn update_board(&self, board_id: BoardId, update: &BoardUpdate) -> Result<Board, ClientError>;
    async fn delete_board(&self, board_id: BoardId) -> Result<(), ClientError>;

    async fn create_list(&self, board_id: BoardId, list: &NewList) -> Result<List, ClientError>;
    async fn update_list(&self, list_id: ListId, update: &ListUpdate) -> Result<List, ClientError>;
    async fn delete_list(&self, list_id: ListId) -> Result<(), ClientError>;

    async fn create_card(&self, list_id: ListId, card: &NewCard) -> Result<Card, ClientError>;
    async fn update_card(&self, card_id: CardId, update: &CardUpdate) -> Result<Card, ClientError>;
    async fn delete_card(&self, card_id: CardId) -> Result<(), ClientError>;
    async fn move_card(&self, card_id: CardId, request: &MoveCardRequest) -> Result<Card, ClientError>;

    async fn list_collaborators(&self, card_id: CardId) -> Result<Vec<User>, ClientError>;
    async fn add_collaborator(
        &self,
        card_id: CardId,
        request: &CollaboratorRequest,
    ) -> Result<User, ClientError>;
    async fn remove_collaborator(&self, card_id: CardId, user_id: UserId) -> Result<(), ClientError>;

    async fn list_comments(&self, card_id: CardId) -> Result<Vec<Comment>, ClientError>;
    async fn add_comment(&self, card_id: CardId, comment: &NewComment) -> Result<Comment, ClientError>;
    async fn delete_comment(&self, card_id: CardId, comment_id: CommentId) -> Result<(), ClientError>;
}

/// reqwest-backed client for `{api_url}/api`.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: String,
    credential: Option<Credential>,
}

impl RestClient {
    pub fn new(
        api_url: &str,
        credential: Option<Credential>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        reqwest::Url::parse(api_url)
            .map_err(|e| ClientError::Config(format!("invalid API URL '{api_url}': {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: format!("{}/api", api_url.trim_end_matches('/')),
            credential,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base, path));
        match &self.credential {
            Some(credential) => builder.bearer_auth(credential.expose()),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        what: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = check(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        decode_body(what, &bytes)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        what: &'static str,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(what, self.request(method, path).json(body)).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ClientError> {
        check(self.request(method, path).send().await?).await?;
        Ok(())
    }
}

/// Turn a non-success response into `ClientError::Http`, using the server's
/// `message` when the body carries one.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    debug!(status = status.as_u16(), %message, "request failed");
    Err(ClientError::Http {
        status: status.as_u16(),
        message,
    })
}

/// Decode either a `{status, message, data}` envelope or a bare entity.
/// A `null` or missing `data` decodes as JSON `null`, which suits
/// `Option`-typed targets.
pub(crate) fn decode_body<T: DeserializeOwned>(what: &'static str, bytes: &[u8]) -> Result<T, ClientError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|source| ClientError::Decode { what, source })?;
    let inner = match value {
        Value::Object(mut map) if map.contains_key("status") && !map.contains_key("id") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(inner).map_err(|source| ClientError::Decode { what, source })
}

#[async_trait]
impl BoardBackend for RestClient {
    async fn list_boards(&self) -> Result<Vec<Board>, ClientError> {
        let boards: Option<Vec<Board>> = self.send("boards", self.request(Method::GET, "/boards")).await?;
        Ok(boards.unwrap_or_default())
    }

    async fn create_board(&self, board: &NewBoard) -> Result<Board, ClientError> {
        self.send_json("board", Method::POST, "/boards", board).await
    }

    async fn get_board(&self, board_id: BoardId) -> Result<Board, ClientError> {
        self.send("board", self.request(Method::GET, &format!("/boards/{board_id}")))
            .await
    }

    async fn update_board(&self, board_id: BoardId, update: &BoardUpdate) -> Result<Board, ClientError> {
        self.send_json("board", Method::PUT, &format!("/boards/{board_id}"), update)
            .await
    }

    async fn delete_board(&self, board_id: BoardId) -> Result<(), ClientError> {
        self.send_empty(Method::DELETE, &format!("/boards/{board_id}")).await
    }

    async fn create_list(&self, board_id: BoardId, list: &NewList) -> Result<List, ClientError> {
        self.send_json("list", Method::POST, &format!("/boards/{board_id}/lists"), list)
            .await
    }

    async fn update_list(&self, list_id: ListId, update: &ListUpdate) -> Result<List, ClientError> {
        self.send_json("list", Method::PUT, &format!("/lists/{list_id}"), update)
            .await
    }

    async fn delete_list(&self, list_id: ListId) -> Result<(), ClientError> {
        self.send_empty(Method::DELETE, &format!("/lists/{list_id}")).await
    }

    async fn create_card(&self, list_id: ListId, card: &NewCard) -> Result<Card, ClientError> {
        self.send_json("card", Method::POST, &format!("/lists/{list_id}/cards"), card)
            .await
    }

    async fn update_card(&self, card_id: CardId, update: &CardUpdate) -> Result<Card, ClientError> {
        self.send_json("card", Method::PUT, &format!("/cards/{card_id}"), update)
            .await
    }

    async fn delete_card(&self, card_id: CardId) -> Result<(), ClientError> {
        self.send_empty(Method::DELETE, &format!("/cards/{card_id}")).await
    }

    async fn move_card(&self, card_id: CardId, request: &MoveCardRequest) -> Result<Card, ClientError> {
        self.send_json("card", Method::PATCH, &format!("/cards/{card_id}/move"), request)
            .await
    }

    async fn list_collaborators(&self, card_id: CardId) -> Result<Vec<User>, ClientError> {
        let users: Option<Vec<User>> = self
            .send(
                "collaborators",
                self.request(Method::GET, &format!("/cards/{card_id}/collaborators")),
            )
            .await?;
        Ok(users.unwrap_or_default())
    }

    async fn add_collaborator(
        &self,
        card_id: CardId,
        request: &CollaboratorRequest,
    ) -> Result<User, ClientError> {
        self.send_json(
            "collaborator",
            Method::POST,
            &format!("/cards/{card_id}/collaborators"),
            request,
        )
        .await
    }

    async fn remove_collaborator(&self, card_id: CardId, user_id: UserId) -> Result<(), ClientError> {
        self.send_empty(
            Method::DELETE,
            &format!("/cards/{card_id}/collaborators/{user_id}"),
        )
        .await
    }

    async fn list_comments(&self, card_id: CardId) -> Result<Vec<Comment>, ClientError> {
        let comments: Option<Vec<Comment>> = self
            .send(
                "comments",
                self.request(Method::GET, &format!("/cards/{card_id}/comments")),
            )
            .await?;
        Ok(comments.unwrap_or_default())
    }

    async fn add_comment(&self, card_id: CardId, comment: &NewComment) -> Result<Comment, ClientError> {
        self.send_json(
            "comment",
            Method::POST,
            &format!("/cards/{card_id}/comments"),
            comment,
        )
        .await
    }

    async fn delete_comment(&self, card_id: CardId, comment_id: CommentId) -> Result<(), ClientError> {
        self.send_empty(
            Method::DELETE,
            &format!("/cards/{card_id}/comments/{comment_id}"),
        )
        .await
    }
}
