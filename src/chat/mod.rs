use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use service::ChatService;

use crate::state::AppState;
use crate::{message, thread, user};

pub mod handler;
pub mod model;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn ChatService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route(
            "/threads",
            post(handler::api::start_thread).get(handler::api::find_threads),
        )
        .route("/threads/{id}", delete(handler::api::delete_thread))
        .route(
            "/threads/{id}/messages",
            post(handler::api::post_message).get(handler::api::find_messages),
        )
        .route(
            "/threads/{id}/messages/unread_count",
            get(handler::api::unread_count),
        )
        .route(
            "/threads/{id}/messages/{message_id}",
            patch(handler::api::update_message),
        )
        .with_state(s)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot start a thread with yourself")]
    SelfThread,

    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _Thread(#[from] thread::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
}
