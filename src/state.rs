use std::sync::Arc;

use axum::extract::FromRef;

use crate::chat;
use crate::chat::service::ChatServiceImpl;
use crate::integration::db;
use crate::message::repository::PgMessageRepository;
use crate::thread::repository::PgThreadRepository;
use crate::user::repository::PgUserRepository;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub chat_service: chat::Service,
}

impl AppState {
    pub fn init(config: &db::Config) -> Self {
        let pool = config.connect();

        let user_repo = Arc::new(PgUserRepository::new(pool.clone()));
        let thread_repo = Arc::new(PgThreadRepository::new(pool.clone()));
        let message_repo = Arc::new(PgMessageRepository::new(pool));

        Self {
            chat_service: Arc::new(ChatServiceImpl::new(user_repo, thread_repo, message_repo)),
        }
    }
}
