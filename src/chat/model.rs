use serde::Serialize;

use crate::message::model::Message;
use crate::thread::model::Thread;
use crate::user::model::User;
use crate::{message, thread, user};

#[derive(Clone, Debug, Serialize)]
pub struct ParticipantDto {
    id: user::Id,
    username: String,
}

impl ParticipantDto {
    pub const fn id(&self) -> &user::Id {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl From<User> for ParticipantDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id().to_owned(),
            username: u.username().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ThreadDto {
    id: thread::Id,
    participants: Vec<ParticipantDto>,
    created: i64,
    updated: i64,
}

impl ThreadDto {
    pub fn new(thread: &Thread, participants: Vec<ParticipantDto>) -> Self {
        Self {
            id: thread.id().to_owned(),
            participants,
            created: thread.created_at().and_utc().timestamp(),
            updated: thread.updated_at().and_utc().timestamp(),
        }
    }

    pub const fn id(&self) -> &thread::Id {
        &self.id
    }

    pub fn participants(&self) -> &[ParticipantDto] {
        &self.participants
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MessageDto {
    id: message::Id,
    thread_id: thread::Id,
    sender: ParticipantDto,
    text: String,
    created: i64,
    is_read: bool,
}

impl MessageDto {
    pub fn new(message: &Message, sender: ParticipantDto) -> Self {
        Self {
            id: message.id().to_owned(),
            thread_id: message.thread_id().to_owned(),
            sender,
            text: message.text().to_string(),
            created: message.created_at().and_utc().timestamp(),
            is_read: message.is_read(),
        }
    }

    pub const fn id(&self) -> &message::Id {
        &self.id
    }

    pub const fn sender(&self) -> &ParticipantDto {
        &self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn is_read(&self) -> bool {
        self.is_read
    }
}
