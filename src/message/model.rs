use chrono::NaiveDateTime;
use diesel::prelude::{Associations, Identifiable, Insertable, Queryable, Selectable};

use crate::{thread, user};

use super::Id;

#[derive(Queryable, Selectable, Identifiable, Associations, Clone, Debug)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(belongs_to(thread::model::Thread, foreign_key = thread_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Message {
    id: Id,
    thread_id: thread::Id,
    sender_id: user::Id,
    text: String,
    created_at: NaiveDateTime,
    is_read: bool,
}

impl Message {
    pub fn new(thread_id: thread::Id, sender_id: user::Id, text: &str) -> Self {
        Self {
            id: Id::random(),
            thread_id,
            sender_id,
            text: text.to_string(),
            created_at: chrono::Utc::now().naive_utc(),
            is_read: false,
        }
    }

    pub fn with_read(&self) -> Self {
        Self {
            is_read: true,
            ..self.clone()
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn thread_id(&self) -> &thread::Id {
        &self.thread_id
    }

    pub const fn sender_id(&self) -> &user::Id {
        &self.sender_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub const fn is_read(&self) -> bool {
        self.is_read
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::messages)]
pub struct NewMessage<'a> {
    id: &'a Id,
    thread_id: &'a thread::Id,
    sender_id: &'a user::Id,
    text: &'a str,
}

impl<'a> NewMessage<'a> {
    pub fn new(id: &'a Id, thread_id: &'a thread::Id, sender_id: &'a user::Id, text: &'a str) -> Self {
        Self {
            id,
            thread_id,
            sender_id,
            text,
        }
    }
}
