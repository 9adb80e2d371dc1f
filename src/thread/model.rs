use chrono::NaiveDateTime;
use diesel::prelude::{Identifiable, Insertable, Queryable, Selectable};

use crate::user;

use super::Id;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = crate::schema::threads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Thread {
    id: Id,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl Thread {
    pub fn new() -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Id::random(),
            created_at: now,
            updated_at: now,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub const fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::threads)]
pub struct NewThread<'a> {
    id: &'a Id,
}

impl<'a> NewThread<'a> {
    pub fn new(id: &'a Id) -> Self {
        Self { id }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::thread_participants)]
pub struct NewParticipant<'a> {
    thread_id: &'a Id,
    user_id: &'a user::Id,
}

impl<'a> NewParticipant<'a> {
    pub fn new(thread_id: &'a Id, user_id: &'a user::Id) -> Self {
        Self { thread_id, user_id }
    }
}
