use diesel::prelude::{Identifiable, Insertable, Queryable, Selectable};

use super::Id;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    id: Id,
    username: String,
}

impl User {
    pub fn new(id: Id, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser<'a> {
    id: &'a Id,
    username: &'a str,
}

impl<'a> NewUser<'a> {
    pub fn new(id: &'a Id, username: &'a str) -> Self {
        Self { id, username }
    }

    pub const fn id(&self) -> &Id {
        self.id
    }

    pub fn username(&self) -> &str {
        self.username
    }
}
