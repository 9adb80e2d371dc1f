use std::fmt::Display;
use std::sync::Arc;

use diesel::{
    deserialize::{self, FromSql, FromSqlRow},
    expression::AsExpression,
    pg::{Pg, PgValue},
    serialize::{self, Output, ToSql},
    sql_types,
};
use repository::MessageRepository;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::thread;

pub mod model;
pub mod repository;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn MessageRepository + Send + Sync>;

#[derive(Clone, Debug, Deserialize, Serialize, Hash, PartialEq, Eq, FromSqlRow, AsExpression)]
#[diesel(sql_type = sql_types::Uuid)]
pub struct Id(Uuid);

impl Id {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn get(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromSql<sql_types::Uuid, Pg> for Id {
    fn from_sql(value: PgValue<'_>) -> deserialize::Result<Self> {
        <Uuid as FromSql<sql_types::Uuid, Pg>>::from_sql(value).map(Self)
    }
}

impl ToSql<sql_types::Uuid, Pg> for Id {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <Uuid as ToSql<sql_types::Uuid, Pg>>::to_sql(&self.0, out)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message not found: {0:?}")]
    NotFound(Option<Id>),
    #[error("thread not found: {0:?}")]
    ThreadNotFound(thread::Id),
    #[error("sender is not a participant of the thread")]
    NotParticipant,
    #[error("message text cannot be empty")]
    EmptyText,
    #[error("sender cannot mark their own message as read")]
    SelfRead,
    #[error("a message cannot be marked as unread")]
    MarkUnread,

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
