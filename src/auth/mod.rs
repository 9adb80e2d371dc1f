use crate::user;

pub mod middleware;

#[derive(Clone, Debug)]
pub struct Identity(user::Id);

impl Identity {
    pub fn new(id: user::Id) -> Self {
        Self(id)
    }

    pub const fn user_id(&self) -> &user::Id {
        &self.0
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing user identity")]
    MissingIdentity,
    #[error("malformed user identity")]
    MalformedIdentity,
}
