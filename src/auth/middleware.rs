use axum::{extract::Request, middleware::Next, response::Response};
use log::debug;
use uuid::Uuid;

use crate::user;

use super::{Error, Identity};

/// Header the identity provider in front of this service resolves the
/// caller into. Issuing and validating credentials happens there, not here.
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn identify(mut req: Request, next: Next) -> crate::Result<Response> {
    let header = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or(Error::MissingIdentity)?;

    let id = header
        .to_str()
        .ok()
        .and_then(|raw| raw.parse::<Uuid>().ok())
        .ok_or_else(|| {
            debug!("rejecting request with malformed {USER_ID_HEADER} header");
            Error::MalformedIdentity
        })?;

    req.extensions_mut().insert(Identity::new(user::Id::from(id)));

    Ok(next.run(req).await)
}
