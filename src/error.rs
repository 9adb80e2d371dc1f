use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, error};
use serde::Serialize;

use crate::{auth, chat};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the '{0}' field is required")]
    FieldRequired(&'static str),
    #[error("the '{0}' field may not be null")]
    FieldNull(&'static str),
    #[error("only the 'is_read' field can be updated")]
    ReadFlagOnly,

    #[error(transparent)]
    _Auth(#[from] auth::Error),
    #[error(transparent)]
    _Chat(#[from] chat::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message) = match self {
            e @ (Self::FieldRequired(_) | Self::FieldNull(_) | Self::ReadFlagOnly) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            Self::_Auth(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            Self::_Chat(e) => {
                let message = e.to_string();
                (StatusCode::from(e), message)
            }
        };

        let message = if status.is_server_error() {
            error!("API error: {message}");
            String::from("Something went wrong")
        } else {
            debug!("API error: {message}");
            message
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}
