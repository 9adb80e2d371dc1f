use axum::http::StatusCode;

use crate::{message, thread, user};

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            super::Error::SelfThread => Self::BAD_REQUEST,
            super::Error::_User(e) => match e {
                // an unknown handle is a bad request, not a resource miss
                user::Error::NotFound(_) => Self::BAD_REQUEST,
                user::Error::_R2d2(_) | user::Error::_Diesel(_) => Self::INTERNAL_SERVER_ERROR,
            },
            super::Error::_Thread(e) => match e {
                thread::Error::NotFound(_) => Self::NOT_FOUND,
                thread::Error::AlreadyExists => Self::CONFLICT,
                thread::Error::SelfReference => Self::BAD_REQUEST,
                thread::Error::_R2d2(_) | thread::Error::_Diesel(_) => {
                    Self::INTERNAL_SERVER_ERROR
                }
            },
            super::Error::_Message(e) => match e {
                message::Error::NotFound(_) | message::Error::ThreadNotFound(_) => Self::NOT_FOUND,
                message::Error::NotParticipant | message::Error::SelfRead => Self::FORBIDDEN,
                message::Error::EmptyText | message::Error::MarkUnread => Self::BAD_REQUEST,
                message::Error::_R2d2(_) | message::Error::_Diesel(_) => {
                    Self::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

pub(super) mod api {
    use axum::{
        Extension, Json,
        extract::{Path, State},
        http::StatusCode,
        response::IntoResponse,
    };
    use serde::{Deserialize, Deserializer};
    use serde_json::{Map, Value, json};

    use crate::auth::Identity;
    use crate::chat::{self, model::MessageDto};
    use crate::error::Error;
    use crate::{message, thread, user};

    #[derive(Deserialize)]
    pub struct StartThreadParams {
        username: Option<user::Username>,
    }

    pub async fn start_thread(
        Extension(identity): Extension<Identity>,
        chat_service: State<chat::Service>,
        Json(params): Json<StartThreadParams>,
    ) -> crate::Result<impl IntoResponse> {
        let username = params.username.ok_or(Error::FieldRequired("username"))?;

        let (thread, created) = chat_service
            .start_or_get_thread(identity.user_id(), &username)
            .await?;

        let status = if created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };

        Ok((status, Json(thread)))
    }

    pub async fn find_threads(
        Extension(identity): Extension<Identity>,
        chat_service: State<chat::Service>,
    ) -> crate::Result<impl IntoResponse> {
        let threads = chat_service.find_my_threads(identity.user_id()).await?;
        Ok(Json(threads))
    }

    pub async fn delete_thread(
        Extension(identity): Extension<Identity>,
        Path(id): Path<thread::Id>,
        chat_service: State<chat::Service>,
    ) -> crate::Result<StatusCode> {
        chat_service.delete_thread(&id, identity.user_id()).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    pub async fn find_messages(
        Extension(identity): Extension<Identity>,
        Path(thread_id): Path<thread::Id>,
        chat_service: State<chat::Service>,
    ) -> crate::Result<impl IntoResponse> {
        let messages = chat_service
            .find_messages(&thread_id, identity.user_id())
            .await?;
        Ok(Json(messages))
    }

    #[derive(Deserialize)]
    pub struct PostMessageParams {
        #[serde(default, deserialize_with = "some_or_null")]
        text: Option<Option<String>>,
    }

    // Keeps "field absent" and "field: null" apart, so each gets its own
    // validation answer.
    fn some_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }

    pub async fn post_message(
        Extension(identity): Extension<Identity>,
        Path(thread_id): Path<thread::Id>,
        chat_service: State<chat::Service>,
        Json(params): Json<PostMessageParams>,
    ) -> crate::Result<impl IntoResponse> {
        let text = match params.text {
            None => return Err(Error::FieldRequired("text")),
            Some(None) => return Err(Error::FieldNull("text")),
            Some(Some(text)) => text,
        };

        let message = chat_service
            .post_message(&thread_id, identity.user_id(), &text)
            .await?;

        Ok((StatusCode::CREATED, Json(message)))
    }

    pub async fn update_message(
        Extension(identity): Extension<Identity>,
        Path((thread_id, message_id)): Path<(thread::Id, message::Id)>,
        chat_service: State<chat::Service>,
        Json(body): Json<Map<String, Value>>,
    ) -> crate::Result<Json<MessageDto>> {
        if body.keys().any(|k| k != "is_read") {
            return Err(Error::ReadFlagOnly);
        }

        let read = body
            .get("is_read")
            .and_then(Value::as_bool)
            .ok_or(Error::FieldRequired("is_read"))?;

        let message = chat_service
            .set_read_state(&thread_id, &message_id, identity.user_id(), read)
            .await?;

        Ok(Json(message))
    }

    pub async fn unread_count(
        Extension(identity): Extension<Identity>,
        Path(thread_id): Path<thread::Id>,
        chat_service: State<chat::Service>,
    ) -> crate::Result<impl IntoResponse> {
        let count = chat_service
            .unread_count(&thread_id, identity.user_id())
            .await?;

        Ok(Json(json!({ "unread_count": count })))
    }
}
