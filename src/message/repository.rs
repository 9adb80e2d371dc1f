use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;

use crate::schema::{messages, thread_participants, threads};
use crate::{thread, user};

use super::Id;
use super::model::{Message, NewMessage};

pub trait MessageRepository {
    /// The stored message always starts unread, whatever the caller sent;
    /// the owning thread's `updated_at` is bumped in the same transaction.
    fn create(&self, thread_id: &thread::Id, sender: &user::Id, text: &str)
    -> super::Result<Message>;

    fn find_all(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<Vec<Message>>;

    /// The only legal transition is unread to read, performed by a
    /// participant other than the sender. Re-reading an already read
    /// message is a no-op.
    fn set_read(
        &self,
        thread_id: &thread::Id,
        id: &Id,
        acting_user: &user::Id,
        read: bool,
    ) -> super::Result<Message>;

    fn count_unread(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<i64>;
}

pub struct PgMessageRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgMessageRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl MessageRepository for PgMessageRepository {
    fn create(
        &self,
        thread_id: &thread::Id,
        sender: &user::Id,
        text: &str,
    ) -> super::Result<Message> {
        if text.is_empty() {
            return Err(super::Error::EmptyText);
        }

        let mut conn = self.pool.get()?;

        conn.transaction(|conn| {
            let thread_exists = diesel::select(diesel::dsl::exists(
                threads::table.find(thread_id),
            ))
            .get_result::<bool>(conn)?;

            if !thread_exists {
                return Err(super::Error::ThreadNotFound(thread_id.to_owned()));
            }

            if !is_participant(conn, thread_id, sender)? {
                return Err(super::Error::NotParticipant);
            }

            let id = Id::random();
            let message = diesel::insert_into(messages::table)
                .values(NewMessage::new(&id, thread_id, sender, text))
                .returning(Message::as_returning())
                .get_result(conn)?;

            diesel::update(threads::table.find(thread_id))
                .set(threads::updated_at.eq(diesel::dsl::now))
                .execute(conn)?;

            Ok(message)
        })
    }

    fn find_all(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<Vec<Message>> {
        let mut conn = self.pool.get()?;

        // NotFound hides other people's threads, unknown ids included
        if !is_participant(&mut conn, thread_id, requesting_user)? {
            return Err(super::Error::NotFound(None));
        }

        let messages = messages::table
            .filter(messages::thread_id.eq(thread_id))
            .order((messages::created_at.asc(), messages::id.asc()))
            .select(Message::as_select())
            .load(&mut conn)?;

        Ok(messages)
    }

    fn set_read(
        &self,
        thread_id: &thread::Id,
        id: &Id,
        acting_user: &user::Id,
        read: bool,
    ) -> super::Result<Message> {
        let mut conn = self.pool.get()?;

        conn.transaction(|conn| {
            if !is_participant(conn, thread_id, acting_user)? {
                return Err(super::Error::NotFound(Some(id.to_owned())));
            }

            let message: Message = messages::table
                .find(id)
                .filter(messages::thread_id.eq(thread_id))
                .select(Message::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| super::Error::NotFound(Some(id.to_owned())))?;

            if !read {
                return Err(super::Error::MarkUnread);
            }

            if message.sender_id() == acting_user {
                return Err(super::Error::SelfRead);
            }

            if message.is_read() {
                return Ok(message);
            }

            let updated = diesel::update(messages::table.find(id))
                .set(messages::is_read.eq(true))
                .returning(Message::as_returning())
                .get_result(conn)?;

            Ok(updated)
        })
    }

    fn count_unread(
        &self,
        thread_id: &thread::Id,
        requesting_user: &user::Id,
    ) -> super::Result<i64> {
        let mut conn = self.pool.get()?;

        if !is_participant(&mut conn, thread_id, requesting_user)? {
            return Err(super::Error::NotParticipant);
        }

        let count = messages::table
            .filter(messages::thread_id.eq(thread_id))
            .filter(messages::is_read.eq(false))
            .filter(messages::sender_id.ne(requesting_user))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(count)
    }
}

fn is_participant(
    conn: &mut PgConnection,
    thread_id: &thread::Id,
    user_id: &user::Id,
) -> diesel::QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        thread_participants::table
            .filter(thread_participants::thread_id.eq(thread_id))
            .filter(thread_participants::user_id.eq(user_id)),
    ))
    .get_result(conn)
}
