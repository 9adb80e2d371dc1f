use diesel::Connection;
use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;

use crate::schema::{thread_participants, threads};
use crate::user;

use super::Id;
use super::model::{NewParticipant, NewThread, Thread};

pub trait ThreadRepository {
    /// Creates the thread together with both participant rows in one
    /// serializable transaction, so a half-built participant set is never
    /// visible and two racing creates for the same pair cannot both commit.
    fn create(&self, a: &user::Id, b: &user::Id) -> super::Result<Thread>;

    fn find_by_participants(&self, a: &user::Id, b: &user::Id) -> super::Result<Option<Thread>>;

    fn find_by_id_and_participant(&self, id: &Id, user_id: &user::Id) -> super::Result<Thread>;

    fn find_all_by_participant(&self, user_id: &user::Id) -> super::Result<Vec<Thread>>;

    fn participants(&self, id: &Id) -> super::Result<Vec<user::Id>>;

    fn delete(&self, id: &Id, acting_user: &user::Id) -> super::Result<()>;
}

pub struct PgThreadRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgThreadRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl ThreadRepository for PgThreadRepository {
    fn create(&self, a: &user::Id, b: &user::Id) -> super::Result<Thread> {
        if a == b {
            return Err(super::Error::SelfReference);
        }

        let mut conn = self.pool.get()?;

        conn.build_transaction().serializable().run(|conn| {
            if find_pair(conn, a, b)?.is_some() {
                return Err(super::Error::AlreadyExists);
            }

            let id = Id::random();
            let thread = diesel::insert_into(threads::table)
                .values(NewThread::new(&id))
                .returning(Thread::as_returning())
                .get_result(conn)?;

            diesel::insert_into(thread_participants::table)
                .values(vec![NewParticipant::new(&id, a), NewParticipant::new(&id, b)])
                .execute(conn)?;

            Ok(thread)
        })
    }

    fn find_by_participants(&self, a: &user::Id, b: &user::Id) -> super::Result<Option<Thread>> {
        let mut conn = self.pool.get()?;

        find_pair(&mut conn, a, b).map_err(Into::into)
    }

    fn find_by_id_and_participant(&self, id: &Id, user_id: &user::Id) -> super::Result<Thread> {
        let mut conn = self.pool.get()?;

        let mine = thread_participants::table
            .filter(thread_participants::user_id.eq(user_id))
            .select(thread_participants::thread_id);

        threads::table
            .find(id)
            .filter(threads::id.eq_any(mine))
            .select(Thread::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| super::Error::NotFound(id.to_owned()))
    }

    fn find_all_by_participant(&self, user_id: &user::Id) -> super::Result<Vec<Thread>> {
        let mut conn = self.pool.get()?;

        let mine = thread_participants::table
            .filter(thread_participants::user_id.eq(user_id))
            .select(thread_participants::thread_id);

        let threads = threads::table
            .filter(threads::id.eq_any(mine))
            .order((threads::created_at.asc(), threads::id.asc()))
            .select(Thread::as_select())
            .load(&mut conn)?;

        Ok(threads)
    }

    fn participants(&self, id: &Id) -> super::Result<Vec<user::Id>> {
        let mut conn = self.pool.get()?;

        let participants = thread_participants::table
            .filter(thread_participants::thread_id.eq(id))
            .order(thread_participants::user_id.asc())
            .select(thread_participants::user_id)
            .load(&mut conn)?;

        Ok(participants)
    }

    // NotFound covers both a missing thread and a thread the acting user is
    // not part of, so callers cannot probe for other people's threads.
    fn delete(&self, id: &Id, acting_user: &user::Id) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        conn.transaction(|conn| {
            let is_member = diesel::select(diesel::dsl::exists(
                thread_participants::table
                    .filter(thread_participants::thread_id.eq(id))
                    .filter(thread_participants::user_id.eq(acting_user)),
            ))
            .get_result::<bool>(conn)?;

            if !is_member {
                return Err(super::Error::NotFound(id.to_owned()));
            }

            diesel::delete(threads::table.find(id)).execute(conn)?;

            Ok(())
        })
    }
}

fn find_pair(
    conn: &mut PgConnection,
    a: &user::Id,
    b: &user::Id,
) -> diesel::QueryResult<Option<Thread>> {
    let with_a = thread_participants::table
        .filter(thread_participants::user_id.eq(a))
        .select(thread_participants::thread_id);
    let with_b = thread_participants::table
        .filter(thread_participants::user_id.eq(b))
        .select(thread_participants::thread_id);

    threads::table
        .filter(threads::id.eq_any(with_a))
        .filter(threads::id.eq_any(with_b))
        .select(Thread::as_select())
        .first(conn)
        .optional()
}
