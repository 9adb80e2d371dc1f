use diesel::ExpressionMethods;
use diesel::OptionalExtension;
use diesel::PgConnection;
use diesel::QueryDsl;
use diesel::RunQueryDsl;
use diesel::SelectableHelper;
use diesel::r2d2::ConnectionManager;

use crate::schema::users;

use super::Id;
use super::Username;
use super::model::{NewUser, User};

pub trait UserRepository {
    fn insert(&self, user: &NewUser) -> super::Result<()>;

    fn find_by_id(&self, id: &Id) -> super::Result<User>;

    fn find_by_username(&self, username: &Username) -> super::Result<User>;

    fn find_all_by_ids(&self, ids: &[Id]) -> super::Result<Vec<User>>;

    fn delete(&self, id: &Id) -> super::Result<()>;
}

pub struct PgUserRepository {
    pool: r2d2::Pool<ConnectionManager<PgConnection>>,
}

impl PgUserRepository {
    pub fn new(pool: r2d2::Pool<ConnectionManager<PgConnection>>) -> Self {
        Self { pool }
    }
}

impl UserRepository for PgUserRepository {
    fn insert(&self, u: &NewUser) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        diesel::insert_into(users::table).values(u).execute(&mut conn)?;

        Ok(())
    }

    fn find_by_id(&self, id: &Id) -> super::Result<User> {
        let mut conn = self.pool.get()?;

        let u = users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)?;

        Ok(u)
    }

    fn find_by_username(&self, username: &Username) -> super::Result<User> {
        let mut conn = self.pool.get()?;

        users::table
            .filter(users::username.eq(username.as_str()))
            .limit(1)
            .select(User::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| super::Error::NotFound(username.to_owned()))
    }

    fn find_all_by_ids(&self, ids: &[Id]) -> super::Result<Vec<User>> {
        let mut conn = self.pool.get()?;

        let users = users::table
            .filter(users::id.eq_any(ids))
            .select(User::as_select())
            .get_results(&mut conn)?;

        Ok(users)
    }

    // Relies on the store-level cascades: the user's messages and
    // participant rows go away in the same statement.
    fn delete(&self, id: &Id) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        diesel::delete(users::table.find(id)).execute(&mut conn)?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use diesel::QueryDsl;
    use diesel::RunQueryDsl;
    use testcontainers_modules::{postgres::Postgres, testcontainers::runners::AsyncRunner};

    use crate::integration::db;
    use crate::message::repository::{MessageRepository, PgMessageRepository};
    use crate::thread::repository::{PgThreadRepository, ThreadRepository};
    use crate::user::{self, Id, Username};

    use super::*;

    fn seed_user(pool: &db::Pool, username: &str) -> Id {
        let id = Id::random();
        PgUserRepository::new(pool.clone())
            .insert(&NewUser::new(&id, username))
            .unwrap();
        id
    }

    #[tokio::test]
    async fn should_insert_and_find_by_username() {
        let node = Postgres::default().start().await.unwrap();
        let pool = db::Config::test(&node).await.connect();
        db::init_schema(&pool);
        let repo = PgUserRepository::new(pool.clone());

        let jora = seed_user(&pool, "jora");

        let found = repo.find_by_username(&Username::new("jora")).unwrap();

        assert_eq!(found.id(), &jora);
        assert_eq!(found.username(), "jora");
    }

    #[tokio::test]
    async fn should_not_find_unknown_username() {
        let node = Postgres::default().start().await.unwrap();
        let pool = db::Config::test(&node).await.connect();
        db::init_schema(&pool);
        let repo = PgUserRepository::new(pool.clone());

        seed_user(&pool, "jora");

        let res = repo.find_by_username(&Username::new("valera"));

        assert!(matches!(res, Err(user::Error::NotFound(_))));
    }

    #[tokio::test]
    async fn should_find_all_by_ids() {
        let node = Postgres::default().start().await.unwrap();
        let pool = db::Config::test(&node).await.connect();
        db::init_schema(&pool);
        let repo = PgUserRepository::new(pool.clone());

        let jora = seed_user(&pool, "jora");
        let valera = seed_user(&pool, "valera");
        seed_user(&pool, "radu");

        let users = repo
            .find_all_by_ids(&[jora.clone(), valera.clone()])
            .unwrap();

        assert_eq!(users.len(), 2);
        assert!(users.iter().any(|u| u.id() == &jora));
        assert!(users.iter().any(|u| u.id() == &valera));
    }

    #[tokio::test]
    async fn should_delete_user_with_only_their_messages() {
        let node = Postgres::default().start().await.unwrap();
        let pool = db::Config::test(&node).await.connect();
        db::init_schema(&pool);
        let user_repo = PgUserRepository::new(pool.clone());
        let thread_repo = PgThreadRepository::new(pool.clone());
        let message_repo = PgMessageRepository::new(pool.clone());

        let jora = seed_user(&pool, "jora");
        let valera = seed_user(&pool, "valera");

        let thread = thread_repo.create(&jora, &valera).unwrap();
        message_repo.create(thread.id(), &jora, "ping").unwrap();
        message_repo.create(thread.id(), &jora, "ping again").unwrap();
        let kept = message_repo.create(thread.id(), &valera, "pong").unwrap();

        user_repo.delete(&jora).unwrap();

        let remaining = message_repo.find_all(thread.id(), &valera).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), kept.id());

        // the thread itself survives for the other participant
        let mut conn = pool.get().unwrap();
        let thread_count: i64 = crate::schema::threads::table
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(thread_count, 1);
    }
}
