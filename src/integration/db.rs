use std::env;

use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    user: String,
    password: String,
    db: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 5432,
            user: String::from("postgres"),
            password: String::from("postgres"),
            db: String::from("dm"),
        }
    }
}

impl Config {
    pub fn env() -> Option<Self> {
        let host = env::var("POSTGRES_HOST").ok()?;
        let port = env::var("POSTGRES_PORT").ok()?.parse().ok()?;
        let user = env::var("POSTGRES_USER").ok()?;
        let password = env::var("POSTGRES_PASSWORD").ok()?;
        let db = env::var("POSTGRES_DB").ok()?;

        Some(Self {
            host,
            port,
            user,
            password,
            db,
        })
    }

    pub fn connect(&self) -> Pool {
        let url = format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.db
        );

        let manager = ConnectionManager::<PgConnection>::new(url);

        match r2d2::Pool::builder().build(manager) {
            Ok(pool) => pool,
            Err(e) => panic!("Failed to connect to Postgres: {e}"),
        }
    }
}

#[cfg(test)]
impl Config {
    pub async fn test(
        node: &testcontainers_modules::testcontainers::ContainerAsync<
            testcontainers_modules::postgres::Postgres,
        >,
    ) -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: node.get_host_port_ipv4(5432).await.unwrap(),
            user: String::from("postgres"),
            password: String::from("postgres"),
            db: String::from("postgres"),
        }
    }
}

#[cfg(test)]
pub fn init_schema(pool: &Pool) {
    use diesel::connection::SimpleConnection;

    let mut conn = pool.get().unwrap();
    conn.batch_execute(include_str!(
        "../../migrations/2025-07-02-101500_create_dm_schema/up.sql"
    ))
    .unwrap();
}
