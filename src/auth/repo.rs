use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::auth::{
    errors::RepoError,
    repo_types::{NewUser, User},
};

/// Entry point to user persistence. Each logical operation runs inside one [`UserTx`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UserTx>, RepoError>;
}

/// A single transaction against the user table. Dropping it without `commit` rolls back.
#[async_trait]
pub trait UserTx: Send {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, RepoError>;

    async fn insert(&mut self, user: NewUser) -> Result<User, RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn begin(&self) -> Result<Box<dyn UserTx>, RepoError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUserTx { tx }))
    }
}

pub struct PgUserTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UserTx for PgUserTx {
    async fn find_by_email(&mut self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn insert(&mut self, user: NewUser) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(user)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await?;
        Ok(())
    }
}
