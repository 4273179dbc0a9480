use async_trait::async_trait;

use crate::db::PgTx;
use crate::error::{AppError, AppResult};
use crate::users::repo_types::User;

/// Data access for the `"user"` table.
///
/// Every method runs exactly one statement inside the caller's transaction.
#[async_trait]
pub trait UserRepository<Tx: Send>: Send + Sync {
    /// Insert a user whose password is already hashed; returns it with its new id.
    async fn create(&self, tx: &mut Tx, user: User) -> AppResult<User>;

    async fn find_by_id(&self, tx: &mut Tx, id: i64) -> AppResult<User>;

    async fn find_by_email(&self, tx: &mut Tx, email: &str) -> AppResult<User>;

    /// All users; an empty table is an empty list.
    async fn find_by_all(&self, tx: &mut Tx) -> AppResult<Vec<User>>;

    async fn update_username(&self, tx: &mut Tx, id: i64, username: &str) -> AppResult<()>;

    async fn update_email(&self, tx: &mut Tx, id: i64, email: &str) -> AppResult<()>;

    async fn update_password(&self, tx: &mut Tx, id: i64, password_hash: &str) -> AppResult<()>;

    async fn delete(&self, tx: &mut Tx, id: i64) -> AppResult<()>;
}

pub(crate) fn not_found_id(id: i64) -> AppError {
    AppError::NotFound(format!("user with id {id} not found"))
}

pub(crate) fn not_found_email(email: &str) -> AppError {
    AppError::NotFound(format!("user with email {email} not found"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PgUserRepository;

impl PgUserRepository {
    async fn update_column(
        tx: &mut PgTx,
        sql: &'static str,
        context: &'static str,
        id: i64,
        value: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(sql)
            .bind(value)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::query(context))?;
        if result.rows_affected() == 0 {
            return Err(not_found_id(id));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository<PgTx> for PgUserRepository {
    async fn create(&self, tx: &mut PgTx, user: User) -> AppResult<User> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO "user" (username, email, password)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::query("insert user"))?;
        Ok(User { id, ..user })
    }

    async fn find_by_id(&self, tx: &mut PgTx, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password
            FROM "user"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::query("select user by id"))?
        .ok_or_else(|| not_found_id(id))
    }

    async fn find_by_email(&self, tx: &mut PgTx, email: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password
            FROM "user"
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::query("select user by email"))?
        .ok_or_else(|| not_found_email(email))
    }

    async fn find_by_all(&self, tx: &mut PgTx) -> AppResult<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password
            FROM "user"
            ORDER BY id
            "#,
        )
        .fetch_all(&mut **tx)
        .await
        .map_err(AppError::query("select all users"))
    }

    async fn update_username(&self, tx: &mut PgTx, id: i64, username: &str) -> AppResult<()> {
        Self::update_column(
            tx,
            r#"UPDATE "user" SET username = $1 WHERE id = $2"#,
            "update username",
            id,
            username,
        )
        .await
    }

    async fn update_email(&self, tx: &mut PgTx, id: i64, email: &str) -> AppResult<()> {
        Self::update_column(
            tx,
            r#"UPDATE "user" SET email = $1 WHERE id = $2"#,
            "update email",
            id,
            email,
        )
        .await
    }

    async fn update_password(&self, tx: &mut PgTx, id: i64, password_hash: &str) -> AppResult<()> {
        Self::update_column(
            tx,
            r#"UPDATE "user" SET password = $1 WHERE id = $2"#,
            "update password",
            id,
            password_hash,
        )
        .await
    }

    async fn delete(&self, tx: &mut PgTx, id: i64) -> AppResult<()> {
        let result = sqlx::query(r#"DELETE FROM "user" WHERE id = $1"#)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::query("delete user"))?;
        if result.rows_affected() == 0 {
            return Err(not_found_id(id));
        }
        Ok(())
    }
}
