use std::future::Future;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, instrument, warn};

use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::tx::UnitOfWork;
use crate::users::dto::{
    UpdatedEmail, UpdatedUsername, UserCreateRequest, UserLoginRequest, UserResponse,
    UserUpdateEmailRequest, UserUpdatePasswordRequest, UserUpdateUsernameRequest,
};
use crate::users::password::{dummy_verify, hash_password, verify_password};
use crate::users::repo::{PgUserRepository, UserRepository};
use crate::users::repo_types::User;

pub type PgUserService = UserService<PgPool, PgUserRepository>;

/// User use-cases. Each public method is exactly one transaction.
pub struct UserService<D, R> {
    db: D,
    repo: R,
    query_timeout: Duration,
}

impl<D, R> UserService<D, R>
where
    D: Database,
    R: UserRepository<D::Tx>,
{
    pub fn new(db: D, repo: R, query_timeout: Duration) -> Self {
        Self {
            db,
            repo,
            query_timeout,
        }
    }

    /// Run a use-case body under the configured deadline. The pool also sets
    /// the same deadline as the server's `statement_timeout`, whose
    /// cancellation is reported as a timeout too.
    async fn bounded<T>(
        &self,
        use_case: &'static str,
        body: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.query_timeout, body).await {
            Ok(Err(e)) if e.is_statement_timeout() => Err(AppError::Timeout(use_case)),
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(use_case)),
        }
    }

    /// Hash the password and insert the user. The returned entity carries the
    /// hash, never the plaintext.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create(&self, request: UserCreateRequest) -> AppResult<User> {
        let password = hash_password(&request.password)?;
        let user = User {
            id: 0,
            username: request.username,
            email: request.email,
            password,
        };

        let mut uow = UnitOfWork::begin(&self.db, "create").await?;
        let result = self
            .bounded("create", self.repo.create(uow.tx(), user))
            .await;
        let saved = uow.finish(result).await?;

        info!(user_id = saved.id, "user created");
        Ok(User {
            id: saved.id,
            username: saved.username,
            email: saved.email,
            password: saved.password,
        })
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: i64) -> AppResult<UserResponse> {
        let mut uow = UnitOfWork::begin(&self.db, "find_by_id").await?;
        let result = self
            .bounded("find_by_id", self.repo.find_by_id(uow.tx(), id))
            .await;
        uow.finish(result).await.map(UserResponse::from)
    }

    #[instrument(skip(self))]
    pub async fn find_by_all(&self) -> AppResult<Vec<UserResponse>> {
        let mut uow = UnitOfWork::begin(&self.db, "find_by_all").await?;
        let result = self
            .bounded("find_by_all", self.repo.find_by_all(uow.tx()))
            .await;
        let users = uow.finish(result).await?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    #[instrument(skip(self, request), fields(user_id = request.id))]
    pub async fn update_email(&self, request: UserUpdateEmailRequest) -> AppResult<UpdatedEmail> {
        let mut uow = UnitOfWork::begin(&self.db, "update_email").await?;
        let result: AppResult<()> = self
            .bounded("update_email", async {
                let tx = uow.tx();
                let user = self.repo.find_by_id(tx, request.id).await?;
                self.repo.update_email(tx, user.id, &request.email).await
            })
            .await;
        uow.finish(result).await?;
        Ok(UpdatedEmail {
            email: request.email,
        })
    }

    #[instrument(skip(self, request), fields(user_id = request.id))]
    pub async fn update_username(
        &self,
        request: UserUpdateUsernameRequest,
    ) -> AppResult<UpdatedUsername> {
        let mut uow = UnitOfWork::begin(&self.db, "update_username").await?;
        let result: AppResult<()> = self
            .bounded("update_username", async {
                let tx = uow.tx();
                let user = self.repo.find_by_id(tx, request.id).await?;
                self.repo.update_username(tx, user.id, &request.username).await
            })
            .await;
        uow.finish(result).await?;
        Ok(UpdatedUsername {
            username: request.username,
        })
    }

    #[instrument(skip(self, request), fields(user_id = request.id))]
    pub async fn update_password(&self, request: UserUpdatePasswordRequest) -> AppResult<()> {
        let mut uow = UnitOfWork::begin(&self.db, "update_password").await?;
        let result: AppResult<()> = self
            .bounded("update_password", async {
                let tx = uow.tx();
                let user = self.repo.find_by_id(tx, request.id).await?;
                let hash = hash_password(&request.password)?;
                self.repo.update_password(tx, user.id, &hash).await
            })
            .await;
        uow.finish(result).await?;
        info!(user_id = request.id, "password updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let mut uow = UnitOfWork::begin(&self.db, "delete").await?;
        let result: AppResult<()> = self
            .bounded("delete", async {
                let tx = uow.tx();
                let user = self.repo.find_by_id(tx, id).await?;
                self.repo.delete(tx, user.id).await
            })
            .await;
        uow.finish(result).await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Check credentials. Unknown email and wrong password both yield
    /// `AppError::Auth`.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: UserLoginRequest) -> AppResult<UserResponse> {
        let mut uow = UnitOfWork::begin(&self.db, "login").await?;
        let result = self
            .bounded("login", self.repo.find_by_email(uow.tx(), &request.email))
            .await;
        let user = match uow.finish(result).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                dummy_verify(&request.password);
                warn!("login with unknown email");
                return Err(AppError::Auth);
            }
            Err(e) => return Err(e),
        };

        if !verify_password(&request.password, &user.password)? {
            warn!(user_id = user.id, "login with invalid password");
            return Err(AppError::Auth);
        }

        info!(user_id = user.id, "user logged in");
        Ok(user.into())
    }
}
