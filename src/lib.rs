//! User accounts backend: create, read, update, delete and authenticate
//! users stored in a Postgres `"user"` table.
//!
//! ```text
//! UserService ── one UnitOfWork per use-case ──> UserRepository ──> Postgres
//! ```

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod tx;
pub mod users;

pub use error::{AppError, AppResult};
