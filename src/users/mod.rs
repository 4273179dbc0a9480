pub mod dto;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;

#[cfg(test)]
pub(crate) mod memory;

pub use repo::{PgUserRepository, UserRepository};
pub use repo_types::User;
pub use services::{PgUserService, UserService};
