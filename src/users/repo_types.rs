use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record in the `"user"` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,          // assigned by the store on insert
    pub username: String,
    pub email: String,    // login identifier
    #[serde(skip_serializing)]
    pub password: String, // Argon2 PHC string, never plaintext
}
