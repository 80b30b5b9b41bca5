use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::fmt;
use std::str::FromStr;

/// Login principal stored in the master `users` table. Usernames are unique
/// across the whole system, not per tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Credential {
    pub id: i64,
    pub name: Option<String>,
    pub user_name: String,
    pub password: String,
    pub role: String,
    pub db_name: Option<String>,
    pub token: Option<String>,
}

impl Credential {
    pub fn role(&self) -> Role {
        Role::from_str(&self.role).unwrap_or(Role::Staff)
    }

    pub fn tenant_key(&self) -> Option<&str> {
        self.db_name.as_deref().filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "STAFF" => Ok(Role::Staff),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

pub struct NewCredential<'a> {
    pub name: &'a str,
    pub user_name: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub tenant_key: &'a str,
}

pub async fn find_by_user_name(
    pool: &PgPool,
    user_name: &str,
) -> Result<Option<Credential>, sqlx::Error> {
    sqlx::query_as::<_, Credential>(
        "SELECT id, name, user_name, password, role, db_name, token \
         FROM users WHERE user_name = $1",
    )
    .bind(user_name)
    .fetch_optional(pool)
    .await
}

pub async fn create(pool: &PgPool, new: NewCredential<'_>) -> Result<Credential, sqlx::Error> {
    sqlx::query_as::<_, Credential>(
        "INSERT INTO users (name, user_name, password, role, db_name) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, name, user_name, password, role, db_name, token",
    )
    .bind(new.name)
    .bind(new.user_name)
    .bind(new.password_hash)
    .bind(new.role.as_str())
    .bind(new.tenant_key)
    .fetch_one(pool)
    .await
}

/// Rotate the stored session token. The most recent login always wins;
/// any previously issued token stops authenticating immediately.
pub async fn store_token(
    pool: &PgPool,
    user_name: &str,
    token: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET token = $1 WHERE user_name = $2")
        .bind(token)
        .bind(user_name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn clear_token(pool: &PgPool, user_name: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET token = NULL WHERE user_name = $1")
        .bind(user_name)
        .execute(pool)
        .await?;
    Ok(())
}

/// Rewrite the password hash and end the active session in one statement.
pub async fn update_password(
    pool: &PgPool,
    user_name: &str,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password = $1, token = NULL WHERE user_name = $2")
        .bind(password_hash)
        .bind(user_name)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_by_user_name(pool: &PgPool, user_name: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE user_name = $1")
        .bind(user_name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    // PostgreSQL unique_violation
    e.as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code.as_ref() == "23505")
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}
