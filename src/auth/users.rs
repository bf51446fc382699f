use chrono::{SecondsFormat, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension};

use crate::db::models::{User, UserId};
use crate::state::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("a user with this email already exists")]
    Duplicate,

    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Insert a new user with a bcrypt hash of `password`.
pub fn create_user(
    pool: &DbPool,
    email: &str,
    password: &str,
    cost: u32,
) -> Result<User, UserError> {
    let user = User {
        id: UserId::generate(),
        email: normalize_email(email),
        password_hash: bcrypt::hash(password, cost)?,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.email, user.password_hash, user.created_at],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => UserError::Duplicate,
        _ => UserError::Sql(e),
    })?;

    Ok(user)
}

pub fn find_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, UserError> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
            params![normalize_email(email)],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

/// Check `password` against the stored hash. Unknown emails and wrong
/// passwords are indistinguishable to the caller.
pub fn authenticate(pool: &DbPool, email: &str, password: &str) -> Result<Option<User>, UserError> {
    let Some(user) = find_by_email(pool, email)? else {
        return Ok(None);
    };
    if bcrypt::verify(password, &user.password_hash)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    const COST: u32 = 4;

    #[test]
    fn create_then_find_by_email() {
        let pool = memory_pool();
        let user = create_user(&pool, " Alice@Example.com ", "hunter2", COST).unwrap();
        assert_eq!(user.email, "alice@example.com");

        let found = find_by_email(&pool, "ALICE@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_ne!(found.password_hash, "hunter2");
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let pool = memory_pool();
        create_user(&pool, "bob@example.com", "pw", COST).unwrap();
        let err = create_user(&pool, "BOB@example.com", "other", COST).unwrap_err();
        assert!(matches!(err, UserError::Duplicate));
    }

    #[test]
    fn authenticate_checks_password() {
        let pool = memory_pool();
        let user = create_user(&pool, "carol@example.com", "right", COST).unwrap();

        let ok = authenticate(&pool, "carol@example.com", "right").unwrap();
        assert_eq!(ok.map(|u| u.id), Some(user.id));
        assert!(authenticate(&pool, "carol@example.com", "wrong")
            .unwrap()
            .is_none());
        assert!(authenticate(&pool, "nobody@example.com", "right")
            .unwrap()
            .is_none());
    }
}
