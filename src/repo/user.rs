use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use crate::models::{Role, User};
use super::{StoreError, StoreResult, UserDirectory};

const KIND: &str = "User";

/// User repository over SQLite
pub struct UserRepo<'c> {
    conn: &'c Connection,
}

impl<'c> UserRepo<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Create a user with its checkpoint assignments
    pub fn create(&self, user: &User) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO users (identity, name, role, created_ts) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user.identity, user.name, user.role.as_str(), now],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                StoreError::already_exists(KIND, &user.identity)
            } else {
                StoreError::Sqlite(e)
            }
        })?;

        for checkpoint in &user.assigned_checkpoints {
            tx.execute(
                "INSERT INTO user_checkpoints (identity, checkpoint) VALUES (?1, ?2)",
                rusqlite::params![user.identity, checkpoint],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// List all users ordered by identity
    pub fn list(&self) -> StoreResult<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT identity FROM users ORDER BY identity"
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut identities = Vec::new();
        for row in rows {
            identities.push(row?);
        }

        identities.iter().map(|identity| self.get_user(identity)).collect()
    }

    fn get_checkpoints(&self, identity: &str) -> StoreResult<BTreeSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT checkpoint FROM user_checkpoints WHERE identity = ?1 ORDER BY checkpoint"
        )?;
        let rows = stmt.query_map([identity], |row| row.get::<_, String>(0))?;

        let mut checkpoints = BTreeSet::new();
        for row in rows {
            checkpoints.insert(row?);
        }
        Ok(checkpoints)
    }
}

impl UserDirectory for UserRepo<'_> {
    fn get_user(&self, identity: &str) -> StoreResult<User> {
        let row = self.conn
            .query_row(
                "SELECT identity, name, role FROM users WHERE identity = ?1",
                [identity],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found(KIND, identity))?;

        let (identity, name, role) = row;
        // The CHECK constraint keeps other values out of the table
        let role = Role::from_str(&role).unwrap_or(Role::Operator);

        Ok(User {
            assigned_checkpoints: self.get_checkpoints(&identity)?,
            identity,
            name,
            role,
        })
    }
}
