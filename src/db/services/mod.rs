//! The `services` module implements the repository traits on top of sea-orm.
//!
//! `SeaOrmStore` wraps one `DatabaseConnection`; each sub-module carries the
//! impl block for one entity area (users, groups, messages, tasks, notes).

use sea_orm::DatabaseConnection;

pub mod group_service;
pub mod message_service;
pub mod note_service;
pub mod task_service;
pub mod user_service;

#[derive(Clone, Debug)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[cfg(test)]
mod tests;
