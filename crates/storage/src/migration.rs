// SPDX-License-Identifier: MIT

//! Versioned snapshot migrations. A snapshot on disk carries a `v` field;
//! opening an older snapshot walks the registered chain of migrations up to
//! the current binary's expected version before it is loaded.

use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than this binary's {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

pub trait Migration {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    pub fn register(&mut self, migration: Box<dyn Migration>) {
        self.migrations.push(migration);
    }

    /// Walks the chain of registered migrations from the snapshot's current
    /// `v` field to `target`, applying each in turn.
    pub fn migrate_to(&self, mut snapshot: Value, target: u32) -> Result<Value, MigrationError> {
        let current = snapshot.get("v").and_then(Value::as_u64).unwrap_or(0) as u32;
        if current == target {
            return Ok(snapshot);
        }
        if current > target {
            return Err(MigrationError::TooNew(current, target));
        }

        let mut v = current;
        while v != target {
            let step = self.migrations.iter().find(|m| m.source_version() == v);
            match step {
                Some(step) => {
                    step.migrate(&mut snapshot)?;
                    v = step.target_version();
                    if let Some(obj) = snapshot.as_object_mut() {
                        obj.insert("v".to_string(), v.into());
                    }
                }
                None => return Err(MigrationError::NoPath(current, target)),
            }
        }
        Ok(snapshot)
    }
}
