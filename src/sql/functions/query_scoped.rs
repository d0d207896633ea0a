use std::fmt::Debug;

use crate::error::{DbError, DbResult};

/// Write-once slot for a value that stays fixed for one query.
///
/// Starts Unresolved; the only legal transition is to Resolved, after which
/// the value is read-only. Deliberately not `Clone`: function nodes copy it
/// forward explicitly when they are cloned.
#[derive(Debug)]
pub struct QueryScoped<T> {
    value: Option<T>,
}

impl<T: Clone + PartialEq + Debug> QueryScoped<T> {
    pub fn new() -> Self {
        QueryScoped { value: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Resolves the value on first use; later calls never run `resolve`.
    pub fn get_or_resolve<F>(&mut self, resolve: F) -> DbResult<&T>
    where
        F: FnOnce() -> DbResult<T>,
    {
        if self.value.is_none() {
            self.value = Some(resolve()?);
        }
        self.require("query-scoped value")
    }

    /// Stores `value` if unresolved. Re-storing the cached value is a no-op;
    /// any other value is rejected.
    pub fn set(&mut self, value: T) -> DbResult<()> {
        match &self.value {
            None => {
                self.value = Some(value);
                Ok(())
            }
            Some(existing) if *existing == value => Ok(()),
            Some(existing) => Err(DbError::IllegalState(format!(
                "query-scoped value already resolved to {:?}, refusing {:?}",
                existing, value
            ))),
        }
    }

    pub fn require(&self, owner: &str) -> DbResult<&T> {
        self.value
            .as_ref()
            .ok_or_else(|| DbError::IllegalState(format!("{} evaluated before initialize", owner)))
    }

    /// Copies a resolved value into `target`; an unresolved source leaves it untouched.
    pub fn copy_forward(&self, target: &mut QueryScoped<T>) -> DbResult<()> {
        match &self.value {
            Some(v) => target.set(v.clone()),
            None => Ok(()),
        }
    }
}

impl<T: Clone + PartialEq + Debug> Default for QueryScoped<T> {
    fn default() -> Self {
        QueryScoped::new()
    }
}
