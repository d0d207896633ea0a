//! Scalar function nodes and the builtin registry.
//!
//! A function node is created once per query plan, configured with the job
//! environment (if any), initialized with its argument types and then
//! evaluated once per row.

pub mod current_date;
pub mod current_timestamp;
pub mod query_scoped;

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{debug, warn};

use crate::config::{ExecutionContext, JobConf};
use crate::error::{DbError, DbResult};
use crate::session::SessionState;
use crate::types::{ColumnType, ColumnValue, Timestamp};

pub use current_date::CurrentDate;
pub use current_timestamp::CurrentTimestamp;
pub use query_scoped::QueryScoped;

/// Declared properties the planner must respect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionProperties {
    /// Same inputs give the same result across separate queries.
    pub deterministic: bool,
    /// Constant within one query execution.
    pub runtime_constant: bool,
    /// Upper bound on distinct values per query, if known.
    pub max_ndv: Option<u64>,
    /// Usage text shown by `DESCRIBE FUNCTION`; `_FUNC_` stands for the name.
    pub description: &'static str,
}

/// What `initialize` may consult besides its argument types.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitContext<'a> {
    pub session: Option<&'a SessionState>,
}

impl<'a> InitContext<'a> {
    pub fn with_session(session: &'a SessionState) -> Self {
        InitContext { session: Some(session) }
    }

    pub fn detached() -> Self {
        InitContext { session: None }
    }
}

/// State shared by every function node.
#[derive(Debug, Clone, Default)]
pub struct FunctionBase {
    conf: Option<Arc<JobConf>>,
}

impl FunctionBase {
    pub fn configure(&mut self, context: &ExecutionContext) {
        self.conf = Some(context.job_conf());
    }

    pub fn conf(&self) -> Option<&JobConf> {
        self.conf.as_deref()
    }

    /// Copies base state into `target`, which must be the same function.
    pub fn copy_to(&self, source_name: &str, target: &mut dyn ScalarFunction) -> DbResult<()> {
        if target.name() != source_name {
            return Err(DbError::CopyMismatch {
                expected: source_name.to_string(),
                found: target.name().to_string(),
            });
        }
        target.base_mut().conf = self.conf.clone();
        Ok(())
    }
}

pub trait ScalarFunction: Any + Send + Sync {
    /// Canonical upper-case name.
    fn name(&self) -> &'static str;

    fn properties(&self) -> FunctionProperties;

    fn base(&self) -> &FunctionBase;

    fn base_mut(&mut self) -> &mut FunctionBase;

    /// Stores the job environment for later use. Never fails.
    fn configure(&mut self, context: &ExecutionContext) {
        self.base_mut().configure(context);
    }

    /// Checks the argument types and returns the output type.
    fn initialize(&mut self, arguments: &[ColumnType], ctx: &InitContext<'_>) -> DbResult<ColumnType>;

    fn evaluate(&self, arguments: &[ColumnValue]) -> DbResult<ColumnValue>;

    /// Rendering used in plan explanations and error messages.
    fn display_name(&self, children: &[String]) -> String;

    /// A fresh, unconfigured and unresolved instance of the same function.
    fn new_instance(&self) -> Box<dyn ScalarFunction>;

    /// Copies this node's state into `target`.
    fn clone_with_state(&self, target: &mut dyn ScalarFunction) -> DbResult<()> {
        self.base().copy_to(self.name(), target)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// `new_instance` followed by `clone_with_state`.
pub fn duplicate(function: &dyn ScalarFunction) -> DbResult<Box<dyn ScalarFunction>> {
    let mut copy = function.new_instance();
    function.clone_with_state(copy.as_mut())?;
    Ok(copy)
}

/// Downcasts a clone target to the concrete type of its source.
pub(crate) fn downcast_target<'a, T: ScalarFunction>(
    source_name: &str,
    target: &'a mut dyn ScalarFunction,
) -> DbResult<&'a mut T> {
    let found = target.name();
    target.as_any_mut().downcast_mut::<T>().ok_or_else(|| DbError::CopyMismatch {
        expected: source_name.to_string(),
        found: found.to_string(),
    })
}

pub(crate) fn check_no_arguments(function: &str, arguments: &[ColumnType]) -> DbResult<()> {
    if arguments.is_empty() {
        Ok(())
    } else {
        Err(DbError::ArgumentCount { function: function.to_string(), count: arguments.len() })
    }
}

/// Resolves the instant the current query started.
///
/// The session wins, then a timestamp propagated through the job
/// configuration, then the wall clock.
pub fn resolve_query_timestamp(ctx: &InitContext<'_>, conf: Option<&JobConf>) -> DbResult<Timestamp> {
    if let Some(session) = ctx.session {
        let ts = session.query_current_timestamp();
        debug!("query timestamp {} taken from session", ts);
        return Ok(ts);
    }
    if let Some(conf) = conf {
        match conf.query_timestamp()? {
            Some(ts) => {
                debug!("query timestamp {} taken from job configuration", ts);
                return Ok(ts);
            }
            None => warn!("job configuration has no query timestamp, reading the wall clock"),
        }
    }
    let ts = Timestamp::now();
    debug!("query timestamp {} taken from the wall clock", ts);
    Ok(ts)
}

type Constructor = fn() -> Box<dyn ScalarFunction>;

pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, Constructor>,
}

impl FunctionRegistry {
    fn builtin() -> Self {
        let mut registry = FunctionRegistry { functions: BTreeMap::new() };
        registry.register("CURRENT_TIMESTAMP", || Box::new(CurrentTimestamp::new()));
        registry.register("NOW", || Box::new(CurrentTimestamp::new()));
        registry.register("GETDATE", || Box::new(CurrentTimestamp::new()));
        registry.register("CURRENT_DATE", || Box::new(CurrentDate::new()));
        registry
    }

    fn register(&mut self, name: &'static str, constructor: Constructor) {
        self.functions.insert(name, constructor);
    }

    pub fn global() -> &'static FunctionRegistry {
        &BUILTINS
    }

    pub fn create(&self, name: &str) -> DbResult<Box<dyn ScalarFunction>> {
        self.functions
            .get(name.to_uppercase().as_str())
            .map(|ctor| ctor())
            .ok_or_else(|| DbError::UnknownFunction(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.functions.keys().copied().collect()
    }
}

lazy_static! {
    static ref BUILTINS: FunctionRegistry = FunctionRegistry::builtin();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_aliases() {
        let registry = FunctionRegistry::global();
        for name in ["current_timestamp", "NOW", "GetDate"] {
            let f = registry.create(name).unwrap();
            assert_eq!(f.name(), "CURRENT_TIMESTAMP");
        }
        assert_eq!(registry.create("current_date").unwrap().name(), "CURRENT_DATE");
        assert!(registry.create("now").unwrap().properties().description.contains("current timestamp"));
        assert_eq!(registry.names(), vec!["CURRENT_DATE", "CURRENT_TIMESTAMP", "GETDATE", "NOW"]);
    }

    #[test]
    fn unknown_function() {
        let err = FunctionRegistry::global().create("RAND").err().unwrap();
        assert!(matches!(err, DbError::UnknownFunction(ref n) if n == "RAND"));
    }

    #[test]
    fn runtime_constant_properties() {
        let props = FunctionRegistry::global().create("CURRENT_TIMESTAMP").unwrap().properties();
        assert!(!props.deterministic);
        assert!(props.runtime_constant);
        assert_eq!(props.max_ndv, Some(1));
    }

    #[test]
    fn session_wins_over_conf() {
        let mut session = SessionState::new();
        let t1 = Timestamp::parse("2024-01-01 00:00:00").unwrap();
        session.begin_query_at(t1);
        let mut conf = JobConf::new();
        conf.set_long(crate::config::QUERY_TIMESTAMP_KEY, 0);
        let ts = resolve_query_timestamp(&InitContext::with_session(&session), Some(&conf)).unwrap();
        assert_eq!(ts, t1);
    }

    #[test]
    fn conf_without_key_falls_back_to_clock() {
        let before = Timestamp::now().epoch_millis();
        let ts = resolve_query_timestamp(&InitContext::detached(), Some(&JobConf::new())).unwrap();
        assert!((ts.epoch_millis() - before).abs() <= 2_000);
    }

    #[test]
    fn copy_between_different_functions_fails() {
        let source = CurrentTimestamp::new();
        let mut target = CurrentDate::new();
        let err = source.clone_with_state(&mut target).unwrap_err();
        assert!(matches!(err, DbError::CopyMismatch { .. }));
    }
}
