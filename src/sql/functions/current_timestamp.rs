use std::any::Any;

use crate::error::DbResult;
use crate::types::{ColumnType, ColumnValue, Timestamp};

use super::{
    FunctionBase, FunctionProperties, InitContext, QueryScoped, ScalarFunction, check_no_arguments,
    downcast_target, resolve_query_timestamp,
};

const NAME: &str = "CURRENT_TIMESTAMP";

/// `CURRENT_TIMESTAMP()`: the timestamp at the start of query evaluation.
///
/// Not deterministic, but a runtime constant: every call within one query
/// returns the same value, separate queries may differ.
#[derive(Debug, Default)]
pub struct CurrentTimestamp {
    base: FunctionBase,
    current: QueryScoped<Timestamp>,
}

impl CurrentTimestamp {
    pub fn new() -> Self {
        CurrentTimestamp::default()
    }

    pub fn current_timestamp(&self) -> Option<Timestamp> {
        self.current.get().copied()
    }

    /// Pins the value before initialization, e.g. when a plan is rebuilt
    /// from a serialized form. Rejected once a different value is cached.
    pub fn set_current_timestamp(&mut self, ts: Timestamp) -> DbResult<()> {
        self.current.set(ts)
    }
}

impl ScalarFunction for CurrentTimestamp {
    fn name(&self) -> &'static str {
        NAME
    }

    fn properties(&self) -> FunctionProperties {
        FunctionProperties {
            deterministic: false,
            runtime_constant: true,
            max_ndv: Some(1),
            description: "_FUNC_() - Returns the current timestamp at the start of query evaluation. \
                          All calls of current_timestamp within the same query return the same value.",
        }
    }

    fn base(&self) -> &FunctionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut FunctionBase {
        &mut self.base
    }

    fn initialize(&mut self, arguments: &[ColumnType], ctx: &InitContext<'_>) -> DbResult<ColumnType> {
        check_no_arguments(NAME, arguments)?;
        let conf = self.base.conf();
        self.current.get_or_resolve(|| resolve_query_timestamp(ctx, conf))?;
        Ok(ColumnType::Timestamp)
    }

    fn evaluate(&self, _arguments: &[ColumnValue]) -> DbResult<ColumnValue> {
        Ok(ColumnValue::Timestamp(*self.current.require(NAME)?))
    }

    fn display_name(&self, _children: &[String]) -> String {
        format!("{}()", NAME)
    }

    fn new_instance(&self) -> Box<dyn ScalarFunction> {
        Box::new(CurrentTimestamp::new())
    }

    fn clone_with_state(&self, target: &mut dyn ScalarFunction) -> DbResult<()> {
        self.base.copy_to(NAME, target)?;
        let other = downcast_target::<CurrentTimestamp>(NAME, target)?;
        self.current.copy_forward(&mut other.current)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
