use std::any::Any;

use chrono::NaiveDate;

use crate::error::DbResult;
use crate::types::{ColumnType, ColumnValue};

use super::{
    FunctionBase, FunctionProperties, InitContext, QueryScoped, ScalarFunction, check_no_arguments,
    downcast_target, resolve_query_timestamp,
};

const NAME: &str = "CURRENT_DATE";

/// `CURRENT_DATE()`: the date part of the query start timestamp.
#[derive(Debug, Default)]
pub struct CurrentDate {
    base: FunctionBase,
    current: QueryScoped<NaiveDate>,
}

impl CurrentDate {
    pub fn new() -> Self {
        CurrentDate::default()
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.current.get().copied()
    }
}

impl ScalarFunction for CurrentDate {
    fn name(&self) -> &'static str {
        NAME
    }

    fn properties(&self) -> FunctionProperties {
        FunctionProperties {
            deterministic: false,
            runtime_constant: true,
            max_ndv: Some(1),
            description: "_FUNC_() - Returns the current date at the start of query evaluation. \
                          All calls of current_date within the same query return the same value.",
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
        self.current
            .get_or_resolve(|| resolve_query_timestamp(ctx, conf).map(|ts| ts.date()))?;
        Ok(ColumnType::Date)
    }

    fn evaluate(&self, _arguments: &[ColumnValue]) -> DbResult<ColumnValue> {
        Ok(ColumnValue::Date(*self.current.require(NAME)?))
    }

    fn display_name(&self, _children: &[String]) -> String {
        format!("{}()", NAME)
    }

    fn new_instance(&self) -> Box<dyn ScalarFunction> {
        Box::new(CurrentDate::new())
    }

    fn clone_with_state(&self, target: &mut dyn ScalarFunction) -> DbResult<()> {
        self.base.copy_to(NAME, target)?;
        let other = downcast_target::<CurrentDate>(NAME, target)?;
        self.current.copy_forward(&mut other.current)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::session::SessionState;
    use crate::sql::functions::duplicate;
    use crate::types::Timestamp;

    #[test]
    fn date_of_session_timestamp() {
        let mut session = SessionState::new();
        session.begin_query_at(Timestamp::parse("2024-02-29 23:59:59.999").unwrap());
        let mut f = CurrentDate::new();
        assert_eq!(f.initialize(&[], &InitContext::with_session(&session)).unwrap(), ColumnType::Date);
        assert_eq!(f.evaluate(&[]).unwrap().to_string_value(), "2024-02-29");
    }

    #[test]
    fn arity_and_state_errors() {
        let mut f = CurrentDate::new();
        assert!(matches!(f.evaluate(&[]), Err(DbError::IllegalState(_))));
        let err = f.initialize(&[ColumnType::Date], &InitContext::detached()).unwrap_err();
        assert_eq!(err.to_string(), "The function CURRENT_DATE does not take any arguments, but found 1");
    }

    #[test]
    fn clone_propagates_date() {
        let mut session = SessionState::new();
        session.begin_query_at(Timestamp::parse("2023-06-01 08:00:00").unwrap());
        let mut f = CurrentDate::new();
        f.initialize(&[], &InitContext::with_session(&session)).unwrap();
        let copy = duplicate(&f).unwrap();
        assert_eq!(copy.evaluate(&[]).unwrap(), f.evaluate(&[]).unwrap());
        assert_eq!(copy.display_name(&[]), "CURRENT_DATE()");
    }
}
