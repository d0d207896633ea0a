pub mod executor;
pub mod plan;

pub use executor::{Executor, ProjectionExecutor};
pub use plan::{PlanExpr, QueryPlan};

use crate::error::DbResult;
use crate::sql::functions::InitContext;
use crate::types::ColumnValue;

/// Initializes `plan` and evaluates it over `input_rows` rows.
pub fn execute_plan(plan: &mut QueryPlan, ctx: &InitContext<'_>, input_rows: usize) -> DbResult<Vec<Vec<ColumnValue>>> {
    plan.initialize(ctx)?;
    ProjectionExecutor::new(plan, input_rows).collect_rows()
}
