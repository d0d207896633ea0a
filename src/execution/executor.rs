use crate::error::DbResult;
use crate::execution::plan::QueryPlan;
use crate::types::ColumnValue;

pub trait Executor {
    /// Returns the next row of results, or None if done.
    fn next(&mut self) -> DbResult<Option<Vec<ColumnValue>>>;
}

/// Evaluates a projection once per input row. The plan consumes no input
/// columns, so only the row count matters.
pub struct ProjectionExecutor<'a> {
    plan: &'a QueryPlan,
    remaining: usize,
}

impl<'a> ProjectionExecutor<'a> {
    pub fn new(plan: &'a QueryPlan, input_rows: usize) -> Self {
        ProjectionExecutor { plan, remaining: input_rows }
    }

    pub fn collect_rows(mut self) -> DbResult<Vec<Vec<ColumnValue>>> {
        let mut out = Vec::new();
        while let Some(row) = self.next()? {
            out.push(row);
        }
        Ok(out)
    }
}

impl Executor for ProjectionExecutor<'_> {
    fn next(&mut self) -> DbResult<Option<Vec<ColumnValue>>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.plan.evaluate_row().map(Some)
    }
}
