use log::debug;

use crate::config::ExecutionContext;
use crate::error::{DbError, DbResult};
use crate::sql::ast::{Expr, Literal, SelectItem, Statement};
use crate::sql::functions::{FunctionRegistry, InitContext, ScalarFunction, duplicate};
use crate::types::{ColumnType, ColumnValue};

/// Compiled expression tree. Function nodes own their per-query state.
pub enum PlanExpr {
    Literal(ColumnValue),
    Function { function: Box<dyn ScalarFunction>, args: Vec<PlanExpr> },
}

impl PlanExpr {
    pub fn compile(expr: &Expr, env: Option<&ExecutionContext>) -> DbResult<Self> {
        match expr {
            Expr::Literal(lit) => Ok(PlanExpr::Literal(match lit {
                Literal::Integer(i) => ColumnValue::Integer(*i),
                Literal::Text(s) => ColumnValue::Text(s.clone()),
                Literal::Boolean(b) => ColumnValue::Boolean(*b),
                Literal::Null => ColumnValue::Null,
            })),
            Expr::FunctionCall { name, args } => {
                let mut function = FunctionRegistry::global().create(name)?;
                if let Some(env) = env {
                    function.configure(env);
                }
                let args = args
                    .iter()
                    .map(|a| PlanExpr::compile(a, env))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(PlanExpr::Function { function, args })
            }
        }
    }

    /// Initializes children first; their output types are this node's
    /// argument descriptors.
    pub fn initialize(&mut self, ctx: &InitContext<'_>) -> DbResult<ColumnType> {
        match self {
            PlanExpr::Literal(v) => Ok(v.column_type()),
            PlanExpr::Function { function, args } => {
                let arg_types = args
                    .iter_mut()
                    .map(|a| a.initialize(ctx))
                    .collect::<DbResult<Vec<_>>>()?;
                function.initialize(&arg_types, ctx)
            }
        }
    }

    pub fn evaluate(&self) -> DbResult<ColumnValue> {
        match self {
            PlanExpr::Literal(v) => Ok(v.clone()),
            PlanExpr::Function { function, args } => {
                let values = args.iter().map(PlanExpr::evaluate).collect::<DbResult<Vec<_>>>()?;
                function.evaluate(&values)
            }
        }
    }

    pub fn display(&self) -> String {
        match self {
            PlanExpr::Literal(ColumnValue::Text(s)) => format!("'{}'", s),
            PlanExpr::Literal(v) => v.to_string_value(),
            PlanExpr::Function { function, args } => {
                let children: Vec<String> = args.iter().map(PlanExpr::display).collect();
                function.display_name(&children)
            }
        }
    }

    pub fn duplicate(&self) -> DbResult<Self> {
        match self {
            PlanExpr::Literal(v) => Ok(PlanExpr::Literal(v.clone())),
            PlanExpr::Function { function, args } => Ok(PlanExpr::Function {
                function: duplicate(function.as_ref())?,
                args: args.iter().map(PlanExpr::duplicate).collect::<DbResult<Vec<_>>>()?,
            }),
        }
    }

    fn visit_functions<'a>(&'a self, out: &mut Vec<&'a dyn ScalarFunction>) {
        if let PlanExpr::Function { function, args } = self {
            out.push(function.as_ref());
            for a in args {
                a.visit_functions(out);
            }
        }
    }
}

pub struct PlanItem {
    pub expr: PlanExpr,
    pub alias: Option<String>,
}

/// Projection plan for a `SELECT` without `FROM`.
pub struct QueryPlan {
    items: Vec<PlanItem>,
}

impl QueryPlan {
    /// Builds function nodes and configures them; nothing is initialized.
    pub fn compile(stmt: &Statement, env: Option<&ExecutionContext>) -> DbResult<Self> {
        let items = match stmt {
            Statement::Select { items } => items,
            Statement::Explain(inner) => return QueryPlan::compile(inner, env),
            Statement::DescribeFunction(_) | Statement::Exit => {
                return Err(DbError::Unsupported("only SELECT statements can be planned".into()));
            }
        };
        let items = items
            .iter()
            .map(|SelectItem { expr, alias }| -> DbResult<PlanItem> {
                Ok(PlanItem { expr: PlanExpr::compile(expr, env)?, alias: alias.clone() })
            })
            .collect::<DbResult<Vec<_>>>()?;
        debug!("compiled plan with {} items", items.len());
        Ok(QueryPlan { items })
    }

    /// Safe to call repeatedly; already resolved nodes keep their values.
    pub fn initialize(&mut self, ctx: &InitContext<'_>) -> DbResult<Vec<ColumnType>> {
        self.items.iter_mut().map(|item| item.expr.initialize(ctx)).collect()
    }

    pub fn evaluate_row(&self) -> DbResult<Vec<ColumnValue>> {
        self.items.iter().map(|item| item.expr.evaluate()).collect()
    }

    pub fn header(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| item.alias.clone().unwrap_or_else(|| item.expr.display()))
            .collect()
    }

    pub fn explain(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| match &item.alias {
                Some(alias) => format!("{} AS {}", item.expr.display(), alias),
                None => item.expr.display(),
            })
            .collect()
    }

    /// Clones every node, carrying resolved values forward.
    pub fn duplicate(&self) -> DbResult<Self> {
        let items = self
            .items
            .iter()
            .map(|item| -> DbResult<PlanItem> {
                Ok(PlanItem { expr: item.expr.duplicate()?, alias: item.alias.clone() })
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(QueryPlan { items })
    }

    /// Independent copies for plan fragments running in parallel.
    pub fn fork(&self, fragments: usize) -> DbResult<Vec<Self>> {
        (0..fragments).map(|_| self.duplicate()).collect()
    }

    pub fn functions(&self) -> Vec<&dyn ScalarFunction> {
        let mut out = Vec::new();
        for item in &self.items {
            item.expr.visit_functions(&mut out);
        }
        out
    }

    /// True when every function in the plan is constant within a query.
    pub fn is_runtime_constant(&self) -> bool {
        self.functions().iter().all(|f| {
            let props = f.properties();
            props.deterministic || props.runtime_constant
        })
    }
}
