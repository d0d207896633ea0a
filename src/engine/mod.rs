use std::collections::{HashMap, VecDeque};

use log::{debug, info};

use crate::config::{ExecutionContext, JobConf};
use crate::error::{DbError, DbResult};
use crate::execution::{QueryPlan, execute_plan};
use crate::session::SessionState;
use crate::sql::ast::Statement;
use crate::sql::functions::{FunctionRegistry, InitContext};
use crate::sql::parser::parse_statement;
use crate::types::{ColumnValue, Timestamp};

/// Most statements whose compiled plans are kept at once.
pub const PLAN_CACHE_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutput {
    pub header: Vec<String>,
    pub rows: Vec<Vec<ColumnValue>>,
}

pub struct Engine {
    session: SessionState,
    env: Option<ExecutionContext>,
    /// Compiled, never initialized templates keyed by statement text.
    plan_cache: HashMap<String, QueryPlan>,
    /// Insertion order of `plan_cache` keys, oldest first.
    plan_order: VecDeque<String>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            session: SessionState::new(),
            env: None,
            plan_cache: HashMap::new(),
            plan_order: VecDeque::new(),
        }
    }

    pub fn with_conf(conf: JobConf) -> Self {
        Engine { env: Some(ExecutionContext::new(conf)), ..Engine::new() }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn cached_plans(&self) -> usize {
        self.plan_cache.len()
    }

    pub fn execute(&mut self, sql: &str) -> DbResult<QueryOutput> {
        self.execute_with(sql, None)
    }

    /// Runs `sql` as a query that started at `ts`.
    pub fn execute_at(&mut self, sql: &str, ts: Timestamp) -> DbResult<QueryOutput> {
        self.execute_with(sql, Some(ts))
    }

    fn execute_with(&mut self, sql: &str, start: Option<Timestamp>) -> DbResult<QueryOutput> {
        let stmt = parse_statement(sql)?;
        match &stmt {
            Statement::Select { .. } => self.run_select(sql.trim(), &stmt, start),
            Statement::Explain(inner) => {
                let plan = QueryPlan::compile(inner, self.env.as_ref())?;
                let rows = plan.explain().into_iter().map(|line| vec![ColumnValue::Text(line)]).collect();
                Ok(QueryOutput { header: vec!["plan".into()], rows })
            }
            Statement::DescribeFunction(name) => describe_function(name),
            Statement::Exit => Err(DbError::Unsupported("EXIT is handled by the shell".into())),
        }
    }

    fn run_select(&mut self, key: &str, stmt: &Statement, start: Option<Timestamp>) -> DbResult<QueryOutput> {
        if !self.plan_cache.contains_key(key) {
            let plan = QueryPlan::compile(stmt, self.env.as_ref())?;
            self.cache_plan(key, plan);
        } else {
            debug!("reusing cached plan for '{}'", key);
        }
        match start {
            Some(ts) => self.session.begin_query_at(ts),
            None => self.session.begin_query(),
        };
        let template = &self.plan_cache[key];
        // A fresh copy of the unresolved template gives this query its own values.
        let mut plan = template.duplicate()?;
        let rows = execute_plan(&mut plan, &InitContext::with_session(&self.session), 1)?;
        Ok(QueryOutput { header: plan.header(), rows })
    }

    fn cache_plan(&mut self, key: &str, plan: QueryPlan) {
        while self.plan_cache.len() >= PLAN_CACHE_CAPACITY {
            match self.plan_order.pop_front() {
                Some(oldest) => {
                    debug!("evicting cached plan for '{}'", oldest);
                    self.plan_cache.remove(&oldest);
                }
                None => break,
            }
        }
        info!("caching plan for '{}'", key);
        self.plan_cache.insert(key.to_string(), plan);
        self.plan_order.push_back(key.to_string());
    }

    /// Configuration for worker fragments of the current query.
    pub fn worker_conf(&self) -> JobConf {
        let mut conf = match &self.env {
            Some(env) => (*env.job_conf()).clone(),
            None => JobConf::new(),
        };
        self.session.propagate_query_timestamp(&mut conf);
        conf
    }
}

fn describe_function(name: &str) -> DbResult<QueryOutput> {
    let function = FunctionRegistry::global().create(name)?;
    let props = function.properties();
    let max_ndv = match props.max_ndv {
        Some(n) => ColumnValue::Integer(n as i64),
        None => ColumnValue::Null,
    };
    Ok(QueryOutput {
        header: ["function", "description", "deterministic", "runtime_constant", "max_ndv"]
            .into_iter()
            .map(String::from)
            .collect(),
        rows: vec![vec![
            ColumnValue::Text(function.name().to_string()),
            ColumnValue::Text(props.description.replace("_FUNC_", name)),
            ColumnValue::Boolean(props.deterministic),
            ColumnValue::Boolean(props.runtime_constant),
            max_ndv,
        ]],
    })
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
