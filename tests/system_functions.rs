use std::io::Write;
use std::thread;

use tempoql::config::{ExecutionContext, JobConf, QUERY_TIMESTAMP_KEY};
use tempoql::engine::Engine;
use tempoql::error::DbError;
use tempoql::execution::{QueryPlan, execute_plan};
use tempoql::session::SessionState;
use tempoql::sql::functions::InitContext;
use tempoql::sql::parser::parse_statement;
use tempoql::types::{ColumnValue, Timestamp};

fn compile(sql: &str, env: Option<&ExecutionContext>) -> QueryPlan {
    QueryPlan::compile(&parse_statement(sql).unwrap(), env).unwrap()
}

#[test]
fn load_conf_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# propagated by the coordinator").unwrap();
    writeln!(file, "{} = 1704067200000", QUERY_TIMESTAMP_KEY).unwrap();
    let conf = JobConf::load(file.path()).unwrap();

    let mut engine = Engine::with_conf(conf.clone());
    let env = ExecutionContext::new(conf);
    let mut plan = compile("SELECT CURRENT_TIMESTAMP", Some(&env));
    let rows = execute_plan(&mut plan, &InitContext::detached(), 1).unwrap();
    assert_eq!(rows[0][0].to_string_value(), "2024-01-01 00:00:00.000");

    // with a session available, the session still decides
    let t = Timestamp::parse("2025-05-05 00:00:00").unwrap();
    let out = engine.execute_at("SELECT CURRENT_TIMESTAMP", t).unwrap();
    assert_eq!(out.rows[0][0], ColumnValue::Timestamp(t));
}

#[test]
fn conf_file_accepts_quoted_values_and_trailing_comments() {
    let start = Timestamp::parse("2024-01-01 00:00:00").unwrap();
    for body in [
        format!("{} = \"1704067200000\"\n", QUERY_TIMESTAMP_KEY),
        format!("{} = 1704067200000 # start\n", QUERY_TIMESTAMP_KEY),
        "[tempoql.query]\ntimestamp = 1704067200000\n".to_string(),
    ] {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        let conf = JobConf::load(file.path()).unwrap();
        assert_eq!(conf.query_timestamp().unwrap(), Some(start), "{}", body);
    }
}

#[test]
fn malformed_conf_file_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{} 1704067200000", QUERY_TIMESTAMP_KEY).unwrap();
    assert!(matches!(JobConf::load(file.path()), Err(DbError::ParseError(_))));
}

#[test]
fn missing_conf_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = JobConf::load(dir.path().join("absent.conf")).unwrap_err();
    assert!(matches!(err, DbError::Io(_)));
}

#[test]
fn bad_timestamp_setting_fails_worker_plan() {
    let mut conf = JobConf::new();
    conf.set(QUERY_TIMESTAMP_KEY, "12:00");
    let env = ExecutionContext::new(conf);
    let mut plan = compile("SELECT CURRENT_DATE()", Some(&env));
    let err = plan.initialize(&InitContext::detached()).unwrap_err();
    assert!(matches!(err, DbError::InvalidSetting { ref key, .. } if key == QUERY_TIMESTAMP_KEY));
}

#[test]
fn workers_agree_with_coordinator() {
    let mut coordinator = Engine::new();
    let t = Timestamp::parse("2024-06-30 23:59:59.999").unwrap();
    let out = coordinator.execute_at("SELECT CURRENT_TIMESTAMP", t).unwrap();

    // a worker has no session, only the shipped configuration
    let env = ExecutionContext::new(coordinator.worker_conf());
    let mut worker_plan = compile("SELECT CURRENT_TIMESTAMP", Some(&env));
    let rows = execute_plan(&mut worker_plan, &InitContext::detached(), 1).unwrap();
    assert_eq!(rows, out.rows);
}

#[test]
fn forked_fragments_share_the_resolved_value() {
    let mut session = SessionState::new();
    session.begin_query_at(Timestamp::parse("2024-01-01 00:00:00").unwrap());
    let mut plan = compile("SELECT CURRENT_TIMESTAMP, CURRENT_DATE", None);
    plan.initialize(&InitContext::with_session(&session)).unwrap();
    let expected = plan.evaluate_row().unwrap();

    let fragments = plan.fork(4).unwrap();
    let results: Vec<Vec<Vec<ColumnValue>>> = thread::scope(|s| {
        let handles: Vec<_> = fragments
            .iter()
            .map(|fragment| {
                s.spawn(move || {
                    // no initialize: the resolved values were copied forward
                    (0..50).map(|_| fragment.evaluate_row().unwrap()).collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    for rows in results {
        assert!(rows.iter().all(|row| *row == expected));
    }
}

#[test]
fn evaluating_unresolved_fork_fails() {
    let plan = compile("SELECT NOW", None);
    let forks = plan.fork(2).unwrap();
    for fork in &forks {
        assert!(matches!(fork.evaluate_row(), Err(DbError::IllegalState(_))));
    }
}

#[test]
fn many_rows_one_value() {
    let mut session = SessionState::new();
    session.begin_query();
    let mut plan = compile("SELECT CURRENT_TIMESTAMP", None);
    let rows = execute_plan(&mut plan, &InitContext::with_session(&session), 1000).unwrap();
    assert_eq!(rows.len(), 1000);
    assert!(rows.iter().all(|r| r[0] == ColumnValue::Timestamp(session.query_current_timestamp())));
}
