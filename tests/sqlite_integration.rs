//! End-to-end exercises of the statement engine (C6) against the real
//! `sqlite` backend, in-process and in-memory — no external service
//! required. Covers the seed scenarios from spec.md §8.

use pretty_assertions::assert_eq;
use vellum::backend::StatementType;
use vellum::{Category, Indicator, Session, StandardInto, StandardUse, VectorInto, VectorUse};

fn open() -> Session {
  vellum::register_builtin_backends();
  Session::open_str("sqlite", "").expect("open in-memory sqlite session")
}

fn open_on_disk(path: &std::path::Path) -> Session {
  vellum::register_builtin_backends();
  let conn_str = format!("path={}", path.display());
  Session::open_str("sqlite", &conn_str).expect("open on-disk sqlite session")
}

#[test]
fn scalar_insert_and_select_round_trips() {
  let mut session = open();
  session.once("create table t(id integer, s varchar(20))").unwrap();

  {
    let mut id = 7i64;
    let mut s = "hello".to_string();
    let mut stmt = session.prepare("insert into t(id, s) values(:id, :s)", StatementType::OneTimeQuery).unwrap();
    stmt.exchange_use(StandardUse::new(&mut id, Some("id"))).unwrap();
    stmt.exchange_use(StandardUse::new(&mut s, Some("s"))).unwrap();
    stmt.define_and_bind().unwrap();
    stmt.execute(false).unwrap();
  }

  let mut out_id = 0i64;
  let mut out_s = String::new();
  {
    let mut stmt = session.prepare("select id, s from t", StatementType::RepeatableQuery).unwrap();
    stmt.exchange_into(StandardInto::new(&mut out_id));
    stmt.exchange_into(StandardInto::new(&mut out_s));
    stmt.define_and_bind().unwrap();
    let got = stmt.execute(true).unwrap();
    assert!(got, "expected a row back");
  }
  assert_eq!(out_id, 7);
  assert_eq!(out_s, "hello");
}

#[test]
fn bulk_insert_and_bulk_select_round_trip() {
  let mut session = open();
  session.once("create table t(id integer, s varchar(20))").unwrap();

  let ids: Vec<i64> = vec![1, 2, 3, 4];
  let ss: Vec<String> = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
  {
    let mut stmt = session.prepare("insert into t(id, s) values(:id, :s)", StatementType::RepeatableQuery).unwrap();
    stmt.exchange_use_vector(VectorUse::new(&ids, Some("id"))).unwrap();
    stmt.exchange_use_vector(VectorUse::new(&ss, Some("s"))).unwrap();
    stmt.define_and_bind().unwrap();
    stmt.execute(true).unwrap();
    assert_eq!(stmt.get_affected_rows(), 4);
  }

  let mut out_ids: Vec<i64> = vec![0; 4];
  let mut out_ss: Vec<String> = vec![String::new(); 4];
  {
    let mut stmt = session.prepare("select id, s from t order by id", StatementType::RepeatableQuery).unwrap();
    stmt.exchange_into_vector(VectorInto::new(&mut out_ids));
    stmt.exchange_into_vector(VectorInto::new(&mut out_ss));
    stmt.define_and_bind().unwrap();
    let got = stmt.execute(true).unwrap();
    assert!(got);
  }
  assert_eq!(out_ids, ids);
  assert_eq!(out_ss, ss);
}

#[test]
fn null_indicator_round_trips_on_select() {
  let mut session = open();
  session.once("create table t(id integer, s varchar(20))").unwrap();

  {
    let mut id = 1i64;
    let mut s_placeholder = String::new();
    let mut s_indicator = Indicator::Null;
    let mut stmt = session.prepare("insert into t(id, s) values(:id, :s)", StatementType::OneTimeQuery).unwrap();
    stmt.exchange_use(StandardUse::new(&mut id, Some("id"))).unwrap();
    stmt.exchange_use(StandardUse::with_indicator(&mut s_placeholder, &mut s_indicator, Some("s"))).unwrap();
    stmt.define_and_bind().unwrap();
    stmt.execute(false).unwrap();
  }

  let mut out_id = 0i64;
  let mut out_s = String::new();
  let mut out_indicator = Indicator::Ok;
  {
    let mut stmt = session.prepare("select id, s from t", StatementType::RepeatableQuery).unwrap();
    stmt.exchange_into(StandardInto::new(&mut out_id));
    stmt.exchange_into(StandardInto::with_indicator(&mut out_s, &mut out_indicator));
    stmt.define_and_bind().unwrap();
    stmt.execute(true).unwrap();
  }
  assert_eq!(out_id, 1);
  assert_eq!(out_indicator, Indicator::Null);
}

#[test]
fn dynamic_row_describes_and_decodes_by_name() {
  let mut session = open();
  session.once("create table t(id integer, s varchar(20))").unwrap();
  session.once("insert into t(id, s) values(7, 'hello')").unwrap();

  let mut stmt = session.prepare("select id, s from t", StatementType::RepeatableQuery).unwrap();
  let row = stmt.into_row();
  stmt.define_and_bind().unwrap();
  let got = stmt.execute(true).unwrap();
  assert!(got);

  let row = row.borrow();
  assert_eq!(row.size(), 2);
  assert_eq!(row.get_i64_by_name("id").unwrap(), 7);
  assert_eq!(row.get_string_by_name("s").unwrap(), "hello");
}

#[test]
fn mixing_named_and_positional_use_bindings_fails() {
  let mut session = open();
  session.once("create table t(id integer, s varchar(20))").unwrap();

  let mut stmt = session.prepare("insert into t(id, s) values(:a, :b)", StatementType::OneTimeQuery).unwrap();
  let mut a = 7i64;
  let mut b = "a".to_string();
  stmt.exchange_use(StandardUse::new(&mut a, Some("a"))).unwrap();
  stmt.exchange_use(StandardUse::new(&mut b, Some("b"))).unwrap();

  let mut c = 9i64;
  let err = stmt.exchange_use(StandardUse::new(&mut c, None)).unwrap_err();
  assert_eq!(err.category(), Category::InvalidStatement);
}

#[test]
fn partial_bulk_failure_reports_rows_successfully_applied() {
  let mut session = open();
  session.once("create table t(val integer check (val < 100))").unwrap();

  let vals: Vec<i64> = vec![1, 2, 101];
  let mut stmt = session.prepare("insert into t(val) values(:v)", StatementType::RepeatableQuery).unwrap();
  stmt.exchange_use_vector(VectorUse::new(&vals, Some("v"))).unwrap();
  stmt.define_and_bind().unwrap();

  let result = stmt.execute(true);
  assert!(result.is_err());
  assert_eq!(stmt.get_affected_rows(), 2);
}

#[test]
fn on_disk_session_persists_across_reconnect() {
  let dir = tempfile::tempdir().unwrap();
  let db_path = dir.path().join("vellum_test.db");

  {
    let mut session = open_on_disk(&db_path);
    session.once("create table t(id integer, s varchar(20))").unwrap();
    session.once("insert into t(id, s) values(42, 'persisted')").unwrap();
  }

  let mut session = open_on_disk(&db_path);
  let mut out_id = 0i64;
  let mut out_s = String::new();
  {
    let mut stmt = session.prepare("select id, s from t", StatementType::RepeatableQuery).unwrap();
    stmt.exchange_into(StandardInto::new(&mut out_id));
    stmt.exchange_into(StandardInto::new(&mut out_s));
    stmt.define_and_bind().unwrap();
    let got = stmt.execute(true).unwrap();
    assert!(got);
  }
  assert_eq!(out_id, 42);
  assert_eq!(out_s, "persisted");
}
