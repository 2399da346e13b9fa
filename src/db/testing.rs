//! In-memory database double. Understands the statements the query builder emits, keeps rows
//! per table, runs each transaction on a snapshot and records every statement it sees.

use super::{Database, Executor, RawRow, Transaction};
use crate::model::{id_text, ids_equal};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Record = Map<String, Value>;

#[derive(Clone, Debug, Default)]
struct Table {
    id_column: String,
    rows: Vec<Record>,
}

type Tables = BTreeMap<String, Table>;

#[derive(Default)]
struct Inner {
    tables: Tables,
    failures: Vec<(String, String)>,
    log: Vec<String>,
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace `name`, keyed by `id_column`, holding `rows` (objects keyed by column).
    pub fn table(&self, name: &str, id_column: &str, rows: Value) -> &Self {
        let rows = match rows {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(m) => Some(m),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        self.inner.lock().unwrap().tables.insert(
            name.to_string(),
            Table {
                id_column: id_column.to_string(),
                rows,
            },
        );
        self
    }

    /// Statements containing `needle` fail with `message`.
    pub fn fail_on(&self, needle: &str, message: &str) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .failures
            .push((needle.to_string(), message.to_string()));
        self
    }

    /// Every statement plus BEGIN / COMMIT / ROLLBACK markers, in order.
    pub fn log(&self) -> Vec<String> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn statements_containing(&self, needle: &str) -> Vec<String> {
        self.log().into_iter().filter(|s| s.contains(needle)).collect()
    }

    /// Committed rows of `table`, keyed by column.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    fn record(&self, query: &str) -> Result<(), String> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.push(query.to_string());
        match inner.failures.iter().find(|(needle, _)| query.contains(needle.as_str())) {
            Some((_, message)) => Err(message.clone()),
            None => Ok(()),
        }
    }

    fn mark(&self, event: &str) {
        self.inner.lock().unwrap().log.push(event.to_string());
    }
}

#[async_trait]
impl Executor for MemoryDatabase {
    async fn exec(&self, query: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
        self.record(query)?;
        let mut inner = self.inner.lock().unwrap();
        apply(&mut inner.tables, query, params)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction>, String> {
        self.mark("BEGIN");
        let snapshot = self.inner.lock().unwrap().tables.clone();
        Ok(Box::new(MemoryTransaction {
            db: self.clone(),
            tables: Mutex::new(snapshot),
        }))
    }
}

struct MemoryTransaction {
    db: MemoryDatabase,
    tables: Mutex<Tables>,
}

#[async_trait]
impl Executor for MemoryTransaction {
    async fn exec(&self, query: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
        self.db.record(query)?;
        let mut tables = self.tables.lock().unwrap();
        apply(&mut tables, query, params)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<(), String> {
        let MemoryTransaction { db, tables } = *self;
        db.mark("COMMIT");
        db.inner.lock().unwrap().tables = tables.into_inner().unwrap();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), String> {
        self.db.mark("ROLLBACK");
        Ok(())
    }
}

enum Cond {
    Eq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    Never,
}

fn capture(pattern: &str, text: &str) -> Option<Vec<String>> {
    let re = Regex::new(pattern).unwrap();
    re.captures(text).map(|c| {
        c.iter()
            .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect()
    })
}

fn missing(name: &str) -> String {
    format!("relation \"{}\" does not exist", name)
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').to_string()
}

fn argument(token: &str, params: &[Value]) -> Result<Value, String> {
    if token == "NULL" {
        return Ok(Value::Null);
    }
    token
        .strip_prefix('$')
        .and_then(|n| n.parse::<usize>().ok())
        .and_then(|n| params.get(n.wrapping_sub(1)))
        .cloned()
        .ok_or_else(|| format!("unbound parameter {}", token))
}

fn same(stored: Option<&Value>, wanted: &Value) -> bool {
    stored.is_some_and(|v| ids_equal(v, wanted))
}

fn matches(row: &Record, conds: &[Cond]) -> bool {
    conds.iter().all(|c| match c {
        Cond::Eq(col, v) => same(row.get(col), v),
        Cond::In(col, values) => values.iter().any(|v| same(row.get(col), v)),
        Cond::IsNull(col) => row.get(col).map_or(true, Value::is_null),
        Cond::Never => false,
    })
}

fn parse_where(tables: &Tables, clause: &str, params: &[Value]) -> Result<Vec<Cond>, String> {
    if let Some(c) = capture(
        r#"^"([^"]+)" IN \(SELECT "([^"]+)" FROM "([^"]+)"(?: WHERE (.*))?\)$"#,
        clause,
    ) {
        let owner = tables.get(&c[3]).ok_or_else(|| missing(&c[3]))?;
        let inner = if c[4].is_empty() {
            Vec::new()
        } else {
            parse_where(tables, &c[4], params)?
        };
        let keys = owner
            .rows
            .iter()
            .filter(|r| matches(r, &inner))
            .filter_map(|r| r.get(&c[2]).cloned())
            .filter(|v| !v.is_null())
            .collect();
        return Ok(vec![Cond::In(c[1].clone(), keys)]);
    }
    clause.split(" AND ").map(|part| parse_condition(part, params)).collect()
}

fn parse_condition(part: &str, params: &[Value]) -> Result<Cond, String> {
    if part == "1 = 0" {
        return Ok(Cond::Never);
    }
    if let Some(c) = capture(r#"^"([^"]+)" IS NULL$"#, part) {
        return Ok(Cond::IsNull(c[1].clone()));
    }
    if let Some(c) = capture(r#"^"([^"]+)" IN \((.+)\)$"#, part) {
        let values = c[2]
            .split(", ")
            .map(|t| argument(t, params))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Cond::In(c[1].clone(), values));
    }
    if let Some(c) = capture(r#"^"([^"]+)" = (\S+)$"#, part) {
        return Ok(Cond::Eq(c[1].clone(), argument(&c[2], params)?));
    }
    Err(format!("unsupported condition: {}", part))
}

/// Numeric when both sides are numbers, text otherwise; NULL sorts first.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ta, tb) = (a.and_then(id_text), b.and_then(id_text));
    let numbers = (
        ta.as_deref().and_then(|s| s.parse::<f64>().ok()),
        tb.as_deref().and_then(|s| s.parse::<f64>().ok()),
    );
    match numbers {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => ta.cmp(&tb),
    }
}

fn apply(tables: &mut Tables, sql: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
    if let Some(c) = capture(r#"^SELECT (.+?) FROM "([^"]+)"(.*)$"#, sql) {
        return select(tables, &c[1], &c[2], &c[3], params);
    }
    if let Some(c) = capture(r#"^INSERT INTO "([^"]+)" DEFAULT VALUES$"#, sql) {
        return insert(tables, &c[1], "", "", params);
    }
    if let Some(c) = capture(r#"^INSERT INTO "([^"]+)" \((.+)\) VALUES \((.+)\)$"#, sql) {
        return insert(tables, &c[1], &c[2], &c[3], params);
    }
    if let Some(c) = capture(r#"^UPDATE "([^"]+)" SET (.+?) WHERE (.+)$"#, sql) {
        return update(tables, &c[1], &c[2], &c[3], params);
    }
    if let Some(c) = capture(r#"^DELETE FROM "([^"]+)" WHERE (.+)$"#, sql) {
        let conds = parse_where(tables, &c[2], params)?;
        let table = tables.get_mut(&c[1]).ok_or_else(|| missing(&c[1]))?;
        table.rows.retain(|r| !matches(r, &conds));
        return Ok(Vec::new());
    }
    Err(format!("unsupported statement: {}", sql))
}

fn select(tables: &Tables, list: &str, name: &str, rest: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
    let table = tables.get(name).ok_or_else(|| missing(name))?;
    let (filter, order) = match rest.rfind(" ORDER BY ") {
        Some(i) => (&rest[..i], &rest[i + " ORDER BY ".len()..]),
        None => (rest, ""),
    };
    let conds = match filter.strip_prefix(" WHERE ") {
        Some(clause) => parse_where(tables, clause, params)?,
        None => Vec::new(),
    };
    let mut rows: Vec<&Record> = table.rows.iter().filter(|r| matches(r, &conds)).collect();

    if list.starts_with("COUNT(*)") {
        return Ok(vec![RawRow(vec![("count".to_string(), Some(rows.len().to_string()))])]);
    }

    let paging = capture(r"^(.*?)(?: LIMIT (\d+))?(?: OFFSET (\d+))?$", order).unwrap_or_default();
    let keys: Vec<(String, bool)> = paging
        .get(1)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.split(", ")
                .filter_map(|item| capture(r#"^"([^"]+)"(?: (ASC|DESC))?$"#, item))
                .map(|c| (c[1].clone(), c[2] == "DESC"))
                .collect()
        })
        .unwrap_or_default();
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|(col, desc)| {
                let o = compare(a.get(col), b.get(col));
                if *desc {
                    o.reverse()
                } else {
                    o
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    let offset = paging.get(3).and_then(|s| s.parse::<usize>().ok()).unwrap_or(0);
    let limit = paging.get(2).and_then(|s| s.parse::<usize>().ok()).unwrap_or(usize::MAX);

    let columns: Vec<(String, String)> = list
        .split(", ")
        .map(|item| {
            capture(r#"^"([^"]+)"::text AS "([^"]+)"$"#, item)
                .map(|c| (c[1].clone(), c[2].clone()))
                .ok_or_else(|| format!("unsupported select item: {}", item))
        })
        .collect::<Result<_, _>>()?;
    Ok(rows
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|row| {
            columns
                .iter()
                .map(|(column, alias)| (alias.as_str(), row.get(column).and_then(id_text)))
                .collect()
        })
        .collect())
}

fn insert(tables: &mut Tables, name: &str, columns: &str, values: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
    let table = tables.get_mut(name).ok_or_else(|| missing(name))?;
    let mut record = Record::new();
    if !columns.is_empty() {
        let values = values
            .split(", ")
            .map(|t| argument(t, params))
            .collect::<Result<Vec<_>, _>>()?;
        for (column, value) in columns.split(", ").map(unquote).zip(values) {
            record.insert(column, value);
        }
    }
    if record.get(&table.id_column).map_or(true, Value::is_null) {
        let next = table
            .rows
            .iter()
            .filter_map(|r| r.get(&table.id_column).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1;
        record.insert(table.id_column.clone(), Value::from(next));
    }
    table.rows.push(record);
    Ok(Vec::new())
}

fn update(tables: &mut Tables, name: &str, sets: &str, clause: &str, params: &[Value]) -> Result<Vec<RawRow>, String> {
    let conds = parse_where(tables, clause, params)?;
    let assignments = sets
        .split(", ")
        .map(|set| {
            let c = capture(r#"^"([^"]+)" = (\S+)$"#, set).ok_or_else(|| format!("unsupported assignment: {}", set))?;
            Ok((c[1].clone(), argument(&c[2], params)?))
        })
        .collect::<Result<Vec<(String, Value)>, String>>()?;
    let table = tables.get_mut(name).ok_or_else(|| missing(name))?;
    for row in table.rows.iter_mut().filter(|r| matches(r, &conds)) {
        for (column, value) in &assignments {
            row.insert(column.clone(), value.clone());
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(rows: &[RawRow], alias: &str) -> Vec<Option<String>> {
        rows.iter().map(|r| r.get(alias).map(str::to_string)).collect()
    }

    #[tokio::test]
    async fn select_filters_orders_and_pages() {
        let db = MemoryDatabase::new();
        db.table(
            "Users",
            "UserID",
            json!([
                { "UserID": 1, "Name": "Ann", "GrpID": 2 },
                { "UserID": 2, "Name": "Bob", "GrpID": 1 },
                { "UserID": 3, "Name": "Cid", "GrpID": 2 }
            ]),
        );
        let rows = db
            .exec(
                "SELECT \"UserID\"::text AS \"id\", \"Name\"::text AS \"name\" FROM \"Users\" \
                 WHERE \"GrpID\" IN ($1, $2) ORDER BY \"Name\" DESC LIMIT 1 OFFSET 1",
                &[json!(2), json!(9)],
            )
            .await
            .unwrap();
        assert_eq!(text(&rows, "name"), vec![Some("Ann".to_string())]);
    }

    #[tokio::test]
    async fn rollback_discards_and_commit_publishes() {
        let db = MemoryDatabase::new();
        db.table("Groups", "GrpID", json!([]));
        let tx = db.begin().await.unwrap();
        tx.exec("INSERT INTO \"Groups\" (\"GrpName\") VALUES ($1)", &[json!("Staff")])
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert!(db.rows("Groups").is_empty());

        let tx = db.begin().await.unwrap();
        tx.exec("INSERT INTO \"Groups\" (\"GrpName\") VALUES ($1)", &[json!("Staff")])
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(db.rows("Groups"), vec![json!({ "GrpName": "Staff", "GrpID": 1 })]);
        assert_eq!(db.log().iter().filter(|s| s.as_str() == "BEGIN").count(), 2);
    }

    #[tokio::test]
    async fn subquery_updates_and_unknown_tables() {
        let db = MemoryDatabase::new();
        db.table("Groups", "GrpID", json!([{ "GrpID": 1 }, { "GrpID": 2 }]))
            .table("Users", "UserID", json!([{ "UserID": 1, "GrpID": 1 }, { "UserID": 2, "GrpID": 2 }]));
        db.exec(
            "UPDATE \"Users\" SET \"GrpID\" = NULL WHERE \"GrpID\" IN (SELECT \"GrpID\" FROM \"Groups\" WHERE \"GrpID\" = $1)",
            &[json!(1)],
        )
        .await
        .unwrap();
        assert_eq!(
            db.rows("Users"),
            vec![json!({ "UserID": 1, "GrpID": null }), json!({ "UserID": 2, "GrpID": 2 })]
        );
        let err = db.exec("DELETE FROM \"Nope\" WHERE \"id\" = $1", &[json!(1)]).await.unwrap_err();
        assert_eq!(err, "relation \"Nope\" does not exist");
    }
}
