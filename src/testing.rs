//! Shared fixtures: the user / group / account schemas, their in-memory tables and a registry.

use crate::config::{ColumnDef, ColumnType, Schema};
use crate::db::testing::MemoryDatabase;
use crate::model::{Model, ModelRegistry, Row};
use serde_json::{json, Value};
use std::sync::Arc;

fn id(column: &str) -> ColumnDef {
    ColumnDef {
        field: "id".into(),
        column: column.into(),
        ty: ColumnType::Id,
    }
}

pub fn user_schema() -> Schema {
    Schema::new("user", "Users", id("UserID"))
        .column("name", "Name", ColumnType::String)
        .column("deleted", "Deleted", ColumnType::Boolean)
        .with_belongs_to("group", "userGroup", "GrpID", "groupId")
        .with_has_many("accounts", "userAccount", "UserID")
}

pub fn group_schema() -> Schema {
    Schema::new("userGroup", "Groups", id("GrpID"))
        .column("name", "GrpName", ColumnType::String)
        .column("deleted", "Deleted", ColumnType::Boolean)
        .with_has_many("users", "user", "GrpID")
}

pub fn account_schema() -> Schema {
    let mut s = Schema::new("userAccount", "Accounts", id("AccID"))
        .column("login", "Login", ColumnType::String)
        .column("password", "Password", ColumnType::String)
        .with_belongs_to("user", "user", "UserID", "userId");
    s.sensitive.insert("password".into());
    s
}

/// Empty Users / Groups / Accounts tables keyed by their legacy id columns.
pub fn database() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    db.table("Users", "UserID", json!([]))
        .table("Groups", "GrpID", json!([]))
        .table("Accounts", "AccID", json!([]));
    db
}

/// Groups 1 (Admins) and 2 (Staff); users 1 and 2 in group 1, user 3 in group 2; one account for user 1.
pub fn seeded_database() -> MemoryDatabase {
    let db = database();
    db.table(
        "Groups",
        "GrpID",
        json!([
            { "GrpID": 1, "GrpName": "Admins", "Deleted": false },
            { "GrpID": 2, "GrpName": "Staff", "Deleted": false }
        ]),
    )
    .table(
        "Users",
        "UserID",
        json!([
            { "UserID": 1, "Name": "John", "Deleted": false, "GrpID": 1 },
            { "UserID": 2, "Name": "Jane", "Deleted": false, "GrpID": 1 },
            { "UserID": 3, "Name": "Ann", "Deleted": false, "GrpID": 2 }
        ]),
    )
    .table(
        "Accounts",
        "AccID",
        json!([{ "AccID": 1, "Login": "john", "Password": "secret", "UserID": 1 }]),
    );
    db
}

pub fn registry(db: &MemoryDatabase) -> Arc<ModelRegistry> {
    let db = Arc::new(db.clone());
    let mut registry = ModelRegistry::new();
    for schema in [user_schema(), group_schema(), account_schema()] {
        registry
            .register(Model::new(schema, db.clone()))
            .unwrap_or_else(|e| panic!("fixture registry: {}", e));
    }
    Arc::new(registry)
}

pub fn obj(v: Value) -> Row {
    match v {
        Value::Object(m) => m,
        other => panic!("expected object, got {}", other),
    }
}

pub fn rows(v: Value) -> Vec<Row> {
    match v {
        Value::Array(items) => items.into_iter().map(obj).collect(),
        other => panic!("expected array, got {}", other),
    }
}
