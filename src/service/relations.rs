//! Relation resolution: fetch related rows through the registry and embed them onto parent rows.
//!
//! belongsTo keys (`fk_as`) become either the full related row or an `{id}` stub; hasMany
//! relations become arrays of child rows whose reverse link points back at the parent.
//! Each phase fans out one query per descriptor and joins them; the first failure wins.

use crate::config::Schema;
use crate::error::AppError;
use crate::model::{ids_equal, Model, ModelRegistry, Row};
use crate::sql::{key_alias, Filter};
use futures::future::try_join_all;
use serde_json::{json, Value};
use std::sync::Arc;

/// Related rows fetched for one belongsTo descriptor.
#[derive(Clone, Debug, Default)]
pub struct BelongsToData {
    pub model_field_name: String,
    pub fk_as: String,
    /// Identifier field of the related rows.
    pub id_field: String,
    pub rows: Vec<Row>,
}

/// Child rows fetched for one hasMany descriptor.
#[derive(Clone, Debug, Default)]
pub struct HasManyData {
    pub model_field_name: String,
    /// Alias of the raw key carried on each child row for matching, stripped on embed.
    pub key_alias: String,
    /// Field on the child pointing back at the parent.
    pub reverse_field: String,
    /// Key alias of the reverse link on the child, stripped on embed.
    pub reverse_fk_as: String,
    pub rows: Vec<Row>,
}

pub struct RelationResolver<'a> {
    registry: &'a ModelRegistry,
    schema: &'a Schema,
}

impl<'a> RelationResolver<'a> {
    pub fn new(registry: &'a ModelRegistry, schema: &'a Schema) -> Self {
        RelationResolver { registry, schema }
    }

    fn related(&self, relation_model_name: &str) -> Result<Arc<Model>, AppError> {
        self.registry
            .get(relation_model_name)
            .ok_or_else(|| AppError::MissingModel(relation_model_name.to_string()))
    }

    /// Every relation target must be registered before anything is fetched.
    fn check_models(&self) -> Result<(), AppError> {
        let names = self
            .schema
            .belongs_to
            .iter()
            .map(|b| &b.relation_model_name)
            .chain(self.schema.has_many.iter().map(|h| &h.relation_model_name));
        for name in names {
            self.related(name)?;
        }
        Ok(())
    }

    pub async fn fetch_belongs_to(&self, parent_filter: &Filter) -> Result<Vec<BelongsToData>, AppError> {
        let targets = self
            .schema
            .belongs_to
            .iter()
            .map(|b| Ok((b, self.related(&b.relation_model_name)?)))
            .collect::<Result<Vec<_>, AppError>>()?;

        let fetches = targets.iter().map(|(b, model)| async move {
            let related = model.schema();
            let mut rows = model
                .select_where_in(&related.id.column, false, self.schema, &b.fk_field, parent_filter)
                .await?;
            embed_belongs_to(related, &mut rows, None);
            Ok::<_, AppError>(BelongsToData {
                model_field_name: b.model_field_name.clone(),
                fk_as: b.fk_as.clone(),
                id_field: related.id_field().to_string(),
                rows,
            })
        });
        try_join_all(fetches).await
    }

    pub fn embed_belongs_to(&self, rows: &mut [Row], relations_data: Option<&[BelongsToData]>) {
        embed_belongs_to(self.schema, rows, relations_data);
    }

    pub async fn fetch_has_many(&self, parent_filter: &Filter) -> Result<Vec<HasManyData>, AppError> {
        let mut targets = Vec::with_capacity(self.schema.has_many.len());
        for h in &self.schema.has_many {
            let model = self.related(&h.relation_model_name)?;
            let reverse = model
                .schema()
                .reverse_link(&self.schema.name, &h.fk_field)
                .cloned()
                .ok_or_else(|| AppError::ReverseLinkNotFound {
                    model: self.schema.name.clone(),
                    related: model.name().to_string(),
                })?;
            targets.push((h, model, reverse));
        }

        let fetches = targets.iter().map(|(h, model, reverse)| async move {
            let related = model.schema();
            let mut rows = model
                .select_where_in(&h.fk_field, true, self.schema, &self.schema.id.column, parent_filter)
                .await?;
            embed_belongs_to(related, &mut rows, None);
            Ok::<_, AppError>(HasManyData {
                model_field_name: h.model_field_name.clone(),
                key_alias: key_alias(&h.fk_field),
                reverse_field: reverse.model_field_name.clone(),
                reverse_fk_as: reverse.fk_as.clone(),
                rows,
            })
        });
        try_join_all(fetches).await
    }

    pub fn embed_has_many(&self, rows: &mut [Row], relations_data: &[HasManyData]) {
        embed_has_many(self.schema, rows, relations_data);
    }

    /// belongsTo first, then hasMany; the two touch disjoint fields.
    pub async fn fetch_and_embed(&self, mut rows: Vec<Row>, parent_filter: &Filter) -> Result<Vec<Row>, AppError> {
        self.check_models()?;
        let belongs_to = self.fetch_belongs_to(parent_filter).await?;
        embed_belongs_to(self.schema, &mut rows, Some(&belongs_to));
        let has_many = self.fetch_has_many(parent_filter).await?;
        embed_has_many(self.schema, &mut rows, &has_many);
        Ok(rows)
    }
}

/// Replace each `fk_as` key with the related row (when fetched and found) or an `{id}` stub.
/// A NULL key embeds `null`. Rows already embedded keep their relation value.
pub fn embed_belongs_to(schema: &Schema, rows: &mut [Row], relations_data: Option<&[BelongsToData]>) {
    for row in rows.iter_mut() {
        for b in &schema.belongs_to {
            let Some(fk) = row.remove(&b.fk_as) else {
                row.entry(b.model_field_name.clone()).or_insert(Value::Null);
                continue;
            };
            let embedded = if fk.is_null() {
                Value::Null
            } else {
                relations_data
                    .and_then(|data| data.iter().find(|d| d.model_field_name == b.model_field_name))
                    .and_then(|d| {
                        d.rows
                            .iter()
                            .find(|r| r.get(&d.id_field).is_some_and(|id| ids_equal(id, &fk)))
                    })
                    .map(|r| Value::Object(r.clone()))
                    .unwrap_or_else(|| json!({ "id": fk }))
            };
            row.insert(b.model_field_name.clone(), embedded);
        }
    }
}

/// Attach to each parent the children whose key equals the parent id (empty array when none).
pub fn embed_has_many(schema: &Schema, rows: &mut [Row], relations_data: &[HasManyData]) {
    for row in rows.iter_mut() {
        let parent_id = row.get(schema.id_field()).cloned().unwrap_or(Value::Null);
        for d in relations_data {
            let children: Vec<Value> = d
                .rows
                .iter()
                .filter(|child| child.get(&d.key_alias).is_some_and(|fk| ids_equal(fk, &parent_id)))
                .map(|child| {
                    let mut child = child.clone();
                    child.remove(&d.key_alias);
                    child.remove(&d.reverse_fk_as);
                    child.insert(d.reverse_field.clone(), json!({ "id": parent_id }));
                    Value::Object(child)
                })
                .collect();
            row.insert(d.model_field_name.clone(), Value::Array(children));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_schema, resolve_schema};
    use crate::db::testing::MemoryDatabase;
    use crate::testing::{database, group_schema, obj, registry, rows, seeded_database, user_schema};
    use pretty_assertions::assert_eq;

    fn users_data(children: Vec<Row>) -> Vec<HasManyData> {
        vec![HasManyData {
            model_field_name: "users".into(),
            key_alias: "__fk_GrpID".into(),
            reverse_field: "group".into(),
            reverse_fk_as: "groupId".into(),
            rows: children,
        }]
    }

    #[test]
    fn embed_has_many_scenario() {
        let mut parents = rows(json!([{ "id": 1, "name": "Admins", "deleted": false }]));
        let children = rows(json!([{ "id": 10, "name": "John", "__fk_GrpID": "1" }]));
        embed_has_many(&group_schema(), &mut parents, &users_data(children));
        assert_eq!(
            parents,
            rows(json!([{
                "id": 1, "name": "Admins", "deleted": false,
                "users": [{ "id": 10, "name": "John", "group": { "id": 1 } }]
            }]))
        );
    }

    #[test]
    fn embed_has_many_filters_exactly() {
        let mut parents = rows(json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }]));
        let children = rows(json!([
            { "id": 10, "__fk_GrpID": 1 },
            { "id": 11, "__fk_GrpID": "1" },
            { "id": 12, "__fk_GrpID": 2 }
        ]));
        embed_has_many(&group_schema(), &mut parents, &users_data(children));
        let ids = |p: &Row| -> Vec<Value> {
            p["users"].as_array().unwrap().iter().map(|c| c["id"].clone()).collect()
        };
        assert_eq!(ids(&parents[0]), vec![json!(10), json!(11)]);
        assert_eq!(ids(&parents[1]), vec![json!(12)]);
        assert_eq!(parents[2]["users"], json!([]));
    }

    #[test]
    fn embed_belongs_to_stubs_without_data() {
        let input = rows(json!([{ "id": 1, "name": "John", "groupId": 2 }, { "id": 2, "name": "Orphan", "groupId": null }]));
        let mut first = input.clone();
        embed_belongs_to(&user_schema(), &mut first, None);
        assert_eq!(
            first,
            rows(json!([
                { "id": 1, "name": "John", "group": { "id": 2 } },
                { "id": 2, "name": "Orphan", "group": null }
            ]))
        );
        let mut second = input.clone();
        embed_belongs_to(&user_schema(), &mut second, None);
        assert_eq!(first, second);
        // a second pass over already embedded rows leaves them unchanged
        embed_belongs_to(&user_schema(), &mut second, None);
        assert_eq!(first, second);
    }

    #[test]
    fn embed_belongs_to_uses_fetched_rows() {
        let data = vec![BelongsToData {
            model_field_name: "group".into(),
            fk_as: "groupId".into(),
            id_field: "id".into(),
            rows: rows(json!([{ "id": 2, "name": "Staff" }])),
        }];
        let mut users = rows(json!([{ "id": 1, "groupId": 2 }, { "id": 3, "groupId": 9 }]));
        embed_belongs_to(&user_schema(), &mut users, Some(&data));
        assert_eq!(users[0]["group"], json!({ "id": 2, "name": "Staff" }));
        assert_eq!(users[1]["group"], json!({ "id": 9 }));
    }

    #[tokio::test]
    async fn fetch_and_embed_group_users() {
        let db = seeded_database();
        let reg = registry(&db);
        let group = reg.get("userGroup").unwrap();
        let resolver = RelationResolver::new(&reg, group.schema());
        let parents = rows(json!([{ "id": 2, "name": "Staff", "deleted": false }]));
        let out = resolver
            .fetch_and_embed(parents, &Filter::new().eq("id", json!([2])))
            .await
            .unwrap();
        assert_eq!(
            out,
            rows(json!([{
                "id": 2, "name": "Staff", "deleted": false,
                "users": [{ "id": 3, "name": "Ann", "deleted": false, "group": { "id": 2 } }]
            }]))
        );
        assert_eq!(
            db.statements_containing("__fk_GrpID"),
            vec![
                "SELECT \"UserID\"::text AS \"id\", \"Name\"::text AS \"name\", \"Deleted\"::text AS \"deleted\", \
                 \"GrpID\"::text AS \"groupId\", \"GrpID\"::text AS \"__fk_GrpID\" FROM \"Users\" \
                 WHERE \"GrpID\" IN (SELECT \"GrpID\" FROM \"Groups\" WHERE \"GrpID\" IN ($1)) ORDER BY \"UserID\""
                    .to_string()
            ]
        );
    }

    /// Default naming: the hasMany key column is also the child's belongsTo field name.
    #[tokio::test]
    async fn has_many_key_named_like_the_child_relation() {
        let group = parse_schema(
            r#"{ "name": "userGroup", "tableName": "Groups", "fields": {
                   "id": "id", "name": "string",
                   "users": { "hasMany": "user", "fkField": "userGroup" } } }"#,
        )
        .unwrap();
        let user = parse_schema(
            r#"{ "name": "user", "tableName": "Users", "fields": {
                   "id": "id", "name": "string",
                   "userGroup": { "belongsTo": "userGroup" } } }"#,
        )
        .unwrap();
        let db = MemoryDatabase::new();
        db.table("Groups", "id", json!([{ "id": 1, "name": "Admins" }, { "id": 2, "name": "Staff" }]))
            .table(
                "Users",
                "id",
                json!([
                    { "id": 10, "name": "John", "userGroup": 1 },
                    { "id": 11, "name": "Jane", "userGroup": 2 }
                ]),
            );
        let mut reg = ModelRegistry::new();
        for raw in [&group, &user] {
            reg.register(Model::new(resolve_schema(raw).unwrap(), Arc::new(db.clone())))
                .unwrap();
        }
        let group = reg.get("userGroup").unwrap();
        let out = RelationResolver::new(&reg, group.schema())
            .fetch_and_embed(rows(json!([{ "id": 1, "name": "Admins" }])), &Filter::new().eq("id", json!(1)))
            .await
            .unwrap();
        assert_eq!(
            out,
            rows(json!([{
                "id": 1, "name": "Admins",
                "users": [{ "id": 10, "name": "John", "userGroup": { "id": 1 } }]
            }]))
        );
    }

    #[tokio::test]
    async fn fetch_belongs_to_full_rows() {
        let db = seeded_database();
        let reg = registry(&db);
        let user = reg.get("user").unwrap();
        let resolver = RelationResolver::new(&reg, user.schema());
        let data = resolver.fetch_belongs_to(&Filter::new().eq("id", json!(3))).await.unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].rows, vec![obj(json!({ "id": 2, "name": "Staff", "deleted": false }))]);
        let mut users = rows(json!([{ "id": 3, "groupId": 2 }]));
        resolver.embed_belongs_to(&mut users, Some(&data));
        assert_eq!(users[0]["group"]["name"], json!("Staff"));
    }

    #[tokio::test]
    async fn missing_model_aborts_before_any_query() {
        let db = database();
        let mut reg = ModelRegistry::new();
        reg.register(Model::new(user_schema(), Arc::new(db.clone()))).unwrap();
        let user = reg.get("user").unwrap();
        let resolver = RelationResolver::new(&reg, user.schema());
        let err = resolver
            .fetch_and_embed(rows(json!([{ "id": 1, "groupId": 1 }])), &Filter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingModel(ref m) if m == "userGroup"), "{:?}", err);
        assert!(db.log().is_empty());
    }

    #[tokio::test]
    async fn reverse_link_required() {
        let db = database();
        let mut reg = ModelRegistry::new();
        let orphan_users = Schema::new("user", "Users", user_schema().id.clone());
        reg.register(Model::new(group_schema(), Arc::new(db.clone()))).unwrap();
        reg.register(Model::new(orphan_users, Arc::new(db.clone()))).unwrap();
        let group = reg.get("userGroup").unwrap();
        let err = RelationResolver::new(&reg, group.schema())
            .fetch_has_many(&Filter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ReverseLinkNotFound { .. }));
    }

    #[tokio::test]
    async fn fetch_failure_fails_the_phase() {
        let db = seeded_database();
        db.fail_on("FROM \"Accounts\"", "timeout");
        let reg = registry(&db);
        let user = reg.get("user").unwrap();
        let err = RelationResolver::new(&reg, user.schema())
            .fetch_has_many(&Filter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Db(m) if m == "timeout"));
    }
}
