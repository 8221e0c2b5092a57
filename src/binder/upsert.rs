//! Upsert request compilation for bound records

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::record::Record;
use crate::errors::EquipResult;
use crate::query::ast::{Block, Filter, Func, Query};
use crate::schema::naming;
use crate::schema::{ValidationError, ValidationRule};
use crate::store::{Condition, Mutation, NQuad, Request, Subject};

const EQUIPMENT_VAR: &str = "equipment";
const PARENT_VAR: &str = "parent";

/// Compile one all-or-nothing request upserting `record` in `scope`.
///
/// The node is resolved by identifier among the scope's equipment of the
/// same type and created when absent. A parent identifier resolves the
/// parent the same way, creating a stub node when it does not exist yet.
pub fn compile_upsert(
    scope: &str,
    type_name: &str,
    parent_type_name: Option<&str>,
    record: &Record,
    now: DateTime<Utc>,
) -> EquipResult<Request> {
    let parent = match (&record.parent_identifier, parent_type_name) {
        (Some(id), Some(parent_type)) => Some((id.as_str(), parent_type)),
        (Some(id), None) => {
            return Err(ValidationError::new(
                ValidationRule::ParentKeyCountMismatch,
                format!("parent identifier '{}' given but type has no parent", id),
            )
            .on(type_name.to_string())
            .into())
        }
        (None, _) => None,
    };

    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let node = || Subject::Var(EQUIPMENT_VAR.to_string());

    let mut query = Query::new("Upsert")
        .block(lookup(scope, type_name, &record.identifier).bind_as(EQUIPMENT_VAR));
    if let Some((parent_id, parent_type)) = parent {
        query = query.block(lookup(scope, parent_type, parent_id).bind_as(PARENT_VAR));
    }

    let mut update = Mutation::new();
    for field in &record.values {
        if field.predicate == naming::IDENTIFIER {
            continue;
        }
        update = update.set(NQuad::value(
            node(),
            field.predicate.as_str(),
            field.value.to_json(),
        ));
    }
    update = update.set(NQuad::value(node(), naming::UPDATED, timestamp.as_str()));

    let create = creation(
        Mutation::new().when(Condition::Empty(EQUIPMENT_VAR.into())),
        node(),
        scope,
        type_name,
        &record.identifier,
    )
    .set(NQuad::value(node(), naming::CREATED, timestamp.as_str()));

    let mut request = Request::new().with_query(query).mutate(update).mutate(create);

    if let Some((parent_id, parent_type)) = parent {
        let parent_node = || Subject::Var(PARENT_VAR.to_string());
        request = request
            .mutate(Mutation::new().set(NQuad::edge(node(), naming::PARENT_EDGE, parent_node())))
            .mutate(
                creation(
                    Mutation::new().when(Condition::Empty(PARENT_VAR.into())),
                    parent_node(),
                    scope,
                    parent_type,
                    parent_id,
                )
                .set(NQuad::value(parent_node(), naming::CREATED, timestamp.as_str())),
            );
    }
    Ok(request)
}

/// `eq(equipment.id, id)` among the scope's equipment of `type_name`
fn lookup(scope: &str, type_name: &str, identifier: &str) -> Block {
    Block::var(Func::eq(naming::IDENTIFIER, identifier)).with_filter(Some(Filter::And(vec![
        Filter::eq(naming::TYPE_NAME, naming::EQUIPMENT_MARKER),
        Filter::eq(naming::SCOPES, Value::Array(vec![Value::String(scope.to_string())])),
        Filter::eq(naming::EQUIPMENT_TYPE, type_name),
    ])))
}

/// Bookkeeping every new equipment node carries
fn creation(
    mutation: Mutation,
    subject: Subject,
    scope: &str,
    type_name: &str,
    identifier: &str,
) -> Mutation {
    mutation
        .set(NQuad::value(subject.clone(), naming::SCOPES, scope))
        .set(NQuad::value(subject.clone(), naming::IDENTIFIER, identifier))
        .set(NQuad::value(subject.clone(), naming::TYPE_NAME, naming::EQUIPMENT_MARKER))
        .set(NQuad::value(subject.clone(), naming::NODE_TYPE, naming::EQUIPMENT_NODE_TYPE))
        .set(NQuad::value(
            subject.clone(),
            naming::NODE_TYPE,
            naming::type_declaration(type_name),
        ))
        .set(NQuad::value(subject, naming::EQUIPMENT_TYPE, type_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::RecordBinder;
    use crate::query::ast::{Selection, SortDirection};
    use crate::query::QueryVars;
    use crate::schema::{AttributeSchema, DataType, EquipmentTypeDefinition, SchemaCompiler};
    use crate::store::{GraphStore, MemoryGraphStore};
    use chrono::TimeZone;
    use serde_json::json;

    fn server() -> EquipmentTypeDefinition {
        EquipmentTypeDefinition::new("server", "0x11")
            .with_parent("0x1")
            .with_attribute(AttributeSchema::identifier("server_id", "server_id"))
            .with_attribute(AttributeSchema::parent_identifier("cluster", "cluster_id"))
            .with_attribute(AttributeSchema::new("cores", DataType::Int, "cores").displayed())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn record(value: Value) -> Record {
        let binder = RecordBinder::for_type(&server()).unwrap();
        binder.bind(value.as_object().unwrap()).unwrap()
    }

    fn store() -> MemoryGraphStore {
        let store = MemoryGraphStore::new();
        store.alter(&SchemaCompiler::base_statements()).unwrap();
        let compiled = SchemaCompiler::compile_schema("server", &server().attributes);
        store.alter(&compiled.statements()).unwrap();
        store
    }

    fn servers(store: &MemoryGraphStore) -> Vec<Value> {
        let query = Query::new("q").block(
            Block::named("rows", Func::eq(naming::EQUIPMENT_TYPE, "server"))
                .order_by(naming::IDENTIFIER, SortDirection::Asc)
                .select(Selection::field("id", naming::IDENTIFIER))
                .select(Selection::field("cores", "equipment.server.cores"))
                .select(Selection::field("created", naming::CREATED))
                .select(Selection::field("parent", naming::PARENT_EDGE)),
        );
        store
            .query(&query, &QueryVars::new())
            .unwrap()
            .take_rows("rows")
    }

    #[test]
    fn test_parent_key_without_parent_type() {
        let rec = record(json!({ "server_id": "S1", "cluster_id": "C1" }));
        let err = compile_upsert("s1", "server", None, &rec, now()).unwrap_err();
        assert_eq!(
            err.validation().map(|v| v.rule()),
            Some(ValidationRule::ParentKeyCountMismatch)
        );
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let store = store();
        for cores in [json!(4), json!("8")] {
            let rec = record(json!({ "server_id": "S1", "cores": cores }));
            let request = compile_upsert("s1", "server", Some("cluster"), &rec, now()).unwrap();
            store.execute(&request).unwrap();
        }

        let rows = servers(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("S1"));
        assert_eq!(rows[0]["cores"], json!(8));
        assert_eq!(rows[0]["created"], json!("2024-03-01T12:00:00Z"));
    }

    #[test]
    fn test_upsert_creates_parent_stub_once() {
        let store = store();
        for id in ["S1", "S2"] {
            let rec = record(json!({ "server_id": id, "cluster_id": "C1" }));
            let request = compile_upsert("s1", "server", Some("cluster"), &rec, now()).unwrap();
            store.execute(&request).unwrap();
        }
        // Two servers plus one cluster stub
        assert_eq!(store.node_count(), 3);
        let rows = servers(&store);
        assert_eq!(rows[0]["parent"], rows[1]["parent"]);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = store();
        let rec = record(json!({ "server_id": "S1" }));
        for scope in ["s1", "s2"] {
            let request = compile_upsert(scope, "server", None, &rec, now()).unwrap();
            store.execute(&request).unwrap();
        }
        assert_eq!(store.node_count(), 2);
    }
}
