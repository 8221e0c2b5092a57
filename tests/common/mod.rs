//! Shared fixtures: a bootstrapped in-memory repository seeded with a
//! `cluster` type and a `server` type parented to it.

#![allow(dead_code)]

use std::time::Duration;

use equipgraph::schema::{AttributeSchema, DataType, EquipmentTypeDefinition, MetadataSource};
use equipgraph::store::{GraphStore, MemoryGraphStore, Uid};
use equipgraph::{DeletionConfig, EquipmentRepository};
use serde_json::{json, Map, Value};

pub const SCOPE: &str = "scope1";

pub fn scopes() -> Vec<String> {
    vec![SCOPE.to_string()]
}

/// Deletion settings that never sleep between retries
pub fn fast_config() -> DeletionConfig {
    DeletionConfig::default().with_retry_backoff(Duration::ZERO)
}

pub fn memory_repository() -> EquipmentRepository<MemoryGraphStore> {
    let repo = EquipmentRepository::with_config(MemoryGraphStore::new(), fast_config());
    repo.bootstrap().unwrap();
    repo
}

pub struct Fixture {
    pub cluster: EquipmentTypeDefinition,
    pub server: EquipmentTypeDefinition,
}

pub fn seed_types<S: GraphStore>(repo: &EquipmentRepository<S>) -> Fixture {
    let cluster_source = repo
        .upsert_metadata(&MetadataSource::equipment("clusters.csv", SCOPE).with_columns(["id", "name"]))
        .unwrap();
    let server_source = repo
        .upsert_metadata(
            &MetadataSource::equipment("servers.csv", SCOPE)
                .with_columns(["id", "cores", "cluster", "model", "serial"]),
        )
        .unwrap();

    let guard = repo.lock().acquire();
    let cluster = repo
        .create_equipment_type(
            &guard,
            EquipmentTypeDefinition::new("cluster", cluster_source.id)
                .with_scope(SCOPE)
                .with_attribute(AttributeSchema::identifier("cluster_id", "id"))
                .with_attribute(AttributeSchema::new("name", DataType::String, "name").displayed()),
        )
        .unwrap();
    let server = repo
        .create_equipment_type(
            &guard,
            EquipmentTypeDefinition::new("server", server_source.id)
                .with_scope(SCOPE)
                .with_parent(cluster.id.clone())
                .with_attribute(AttributeSchema::identifier("server_id", "id"))
                .with_attribute(AttributeSchema::parent_identifier("cluster", "cluster"))
                .with_attribute(
                    AttributeSchema::new("cores", DataType::Int, "cores")
                        .searchable()
                        .displayed(),
                ),
        )
        .unwrap();
    Fixture { cluster, server }
}

pub fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

pub fn upsert_server<S: GraphStore>(
    repo: &EquipmentRepository<S>,
    id: &str,
    cores: &str,
    cluster: &str,
) {
    let guard = repo.lock().acquire();
    repo.upsert_equipment(
        &guard,
        SCOPE,
        "server",
        &payload(json!({ "id": id, "cores": cores, "cluster": cluster })),
    )
    .unwrap();
}

/// Servers S1 (4 cores), S2 and S3 (8 cores), all in cluster C1
pub fn seed_servers<S: GraphStore>(repo: &EquipmentRepository<S>) {
    upsert_server(repo, "S1", "4", "C1");
    upsert_server(repo, "S2", "8", "C1");
    upsert_server(repo, "S3", "8", "C1");
}

pub fn row_uid(row: &Value) -> Uid {
    row["ID"].as_str().unwrap().parse().unwrap()
}
