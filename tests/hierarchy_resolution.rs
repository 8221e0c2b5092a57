//! Hierarchy Resolution Tests
//!
//! Parent and child lookups, bounded traversals and fixed topologies:
//! - A missing anchor is NotFound
//! - An existing anchor with nothing reachable is NoData
//! - Parent stubs created by ingestion are traversable

mod common;

use common::{memory_repository, row_uid, scopes, seed_servers, seed_types, upsert_server, SCOPE};
use equipgraph::hierarchy::{Direction, Topology};
use equipgraph::query::{AggregateFilter, QuerySpec, SearchPredicate, SortDirection};
use equipgraph::schema::{AttributeSchema, DataType, EquipmentTypeDefinition, MetadataSource};
use equipgraph::store::Uid;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn server_uid(
    repo: &equipgraph::EquipmentRepository<equipgraph::store::MemoryGraphStore>,
    fixture: &common::Fixture,
    id: &str,
) -> Uid {
    let row = repo.equipment(&fixture.server, id, &scopes()).unwrap();
    row_uid(&row)
}

fn cluster_uid(
    repo: &equipgraph::EquipmentRepository<equipgraph::store::MemoryGraphStore>,
    fixture: &common::Fixture,
) -> Uid {
    let anchor = server_uid(repo, fixture, "S1");
    let ancestors = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &scopes())
        .unwrap();
    row_uid(&ancestors.rows[0])
}

// =============================================================================
// Traversals
// =============================================================================

/// Ingestion links each server to the cluster stub it names.
#[test]
fn test_ancestors_reach_parent_stub() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let anchor = server_uid(&repo, &fixture, "S1");
    let page = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &scopes())
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0]["EquipID"], "C1");
    assert_eq!(page.rows[0]["Type"], "cluster");
}

/// Every server sharing a cluster is below it.
#[test]
fn test_descendants_of_cluster() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let anchor = server_uid(&repo, &fixture, "S1");
    let ancestors = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &scopes())
        .unwrap();
    let cluster = row_uid(&ancestors.rows[0]);

    let page = repo
        .equipment_hierarchy(cluster, Direction::Descendants, Some(1), &scopes())
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(
        page.column("EquipID"),
        vec![&json!("S1"), &json!("S2"), &json!("S3")]
    );
}

/// A root has no ancestors: NoData.
#[test]
fn test_root_ancestors_no_data() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let anchor = server_uid(&repo, &fixture, "S1");
    let ancestors = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &scopes())
        .unwrap();
    let cluster = row_uid(&ancestors.rows[0]);

    let err = repo
        .equipment_hierarchy(cluster, Direction::Ancestors, None, &scopes())
        .unwrap_err();
    assert!(err.is_no_data());
}

/// An anchor that does not exist is NotFound.
#[test]
fn test_missing_anchor_not_found() {
    let repo = memory_repository();
    seed_types(&repo);
    seed_servers(&repo);

    let err = repo
        .equipment_hierarchy(Uid(0xdead), Direction::Descendants, None, &scopes())
        .unwrap_err();
    assert!(err.is_not_found());
}

/// An anchor outside the requested scopes is NotFound.
#[test]
fn test_anchor_out_of_scope_not_found() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let anchor = server_uid(&repo, &fixture, "S1");
    let err = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &["other".to_string()])
        .unwrap_err();
    assert!(err.is_not_found());
}

// =============================================================================
// Parents and Children
// =============================================================================

#[test]
fn test_parents_of_server() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let anchor = server_uid(&repo, &fixture, "S2");
    let page = repo
        .equipment_parents(&fixture.server, &fixture.cluster, anchor, &scopes())
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.column("cluster_id"), vec![&json!("C1")]);
}

/// Children are paginated; the total counts every child.
#[test]
fn test_children_paginated() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let anchor = server_uid(&repo, &fixture, "S1");
    let ancestors = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &scopes())
        .unwrap();
    let cluster = row_uid(&ancestors.rows[0]);

    let spec = QuerySpec::new(2).sorted_by("server_id", SortDirection::Desc);
    let page = repo
        .equipment_children(&fixture.cluster, &fixture.server, cluster, &spec, &scopes())
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.column("server_id"), vec![&json!("S3"), &json!("S2")]);
}

/// Children filters compare numbers with greater-or-equal.
#[test]
fn test_children_numeric_filter_is_lower_bound() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);
    let cluster = cluster_uid(&repo, &fixture);

    let spec = QuerySpec::new(10)
        .sorted_by("server_id", SortDirection::Asc)
        .with_filter(AggregateFilter::new().with(SearchPredicate::eq("cores", 5)));
    let page = repo
        .equipment_children(&fixture.cluster, &fixture.server, cluster, &spec, &scopes())
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.column("server_id"), vec![&json!("S2"), &json!("S3")]);

    let spec = QuerySpec::new(10)
        .with_filter(AggregateFilter::new().with(SearchPredicate::eq("cores", 9)));
    let err = repo
        .equipment_children(&fixture.cluster, &fixture.server, cluster, &spec, &scopes())
        .unwrap_err();
    assert!(err.is_no_data());
}

/// Children filters ignore attributes that are not searchable.
#[test]
fn test_children_filter_skips_unsearchable_attribute() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    let guard = repo.lock().acquire();
    let server = repo
        .update_equipment_type(
            &guard,
            &fixture.server.id,
            None,
            vec![AttributeSchema::new("model", DataType::String, "model").displayed()],
            &scopes(),
        )
        .unwrap();
    drop(guard);
    seed_servers(&repo);
    let cluster = cluster_uid(&repo, &fixture);

    let spec = QuerySpec::new(10)
        .with_filter(AggregateFilter::new().with(SearchPredicate::eq("model", "no-such-model")));
    let page = repo
        .equipment_children(&fixture.cluster, &server, cluster, &spec, &scopes())
        .unwrap();
    assert_eq!(page.total, 3);
}

/// A childless instance has no children: NoData.
#[test]
fn test_childless_anchor_no_data() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    upsert_server(&repo, "S1", "4", "C1");
    upsert_server(&repo, "S2", "4", "C2");

    let anchor = server_uid(&repo, &fixture, "S1");
    let ancestors = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &scopes())
        .unwrap();
    assert_eq!(ancestors.total, 1);

    let err = repo
        .equipment_children(
            &fixture.server,
            &fixture.server,
            anchor,
            &QuerySpec::new(10),
            &scopes(),
        )
        .unwrap_err();
    assert!(err.is_no_data());
}

// =============================================================================
// Topologies
// =============================================================================

/// A two-level topology from cluster down to servers.
#[test]
fn test_topology_walk() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let anchor = server_uid(&repo, &fixture, "S1");
    let ancestors = repo
        .equipment_hierarchy(anchor, Direction::Ancestors, None, &scopes())
        .unwrap();
    let cluster = row_uid(&ancestors.rows[0]);

    let topology = Topology::new(
        "compute",
        vec!["cluster".to_string(), "server".to_string()],
        Direction::Descendants,
    )
    .unwrap();
    let path = repo.equipment_topology(&topology, cluster, &scopes()).unwrap();

    assert_eq!(path.levels.len(), 1);
    assert_eq!(path.levels[0].type_name, "server");
    assert_eq!(path.levels[0].rows.len(), 3);
}

#[test]
fn test_topology_missing_anchor() {
    let repo = memory_repository();
    seed_types(&repo);

    let topology = Topology::virtualization();
    let err = repo
        .equipment_topology(&topology, Uid(0xbeef), &scopes())
        .unwrap_err();
    assert!(err.is_not_found());
}

// =============================================================================
// Type Hierarchy
// =============================================================================

/// Descendant types are found through the type metadata.
#[test]
fn test_type_children() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);

    let vm_source = repo
        .upsert_metadata(&MetadataSource::equipment("vms.csv", SCOPE).with_columns(["id", "host"]))
        .unwrap();
    let guard = repo.lock().acquire();
    repo.create_equipment_type(
        &guard,
        EquipmentTypeDefinition::new("vm", vm_source.id)
            .with_scope(SCOPE)
            .with_parent(fixture.server.id.clone())
            .with_attribute(AttributeSchema::identifier("vm_id", "id"))
            .with_attribute(AttributeSchema::parent_identifier("host", "host")),
    )
    .unwrap();
    drop(guard);

    let children = repo
        .equipment_type_children(&fixture.cluster.id, None, &scopes())
        .unwrap();
    let names: Vec<&str> = children.iter().map(|t| t.type_name.as_str()).collect();
    assert_eq!(names, vec!["server", "vm"]);

    let direct = repo
        .equipment_type_children(&fixture.cluster.id, Some(1), &scopes())
        .unwrap();
    assert_eq!(direct.len(), 1);
}
