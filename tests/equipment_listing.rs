//! Equipment Listing Tests
//!
//! End-to-end listings against the in-memory store:
//! - Filtered counts are independent of pagination
//! - Rows come back in a stable order
//! - Unusable sort keys fall back to the identifier
//! - Empty filtered sets are reported as NoData
//! - Product, application and instance links narrow the page and the total

mod common;

use common::{memory_repository, row_uid, scopes, seed_servers, seed_types, Fixture, SCOPE};
use equipgraph::query::{AggregateFilter, FilterOperator, QuerySpec, SearchPredicate, SortDirection};
use equipgraph::schema::naming;
use equipgraph::store::{GraphStore, MemoryGraphStore, Mutation, NQuad, Request, Subject};
use equipgraph::EquipmentRepository;
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

/// Links seeded servers to related entities:
/// - product `oracle-db` covers S1 and S2
/// - instance `inst-1` runs on S2 and S3 and belongs to application `app-1`
/// - a product `oracle-db` of another scope covers S3
fn link_related(repo: &EquipmentRepository<MemoryGraphStore>, fixture: &Fixture) {
    let uid = |id: &str| {
        let row = repo.equipment(&fixture.server, id, &scopes()).unwrap();
        Subject::Node(row_uid(&row))
    };
    let node = |label: &str| Subject::Blank(label.to_string());

    let mutation = Mutation::new()
        .set(NQuad::value(node("product"), naming::PRODUCT_SWIDTAG, "oracle-db"))
        .set(NQuad::value(node("product"), naming::SCOPES, SCOPE))
        .set(NQuad::edge(node("product"), naming::PRODUCT_EQUIPMENT, uid("S1")))
        .set(NQuad::edge(node("product"), naming::PRODUCT_EQUIPMENT, uid("S2")))
        .set(NQuad::value(node("foreign"), naming::PRODUCT_SWIDTAG, "oracle-db"))
        .set(NQuad::value(node("foreign"), naming::SCOPES, "scope2"))
        .set(NQuad::edge(node("foreign"), naming::PRODUCT_EQUIPMENT, uid("S3")))
        .set(NQuad::value(node("instance"), naming::INSTANCE_ID, "inst-1"))
        .set(NQuad::value(node("instance"), naming::SCOPES, SCOPE))
        .set(NQuad::edge(node("instance"), naming::INSTANCE_EQUIPMENT, uid("S2")))
        .set(NQuad::edge(node("instance"), naming::INSTANCE_EQUIPMENT, uid("S3")))
        .set(NQuad::value(node("application"), naming::APPLICATION_ID, "app-1"))
        .set(NQuad::value(node("application"), naming::SCOPES, SCOPE))
        .set(NQuad::edge(node("application"), naming::APPLICATION_INSTANCE, node("instance")));
    repo.store().execute(&Request::new().mutate(mutation)).unwrap();
}

// =============================================================================
// Filtered Listings
// =============================================================================

/// Filtering servers on cores = 8 finds S2 and S3 out of three.
#[test]
fn test_filtered_listing_counts_matches() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let spec = QuerySpec::new(10)
        .sorted_by("server_id", SortDirection::Asc)
        .with_filter(AggregateFilter::new().with(SearchPredicate::eq("cores", 8)));
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.column("server_id"), vec![&json!("S2"), &json!("S3")]);
    assert_eq!(page.column("cores"), vec![&json!(8), &json!(8)]);
}

/// Two-row page sorted by cores descending; equal cores keep ingestion order.
#[test]
fn test_sorted_filtered_page() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let spec = QuerySpec::new(2)
        .sorted_by("cores", SortDirection::Desc)
        .with_filter(AggregateFilter::new().with(SearchPredicate::eq("cores", 8)));
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.len(), 2);
    assert_eq!(page.column("server_id"), vec![&json!("S2"), &json!("S3")]);
}

/// The total stays the full filtered count when the page is smaller.
#[test]
fn test_total_independent_of_page() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let spec = QuerySpec::new(1)
        .with_offset(1)
        .sorted_by("server_id", SortDirection::Asc);
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.column("server_id"), vec![&json!("S2")]);
}

/// String identifiers match by prefix under the regex operator.
#[test]
fn test_identifier_prefix_filter() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);
    common::upsert_server(&repo, "X9", "4", "C1");

    let spec = QuerySpec::new(10)
        .with_filter(AggregateFilter::new().with(SearchPredicate::regex("server_id", "S")));
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 3);
}

/// Any-of values on a numeric attribute are alternatives.
#[test]
fn test_any_of_filter() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let spec = QuerySpec::new(10).with_filter(AggregateFilter::new().with(
        SearchPredicate::any_of("cores", FilterOperator::Eq, vec![json!(4), json!(8)]),
    ));
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 3);
}

/// Filters on unknown attributes are dropped rather than failing.
#[test]
fn test_unknown_filter_key_dropped() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let spec = QuerySpec::new(10)
        .with_filter(AggregateFilter::new().with(SearchPredicate::eq("no_such_attribute", "x")));
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 3);
}

/// A filter nothing satisfies is NoData, not an empty page.
#[test]
fn test_empty_filter_is_no_data() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let spec =
        QuerySpec::new(10).with_filter(AggregateFilter::new().with(SearchPredicate::eq("cores", 64)));
    let err = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap_err();

    assert!(err.is_no_data());
    assert_eq!(err.code(), "EQP_NO_DATA");
}

/// Other scopes never see this scope's instances.
#[test]
fn test_listing_is_scoped() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let err = repo
        .list_equipments(&fixture.server, &QuerySpec::new(10), &["other".to_string()])
        .unwrap_err();
    assert!(err.is_no_data());
}

// =============================================================================
// Related Entities
// =============================================================================

/// Only this scope's product counts: S1 and S2.
#[test]
fn test_product_filter() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);
    link_related(&repo, &fixture);

    let spec = QuerySpec::new(10)
        .sorted_by("server_id", SortDirection::Asc)
        .with_product("oracle-db");
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.column("server_id"), vec![&json!("S1"), &json!("S2")]);
}

/// Applications reach equipment through their instances.
#[test]
fn test_application_filter() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);
    link_related(&repo, &fixture);

    let spec = QuerySpec::new(1)
        .sorted_by("server_id", SortDirection::Asc)
        .with_application("app-1");
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.column("server_id"), vec![&json!("S2")]);
}

/// Related filters intersect with each other and with attribute filters.
#[test]
fn test_related_filters_intersect() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);
    link_related(&repo, &fixture);

    let spec = QuerySpec::new(10)
        .with_product("oracle-db")
        .with_instance("inst-1");
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.column("server_id"), vec![&json!("S2")]);

    let spec = QuerySpec::new(10)
        .with_instance("inst-1")
        .with_filter(AggregateFilter::new().with(SearchPredicate::eq("cores", 4)));
    let err = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap_err();
    assert!(err.is_no_data());
}

#[test]
fn test_unknown_product_is_no_data() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);
    link_related(&repo, &fixture);

    let spec = QuerySpec::new(10).with_product("postgres");
    let err = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap_err();
    assert!(err.is_no_data());
}

// =============================================================================
// Sorting
// =============================================================================

/// Descending on a displayed attribute; ties keep insertion order.
#[test]
fn test_sort_descending_with_ties() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let spec = QuerySpec::new(10).sorted_by("cores", SortDirection::Desc);
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(
        page.column("server_id"),
        vec![&json!("S2"), &json!("S3"), &json!("S1")]
    );
}

/// Sorting on the parent identifier falls back to the identifier.
#[test]
fn test_sort_fallback_on_parent_identifier() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    common::upsert_server(&repo, "S3", "8", "C1");
    common::upsert_server(&repo, "S1", "4", "C1");
    common::upsert_server(&repo, "S2", "8", "C1");

    let spec = QuerySpec::new(10).sorted_by("cluster", SortDirection::Asc);
    let page = repo.list_equipments(&fixture.server, &spec, &scopes()).unwrap();

    assert_eq!(
        page.column("server_id"),
        vec![&json!("S1"), &json!("S2"), &json!("S3")]
    );
}

// =============================================================================
// Single Instance
// =============================================================================

/// A lookup projects every attribute and the parent link.
#[test]
fn test_get_equipment() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let row = repo.equipment(&fixture.server, "S2", &scopes()).unwrap();
    assert_eq!(row["server_id"], "S2");
    assert_eq!(row["cores"], 8);
    assert_eq!(row["cluster"][0]["EquipID"], "C1");
}

#[test]
fn test_get_missing_equipment() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);

    let err = repo.equipment(&fixture.server, "S404", &scopes()).unwrap_err();
    assert!(err.is_not_found());
}

/// Re-ingesting an instance updates it in place.
#[test]
fn test_upsert_updates_in_place() {
    let repo = memory_repository();
    let fixture = seed_types(&repo);
    seed_servers(&repo);
    common::upsert_server(&repo, "S1", "16", "C1");

    let page = repo
        .list_equipments(&fixture.server, &QuerySpec::new(10), &scopes())
        .unwrap();
    assert_eq!(page.total, 3);

    let row = repo.equipment(&fixture.server, "S1", &scopes()).unwrap();
    assert_eq!(row["cores"], 16);
}
