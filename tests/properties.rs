//! Property Tests
//!
//! - Listing totals do not depend on offset or page size
//! - Pages never exceed the requested size or the filtered total
//! - Schema compilation is deterministic and additive

mod common;

use common::{memory_repository, scopes, seed_types, upsert_server};
use equipgraph::query::{AggregateFilter, QuerySpec, SearchPredicate, SortDirection};
use equipgraph::schema::{naming, AttributeSchema, DataType, SchemaCatalog, SchemaCompiler};
use proptest::prelude::*;

fn data_type_strategy() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::String),
        Just(DataType::Int),
        Just(DataType::Float),
    ]
}

/// Plain attributes with unique names
fn attributes_strategy() -> impl Strategy<Value = Vec<AttributeSchema>> {
    prop::collection::vec((data_type_strategy(), any::<bool>()), 0..8).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (data_type, searchable))| {
                let attr =
                    AttributeSchema::new(format!("attr {}", i), data_type, format!("col{}", i))
                        .displayed();
                if searchable {
                    attr.searchable()
                } else {
                    attr
                }
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn listing_total_independent_of_pagination(
        cores in prop::collection::vec(prop_oneof![Just(4u32), Just(8u32)], 1..10),
        offset in 0u64..12,
        page_size in 1u64..6,
    ) {
        let repo = memory_repository();
        let fixture = seed_types(&repo);
        for (i, c) in cores.iter().enumerate() {
            upsert_server(&repo, &format!("S{:02}", i), &c.to_string(), "C1");
        }
        let expected = cores.iter().filter(|c| **c == 8).count() as u64;

        let spec = QuerySpec::new(page_size)
            .with_offset(offset)
            .sorted_by("server_id", SortDirection::Asc)
            .with_filter(AggregateFilter::new().with(SearchPredicate::eq("cores", 8)));
        match repo.list_equipments(&fixture.server, &spec, &scopes()) {
            Ok(page) => {
                prop_assert_eq!(page.total, expected);
                prop_assert!(page.len() as u64 <= page_size);
                prop_assert!(page.len() as u64 <= page.total);
                prop_assert_eq!(
                    page.len() as u64,
                    page_size.min(expected.saturating_sub(offset))
                );
            }
            Err(e) => {
                prop_assert!(e.is_no_data());
                prop_assert_eq!(expected, 0);
            }
        }
    }

    #[test]
    fn schema_compilation_is_deterministic(attributes in attributes_strategy()) {
        let first = SchemaCompiler::compile_schema("server", &attributes);
        let second = SchemaCompiler::compile_schema("server", &attributes);
        prop_assert_eq!(first.render(), second.render());

        let mut catalog = SchemaCatalog::new();
        catalog.record(&first.statements());
        prop_assert!(catalog.missing(&second.statements()).is_empty());
    }

    #[test]
    fn schema_compilation_is_additive(attributes in attributes_strategy(), cut in 0usize..8) {
        let cut = cut.min(attributes.len());
        let before = SchemaCompiler::compile_schema("server", &attributes[..cut]);
        let after = SchemaCompiler::compile_schema("server", &attributes);
        let added: Vec<String> = attributes[cut..]
            .iter()
            .map(|a| naming::attribute_predicate("server", &a.name))
            .collect();

        // Earlier predicates are untouched; exactly the new ones follow
        prop_assert_eq!(&after.predicates[..before.predicates.len()], &before.predicates[..]);
        let tail: Vec<String> = after.predicates[before.predicates.len()..]
            .iter()
            .map(|p| p.predicate.clone())
            .collect();
        prop_assert_eq!(&tail, &added);

        let mut fields = before.type_declaration.fields.clone();
        fields.extend(added.iter().cloned());
        prop_assert_eq!(&after.type_declaration.fields, &fields);
        prop_assert_eq!(&after.type_declaration.name, &before.type_declaration.name);

        // Only the new predicates and, when it grew, the type declaration
        // remain to be applied
        let mut catalog = SchemaCatalog::new();
        catalog.record(&before.statements());
        let missing: Vec<String> = catalog
            .missing(&after.statements())
            .iter()
            .map(|s| s.key())
            .collect();
        let mut expected = added.clone();
        if !added.is_empty() {
            expected.push("type Equipmentserver".to_string());
        }
        prop_assert_eq!(missing, expected);
    }
}
