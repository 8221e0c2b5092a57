//! Equipment type lifecycle
//!
//! A type node carries `metadata.equipment.*` predicates and one attribute
//! node per attribute. Creation and attribute additions write the metadata
//! first, then alter the storage schema with the compiled statements.

use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use super::lock::StructuralGuard;
use super::rows::{parse_rows, type_projection, TypeRow};
use super::EquipmentRepository;
use crate::errors::{EquipError, EquipResult};
use crate::hierarchy::{Direction, HierarchyResolver};
use crate::query::ast::{Block, Filter, Func, Query, QueryVars, SortDirection};
use crate::query::{QueryCompiler, COUNT_BLOCK, ID_ALIAS, TOTAL_ALIAS};
use crate::schema::naming;
use crate::schema::validator::{
    validate_deletion, validate_parent_change, validate_source_unused,
    validate_type_name_available,
};
use crate::schema::{AttributeSchema, EquipmentTypeDefinition, SchemaCompiler, SchemaValidator};
use crate::store::{GraphStore, Mutation, MutationResponse, NQuad, Request, Subject, Uid};

const TYPES_BLOCK: &str = "EqTypes";

fn blank_label(kind: &str) -> String {
    format!("{}-{}", kind, Uuid::new_v4().simple())
}

fn parse_uid(id: &str, what: &str) -> EquipResult<Uid> {
    id.parse()
        .map_err(|_| EquipError::not_found(format!("{} {}", what, id)))
}

/// Quads describing one attribute node linked from `owner`
fn attribute_quads(
    mutation: Mutation,
    owner: &Subject,
    attr: &AttributeSchema,
    label: &str,
) -> Mutation {
    let node = || Subject::Blank(label.to_string());
    mutation
        .set(NQuad::edge(owner.clone(), naming::META_EQUIPMENT_ATTRIBUTE, node()))
        .set(NQuad::value(node(), naming::NODE_TYPE, naming::ATTRIBUTE_NODE_TYPE))
        .set(NQuad::value(node(), naming::ATTR_NAME, attr.name.as_str()))
        .set(NQuad::value(node(), naming::ATTR_TYPE, attr.data_type.code()))
        .set(NQuad::value(node(), naming::ATTR_SCHEMA_NAME, naming::sanitize(&attr.name)))
        .set(NQuad::value(node(), naming::ATTR_SEARCHABLE, attr.is_searchable))
        .set(NQuad::value(node(), naming::ATTR_DISPLAYED, attr.is_displayed))
        .set(NQuad::value(node(), naming::ATTR_IDENTIFIER, attr.is_identifier))
        .set(NQuad::value(
            node(),
            naming::ATTR_PARENT_IDENTIFIER,
            attr.is_parent_identifier,
        ))
        .set(NQuad::value(node(), naming::ATTR_MAPPED_TO, attr.mapped_to.as_str()))
}

/// Add attribute nodes to `owner`, returning the mutation and one blank
/// label per attribute
fn with_attributes(
    mut mutation: Mutation,
    owner: &Subject,
    attributes: &[AttributeSchema],
) -> (Mutation, Vec<String>) {
    let mut labels = Vec::with_capacity(attributes.len());
    for attr in attributes {
        let label = blank_label("attr");
        mutation = attribute_quads(mutation, owner, attr, &label);
        labels.push(label);
    }
    (mutation, labels)
}

fn assign_attribute_ids(
    response: &MutationResponse,
    attributes: &mut [AttributeSchema],
    labels: &[String],
) -> EquipResult<()> {
    for (attr, label) in attributes.iter_mut().zip(labels) {
        let uid = response.assigned(label).ok_or_else(|| {
            EquipError::internal(
                "assign attribute ids",
                format!("no uid for attribute {}", attr.name),
            )
        })?;
        attr.id = uid.to_string();
    }
    Ok(())
}

impl<S: GraphStore> EquipmentRepository<S> {
    /// Every equipment type in scope, ordered by name
    pub fn equipment_types(
        &self,
        scopes: &[String],
    ) -> EquipResult<Vec<EquipmentTypeDefinition>> {
        let block = Block::named(TYPES_BLOCK, Func::Has(naming::META_EQUIPMENT_TYPE.to_string()))
            .with_filter(Some(QueryCompiler::scope_filter(scopes)))
            .order_by(naming::META_EQUIPMENT_TYPE, SortDirection::Asc);
        self.load_types("equipment_types", block)
    }

    pub fn equipment_type_by_name(
        &self,
        type_name: &str,
        scopes: &[String],
    ) -> EquipResult<EquipmentTypeDefinition> {
        let block = Block::named(TYPES_BLOCK, Func::eq(naming::META_EQUIPMENT_TYPE, type_name))
            .with_filter(Some(QueryCompiler::scope_filter(scopes)));
        self.load_types("equipment_type_by_name", block)?
            .into_iter()
            .next()
            .ok_or_else(|| EquipError::not_found(format!("equipment type {}", type_name)))
    }

    pub fn equipment_type_by_id(
        &self,
        id: &str,
        scopes: &[String],
    ) -> EquipResult<EquipmentTypeDefinition> {
        let uid = parse_uid(id, "equipment type")?;
        let block = Block::named(TYPES_BLOCK, Func::uid(uid)).with_filter(Some(Filter::And(vec![
            Filter::Has(naming::META_EQUIPMENT_TYPE.to_string()),
            QueryCompiler::scope_filter(scopes),
        ])));
        self.load_types("equipment_type_by_id", block)?
            .into_iter()
            .next()
            .ok_or_else(|| EquipError::not_found(format!("equipment type {}", id)))
    }

    /// Types below `type_id`, up to `depth` levels (default: one level per
    /// type in scope)
    pub fn equipment_type_children(
        &self,
        type_id: &str,
        depth: Option<u32>,
        scopes: &[String],
    ) -> EquipResult<Vec<EquipmentTypeDefinition>> {
        let uid = parse_uid(type_id.trim(), "equipment type")?;
        let all = self.equipment_types(scopes)?;
        let depth = depth.unwrap_or_else(|| HierarchyResolver::default_depth(all.len()));
        let compiled =
            HierarchyResolver::compile_type_traversal(uid, Direction::Descendants, depth, scopes);
        let response = self.read("equipment_type_children", &compiled.query, &compiled.vars)?;
        let page = compiled.interpret(response)?;
        let ids: HashSet<String> = page
            .rows
            .iter()
            .filter_map(|row| row.get(ID_ALIAS).and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();
        Ok(all.into_iter().filter(|t| ids.contains(&t.id)).collect())
    }

    /// Whether instances of the type exist in scope
    pub fn has_instances(&self, type_name: &str, scopes: &[String]) -> EquipResult<bool> {
        let query = QueryCompiler::compile_instance_count(type_name, scopes);
        let response = self.read("has_instances", &query, &QueryVars::new())?;
        Ok(response.count(COUNT_BLOCK, TOTAL_ALIAS) > 0)
    }

    /// Validate and persist a new type, then declare its predicates.
    ///
    /// The returned definition carries the allocated type and attribute ids.
    pub fn create_equipment_type(
        &self,
        guard: &StructuralGuard<'_>,
        definition: EquipmentTypeDefinition,
    ) -> EquipResult<EquipmentTypeDefinition> {
        const OPERATION: &str = "create_equipment_type";
        self.lock.verify(guard, OPERATION)?;

        let scopes: Vec<String> = definition.scopes.iter().cloned().collect();
        let source = self.metadata_with_id(&definition.source_id, &scopes)?;
        let existing = self.equipment_types(&scopes)?;
        validate_type_name_available(&existing, &definition.type_name)?;
        validate_source_unused(&existing, &definition.source_id)?;
        SchemaValidator::new(&source.available_columns).validate_creation(&existing, &definition)?;

        let mut definition = definition;
        definition.source_name = source.source_name.clone();
        definition.parent_type_name = definition.parent().and_then(|parent_id| {
            existing
                .iter()
                .find(|t| t.id == parent_id)
                .map(|t| t.type_name.clone())
        });

        let type_label = blank_label("type");
        let owner = Subject::Blank(type_label.clone());
        let mut mutation = Mutation::new()
            .set(NQuad::value(
                owner.clone(),
                naming::META_EQUIPMENT_TYPE,
                definition.type_name.as_str(),
            ))
            .set(NQuad::value(
                owner.clone(),
                naming::NODE_TYPE,
                naming::METADATA_EQUIPMENT_NODE_TYPE,
            ))
            .set(NQuad::edge(
                owner.clone(),
                naming::META_EQUIPMENT_SOURCE,
                Subject::Node(parse_uid(&definition.source_id, "metadata source")?),
            ));
        if let Some(parent_id) = definition.parent() {
            mutation = mutation.set(NQuad::edge(
                owner.clone(),
                naming::META_EQUIPMENT_PARENT,
                Subject::Node(parse_uid(parent_id, "equipment type")?),
            ));
        }
        for scope in &definition.scopes {
            mutation = mutation.set(NQuad::value(owner.clone(), naming::SCOPES, scope.as_str()));
        }
        let (mutation, labels) = with_attributes(mutation, &owner, &definition.attributes);

        // Schema first: a failed alter must leave no type metadata behind
        let compiled =
            SchemaCompiler::compile_schema(&definition.type_name, &definition.attributes);
        self.store
            .alter(&compiled.statements())
            .map_err(|e| EquipError::store(OPERATION, e))?;

        let response = self.write(OPERATION, &Request::new().mutate(mutation))?;
        definition.id = response
            .assigned(&type_label)
            .ok_or_else(|| EquipError::internal(OPERATION, "no uid assigned to equipment type"))?
            .to_string();
        assign_attribute_ids(&response, &mut definition.attributes, &labels)?;

        info!(
            equipment_type = %definition.type_name,
            id = %definition.id,
            attributes = definition.attributes.len(),
            "equipment type created"
        );
        Ok(definition)
    }

    /// Add attributes to a type and optionally set its parent.
    ///
    /// Existing attributes are never modified. Re-parenting follows the
    /// forest rules and is refused once an already-parented type has
    /// instances.
    pub fn update_equipment_type(
        &self,
        guard: &StructuralGuard<'_>,
        type_id: &str,
        parent_id: Option<&str>,
        new_attributes: Vec<AttributeSchema>,
        scopes: &[String],
    ) -> EquipResult<EquipmentTypeDefinition> {
        const OPERATION: &str = "update_equipment_type";
        self.lock.verify(guard, OPERATION)?;

        let existing = self.equipment_type_by_id(type_id, scopes)?;
        let parent_id = parent_id.filter(|p| !p.is_empty());
        let source_scopes: Vec<String> = existing.scopes.iter().cloned().collect();
        let source = self.metadata_with_id(&existing.source_id, &source_scopes)?;

        let parent_change = parent_id.filter(|p| existing.parent() != Some(*p));
        if let Some(new_parent) = parent_change {
            let all = self.equipment_types(scopes)?;
            let descendants: HashSet<String> =
                match self.equipment_type_children(&existing.id, None, scopes) {
                    Ok(children) => children.into_iter().map(|t| t.id).collect(),
                    Err(e) if e.is_no_data() => HashSet::new(),
                    Err(e) => return Err(e),
                };
            let has_instances = self.has_instances(&existing.type_name, scopes)?;
            validate_parent_change(&existing, new_parent, &all, &descendants, has_instances)?;
        }
        SchemaValidator::new(&source.available_columns).validate_update(
            &existing,
            parent_id,
            &new_attributes,
        )?;

        let owner = Subject::Node(parse_uid(&existing.id, "equipment type")?);
        let mut mutation = Mutation::new();
        if let Some(new_parent) = parent_change {
            mutation = mutation.set(NQuad::edge(
                owner.clone(),
                naming::META_EQUIPMENT_PARENT,
                Subject::Node(parse_uid(new_parent, "equipment type")?),
            ));
        }
        for scope in scopes {
            mutation = mutation.set(NQuad::value(owner.clone(), naming::SCOPES, scope.as_str()));
        }
        let mut attributes = existing.attributes.clone();
        attributes.extend(new_attributes.iter().cloned());
        let compiled = SchemaCompiler::compile_schema(&existing.type_name, &attributes);
        self.store
            .alter(&compiled.statements())
            .map_err(|e| EquipError::store(OPERATION, e))?;

        let mut new_attributes = new_attributes;
        let (mutation, labels) = with_attributes(mutation, &owner, &new_attributes);
        let response = self.write(OPERATION, &Request::new().mutate(mutation))?;
        assign_attribute_ids(&response, &mut new_attributes, &labels)?;

        info!(
            equipment_type = %existing.type_name,
            added = new_attributes.len(),
            parent = ?parent_change,
            "equipment type updated"
        );
        self.equipment_type_by_id(&existing.id, scopes)
    }

    /// Soft-delete a type that has neither child types nor instances
    pub fn delete_equipment_type(
        &self,
        guard: &StructuralGuard<'_>,
        type_name: &str,
        scope: &str,
    ) -> EquipResult<()> {
        const OPERATION: &str = "delete_equipment_type";
        self.lock.verify(guard, OPERATION)?;

        let scopes = vec![scope.to_string()];
        let existing = self.equipment_type_by_name(type_name, &scopes)?;
        let has_children = self
            .equipment_types(&scopes)?
            .iter()
            .any(|t| t.parent() == Some(existing.id.as_str()));
        let has_instances = self.has_instances(type_name, &scopes)?;
        validate_deletion(&existing, has_children, has_instances)?;

        let node = Subject::Node(parse_uid(&existing.id, "equipment type")?);
        let request = Request::new().mutate(
            Mutation::new()
                .delete(NQuad::clear_all(node.clone()))
                .set(NQuad::value(node, naming::RECYCLE, "true")),
        );
        self.write(OPERATION, &request)?;
        info!(equipment_type = %type_name, scope = %scope, "equipment type deleted");
        Ok(())
    }

    fn load_types(
        &self,
        operation: &str,
        block: Block,
    ) -> EquipResult<Vec<EquipmentTypeDefinition>> {
        let mut block = block;
        for selection in type_projection() {
            block = block.select(selection);
        }
        let query = Query::new(TYPES_BLOCK).block(block);
        let mut response = self.read(operation, &query, &QueryVars::new())?;
        let rows: Vec<TypeRow> = parse_rows(response.take_rows(TYPES_BLOCK))?;
        rows.into_iter().map(TypeRow::into_definition).collect()
    }
}
