//! Equipment instances: listings, lookups, hierarchies and upserts

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use super::lock::StructuralGuard;
use super::EquipmentRepository;
use crate::binder::{compile_upsert, Record, RecordBinder};
use crate::errors::EquipResult;
use crate::hierarchy::{Direction, HierarchyResolver, Topology, TopologyPath};
use crate::query::{EquipmentPage, QueryCompiler, QuerySpec};
use crate::schema::EquipmentTypeDefinition;
use crate::store::{GraphStore, Uid};

impl<S: GraphStore> EquipmentRepository<S> {
    /// One page of instances of `eq_type` plus the total matching count
    pub fn list_equipments(
        &self,
        eq_type: &EquipmentTypeDefinition,
        spec: &QuerySpec,
        scopes: &[String],
    ) -> EquipResult<EquipmentPage> {
        let compiled = QueryCompiler::compile_list(eq_type, spec, scopes);
        let response = self.read("list_equipments", &compiled.query, &compiled.vars)?;
        compiled.interpret(response)
    }

    /// One instance by identifier, every attribute projected
    pub fn equipment(
        &self,
        eq_type: &EquipmentTypeDefinition,
        identifier: &str,
        scopes: &[String],
    ) -> EquipResult<Value> {
        let compiled = QueryCompiler::compile_get(eq_type, identifier, scopes);
        let response = self.read("equipment", &compiled.query, &Default::default())?;
        compiled.interpret(response)
    }

    /// Parents of type `parent_type` of the instance `anchor`
    pub fn equipment_parents(
        &self,
        eq_type: &EquipmentTypeDefinition,
        parent_type: &EquipmentTypeDefinition,
        anchor: Uid,
        scopes: &[String],
    ) -> EquipResult<EquipmentPage> {
        let compiled = HierarchyResolver::compile_parents(eq_type, parent_type, anchor, scopes);
        let response = self.read("equipment_parents", &compiled.query, &compiled.vars)?;
        compiled.interpret(response)
    }

    /// One page of children of type `child_type` of the instance `anchor`
    pub fn equipment_children(
        &self,
        eq_type: &EquipmentTypeDefinition,
        child_type: &EquipmentTypeDefinition,
        anchor: Uid,
        spec: &QuerySpec,
        scopes: &[String],
    ) -> EquipResult<EquipmentPage> {
        let compiled =
            HierarchyResolver::compile_children(eq_type, child_type, anchor, spec, scopes);
        let response = self.read("equipment_children", &compiled.query, &compiled.vars)?;
        compiled.interpret(response)
    }

    /// Every instance above or below `anchor` within `depth` hops; the
    /// default depth is the number of equipment types in scope.
    pub fn equipment_hierarchy(
        &self,
        anchor: Uid,
        direction: Direction,
        depth: Option<u32>,
        scopes: &[String],
    ) -> EquipResult<EquipmentPage> {
        let depth = match depth {
            Some(depth) => depth,
            None => HierarchyResolver::default_depth(self.equipment_types(scopes)?.len()),
        };
        debug!(anchor = %anchor, direction = ?direction, depth = depth, "resolving hierarchy");
        let compiled = HierarchyResolver::compile_traversal(anchor, direction, depth, scopes);
        let response = self.read("equipment_hierarchy", &compiled.query, &compiled.vars)?;
        compiled.interpret(response)
    }

    /// Walk a fixed topology from `anchor`
    pub fn equipment_topology(
        &self,
        topology: &Topology,
        anchor: Uid,
        scopes: &[String],
    ) -> EquipResult<TopologyPath> {
        let compiled = HierarchyResolver::compile_topology(topology, anchor, scopes);
        let response = self.read("equipment_topology", &compiled.query, &Default::default())?;
        compiled.interpret(response)
    }

    /// Bind `raw` to the type `type_name` of `scope` and upsert it,
    /// creating a parent stub when the parent does not exist yet.
    pub fn upsert_equipment(
        &self,
        guard: &StructuralGuard<'_>,
        scope: &str,
        type_name: &str,
        raw: &Map<String, Value>,
    ) -> EquipResult<Record> {
        const OPERATION: &str = "upsert_equipment";
        self.lock.verify(guard, OPERATION)?;

        let eq_type = self.equipment_type_by_name(type_name, &[scope.to_string()])?;
        let record = RecordBinder::for_type(&eq_type)?.bind(raw)?;
        let request = compile_upsert(
            scope,
            &eq_type.type_name,
            eq_type.parent_type_name.as_deref(),
            &record,
            Utc::now(),
        )?;
        self.write(OPERATION, &request)?;
        debug!(
            equipment_type = %eq_type.type_name,
            identifier = %record.identifier,
            scope = %scope,
            "equipment upserted"
        );
        Ok(record)
    }
}
