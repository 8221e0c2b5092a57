//! Metadata sources

use tracing::info;

use super::rows::{metadata_projection, parse_rows, MetadataRow};
use super::EquipmentRepository;
use crate::errors::{EquipError, EquipResult};
use crate::query::ast::{Block, Filter, Func, Query, QueryVars, SortDirection};
use crate::query::QueryCompiler;
use crate::schema::naming;
use crate::schema::{MetadataSource, MetadataType};
use crate::store::{GraphStore, Mutation, NQuad, Request, Subject, Uid};

const METADATA_VAR: &str = "metadata";
const METADATA_BLOCK: &str = "Metadatas";

impl<S: GraphStore> EquipmentRepository<S> {
    /// Create or extend a metadata source, keyed by source name within its
    /// scope. Columns accumulate across upserts.
    pub fn upsert_metadata(&self, source: &MetadataSource) -> EquipResult<MetadataSource> {
        const OPERATION: &str = "upsert_metadata";
        let scopes = vec![source.scope.clone()];
        let lookup = Block::var(Func::eq(naming::METADATA_SOURCE, source.source_name.as_str()))
            .bind_as(METADATA_VAR)
            .with_filter(Some(Filter::And(vec![
                Filter::eq(naming::TYPE_NAME, naming::METADATA_MARKER),
                QueryCompiler::scope_filter(&scopes),
            ])));

        let node = || Subject::Var(METADATA_VAR.to_string());
        let mut mutation = Mutation::new()
            .set(NQuad::value(node(), naming::TYPE_NAME, naming::METADATA_MARKER))
            .set(NQuad::value(node(), naming::NODE_TYPE, naming::METADATA_NODE_TYPE))
            .set(NQuad::value(node(), naming::METADATA_SOURCE, source.source_name.as_str()))
            .set(NQuad::value(node(), naming::METADATA_TYPE, source.metadata_type.as_str()))
            .set(NQuad::value(node(), naming::SCOPES, source.scope.as_str()));
        for column in &source.available_columns {
            mutation = mutation.set(NQuad::value(
                node(),
                naming::METADATA_ATTRIBUTES,
                column.as_str(),
            ));
        }

        let request = Request::new()
            .with_query(Query::new("UpsertMetadata").block(lookup))
            .mutate(mutation);
        self.write(OPERATION, &request)?;

        info!(
            source = %source.source_name,
            scope = %source.scope,
            columns = source.available_columns.len(),
            "metadata source upserted"
        );
        self.metadata_by_source(&source.source_name, &scopes)?
            .ok_or_else(|| EquipError::internal(OPERATION, "metadata source missing after upsert"))
    }

    /// Every metadata source of a kind in scope, ordered by source name
    pub fn metadata_sources(
        &self,
        metadata_type: MetadataType,
        scopes: &[String],
    ) -> EquipResult<Vec<MetadataSource>> {
        let block = Block::named(
            METADATA_BLOCK,
            Func::eq(naming::METADATA_TYPE, metadata_type.as_str()),
        )
        .with_filter(Some(QueryCompiler::scope_filter(scopes)))
        .order_by(naming::METADATA_SOURCE, SortDirection::Asc);
        self.load_metadata("metadata_sources", block)
    }

    pub fn metadata_with_id(&self, id: &str, scopes: &[String]) -> EquipResult<MetadataSource> {
        let uid: Uid = id
            .parse()
            .map_err(|_| EquipError::not_found(format!("metadata source {}", id)))?;
        let block = Block::named(METADATA_BLOCK, Func::uid(uid)).with_filter(Some(Filter::And(vec![
            Filter::eq(naming::TYPE_NAME, naming::METADATA_MARKER),
            QueryCompiler::scope_filter(scopes),
        ])));
        self.load_metadata("metadata_with_id", block)?
            .into_iter()
            .next()
            .ok_or_else(|| EquipError::not_found(format!("metadata source {}", id)))
    }

    fn metadata_by_source(
        &self,
        source_name: &str,
        scopes: &[String],
    ) -> EquipResult<Option<MetadataSource>> {
        let block = Block::named(METADATA_BLOCK, Func::eq(naming::METADATA_SOURCE, source_name))
            .with_filter(Some(Filter::And(vec![
                Filter::eq(naming::TYPE_NAME, naming::METADATA_MARKER),
                QueryCompiler::scope_filter(scopes),
            ])));
        Ok(self.load_metadata("metadata_by_source", block)?.into_iter().next())
    }

    fn load_metadata(&self, operation: &str, block: Block) -> EquipResult<Vec<MetadataSource>> {
        let mut block = block;
        for selection in metadata_projection() {
            block = block.select(selection);
        }
        let query = Query::new(METADATA_BLOCK).block(block);
        let mut response = self.read(operation, &query, &QueryVars::new())?;
        let rows: Vec<MetadataRow> = parse_rows(response.take_rows(METADATA_BLOCK))?;
        rows.into_iter().map(MetadataRow::into_source).collect()
    }
}

