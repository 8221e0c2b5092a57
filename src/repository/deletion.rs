//! Batch soft deletion of a scope's equipment
//!
//! Instances are marked reclaimable in batches, each committed on its own.
//! A batch that keeps conflicting is abandoned and skipped; the deadline is
//! checked between batches. The outcome is best-effort and reported.

use std::thread;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::lock::StructuralGuard;
use super::EquipmentRepository;
use crate::errors::EquipResult;
use crate::query::ast::{Block, Func, PageArg, Query, QueryVars, Selection};
use crate::query::{QueryCompiler, TOTAL_ALIAS};
use crate::schema::naming;
use crate::store::{Condition, GraphStore, Mutation, NQuad, Request, Subject};

const VICTIMS_VAR: &str = "victims";
const BATCH_BLOCK: &str = "Batch";

/// Outcome of a batch deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub operation_id: Uuid,
    /// Instances marked reclaimable
    pub deleted: u64,
    /// Instances left in place by abandoned batches
    pub abandoned: u64,
    /// Batches attempted
    pub batches: u32,
    pub deadline_exceeded: bool,
}

impl DeletionReport {
    fn new() -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            deleted: 0,
            abandoned: 0,
            batches: 0,
            deadline_exceeded: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.abandoned == 0 && !self.deadline_exceeded
    }
}

/// Victim selection for one batch; abandoned instances stay in place, so
/// `skip` moves past them
fn batch_query(scope: &str, size: u64, skip: u64) -> Query {
    Query::new("DeleteEquipments")
        .block(
            Block::var(Func::eq(naming::TYPE_NAME, naming::EQUIPMENT_MARKER))
                .with_filter(Some(QueryCompiler::scope_filter(&[scope.to_string()])))
                .paginate(PageArg::Literal(size), PageArg::Literal(skip))
                .bind_as(VICTIMS_VAR),
        )
        .block(
            Block::named(BATCH_BLOCK, Func::uid_var(VICTIMS_VAR))
                .select(Selection::count(TOTAL_ALIAS)),
        )
}

fn batch_request(query: Query) -> Request {
    let victims = || Subject::Var(VICTIMS_VAR.to_string());
    Request::new().with_query(query).mutate(
        Mutation::new()
            .when(Condition::NotEmpty(VICTIMS_VAR.into()))
            .delete(NQuad::clear_all(victims()))
            .set(NQuad::value(victims(), naming::RECYCLE, "true")),
    )
}

impl<S: GraphStore> EquipmentRepository<S> {
    /// Soft-delete every equipment instance of `scope`.
    ///
    /// Conflicting batches are retried `max_retries` times before being
    /// abandoned. Any other store failure stops the run and is returned.
    pub fn delete_equipments(
        &self,
        guard: &StructuralGuard<'_>,
        scope: &str,
    ) -> EquipResult<DeletionReport> {
        const OPERATION: &str = "delete_equipments";
        self.lock.verify(guard, OPERATION)?;

        let started = Instant::now();
        let mut report = DeletionReport::new();
        info!(
            operation_id = %report.operation_id,
            scope = %scope,
            batch_size = self.config.batch_size,
            "deleting equipments"
        );

        loop {
            if report.batches > 0 && started.elapsed() >= self.config.deadline() {
                warn!(
                    operation_id = %report.operation_id,
                    deleted = report.deleted,
                    "deadline exceeded, stopping deletion"
                );
                report.deadline_exceeded = true;
                break;
            }

            let query = batch_query(scope, self.config.batch_size, report.abandoned);
            let pending = self
                .read(OPERATION, &query, &QueryVars::new())?
                .count(BATCH_BLOCK, TOTAL_ALIAS);
            if pending == 0 {
                break;
            }
            report.batches += 1;

            let request = batch_request(query);
            let mut attempt = 0;
            loop {
                match self.write(OPERATION, &request) {
                    Ok(response) => {
                        report.deleted += response.query.count(BATCH_BLOCK, TOTAL_ALIAS);
                        break;
                    }
                    Err(e) if e.is_conflict() && attempt < self.config.max_retries => {
                        attempt += 1;
                        warn!(
                            operation_id = %report.operation_id,
                            batch = report.batches,
                            attempt = attempt,
                            error = %e,
                            "batch conflicted, retrying"
                        );
                        let backoff = self.config.retry_backoff();
                        if !backoff.is_zero() {
                            thread::sleep(backoff);
                        }
                    }
                    Err(e) if e.is_conflict() => {
                        warn!(
                            operation_id = %report.operation_id,
                            batch = report.batches,
                            instances = pending,
                            error = %e,
                            "abandoning batch"
                        );
                        report.abandoned += pending;
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(
            operation_id = %report.operation_id,
            deleted = report.deleted,
            abandoned = report.abandoned,
            batches = report.batches,
            "deletion finished"
        );
        Ok(report)
    }
}
