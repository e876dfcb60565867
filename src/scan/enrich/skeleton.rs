//! `SkeletonEnricher` (spec §4.4): writes `views.<surface>.skeleton` for
//! every surface, from each surface's `revealed` view (falling back to
//! `sanitized` or `raw` if `revealed` is unset). Produces no findings.

use crate::confusables::ConfusablesTable;
use crate::error::ScannerError;
use crate::model::NormalizedInput;
use crate::scan::surface::{physical_surfaces, view_set, view_set_mut};
use crate::scan::{ScanContext, ScanKind, ScanOutput, Scanner};
use async_trait::async_trait;
use std::sync::Arc;

/// Enriches every surface with its UTS#39 confusable skeleton.
pub struct SkeletonEnricher {
    table: Arc<ConfusablesTable>,
}

impl SkeletonEnricher {
    /// Build an enricher from a loaded confusables table.
    #[must_use]
    pub fn new(table: Arc<ConfusablesTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Scanner for SkeletonEnricher {
    fn name(&self) -> &str {
        "skeleton_enricher"
    }

    fn kind(&self) -> ScanKind {
        ScanKind::Enrich
    }

    async fn run(&self, input: &NormalizedInput, _ctx: &ScanContext) -> Result<ScanOutput, ScannerError> {
        let mut next = input.clone();
        for surface in physical_surfaces(input) {
            let Some(source_text) = view_set(input, surface).map(|vs| {
                vs.revealed
                    .clone()
                    .or_else(|| vs.sanitized.clone())
                    .unwrap_or_else(|| vs.raw.clone())
            }) else {
                continue;
            };
            let skeleton = self.table.skeletonize(&source_text);
            if let Some(vs) = view_set_mut(&mut next, surface) {
                vs.skeleton = Some(skeleton);
            }
        }
        Ok(ScanOutput::transformed(next))
    }
}
