//! Diagram Consolidation Job
//!
//! Periodically brings every enabled mapping up to date: translates new
//! source records, consolidates the cascade up to the configured
//! granularity and fills gaps by interpolation.
//! Supports graceful shutdown via SIGTERM/SIGINT signals.

use std::sync::Arc;
use tokio::time::{interval, Instant};
use tracing::{error, info, warn};

use crate::config::JobConfig;
use crate::error::ConsolidationError;
use crate::models::mapping::ResolvedMapping;
use crate::services::consolidation::ConsolidationEngine;
use crate::services::field_translation::FieldTranslator;
use crate::services::interpolation::InterpolationEngine;
use crate::services::mapping_registry::MappingRegistry;
use crate::services::record_store::RecordStore;

/// What one run did for one mapping
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MappingRunSummary {
    pub translated: usize,
    pub consolidated: usize,
    pub interpolated: usize,
}

/// Translation, consolidation and interpolation for a single mapping
pub struct ConsolidationPipeline {
    translator: FieldTranslator,
    consolidator: ConsolidationEngine,
    interpolator: InterpolationEngine,
    config: JobConfig,
}

impl ConsolidationPipeline {
    pub fn new(store: Arc<dyn RecordStore>, config: JobConfig) -> Self {
        Self {
            translator: FieldTranslator::new(store.clone(), config.scan_batch_size),
            consolidator: ConsolidationEngine::new(store.clone(), config.scan_batch_size),
            interpolator: InterpolationEngine::new(store, config.scan_batch_size),
            config,
        }
    }

    pub async fn process_mapping(&self, mapping: &ResolvedMapping) -> Result<MappingRunSummary, ConsolidationError> {
        let deadline = Some(Instant::now() + self.config.run_timeout);
        let mut summary = MappingRunSummary::default();

        summary.translated = self.translator.translate_pending(mapping, deadline).await?.inserted;

        let reports = self
            .consolidator
            .run_cascade(mapping, self.config.max_type, deadline)
            .await?;
        summary.consolidated = reports.iter().map(|r| r.inserted).sum();

        for &kind in &self.config.upsample_types {
            let report = self
                .interpolator
                .upsample_by_consolidation_type(mapping, kind, self.config.upsample_limit, deadline)
                .await?;
            summary.interpolated += report.inserted;
        }

        Ok(summary)
    }
}

/// Start the diagram consolidation job
///
/// Spawns a background task that, every `config.interval`:
/// 1. Loads all enabled mappings
/// 2. Runs the pipeline for each one, within `config.run_timeout`
///
/// A failing mapping is logged and does not stop the others.
pub async fn start_consolidation_job(registry: Arc<MappingRegistry>, store: Arc<dyn RecordStore>, config: JobConfig) {
    tokio::spawn(async move {
        info!(
            interval_secs = config.interval.as_secs(),
            dry_run = config.dry_run,
            max_type = %config.max_type,
            upsample_types = ?config.upsample_types,
            "Initializing diagram consolidation job"
        );

        let mut ticker = interval(config.interval);
        let dry_run = config.dry_run;
        let pipeline = ConsolidationPipeline::new(store, config);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping diagram consolidation job gracefully");
                    break;
                }
                _ = ticker.tick() => {
                    if dry_run {
                        info!("DRY RUN: Skipping consolidation");
                        continue;
                    }

                    run_all(&registry, &pipeline).await;
                }
            }
        }

        info!("Diagram consolidation job stopped");
    });
}

async fn run_all(registry: &MappingRegistry, pipeline: &ConsolidationPipeline) {
    let mappings = match registry.load_all().await {
        Ok(mappings) => mappings,
        Err(e) => {
            error!(error = %e, "Failed to load mappings");
            return;
        }
    };

    for mapping in mappings {
        match pipeline.process_mapping(&mapping).await {
            Ok(summary) => info!(
                mapping = %mapping.short_name,
                translated = summary.translated,
                consolidated = summary.consolidated,
                interpolated = summary.interpolated,
                "Mapping consolidated"
            ),
            Err(ConsolidationError::DeadlineExceeded) => {
                warn!(mapping = %mapping.short_name, "Run timeout reached, resuming next interval")
            }
            Err(e) => error!(mapping = %mapping.short_name, error = %e, "Mapping consolidation failed"),
        }
    }
}
