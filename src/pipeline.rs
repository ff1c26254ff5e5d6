//! Batch scheduler driving archives through filter, trajectory and detector.
//!
//! Archives are processed in consecutive fixed-size batches on a bounded
//! rayon pool. A batch ends when every worker in it has returned; only then
//! are the sinks flushed and the next batch started, so at most one batch of
//! parsed data is alive and batch N is fully written before batch N+1 runs.

use crate::archive::{self, ArchiveSource};
use crate::boundary::BoundaryRegistry;
use crate::config::PipelineConfig;
use crate::detector;
use crate::error::{Error, Result};
use crate::filter::EligibilityFilter;
use crate::sink::{SinkHandles, SinkSet, WriteUnit};
use crate::trajectory;
use log::{debug, error, info};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// Counters for one successfully processed archive.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub rows: usize,
    pub malformed: usize,
    pub eligible: usize,
    pub vessels: usize,
    pub events: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub batches: usize,
    pub processed: usize,
    /// Archives that failed and need reprocessing, in input order.
    pub skipped: Vec<String>,
    /// Events written per boundary.
    pub written: BTreeMap<String, usize>,
}

impl JobReport {
    pub fn total_events(&self) -> usize {
        self.written.values().sum()
    }
}

pub struct Scheduler<'a> {
    config: &'a PipelineConfig,
    registry: &'a BoundaryRegistry,
    source: &'a dyn ArchiveSource,
    filter: EligibilityFilter,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        registry: &'a BoundaryRegistry,
        source: &'a dyn ArchiveSource,
    ) -> Scheduler<'a> {
        Scheduler {
            config,
            registry,
            source,
            filter: config.filter(),
        }
    }

    pub fn run(&self, ids: &[String], sinks: &mut SinkSet) -> Result<JobReport> {
        self.config.validate()?;
        // a missing sink would otherwise fail archives after their other units were queued
        if let Some(missing) = self.registry.names().find(|name| !sinks.contains(name)) {
            return Err(Error::UnknownBoundary {
                boundary: missing.to_string(),
            });
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers)
            .thread_name(|i| format!("crossing-worker-{}", i))
            .build()?;

        let batches = ids.chunks(self.config.batch_size);
        let total = batches.len();
        info!(
            "processing {} archives in {} batches on {} workers against {} boundaries",
            ids.len(),
            total,
            self.config.workers,
            self.registry.len()
        );

        let mut report = JobReport::default();
        for (n, batch) in batches.enumerate() {
            info!("batch {}/{}: {} archives", n + 1, total, batch.len());

            let handles = sinks.handles();
            // collect() returns only once every worker of the batch is done
            let outcomes: Vec<Result<ArchiveSummary>> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|id| self.process_guarded(id, &handles))
                    .collect()
            });
            drop(handles);

            for (id, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(_) => report.processed += 1,
                    Err(e) => {
                        error!("archive {} failed, needs reprocessing: {}", id, e);
                        report.skipped.push(id.clone());
                    }
                }
            }

            for (boundary, count) in sinks.flush()? {
                *report.written.entry(boundary).or_insert(0) += count;
            }
            report.batches += 1;
            info!("batch {}/{} flushed", n + 1, total);
        }

        info!(
            "done: {} archives processed, {} skipped, {} events written",
            report.processed,
            report.skipped.len(),
            report.total_events()
        );
        Ok(report)
    }

    /// Runs one archive, turning panics into errors so siblings keep running.
    fn process_guarded(&self, id: &str, handles: &SinkHandles) -> Result<ArchiveSummary> {
        panic::catch_unwind(AssertUnwindSafe(|| self.process_archive(id, handles))).unwrap_or_else(
            |payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(Error::Panic {
                    archive: id.to_string(),
                    message,
                })
            },
        )
    }

    /// Fetch, parse, filter, build trajectories and detect crossings for one archive.
    pub fn process_archive(&self, id: &str, handles: &SinkHandles) -> Result<ArchiveSummary> {
        let reader = self.source.fetch(id)?;
        let parsed = archive::parse(id, reader)?;

        let mut summary = ArchiveSummary {
            rows: parsed.records.len(),
            malformed: parsed.malformed,
            ..Default::default()
        };

        let eligible = self.filter.apply(parsed.records);
        summary.eligible = eligible.records.len();
        summary.vessels = eligible.vessels.len();

        let trajectories = trajectory::build(eligible);

        let units: Vec<(&str, WriteUnit)> = self
            .registry
            .iter()
            .map(|boundary| {
                let unit: WriteUnit = trajectories
                    .iter()
                    .flat_map(|t| detector::detect(t, boundary))
                    .collect();
                (boundary.name(), unit)
            })
            .filter(|(_, unit)| !unit.is_empty())
            .collect();

        // detection is finished before anything of this archive is queued
        for (boundary, unit) in units {
            summary.events += unit.len();
            handles.send(boundary, unit)?;
        }

        debug!(
            "{}: {} rows ({} malformed skipped), {} eligible from {} vessels, {} events",
            id,
            summary.rows,
            summary.malformed,
            summary.eligible,
            summary.vessels,
            summary.events
        );
        Ok(summary)
    }
}
