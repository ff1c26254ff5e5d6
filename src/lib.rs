pub mod archive;
pub mod boundary;
pub mod config;
pub mod detector;
pub mod error;
pub mod filter;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod trajectory;

use anyhow::{Context, Result};
use archive::DirectorySource;
use boundary::BoundaryRegistry;
use log::{info, warn};
use pipeline::Scheduler;
use sink::SinkSet;

pub use config::{get_arg, Config, PipelineConfig};
pub use error::Error;

pub fn run(config: Config) -> Result<()> {
    info!("config is {:?}", config);

    let registry = BoundaryRegistry::from_path(&config.boundaries).with_context(|| {
        format!(
            "failed to load boundaries from {}",
            config.boundaries.display()
        )
    })?;

    let source = DirectorySource::new(&config.archive_dir);
    let ids = if config.ids.is_empty() {
        source.list().with_context(|| {
            format!("failed to list archives in {}", config.archive_dir.display())
        })?
    } else {
        config.ids.clone()
    };

    let mut sinks = SinkSet::csv_files(&registry, &config.output_dir).with_context(|| {
        format!(
            "failed to open output files in {}",
            config.output_dir.display()
        )
    })?;

    let report = Scheduler::new(&config.pipeline, &registry, &source).run(&ids, &mut sinks)?;

    for (boundary, n) in &report.written {
        info!("{}: {} crossings", boundary, n);
    }
    for id in &report.skipped {
        warn!("{} was skipped and needs reprocessing", id);
    }

    Ok(())
}
