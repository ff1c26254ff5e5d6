use crate::error::{Error, Result};
use crate::filter::{EligibilityFilter, StatusRule, DEFAULT_MIN_LENGTH};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Knobs of the core pipeline, supplied by the caller.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub min_length: f64,
    pub status_rule: StatusRule,
    /// Worker pool capacity.
    pub workers: usize,
    /// Archives per batch; one batch of parsed data is resident at a time.
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = rayon::current_num_threads();
        PipelineConfig {
            min_length: DEFAULT_MIN_LENGTH,
            status_rule: StatusRule::default(),
            workers,
            batch_size: workers,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("worker pool capacity must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".into()));
        }
        if !self.min_length.is_finite() {
            return Err(Error::Config("minimum length must be a finite number".into()));
        }
        Ok(())
    }

    pub fn filter(&self) -> EligibilityFilter {
        EligibilityFilter::new(self.min_length, self.status_rule)
    }
}

#[derive(Debug)]
pub struct Config {
    pub archive_dir: PathBuf,
    /// Explicit archive identifiers; empty means every archive in `archive_dir`.
    pub ids: Vec<String>,
    pub boundaries: PathBuf,
    pub output_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

fn command() -> Command {
    Command::new("ais-crossing")
        .version("0.1")
        .about("find vessel tracks crossing bridges and port boundaries in daily AIS archives [csv]")
        .arg(
            Arg::new("archive-dir")
                .short('a')
                .long("archive-dir")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("directory holding <id>.csv archives"),
        )
        .arg(
            Arg::new("ids")
                .long("id")
                .action(ArgAction::Append)
                .help("archive identifier to process, may be repeated (default: all)"),
        )
        .arg(
            Arg::new("boundaries")
                .short('b')
                .long("boundaries")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("boundary definitions, csv with name,kind,lon,lat"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("directory receiving one <boundary>.csv per boundary"),
        )
        .arg(
            Arg::new("min-length")
                .long("min-length")
                .value_parser(value_parser!(f64))
                .default_value("150")
                .help("vessels at least this long are kept regardless of type"),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_parser(value_parser!(usize))
                .help("worker pool capacity (default: number of cpus)"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_parser(value_parser!(usize))
                .help("archives per batch (default: worker pool capacity)"),
        )
        .arg(
            Arg::new("legacy-status-parity")
                .long("legacy-status-parity")
                .action(ArgAction::SetTrue)
                .help("match historical output for the restricted-status rule"),
        )
}

pub fn get_arg() -> anyhow::Result<Config> {
    from_matches(command().get_matches())
}

pub fn get_arg_from<I, T>(args: I) -> anyhow::Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    from_matches(command().try_get_matches_from(args)?)
}

fn from_matches(matches: ArgMatches) -> anyhow::Result<Config> {
    let path = |id: &str| matches.get_one::<PathBuf>(id).cloned().unwrap_or_default();

    let defaults = PipelineConfig::default();
    let workers = matches
        .get_one::<usize>("workers")
        .copied()
        .unwrap_or(defaults.workers);
    let batch_size = matches
        .get_one::<usize>("batch-size")
        .copied()
        .unwrap_or(workers);
    let status_rule = if matches.get_flag("legacy-status-parity") {
        StatusRule::LegacyParity
    } else {
        StatusRule::Restricted
    };

    let pipeline = PipelineConfig {
        min_length: matches
            .get_one::<f64>("min-length")
            .copied()
            .unwrap_or(DEFAULT_MIN_LENGTH),
        status_rule,
        workers,
        batch_size,
    };
    pipeline.validate()?;

    Ok(Config {
        archive_dir: path("archive-dir"),
        ids: matches
            .get_many::<String>("ids")
            .unwrap_or_default()
            .cloned()
            .collect(),
        boundaries: path("boundaries"),
        output_dir: path("output-dir"),
        pipeline,
    })
}
