use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use gio_core::error::{GioError, Result};
use gio_core::striping::DEFAULT_MAX_STRIPE_COUNT;
use gio_core::{AddressingMode, ExperimentConfig, StripingParams, Variant};

/// Experiment codes accepted by `-e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExperimentArg {
    /// Sequential write, one private file per rank
    Sw,
    /// Sequential read, one private file per rank
    Sr,
    /// Collective write with MPI-IO, one shared file per sub-group
    Pw,
    /// Collective read with MPI-IO, one shared file per sub-group
    Pr,
}

impl From<ExperimentArg> for Variant {
    fn from(arg: ExperimentArg) -> Self {
        match arg {
            ExperimentArg::Sw => Variant::SequentialWrite,
            ExperimentArg::Sr => Variant::SequentialRead,
            ExperimentArg::Pw => Variant::CollectiveWrite,
            ExperimentArg::Pr => Variant::CollectiveRead,
        }
    }
}

/// Offset addressing strategies accepted by `--addressing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AddressingArg {
    /// File view at `sub_rank * size`
    View,
    /// Cumulative relative seeks from the file start
    Seek,
}

impl From<AddressingArg> for AddressingMode {
    fn from(arg: AddressingArg) -> Self {
        match arg {
            AddressingArg::View => AddressingMode::FileView,
            AddressingArg::Seek => AddressingMode::CumulativeSeek,
        }
    }
}

/// Parallel filesystem I/O benchmark.
#[derive(Parser, Debug)]
#[command(name = "gio", version, about = "MPI parallel filesystem I/O benchmark")]
pub struct CliArgs {
    /// Experiment type (sw/sr: sequential write/read, pw/pr: collective write/read with MPI-IO)
    #[arg(short = 'e', long = "experiment", value_enum)]
    pub experiment: ExperimentArg,

    /// Scale label: s = strong scaling, w = weak scaling
    #[arg(short = 's', long = "scale", value_parser = ["s", "w"])]
    pub scale: String,

    /// Payload size per rank in bytes (supports k/m/g/t suffixes)
    #[arg(short = 'f', long = "size")]
    pub size: String,

    /// Target directory
    #[arg(short = 'd', long = "dir")]
    pub dir: PathBuf,

    /// Number of shared files (required for pw)
    #[arg(short = 'm', long = "files")]
    pub file_count: Option<u32>,

    /// Offset addressing strategy for shared files
    #[arg(long = "addressing", value_enum, default_value_t = AddressingArg::View)]
    pub addressing: AddressingArg,

    /// Maximum stripe count of one file
    #[arg(long = "stripe-count-max", default_value_t = DEFAULT_MAX_STRIPE_COUNT)]
    pub stripe_count_max: u32,

    /// Stripe unit (supports k/m/g suffixes)
    #[arg(long = "stripe-unit", default_value = "1m")]
    pub stripe_unit: String,

    /// Broadcast the configuration from rank 0 and fail if any rank differs
    #[arg(long = "check-config")]
    pub check_config: bool,

    /// Keep private files of sequential runs
    #[arg(short = 'k', long = "keep-file")]
    pub keep_file: bool,

    /// Verbosity (repeat for higher levels)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a size string with optional k/m/g/t suffix (case-insensitive).
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    let (num_str, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        Some(b't' | b'T') => (&s[..s.len() - 1], 1024u64 * 1024 * 1024 * 1024),
        _ => (s, 1),
    };

    num_str
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| GioError::config(format!("invalid size: {s:?}")))
}

impl CliArgs {
    /// Convert CLI arguments into a validated configuration.
    pub fn into_config(self) -> Result<ExperimentConfig> {
        let config = ExperimentConfig {
            variant: self.experiment.into(),
            scale: self.scale,
            payload_size: parse_size(&self.size)?,
            target_dir: self.dir,
            file_count: self.file_count,
            addressing: self.addressing.into(),
            striping: StripingParams {
                max_stripe_count: self.stripe_count_max,
                stripe_unit: parse_size(&self.stripe_unit)?,
            },
            check_config: self.check_config,
            keep_file: self.keep_file,
        };
        config.validate()?;
        Ok(config)
    }
}
