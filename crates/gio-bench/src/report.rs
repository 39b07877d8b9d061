use std::fmt::Write as _;

use gio_core::timer::NB_TIMER_SLOTS;
use gio_core::{ExperimentConfig, Phase, PhaseTable, StripingHints, Variant};
use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

const MEBIBYTE: f64 = 1_048_576.0;

/// Configuration summary printed once by rank 0 before the run.
pub fn format_header(config: &ExperimentConfig, nprocs: i32) -> String {
    // Striping hints are applied only when a collective write creates the file.
    let (factor, unit) = match config.variant {
        Variant::CollectiveWrite => {
            let hints = StripingHints::compute(&config.striping, config.effective_file_count());
            (hints.factor.to_string(), hints.unit.to_string())
        }
        _ => ("-".to_string(), "-".to_string()),
    };
    let file_count = match (config.variant.is_collective(), config.file_count) {
        (false, _) => "-".to_string(),
        (true, Some(m)) => m.to_string(),
        (true, None) => format!("{} (default)", config.effective_file_count()),
    };

    let mut out = String::new();
    let _ = writeln!(out, "gio parallel I/O benchmark");
    let _ = writeln!(out, "  experiment     = {}", config.variant);
    let _ = writeln!(out, "  scale          = {}", config.scale);
    let _ = writeln!(out, "  payload_size   = {}", config.payload_size);
    let _ = writeln!(out, "  target_dir     = {}", config.target_dir.display());
    let _ = writeln!(out, "  num_procs      = {}", nprocs);
    let _ = writeln!(out, "  file_count     = {}", file_count);
    let _ = writeln!(out, "  addressing     = {}", config.addressing.name());
    let _ = writeln!(out, "  striping_factor= {}", factor);
    let _ = write!(out, "  striping_unit  = {}", unit);
    out
}

/// Gather every rank's phase table to rank 0 in one fixed-size gather.
///
/// Returns the tables in rank order on rank 0 and `None` elsewhere.
pub fn gather_phase_tables(table: &PhaseTable, comm: &SimpleCommunicator) -> Option<Vec<PhaseTable>> {
    let root = comm.process_at_rank(0);
    let local = table.to_flat();

    if comm.rank() == 0 {
        let mut all = vec![0.0f64; NB_TIMER_SLOTS * comm.size() as usize];
        root.gather_into_root(&local[..], &mut all[..]);
        Some(
            all.chunks_exact(NB_TIMER_SLOTS)
                .filter_map(PhaseTable::from_flat)
                .collect(),
        )
    } else {
        root.gather_into(&local[..]);
        None
    }
}

/// Sum of ranks whose read-back check failed; known on every rank.
pub fn count_validation_failures(failed: bool, comm: &SimpleCommunicator) -> i32 {
    let local = i32::from(failed);
    let mut total: i32 = 0;
    comm.all_reduce_into(&local, &mut total, SystemOperation::sum());
    total
}

/// One block of the report: every phase of one rank.
pub fn format_rank_block(rank: usize, table: &PhaseTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "rank {}", rank);
    let _ = writeln!(
        out,
        "  {:<10} {:>18} {:>18} {:>12}",
        "phase", "start(s)", "end(s)", "elapsed(s)"
    );
    for (phase, rec) in table.iter() {
        let _ = writeln!(
            out,
            "  {:<10} {:>18.6} {:>18.6} {:>12.6}",
            phase.name(),
            rec.start,
            rec.end,
            rec.elapsed()
        );
    }
    out
}

/// Group-wide view of the io phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateIo {
    /// Earliest io start across ranks
    pub start: f64,
    /// Latest io end across ranks
    pub end: f64,
    /// Bytes moved by all ranks
    pub bytes: u64,
}

impl AggregateIo {
    pub fn from_tables(tables: &[PhaseTable], bytes_per_rank: u64) -> Option<Self> {
        let start = tables
            .iter()
            .map(|t| t.get(Phase::Io).start)
            .reduce(f64::min)?;
        let end = tables
            .iter()
            .map(|t| t.get(Phase::Io).end)
            .reduce(f64::max)?;
        Some(Self {
            start,
            end,
            bytes: bytes_per_rank * tables.len() as u64,
        })
    }

    pub fn elapsed(&self) -> f64 {
        self.end - self.start
    }

    /// Aggregate bandwidth in MiB/s, 0 for an empty window.
    pub fn bandwidth_mib(&self) -> f64 {
        let t = self.elapsed();
        if t > 0.0 {
            self.bytes as f64 / MEBIBYTE / t
        } else {
            0.0
        }
    }
}

/// Full rank-0 report for the gathered tables.
pub fn format_report(tables: &[PhaseTable], bytes_per_rank: u64, failed_ranks: i32) -> String {
    let mut out = String::new();
    for (rank, table) in tables.iter().enumerate() {
        out.push_str(&format_rank_block(rank, table));
    }
    if let Some(agg) = AggregateIo::from_tables(tables, bytes_per_rank) {
        let _ = writeln!(
            out,
            "aggregate io: {} bytes in {:.6} s ({:.2} MiB/s)",
            agg.bytes,
            agg.elapsed(),
            agg.bandwidth_mib()
        );
    }
    if failed_ranks == 0 {
        let _ = writeln!(out, "validation: ok");
    } else {
        let _ = writeln!(out, "validation: FAILED on {} rank(s)", failed_ranks);
    }
    out
}

/// Gather, print on rank 0, and return whether every rank validated.
pub fn report(
    config: &ExperimentConfig,
    phases: &PhaseTable,
    failed: bool,
    comm: &SimpleCommunicator,
) -> bool {
    let tables = gather_phase_tables(phases, comm);
    let failed_ranks = count_validation_failures(failed, comm);

    if let Some(tables) = tables {
        print!("{}", format_report(&tables, config.payload_size, failed_ranks));
    }
    failed_ranks == 0
}
