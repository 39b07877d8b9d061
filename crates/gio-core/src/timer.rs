use std::time::{SystemTime, UNIX_EPOCH};

/// Number of timed phases in one experiment.
pub const NB_PHASES: usize = 6;
/// Number of `f64` slots in a flattened table: a start and an end per phase.
pub const NB_TIMER_SLOTS: usize = NB_PHASES * 2;

/// Timed segments of one experiment, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Total,
    Init,
    Open,
    ViewSeek,
    Io,
    Close,
}

impl Phase {
    pub const ALL: [Phase; NB_PHASES] = [
        Phase::Total,
        Phase::Init,
        Phase::Open,
        Phase::ViewSeek,
        Phase::Io,
        Phase::Close,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Total => "total",
            Phase::Init => "init",
            Phase::Open => "open",
            Phase::ViewSeek => "view/seek",
            Phase::Io => "io",
            Phase::Close => "close",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Start and end of one phase, in wall-clock seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseRecord {
    pub start: f64,
    pub end: f64,
}

impl PhaseRecord {
    pub fn elapsed(&self) -> f64 {
        self.end - self.start
    }
}

/// Timestamps of every phase of one run on one rank.
///
/// All six phases are always present; a phase that does nothing for a given
/// variant still gets a (near-zero) record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTable {
    records: [PhaseRecord; NB_PHASES],
}

impl PhaseTable {
    pub fn start(&mut self, phase: Phase) {
        self.records[phase.index()].start = now();
    }

    pub fn stop(&mut self, phase: Phase) {
        self.records[phase.index()].end = now();
    }

    /// Run `f` with `phase` stamped around it.
    pub fn time<T>(&mut self, phase: Phase, f: impl FnOnce() -> T) -> T {
        self.start(phase);
        let out = f();
        self.stop(phase);
        out
    }

    pub fn get(&self, phase: Phase) -> PhaseRecord {
        self.records[phase.index()]
    }

    pub fn set(&mut self, phase: Phase, record: PhaseRecord) {
        self.records[phase.index()] = record;
    }

    /// Phases with their records, in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (Phase, PhaseRecord)> + '_ {
        Phase::ALL.iter().map(move |&p| (p, self.get(p)))
    }

    /// Flatten to `[start0, end0, start1, end1, ...]` for a fixed-size gather.
    pub fn to_flat(&self) -> [f64; NB_TIMER_SLOTS] {
        let mut flat = [0.0; NB_TIMER_SLOTS];
        for (i, rec) in self.records.iter().enumerate() {
            flat[2 * i] = rec.start;
            flat[2 * i + 1] = rec.end;
        }
        flat
    }

    /// Inverse of [`to_flat`](Self::to_flat). Returns `None` on a wrong length.
    pub fn from_flat(flat: &[f64]) -> Option<Self> {
        if flat.len() != NB_TIMER_SLOTS {
            return None;
        }
        let mut table = Self::default();
        for (i, pair) in flat.chunks_exact(2).enumerate() {
            table.records[i] = PhaseRecord {
                start: pair[0],
                end: pair[1],
            };
        }
        Some(table)
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
///
/// Wall-clock (not monotonic) so that timestamps from different ranks and
/// hosts land on one axis.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_and_names() {
        let names: Vec<_> = Phase::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["total", "init", "open", "view/seek", "io", "close"]);
    }

    #[test]
    fn test_time_stamps_both_ends() {
        let mut table = PhaseTable::default();
        let v = table.time(Phase::Io, || {
            std::thread::sleep(std::time::Duration::from_millis(5));
            42
        });
        assert_eq!(v, 42);
        let rec = table.get(Phase::Io);
        assert!(rec.start > 0.0);
        assert!(rec.elapsed() >= 0.004, "elapsed {}", rec.elapsed());
        assert_eq!(table.get(Phase::Open), PhaseRecord::default());
    }

    #[test]
    fn test_flat_layout() {
        let mut table = PhaseTable::default();
        for (i, phase) in Phase::ALL.iter().enumerate() {
            table.set(
                *phase,
                PhaseRecord {
                    start: i as f64,
                    end: i as f64 + 0.5,
                },
            );
        }
        let flat = table.to_flat();
        assert_eq!(flat[0], 0.0);
        assert_eq!(flat[1], 0.5);
        assert_eq!(flat[8], 4.0);
        assert_eq!(flat[11], 5.5);
        assert_eq!(PhaseTable::from_flat(&flat), Some(table));
        assert_eq!(PhaseTable::from_flat(&flat[..10]), None);
    }

    #[test]
    fn test_now_is_wall_clock() {
        // 2020-01-01T00:00:00Z
        assert!(now() > 1_577_836_800.0);
    }
}
