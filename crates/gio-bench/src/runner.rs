use gio_backend_posix::{self as posix, PosixFile};
use gio_core::error::{GioError, Result, ValidationError};
use gio_core::{ExperimentConfig, OpenFlags, Payload, Phase, PhaseTable, XferDir, paths};
use log::{debug, info, warn};
use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::collective::CollectiveDriver;

/// What one rank brings back from a run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub phases: PhaseTable,
    /// First mismatch found when checking read-back data, if any
    pub validation: Option<ValidationError>,
}

/// Broadcast rank 0's configuration and fail on every rank if any rank
/// holds a different one.
pub fn verify_uniform_config(config: &ExperimentConfig, comm: &SimpleCommunicator) -> Result<()> {
    let local = config.to_bytes()?;
    let root = comm.process_at_rank(0);

    let mut len = local.len() as u64;
    root.broadcast_into(&mut len);

    let mut reference = if comm.rank() == 0 {
        local.clone()
    } else {
        vec![0u8; len as usize]
    };
    root.broadcast_into(&mut reference[..]);

    let mismatch = i32::from(reference != local);
    let mut mismatched: i32 = 0;
    comm.all_reduce_into(&mismatch, &mut mismatched, SystemOperation::sum());

    if mismatch != 0 {
        warn!("configuration differs from rank 0");
    }
    if mismatched > 0 {
        return Err(GioError::config(format!(
            "configuration differs from rank 0 on {mismatched} rank(s)"
        )));
    }
    Ok(())
}

/// Run the configured experiment once and return this rank's timings.
pub fn run_experiment(config: &ExperimentConfig, world: &SimpleCommunicator) -> Result<RunOutcome> {
    let mut phases = PhaseTable::default();
    let dir = config.variant.direction();

    // All ranks enter the timed region together.
    world.barrier();

    phases.start(Phase::Total);
    let validation = if config.variant.is_collective() {
        run_collective(config, world, dir, &mut phases)?
    } else {
        run_sequential(config, world, dir, &mut phases)?
    };
    phases.stop(Phase::Total);

    world.barrier();

    if let Some(v) = &validation {
        warn!("{}", v);
    }
    Ok(RunOutcome { phases, validation })
}

/// Sequential variants: one private file per rank, reliable POSIX I/O only.
fn run_sequential(
    config: &ExperimentConfig,
    world: &SimpleCommunicator,
    dir: XferDir,
    phases: &mut PhaseTable,
) -> Result<Option<ValidationError>> {
    let rank = world.rank();
    let path = paths::sequential_path(&config.target_dir, rank, std::process::id())
        .to_string_lossy()
        .into_owned();
    let size = config.payload_size as usize;

    phases.start(Phase::Init);
    let mut payload = match dir {
        XferDir::Write => Payload::generate_bytes(size, rank)?,
        XferDir::Read => {
            // The private path embeds the pid, so the file to read back is
            // produced here, outside the timed I/O phase.
            prepare_private_file(&path, size, rank)?;
            Payload::sentinel_bytes(size)?
        }
    };
    phases.stop(Phase::Init);

    world.barrier();

    let mut file = phases.time(Phase::Open, || {
        PosixFile::open(&path, OpenFlags::for_xfer(dir), None)
    })?;

    phases.time(Phase::ViewSeek, || file.rewind())?;

    let moved = phases.time(Phase::Io, || match dir {
        XferDir::Write => file.write_all(payload.as_bytes()),
        XferDir::Read => file.read_full(payload.as_bytes_mut()),
    })?;
    debug!("{} {} bytes of {}", dir.name(), moved, path);

    phases.time(Phase::Close, || file.close());

    let validation = match dir {
        XferDir::Read => payload.validate(rank).err(),
        XferDir::Write => None,
    };
    drop(payload);

    if !config.keep_file {
        posix::delete(&path)?;
    }

    Ok(validation)
}

/// Write a private file holding `value` so a sequential read has data.
fn prepare_private_file(path: &str, size: usize, value: i32) -> Result<()> {
    let payload = Payload::generate_bytes(size, value)?;
    let mut file = PosixFile::open(path, OpenFlags::for_xfer(XferDir::Write), None)?;
    file.write_all(payload.as_bytes())?;
    file.close();
    Ok(())
}

/// Collective variants: one shared file per sub-group through MPI-IO.
fn run_collective(
    config: &ExperimentConfig,
    world: &SimpleCommunicator,
    dir: XferDir,
    phases: &mut PhaseTable,
) -> Result<Option<ValidationError>> {
    let size = config.payload_size as usize;

    phases.start(Phase::Init);
    let driver = CollectiveDriver::init(config, world, dir)?;
    let sub_rank = driver.layout().local_rank;
    let mut payload = match dir {
        XferDir::Write => Payload::generate(size, sub_rank)?,
        XferDir::Read => Payload::sentinel(size)?,
    };
    phases.stop(Phase::Init);

    world.barrier();

    let mut file = phases.time(Phase::Open, || driver.open(dir))?;
    phases.time(Phase::ViewSeek, || driver.address(&mut file))?;
    phases.time(Phase::Io, || driver.transfer(&mut file, dir, &mut payload))?;
    phases.time(Phase::Close, || file.close())?;

    info!(
        "collective {} of {} bytes on {} (sub-rank {})",
        dir.name(),
        size,
        driver.path(),
        sub_rank
    );

    let validation = match dir {
        XferDir::Read => payload.validate(sub_rank).err(),
        XferDir::Write => None,
    };
    Ok(validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_private_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gio-file.3.99");
        let path = path.to_str().unwrap();

        prepare_private_file(path, 4096, 3).unwrap();

        let bytes = std::fs::read(path).unwrap();
        assert_eq!(bytes.len(), 4096);
        assert!(bytes.chunks_exact(4).all(|c| c == 3i32.to_ne_bytes()));
    }

    #[test]
    fn test_private_round_trip_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gio-file.5.1");
        let path = path.to_str().unwrap();

        prepare_private_file(path, 1024, 5).unwrap();

        let mut payload = Payload::sentinel(1024).unwrap();
        let mut file = PosixFile::open(path, OpenFlags::for_xfer(XferDir::Read), None).unwrap();
        file.rewind().unwrap();
        assert_eq!(file.read_full(payload.as_bytes_mut()).unwrap(), 1024);
        assert!(file.close());

        assert!(payload.validate(5).is_ok());
        assert!(payload.validate(4).is_err());
    }

    #[test]
    fn test_unaligned_private_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gio-file.2.7");
        let path = path.to_str().unwrap();

        prepare_private_file(path, 1001, 2).unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), 1001);

        let mut payload = Payload::sentinel_bytes(1001).unwrap();
        let mut file = PosixFile::open(path, OpenFlags::for_xfer(XferDir::Read), None).unwrap();
        assert_eq!(file.read_full(payload.as_bytes_mut()).unwrap(), 1001);
        file.close();

        assert!(payload.validate(2).is_ok());
        assert!(payload.validate(3).is_err());
    }

    #[test]
    fn test_short_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        let path = path.to_str().unwrap();

        prepare_private_file(path, 64, 1).unwrap();

        let mut payload = Payload::sentinel(128).unwrap();
        let mut file = PosixFile::open(path, OpenFlags::RDONLY, None).unwrap();
        assert_eq!(file.read_full(payload.as_bytes_mut()).unwrap(), 64);
        file.close();

        let err = payload.validate(1).unwrap_err();
        assert_eq!(err.index, 16);
        assert_eq!(err.actual, gio_core::SENTINEL);
    }
}
