//! Collective I/O driver: one shared file per sub-group, accessed with
//! MPI-IO collective calls.
//!
//! rsmpi has no MPI-IO bindings, so the file calls go through `mpi::ffi`.
//! Handles (`MPI_Info`, `MPI_File`) are wrapped in RAII types here; the
//! element datatype is rsmpi's own `UserDatatype`.

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::raw::{c_char, c_int, c_void};

use gio_core::error::{GioError, Result};
use gio_core::{
    ExperimentConfig, FilePositioner, Payload, StripingHints, SubGroupLayout, XferDir, paths,
};
use log::{debug, info, warn};
use mpi::datatype::UserDatatype;
use mpi::ffi;
use mpi::topology::{Color, SimpleCommunicator};
use mpi::traits::*;

fn to_cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| GioError::config(format!("string contains NUL: {s:?}")))
}

/// Owned `MPI_Info` object carrying I/O hints.
pub struct Info {
    raw: ffi::MPI_Info,
}

impl Info {
    pub fn new() -> Result<Self> {
        let mut raw = MaybeUninit::uninit();
        let rc = unsafe { ffi::MPI_Info_create(raw.as_mut_ptr()) };
        GioError::check_mpi("MPI_Info_create", rc)?;
        Ok(Self {
            raw: unsafe { raw.assume_init() },
        })
    }

    /// Info populated with striping and collective-buffering hints.
    pub fn with_hints(hints: &StripingHints) -> Result<Self> {
        let info = Self::new()?;
        for (key, value) in hints.info_pairs() {
            info.set(key, &value)?;
        }
        Ok(info)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let ckey = to_cstring(key)?;
        let cvalue = to_cstring(value)?;
        let rc = unsafe {
            ffi::MPI_Info_set(
                self.raw,
                ckey.as_ptr() as *mut c_char,
                cvalue.as_ptr() as *mut c_char,
            )
        };
        GioError::check_mpi("MPI_Info_set", rc)
    }

    pub fn raw(&self) -> ffi::MPI_Info {
        self.raw
    }
}

impl Drop for Info {
    fn drop(&mut self) {
        unsafe {
            ffi::MPI_Info_free(&mut self.raw);
        }
    }
}

/// A handle whose release is a collective call.
///
/// The release runs only through [`finish`](Self::finish), which every rank
/// of the group reaches together. A handle dropped while an error unwinds is
/// left for `MPI_Abort` to reclaim: its peers may be blocked in a different
/// collective, so closing it here could never complete.
pub struct CollectiveHandle<T: Copy> {
    raw: T,
    what: &'static str,
    open: bool,
}

impl<T: Copy> CollectiveHandle<T> {
    pub fn new(raw: T, what: &'static str) -> Self {
        Self {
            raw,
            what,
            open: true,
        }
    }

    pub fn raw(&self) -> T {
        self.raw
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Run the collective release exactly once.
    pub fn finish(mut self, release: impl FnOnce(&mut T) -> Result<()>) -> Result<()> {
        self.open = false;
        release(&mut self.raw)
    }
}

impl<T: Copy> Drop for CollectiveHandle<T> {
    fn drop(&mut self) {
        if self.open {
            warn!("{} dropped without a collective close", self.what);
        }
    }
}

/// A shared file opened collectively by one sub-group.
///
/// Must be closed with [`close`](Self::close); see [`CollectiveHandle`].
pub struct SharedFile {
    handle: CollectiveHandle<ffi::MPI_File>,
}

impl SharedFile {
    pub fn open(comm: &SimpleCommunicator, path: &str, dir: XferDir, info: &Info) -> Result<Self> {
        let cpath = to_cstring(path)?;
        let amode = match dir {
            XferDir::Write => (ffi::MPI_MODE_WRONLY | ffi::MPI_MODE_CREATE) as c_int,
            XferDir::Read => ffi::MPI_MODE_RDONLY as c_int,
        };
        let mut raw = MaybeUninit::uninit();
        let rc = unsafe {
            ffi::MPI_File_open(
                comm.as_raw(),
                cpath.as_ptr() as *mut c_char,
                amode,
                info.raw(),
                raw.as_mut_ptr(),
            )
        };
        GioError::check_mpi("MPI_File_open", rc)?;
        Ok(Self {
            handle: CollectiveHandle::new(unsafe { raw.assume_init() }, "shared file"),
        })
    }

    fn raw(&self) -> ffi::MPI_File {
        self.handle.raw()
    }

    /// Remove `path` if it exists. Returns whether a file was deleted.
    pub fn delete(path: &str, info: &Info) -> Result<bool> {
        let cpath = to_cstring(path)?;
        let rc = unsafe { ffi::MPI_File_delete(cpath.as_ptr() as *mut c_char, info.raw()) };
        Ok(rc == 0)
    }

    /// Collective write of the whole payload as one `datatype` element.
    pub fn write_all(&mut self, payload: &Payload, datatype: &UserDatatype) -> Result<()> {
        let mut status = MaybeUninit::<ffi::MPI_Status>::uninit();
        let rc = unsafe {
            ffi::MPI_File_write_all(
                self.raw(),
                payload.as_ptr() as *mut c_void,
                1,
                datatype.as_raw(),
                status.as_mut_ptr(),
            )
        };
        GioError::check_mpi("MPI_File_write_all", rc)
    }

    /// Collective read of one `datatype` element into the payload.
    pub fn read_all(&mut self, payload: &mut Payload, datatype: &UserDatatype) -> Result<()> {
        let mut status = MaybeUninit::<ffi::MPI_Status>::uninit();
        let rc = unsafe {
            ffi::MPI_File_read_all(
                self.raw(),
                payload.as_mut_ptr(),
                1,
                datatype.as_raw(),
                status.as_mut_ptr(),
            )
        };
        GioError::check_mpi("MPI_File_read_all", rc)
    }

    pub fn close(self) -> Result<()> {
        self.handle.finish(|raw| {
            let rc = unsafe { ffi::MPI_File_close(raw) };
            GioError::check_mpi("MPI_File_close", rc)
        })
    }
}

/// [`FilePositioner`] over an open shared file.
pub struct MpiPositioner<'a> {
    file: &'a mut SharedFile,
    datatype: &'a UserDatatype,
    info: &'a Info,
}

impl FilePositioner for MpiPositioner<'_> {
    fn set_view(&mut self, displacement: i64) -> Result<()> {
        let datarep = to_cstring("native")?;
        let rc = unsafe {
            ffi::MPI_File_set_view(
                self.file.raw(),
                displacement as ffi::MPI_Offset,
                self.datatype.as_raw(),
                self.datatype.as_raw(),
                datarep.as_ptr() as *mut c_char,
                self.info.raw(),
            )
        };
        GioError::check_mpi("MPI_File_set_view", rc)
    }

    fn seek_set(&mut self, offset: i64) -> Result<()> {
        let rc = unsafe {
            ffi::MPI_File_seek(
                self.file.raw(),
                offset as ffi::MPI_Offset,
                ffi::MPI_SEEK_SET as c_int,
            )
        };
        GioError::check_mpi("MPI_File_seek", rc)
    }

    fn seek_cur(&mut self, delta: i64) -> Result<()> {
        let rc = unsafe {
            ffi::MPI_File_seek(
                self.file.raw(),
                delta as ffi::MPI_Offset,
                ffi::MPI_SEEK_CUR as c_int,
            )
        };
        GioError::check_mpi("MPI_File_seek", rc)
    }
}

/// Per-run state of a collective experiment.
///
/// Built in the init phase, then driven through open, addressing, transfer
/// and close by the orchestrator.
pub struct CollectiveDriver<'a> {
    config: &'a ExperimentConfig,
    layout: SubGroupLayout,
    comm: SimpleCommunicator,
    datatype: UserDatatype,
    info: Info,
    path: String,
}

impl<'a> CollectiveDriver<'a> {
    /// Partition the world, create the sub-group communicator, the element
    /// datatype and the I/O hints.
    ///
    /// On the write path the sub-group leader removes any previous target so
    /// the striping hints apply to a fresh file.
    pub fn init(
        config: &'a ExperimentConfig,
        world: &SimpleCommunicator,
        dir: XferDir,
    ) -> Result<Self> {
        let file_count = i32::try_from(config.effective_file_count())
            .map_err(|_| GioError::config("file count out of range"))?;
        let layout = SubGroupLayout::partition(world.size(), world.rank(), file_count)?;

        let comm = world
            .split_by_color(Color::with_value(layout.color))
            .ok_or(GioError::Collective {
                op: "MPI_Comm_split",
                code: -1,
            })?;

        let count = i32::try_from(config.element_count())
            .map_err(|_| GioError::config("payload too large for one datatype"))?;
        let datatype = UserDatatype::contiguous(count, &i32::equivalent_datatype());

        let info = match dir {
            XferDir::Write => Info::with_hints(&StripingHints::compute(
                &config.striping,
                config.effective_file_count(),
            ))?,
            XferDir::Read => Info::new()?,
        };

        let path = paths::collective_path(&config.target_dir, layout.color, layout.file_count)
            .to_string_lossy()
            .into_owned();

        if dir == XferDir::Write {
            if layout.is_leader() && SharedFile::delete(&path, &info)? {
                info!("removed previous {}", path);
            }
            comm.barrier();
        }

        debug!(
            "sub-group color={} size={} local_rank={} file={}",
            layout.color, layout.size, layout.local_rank, path
        );

        Ok(Self {
            config,
            layout,
            comm,
            datatype,
            info,
            path,
        })
    }

    pub fn layout(&self) -> &SubGroupLayout {
        &self.layout
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn open(&self, dir: XferDir) -> Result<SharedFile> {
        SharedFile::open(&self.comm, &self.path, dir, &self.info)
    }

    /// Position this rank at the start of its region.
    pub fn address(&self, file: &mut SharedFile) -> Result<()> {
        let mut positioner = MpiPositioner {
            file,
            datatype: &self.datatype,
            info: &self.info,
        };
        self.config.addressing.strategy().position(
            &mut positioner,
            self.layout.local_rank,
            self.config.payload_size,
        )
    }

    /// One collective transfer of the full local payload.
    pub fn transfer(&self, file: &mut SharedFile, dir: XferDir, payload: &mut Payload) -> Result<()> {
        match dir {
            XferDir::Write => file.write_all(payload, &self.datatype),
            XferDir::Read => file.read_all(payload, &self.datatype),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_finish_releases_once() {
        let calls = Cell::new(0);
        let handle = CollectiveHandle::new(7u32, "test handle");
        assert!(handle.is_open());
        handle
            .finish(|raw| {
                assert_eq!(*raw, 7);
                calls.set(calls.get() + 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_finish_reports_release_error() {
        let handle = CollectiveHandle::new(0u32, "test handle");
        let err = handle
            .finish(|_| GioError::check_mpi("MPI_File_close", 5))
            .unwrap_err();
        assert!(matches!(
            err,
            GioError::Collective {
                op: "MPI_File_close",
                code: 5
            }
        ));
    }

    #[test]
    fn test_error_path_drop_issues_no_release() {
        let released = Cell::new(false);
        let result: Result<()> = (|| {
            let handle = CollectiveHandle::new(1u32, "test handle");
            // Fails before reaching the collective close; the handle unwinds.
            GioError::check_mpi("MPI_File_set_view", 1)?;
            handle.finish(|_| {
                released.set(true);
                Ok(())
            })
        })();
        assert!(result.is_err());
        assert!(!released.get());
    }
}
