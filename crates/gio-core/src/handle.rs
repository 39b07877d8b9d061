use bitflags::bitflags;

/// Direction of a data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XferDir {
    Read,
    Write,
}

impl XferDir {
    pub fn name(&self) -> &'static str {
        match self {
            XferDir::Read => "read",
            XferDir::Write => "write",
        }
    }
}

bitflags! {
    /// Open flags for private benchmark files.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Read only
        const RDONLY  = 0x01;
        /// Write only
        const WRONLY  = 0x02;
        /// Read/write
        const RDWR    = 0x04;
        /// Create
        const CREAT   = 0x10;
        /// Truncate
        const TRUNC   = 0x20;
    }
}

impl OpenFlags {
    /// Flags used to open a private file for the given transfer direction.
    pub fn for_xfer(dir: XferDir) -> Self {
        match dir {
            XferDir::Write => OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC,
            XferDir::Read => OpenFlags::RDONLY,
        }
    }
}
