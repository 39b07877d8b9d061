use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GioError, Result};
use crate::handle::XferDir;
use crate::payload::ELEMENT_WIDTH;
use crate::striping::StripingParams;

/// Which experiment a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    SequentialWrite,
    SequentialRead,
    CollectiveWrite,
    CollectiveRead,
}

impl Variant {
    /// Short code used on the command line.
    pub fn code(&self) -> &'static str {
        match self {
            Variant::SequentialWrite => "sw",
            Variant::SequentialRead => "sr",
            Variant::CollectiveWrite => "pw",
            Variant::CollectiveRead => "pr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "sw" => Some(Variant::SequentialWrite),
            "sr" => Some(Variant::SequentialRead),
            "pw" => Some(Variant::CollectiveWrite),
            "pr" => Some(Variant::CollectiveRead),
            _ => None,
        }
    }

    pub fn is_collective(&self) -> bool {
        matches!(self, Variant::CollectiveWrite | Variant::CollectiveRead)
    }

    pub fn direction(&self) -> XferDir {
        match self {
            Variant::SequentialWrite | Variant::CollectiveWrite => XferDir::Write,
            Variant::SequentialRead | Variant::CollectiveRead => XferDir::Read,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::SequentialWrite => "sequential write",
            Variant::SequentialRead => "sequential read",
            Variant::CollectiveWrite => "collective write",
            Variant::CollectiveRead => "collective read",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// How each sub-rank reaches its region of a shared file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Declarative file view at `sub_rank * payload_size`
    #[default]
    FileView,
    /// `sub_rank` relative seeks of `payload_size` bytes from the file start
    CumulativeSeek,
}

impl AddressingMode {
    pub fn name(&self) -> &'static str {
        match self {
            AddressingMode::FileView => "view",
            AddressingMode::CumulativeSeek => "seek",
        }
    }
}

/// Everything a run needs to know, built once and shared by reference.
///
/// Every rank must hold an identical value; see
/// [`to_bytes`](Self::to_bytes) for the startup cross-check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub variant: Variant,
    /// Scale label (`s`trong / `w`eak); informational only
    pub scale: String,
    /// Bytes written or read by each rank
    pub payload_size: u64,
    pub target_dir: PathBuf,
    /// Number of shared files (collective variants)
    pub file_count: Option<u32>,
    pub addressing: AddressingMode,
    pub striping: StripingParams,
    /// Broadcast and compare the configuration before running
    pub check_config: bool,
    /// Keep private files of sequential variants after the run
    pub keep_file: bool,
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<()> {
        let width = ELEMENT_WIDTH as u64;
        if self.payload_size == 0 {
            return Err(GioError::config("payload size must be positive"));
        }
        // Collective transfers move whole elements; private files are
        // byte-addressed.
        if self.variant.is_collective() && self.payload_size % width != 0 {
            return Err(GioError::config(format!(
                "payload size {} is not a multiple of {} bytes",
                self.payload_size, width
            )));
        }
        if usize::try_from(self.payload_size).is_err() {
            return Err(GioError::config(format!(
                "payload size {} does not fit in memory",
                self.payload_size
            )));
        }
        if self.variant.is_collective() && i32::try_from(self.element_count()).is_err() {
            return Err(GioError::config(format!(
                "payload of {} elements exceeds the collective datatype limit",
                self.element_count()
            )));
        }
        match (self.variant, self.file_count) {
            (_, Some(0)) => Err(GioError::config("file count must be non-zero")),
            (Variant::CollectiveWrite, None) => Err(GioError::config(
                "collective write requires a file count (-m)",
            )),
            _ => Ok(()),
        }
    }

    /// Shared files in use; collective read defaults to one file.
    pub fn effective_file_count(&self) -> u32 {
        self.file_count.unwrap_or(1)
    }

    /// Payload length in 4-byte elements.
    pub fn element_count(&self) -> u64 {
        self.payload_size / ELEMENT_WIDTH as u64
    }

    /// Canonical serialized form, compared across ranks at startup.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| GioError::config(format!("cannot serialize configuration: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(variant: Variant) -> ExperimentConfig {
        ExperimentConfig {
            variant,
            scale: "w".to_string(),
            payload_size: 4096,
            target_dir: PathBuf::from("/tmp"),
            file_count: None,
            addressing: AddressingMode::default(),
            striping: StripingParams::default(),
            check_config: false,
            keep_file: false,
        }
    }

    #[test]
    fn test_codes_roundtrip() {
        for code in ["sw", "sr", "pw", "pr"] {
            assert_eq!(Variant::from_code(code).unwrap().code(), code);
        }
        assert_eq!(Variant::from_code("xx"), None);
    }

    #[test]
    fn test_collective_write_needs_file_count() {
        let mut cfg = sample(Variant::CollectiveWrite);
        assert!(cfg.validate().unwrap_err().is_configuration());
        cfg.file_count = Some(0);
        assert!(cfg.validate().is_err());
        cfg.file_count = Some(2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_collective_read_defaults_to_one_file() {
        let cfg = sample(Variant::CollectiveRead);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.effective_file_count(), 1);
    }

    #[test]
    fn test_collective_payload_must_be_whole_elements() {
        for variant in [Variant::CollectiveWrite, Variant::CollectiveRead] {
            let mut cfg = sample(variant);
            cfg.file_count = Some(1);
            cfg.payload_size = 4094;
            assert!(cfg.validate().unwrap_err().is_configuration());
            cfg.payload_size = 0;
            assert!(cfg.validate().is_err());
            cfg.payload_size = 8;
            assert!(cfg.validate().is_ok());
            assert_eq!(cfg.element_count(), 2);
        }
    }

    #[test]
    fn test_sequential_payload_any_positive_size() {
        for variant in [Variant::SequentialWrite, Variant::SequentialRead] {
            let mut cfg = sample(variant);
            for size in [1, 3, 1001, 4095] {
                cfg.payload_size = size;
                assert!(cfg.validate().is_ok(), "{variant} size {size}");
            }
            cfg.payload_size = 0;
            assert!(cfg.validate().is_err());
        }
    }

    #[test]
    fn test_collective_element_limit() {
        let mut cfg = sample(Variant::CollectiveRead);
        cfg.payload_size = (i32::MAX as u64 + 1) * 4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_serialized_form_tracks_fields() {
        let a = sample(Variant::SequentialRead);
        let mut b = a.clone();
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        b.payload_size = 8192;
        assert_ne!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
    }

    #[test]
    fn test_direction() {
        assert_eq!(Variant::CollectiveRead.direction(), XferDir::Read);
        assert_eq!(Variant::SequentialWrite.direction(), XferDir::Write);
        assert!(!Variant::SequentialRead.is_collective());
    }
}
