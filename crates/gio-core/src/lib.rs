pub mod addressing;
pub mod config;
pub mod error;
pub mod handle;
pub mod partition;
pub mod paths;
pub mod payload;
pub mod striping;
pub mod timer;

// Re-export primary types for convenience
pub use addressing::{CumulativeSeek, FilePositioner, FileView, OffsetAddressing};
pub use config::{AddressingMode, ExperimentConfig, Variant};
pub use error::{GioError, Result, ValidationError};
pub use handle::{OpenFlags, XferDir};
pub use partition::SubGroupLayout;
pub use payload::{ELEMENT_WIDTH, Payload, SENTINEL};
pub use striping::{StripingHints, StripingParams};
pub use timer::{Phase, PhaseRecord, PhaseTable, now};
