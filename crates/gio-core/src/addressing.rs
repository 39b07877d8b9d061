//! Offset addressing inside a shared file.
//!
//! Every sub-rank owns the byte range `[sub_rank * payload, (sub_rank + 1) * payload)`
//! of its sub-group's file. Two strategies reach that range:
//!
//! * [`FileView`] declares it once as a view displacement.
//! * [`CumulativeSeek`] walks the individual file pointer forward one payload
//!   at a time, which avoids a single very large displacement when the
//!   aggregate file is huge.
//!
//! Strategies drive a [`FilePositioner`], implemented over MPI-IO by the
//! benchmark binary and by a recording mock in the tests below.

use std::ops::Range;

use crate::config::AddressingMode;
use crate::error::{GioError, Result};

/// File positioning primitives a strategy may use.
pub trait FilePositioner {
    /// Set the file view with the given byte displacement.
    fn set_view(&mut self, displacement: i64) -> Result<()>;

    /// Move the individual file pointer to an absolute offset.
    fn seek_set(&mut self, offset: i64) -> Result<()>;

    /// Move the individual file pointer relative to its current position.
    fn seek_cur(&mut self, delta: i64) -> Result<()>;
}

/// A way of positioning one sub-rank at the start of its region.
pub trait OffsetAddressing {
    fn name(&self) -> &'static str;

    fn position(
        &self,
        file: &mut dyn FilePositioner,
        sub_rank: i32,
        payload_size: u64,
    ) -> Result<()>;
}

/// Declarative view: displacement `sub_rank * payload_size`.
pub struct FileView;

/// `sub_rank` forward seeks of `payload_size` bytes from the file start.
pub struct CumulativeSeek;

impl OffsetAddressing for FileView {
    fn name(&self) -> &'static str {
        "view"
    }

    fn position(
        &self,
        file: &mut dyn FilePositioner,
        sub_rank: i32,
        payload_size: u64,
    ) -> Result<()> {
        let region = region_for(sub_rank, payload_size)?;
        file.set_view(offset_of(region.start)?)
    }
}

impl OffsetAddressing for CumulativeSeek {
    fn name(&self) -> &'static str {
        "seek"
    }

    fn position(
        &self,
        file: &mut dyn FilePositioner,
        sub_rank: i32,
        payload_size: u64,
    ) -> Result<()> {
        let step = offset_of(payload_size)?;
        file.seek_set(0)?;
        for _ in 0..sub_rank {
            file.seek_cur(step)?;
        }
        Ok(())
    }
}

impl AddressingMode {
    pub fn strategy(&self) -> &'static dyn OffsetAddressing {
        match self {
            AddressingMode::FileView => &FileView,
            AddressingMode::CumulativeSeek => &CumulativeSeek,
        }
    }
}

/// Byte range owned by `sub_rank` within its shared file.
pub fn region_for(sub_rank: i32, payload_size: u64) -> Result<Range<u64>> {
    let rank = u64::try_from(sub_rank)
        .map_err(|_| GioError::config(format!("negative sub-rank {sub_rank}")))?;
    let start = rank
        .checked_mul(payload_size)
        .ok_or_else(|| GioError::config("shared file offset overflows"))?;
    let end = start
        .checked_add(payload_size)
        .ok_or_else(|| GioError::config("shared file offset overflows"))?;
    Ok(start..end)
}

fn offset_of(bytes: u64) -> Result<i64> {
    i64::try_from(bytes).map_err(|_| GioError::config(format!("offset {bytes} exceeds MPI_Offset")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tracks where a transfer of the positioned rank would land.
    #[derive(Default)]
    struct Recorder {
        view_disp: i64,
        pointer: i64,
        calls: Vec<&'static str>,
    }

    impl Recorder {
        fn landing_offset(&self) -> i64 {
            self.view_disp + self.pointer
        }
    }

    impl FilePositioner for Recorder {
        fn set_view(&mut self, displacement: i64) -> Result<()> {
            self.view_disp = displacement;
            self.pointer = 0;
            self.calls.push("view");
            Ok(())
        }

        fn seek_set(&mut self, offset: i64) -> Result<()> {
            self.pointer = offset;
            self.calls.push("seek_set");
            Ok(())
        }

        fn seek_cur(&mut self, delta: i64) -> Result<()> {
            self.pointer += delta;
            self.calls.push("seek_cur");
            Ok(())
        }
    }

    fn landing(strategy: &dyn OffsetAddressing, sub_rank: i32, payload: u64) -> i64 {
        let mut rec = Recorder::default();
        strategy.position(&mut rec, sub_rank, payload).unwrap();
        rec.landing_offset()
    }

    #[test]
    fn test_strategies_agree() {
        for payload in [4u64, 4096, 1 << 20, 3 << 30] {
            for sub_rank in 0..16 {
                let view = landing(&FileView, sub_rank, payload);
                let seek = landing(&CumulativeSeek, sub_rank, payload);
                assert_eq!(view, seek, "sub_rank {sub_rank} payload {payload}");
                assert_eq!(view as u64, region_for(sub_rank, payload).unwrap().start);
            }
        }
    }

    #[test]
    fn test_regions_tile_the_file() {
        let payload = 4096;
        let group = 8;
        let mut expected_start = 0;
        for sub_rank in 0..group {
            let r = region_for(sub_rank, payload).unwrap();
            assert_eq!(r.start, expected_start, "gap or overlap before {sub_rank}");
            assert_eq!(r.end - r.start, payload);
            expected_start = r.end;
        }
        assert_eq!(expected_start, group as u64 * payload);
    }

    #[test]
    fn test_seek_call_pattern() {
        let mut rec = Recorder::default();
        CumulativeSeek.position(&mut rec, 3, 100).unwrap();
        assert_eq!(rec.calls, ["seek_set", "seek_cur", "seek_cur", "seek_cur"]);

        let mut rec = Recorder::default();
        FileView.position(&mut rec, 3, 100).unwrap();
        assert_eq!(rec.calls, ["view"]);
    }

    #[test]
    fn test_large_aggregate_offsets() {
        // 2048 sub-ranks of 2 GiB each: past 4 TiB
        let payload = 2u64 << 30;
        let r = region_for(2047, payload).unwrap();
        assert_eq!(r.start, 2047 * payload);
        assert_eq!(landing(&CumulativeSeek, 2047, payload) as u64, r.start);
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(region_for(i32::MAX, u64::MAX / 2).is_err());
        assert!(region_for(-1, 16).is_err());
        assert!(FileView.position(&mut Recorder::default(), 2, u64::MAX / 2).is_err());
    }

    #[test]
    fn test_mode_selects_strategy() {
        assert_eq!(AddressingMode::FileView.strategy().name(), "view");
        assert_eq!(AddressingMode::CumulativeSeek.strategy().name(), "seek");
    }
}
