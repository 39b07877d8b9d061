use std::ops::Range;

use crate::error::{GioError, Result};

/// Placement of one rank within the sub-groups that share a target file.
///
/// The world group of `N` ranks is cut into `M` contiguous blocks of `N / M`
/// ranks; block `c` (the color) writes file `c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubGroupLayout {
    /// Sub-group index, `0..file_count`
    pub color: i32,
    /// Ranks per sub-group
    pub size: i32,
    /// Rank within the sub-group
    pub local_rank: i32,
    /// Number of sub-groups (and shared files)
    pub file_count: i32,
}

impl SubGroupLayout {
    /// Compute the sub-group of `rank` when `world_size` ranks share
    /// `file_count` files.
    pub fn partition(world_size: i32, rank: i32, file_count: i32) -> Result<Self> {
        if file_count < 1 {
            return Err(GioError::config(format!(
                "file count must be at least 1 (got {file_count})"
            )));
        }
        if world_size < 1 || rank < 0 || rank >= world_size {
            return Err(GioError::config(format!(
                "rank {rank} is outside a group of {world_size}"
            )));
        }
        if world_size % file_count != 0 {
            return Err(GioError::config(format!(
                "world size {world_size} cannot be divided by file count {file_count}"
            )));
        }

        let size = world_size / file_count;
        Ok(Self {
            color: rank / size,
            size,
            local_rank: rank % size,
            file_count,
        })
    }

    /// Global ranks belonging to this sub-group.
    pub fn members(&self) -> Range<i32> {
        let first = self.color * self.size;
        first..first + self.size
    }

    pub fn is_leader(&self) -> bool {
        self.local_rank == 0
    }
}
