use std::path::{Path, PathBuf};

/// Common prefix for every benchmark data file.
pub const FILE_PREFIX: &str = "gio-file";

/// Private file of one rank: `<dir>/gio-file.<rank>.<pid>`.
pub fn sequential_path(dir: &Path, rank: i32, pid: u32) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}.{rank}.{pid}"))
}

/// Shared file of one sub-group: `<dir>/gio-file.coll.<color>.<file_count>`.
pub fn collective_path(dir: &Path, color: i32, file_count: i32) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}.coll.{color}.{file_count}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_path() {
        let p = sequential_path(Path::new("/scratch/run"), 3, 4242);
        assert_eq!(p, PathBuf::from("/scratch/run/gio-file.3.4242"));
    }

    #[test]
    fn test_collective_paths_distinct_per_color() {
        let dir = Path::new("/lustre");
        let a = collective_path(dir, 0, 4);
        let b = collective_path(dir, 1, 4);
        assert_eq!(a, PathBuf::from("/lustre/gio-file.coll.0.4"));
        assert_ne!(a, b);
        // same color under a different layout is a different file
        assert_ne!(a, collective_path(dir, 0, 2));
    }
}
