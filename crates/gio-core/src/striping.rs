use serde::{Deserialize, Serialize};

/// Largest stripe count a single file may use on the target filesystem.
pub const DEFAULT_MAX_STRIPE_COUNT: u32 = 160;
/// Stripe unit in bytes (1 MiB).
pub const DEFAULT_STRIPE_UNIT: u64 = 1_048_576;

/// Striping limits supplied by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripingParams {
    /// Storage targets available to one file
    pub max_stripe_count: u32,
    /// Bytes per stripe
    pub stripe_unit: u64,
}

impl Default for StripingParams {
    fn default() -> Self {
        Self {
            max_stripe_count: DEFAULT_MAX_STRIPE_COUNT,
            stripe_unit: DEFAULT_STRIPE_UNIT,
        }
    }
}

/// Advisory layout hints handed to MPI-IO when a shared file is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripingHints {
    pub factor: u32,
    pub unit: u64,
}

impl StripingHints {
    /// Spread the available storage targets evenly over `file_count` files.
    ///
    /// The factor is `max_stripe_count / file_count`, floored at 1 and never
    /// above `max_stripe_count`.
    pub fn compute(params: &StripingParams, file_count: u32) -> Self {
        let max = params.max_stripe_count.max(1);
        let factor = (max / file_count.max(1)).clamp(1, max);
        Self {
            factor,
            unit: params.stripe_unit,
        }
    }

    /// Key/value pairs in the form `MPI_Info_set` expects.
    pub fn info_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("striping_factor", self.factor.to_string()),
            ("striping_unit", self.unit.to_string()),
            ("romio_cb_write", "enable".to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_inverse_to_file_count() {
        let params = StripingParams::default();
        assert_eq!(StripingHints::compute(&params, 1).factor, 160);
        assert_eq!(StripingHints::compute(&params, 2).factor, 80);
        assert_eq!(StripingHints::compute(&params, 3).factor, 53);
        assert_eq!(StripingHints::compute(&params, 160).factor, 1);
    }

    #[test]
    fn test_factor_floored_at_one() {
        let params = StripingParams {
            max_stripe_count: 4,
            stripe_unit: 65536,
        };
        let hints = StripingHints::compute(&params, 64);
        assert_eq!(hints.factor, 1);
        assert_eq!(hints.unit, 65536);
    }

    #[test]
    fn test_degenerate_inputs() {
        let params = StripingParams {
            max_stripe_count: 0,
            stripe_unit: DEFAULT_STRIPE_UNIT,
        };
        assert_eq!(StripingHints::compute(&params, 0).factor, 1);
    }

    #[test]
    fn test_info_pairs() {
        let hints = StripingHints {
            factor: 4,
            unit: 1_048_576,
        };
        let pairs = hints.info_pairs();
        assert_eq!(pairs[0], ("striping_factor", "4".to_string()));
        assert_eq!(pairs[1], ("striping_unit", "1048576".to_string()));
        assert_eq!(pairs[2].0, "romio_cb_write");
    }
}
