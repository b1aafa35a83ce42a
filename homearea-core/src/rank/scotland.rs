//! Decile to rank translation for the Scottish index.
//!
//! The Scottish dataset publishes a native decile only for overall
//! deprivation. Every other domain is a raw rank across the 6976 data zones
//! of SIMD 2016, with 1 the most deprived. A decile threshold therefore has
//! to become the smallest rank inside that decile before filtering.

/// Data zones ranked by the Scottish index.
pub const SCOTLAND_DATA_ZONES: u32 = 6976;

/// Smallest rank belonging to deciles 2 through 10.
const DECILE_RANK_CUTOFFS: [(u8, u32); 9] = [
    (2, 699),
    (3, 1396),
    (4, 2094),
    (5, 2791),
    (6, 3489),
    (7, 4187),
    (8, 4884),
    (9, 5582),
    (10, 6279),
];

/// Smallest Scottish rank within `decile`.
///
/// Deciles 0 and 1 admit every zone and map to rank 0. Returns `None` for
/// deciles above 10.
///
/// # Examples
///
/// ```
/// use homearea_core::rank::scotland_rank_cutoff;
///
/// assert_eq!(scotland_rank_cutoff(5), Some(2791));
/// assert_eq!(scotland_rank_cutoff(1), Some(0));
/// assert_eq!(scotland_rank_cutoff(11), None);
/// ```
#[must_use]
pub fn scotland_rank_cutoff(decile: u8) -> Option<u32> {
    if decile <= 1 {
        return Some(0);
    }
    DECILE_RANK_CUTOFFS
        .iter()
        .find(|(candidate, _)| *candidate == decile)
        .map(|(_, rank)| *rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Some(0))]
    #[case(1, Some(0))]
    #[case(2, Some(699))]
    #[case(5, Some(2791))]
    #[case(10, Some(6279))]
    #[case(11, None)]
    fn translates_deciles(#[case] decile: u8, #[case] expected: Option<u32>) {
        assert_eq!(scotland_rank_cutoff(decile), expected);
    }

    #[rstest]
    fn cutoffs_increase_with_decile() {
        let cutoffs: Vec<u32> = (0..=10).filter_map(scotland_rank_cutoff).collect();
        assert!(cutoffs.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(cutoffs.iter().all(|rank| *rank < SCOTLAND_DATA_ZONES));
    }
}
