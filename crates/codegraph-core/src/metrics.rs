// ABOUTME: Quality metrics attached to every Function: computed once during extraction,
// ABOUTME: stored on the record, never read back by the staged resolution engine itself.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub cyclomatic_complexity: u32,
    pub cognitive_complexity: u32,
    pub lines_of_code: u32,
    pub lines_of_comments: u32,
    pub parameter_count: u32,
    pub halstead_volume: f64,
    pub maintainability_index: f64,
}

/// Raw operator/operand tallies collected during the same AST walk that extracts a
/// function, consumed by [`halstead_volume`] so the volume never needs a second pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalsteadCounts {
    pub distinct_operators: u32,
    pub distinct_operands: u32,
    pub total_operators: u32,
    pub total_operands: u32,
}

/// `N * log2(n)` where `n` is the vocabulary size and `N` the program length, the
/// textbook Halstead volume formula.
pub fn halstead_volume(counts: HalsteadCounts) -> f64 {
    let vocabulary = (counts.distinct_operators + counts.distinct_operands) as f64;
    let length = (counts.total_operators + counts.total_operands) as f64;
    if vocabulary <= 0.0 {
        0.0
    } else {
        length * vocabulary.log2()
    }
}

/// The standard derived maintainability index, clamped to `[0, 100]`.
pub fn maintainability_index(halstead_volume: f64, cyclomatic_complexity: u32, lines_of_code: u32) -> f64 {
    let volume = halstead_volume.max(1.0);
    let loc = (lines_of_code.max(1)) as f64;
    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * cyclomatic_complexity as f64 - 16.2 * loc.ln();
    (raw * 100.0 / 171.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_zero_for_empty_vocabulary() {
        assert_eq!(halstead_volume(HalsteadCounts::default()), 0.0);
    }

    #[test]
    fn maintainability_index_is_clamped() {
        let mi = maintainability_index(0.0, 0, 0);
        assert!((0.0..=100.0).contains(&mi));
    }

    #[test]
    fn higher_complexity_lowers_maintainability() {
        let low = maintainability_index(500.0, 2, 20);
        let high = maintainability_index(500.0, 40, 20);
        assert!(high < low);
    }
}
