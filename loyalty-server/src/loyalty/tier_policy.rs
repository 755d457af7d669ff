//! Tier Policy
//!
//! Pure mapping from a tier-points value to a tier and the progress within
//! its band, over an ascending threshold table. No state, no I/O.

use shared::models::{Tier, TierProgress, TierThreshold};

use super::error::{LedgerError, LedgerResult};

/// Validated, strictly ascending tier threshold table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTable {
    rows: Vec<TierThreshold>,
}

impl TierTable {
    /// Build a table. Rows must be non-empty, start at 0, and strictly ascend
    /// in both tier and minimum points.
    pub fn new(rows: Vec<TierThreshold>) -> LedgerResult<Self> {
        let Some(first) = rows.first() else {
            return Err(LedgerError::InvalidTierConfig(
                "tier table is empty".into(),
            ));
        };
        if first.min_tier_points != 0 {
            return Err(LedgerError::InvalidTierConfig(format!(
                "lowest tier {} must start at 0, got {}",
                first.tier, first.min_tier_points
            )));
        }
        for pair in rows.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            if upper.tier <= lower.tier {
                return Err(LedgerError::InvalidTierConfig(format!(
                    "tiers out of order: {} listed after {}",
                    upper.tier, lower.tier
                )));
            }
            if upper.min_tier_points <= lower.min_tier_points {
                return Err(LedgerError::InvalidTierConfig(format!(
                    "threshold for {} ({}) must exceed {} ({})",
                    upper.tier, upper.min_tier_points, lower.tier, lower.min_tier_points
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Bronze 0, Silver 1000, Gold 5000, Platinum 10000
    pub fn standard() -> Self {
        Self {
            rows: vec![
                TierThreshold::new(Tier::Bronze, 0),
                TierThreshold::new(Tier::Silver, 1_000),
                TierThreshold::new(Tier::Gold, 5_000),
                TierThreshold::new(Tier::Platinum, 10_000),
            ],
        }
    }

    /// Build a table from minimums assigned to tiers in ascending order,
    /// e.g. `[0, 1000, 5000, 10000]`.
    pub fn from_minimums(minimums: &[i64]) -> LedgerResult<Self> {
        if minimums.len() > Tier::ALL.len() {
            return Err(LedgerError::InvalidTierConfig(format!(
                "{} thresholds given, at most {} tiers exist",
                minimums.len(),
                Tier::ALL.len()
            )));
        }
        let rows = Tier::ALL
            .iter()
            .zip(minimums)
            .map(|(tier, min)| TierThreshold::new(*tier, *min))
            .collect();
        Self::new(rows)
    }

    /// Parse a comma separated list of minimums (`"0,1000,5000,10000"`)
    pub fn parse(thresholds: &str) -> LedgerResult<Self> {
        let minimums = thresholds
            .split(',')
            .map(|part| {
                part.trim().parse::<i64>().map_err(|e| {
                    LedgerError::InvalidTierConfig(format!("bad threshold '{}': {e}", part.trim()))
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;
        Self::from_minimums(&minimums)
    }

    pub fn rows(&self) -> &[TierThreshold] {
        &self.rows
    }

    /// Highest tier whose threshold is met
    pub fn tier_for(&self, tier_points: i64) -> Tier {
        self.rows[self.band_index(tier_points)].tier
    }

    /// Tier and progress for a tier-points value
    pub fn evaluate(&self, tier_points: i64) -> (Tier, TierProgress) {
        let index = self.band_index(tier_points);
        (self.rows[index].tier, self.progress_in_band(index, tier_points))
    }

    /// Progress measured from the band of `tier`, which may be above what
    /// `tier_points` alone would earn when demotion is disabled.
    pub fn progress_for(&self, tier: Tier, tier_points: i64) -> TierProgress {
        let index = self
            .rows
            .iter()
            .rposition(|row| row.tier <= tier)
            .unwrap_or(0);
        self.progress_in_band(index, tier_points)
    }

    fn band_index(&self, tier_points: i64) -> usize {
        self.rows
            .iter()
            .rposition(|row| row.min_tier_points <= tier_points)
            .unwrap_or(0)
    }

    fn progress_in_band(&self, index: usize, tier_points: i64) -> TierProgress {
        let current = &self.rows[index];
        let Some(next) = self.rows.get(index + 1) else {
            return TierProgress::top();
        };

        let span = (next.min_tier_points - current.min_tier_points) as f64;
        let into_band = (tier_points - current.min_tier_points) as f64;
        let percentage = (into_band / span * 100.0).clamp(0.0, 100.0);

        TierProgress {
            points_to_next_tier: (next.min_tier_points - tier_points).max(0),
            next_tier: Some(next.tier),
            progress_percentage: percentage,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Tier table plus the demotion rule
#[derive(Debug, Clone, Default)]
pub struct TierPolicy {
    pub table: TierTable,
    /// When false, a drop in tier points never lowers an achieved tier
    pub allow_demotion: bool,
}

impl TierPolicy {
    pub fn new(table: TierTable, allow_demotion: bool) -> Self {
        Self {
            table,
            allow_demotion,
        }
    }

    /// Tier a member holding `current` should end up with at `tier_points`
    pub fn resolve(&self, current: Tier, tier_points: i64) -> Tier {
        let computed = self.table.tier_for(tier_points);
        if computed < current && !self.allow_demotion {
            current
        } else {
            computed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_standard_bands() {
        let table = TierTable::standard();
        assert_eq!(table.tier_for(0), Tier::Bronze);
        assert_eq!(table.tier_for(999), Tier::Bronze);
        assert_eq!(table.tier_for(1_000), Tier::Silver);
        assert_eq!(table.tier_for(5_000), Tier::Gold);
        assert_eq!(table.tier_for(250_000), Tier::Platinum);
    }

    #[test]
    fn test_progress_within_band() {
        let (tier, progress) = TierTable::standard().evaluate(3_000);
        assert_eq!(tier, Tier::Silver);
        assert_eq!(progress.next_tier, Some(Tier::Gold));
        assert_eq!(progress.points_to_next_tier, 2_000);
        assert!((progress.progress_percentage - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_top_tier_progress() {
        let (tier, progress) = TierTable::standard().evaluate(12_000);
        assert_eq!(tier, Tier::Platinum);
        assert_eq!(progress, TierProgress::top());
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let table = TierTable::standard();
        let mut last: Option<(Tier, f64)> = None;
        for points in (0..=12_000).step_by(37) {
            let (tier, progress) = table.evaluate(points);
            assert!((0.0..=100.0).contains(&progress.progress_percentage));
            if let Some((last_tier, last_pct)) = last
                && last_tier == tier
            {
                assert!(progress.progress_percentage >= last_pct);
            }
            last = Some((tier, progress.progress_percentage));
        }
    }

    #[test]
    fn test_progress_for_kept_tier_clamps_to_zero() {
        // Gold member whose points fell back into the Silver band
        let progress = TierTable::standard().progress_for(Tier::Gold, 2_000);
        assert_eq!(progress.next_tier, Some(Tier::Platinum));
        assert_eq!(progress.points_to_next_tier, 8_000);
        assert_eq!(progress.progress_percentage, 0.0);
    }

    #[test]
    fn test_rejects_malformed_tables() {
        assert!(matches!(
            TierTable::new(vec![]),
            Err(LedgerError::InvalidTierConfig(_))
        ));
        assert!(TierTable::from_minimums(&[100, 1_000]).is_err());
        assert!(TierTable::from_minimums(&[0, 5_000, 1_000]).is_err());
        assert!(TierTable::from_minimums(&[0, 1_000, 1_000]).is_err());
        assert!(TierTable::from_minimums(&[0, 1, 2, 3, 4]).is_err());
        assert!(
            TierTable::new(vec![
                TierThreshold::new(Tier::Silver, 0),
                TierThreshold::new(Tier::Bronze, 100),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            TierTable::parse("0, 1000,5000 ,10000").unwrap(),
            TierTable::standard()
        );
        assert!(TierTable::parse("0,abc").is_err());

        let short = TierTable::parse("0,500").unwrap();
        assert_eq!(short.tier_for(10_000), Tier::Silver);
        assert_eq!(short.evaluate(10_000).1, TierProgress::top());
    }

    #[test]
    fn test_demotion_rule() {
        let keep = TierPolicy::new(TierTable::standard(), false);
        assert_eq!(keep.resolve(Tier::Gold, 10), Tier::Gold);
        assert_eq!(keep.resolve(Tier::Gold, 10_000), Tier::Platinum);

        let demote = TierPolicy::new(TierTable::standard(), true);
        assert_eq!(demote.resolve(Tier::Gold, 10), Tier::Bronze);
    }
}
