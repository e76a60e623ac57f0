//! Profile view model supplied by the statistics backend

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::wallet::WalletBadges;

/// Aggregated contribution statistics for one developer.
///
/// Built upstream and treated as immutable by the view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    /// GitHub login the statistics belong to
    pub username: String,

    /// Per-month summaries, oldest first
    #[serde(default)]
    pub monthly: Vec<PeriodSummary>,

    /// Per-week summaries, oldest first
    #[serde(default)]
    pub weekly: Vec<PeriodSummary>,

    #[serde(default)]
    pub tags: TagSet,

    #[serde(default)]
    pub stats: ContributionStats,

    /// One sample per day with activity
    #[serde(default)]
    pub daily_activity: Vec<DailyActivity>,

    /// Addresses already known upstream
    #[serde(default)]
    pub addresses: WalletBadges,
}

/// Activity summed over one time bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    /// Bucket label, e.g. `2024-05` or `2024-W19`
    pub label: String,
    #[serde(default)]
    pub prs: u32,
    #[serde(default)]
    pub xp: u64,
}

/// Tags attached to the developer, by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

impl TagSet {
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.skills.is_empty() && self.focus_areas.is_empty()
    }
}

/// Aggregate pull-request and code-change counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionStats {
    #[serde(default)]
    pub total_prs: u32,
    #[serde(default)]
    pub merged_prs: u32,
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub repositories: u32,
}

impl ContributionStats {
    /// Share of pull requests that were merged, `None` without any PRs
    pub fn merge_rate(&self) -> Option<f64> {
        if self.total_prs == 0 {
            return None;
        }
        Some(f64::from(self.merged_prs.min(self.total_prs)) / f64::from(self.total_prs))
    }

    /// Lines added minus lines deleted, saturating at the `i64` bounds
    pub fn net_lines(&self) -> i64 {
        let additions = i64::try_from(self.additions).unwrap_or(i64::MAX);
        let deletions = i64::try_from(self.deletions).unwrap_or(i64::MAX);
        additions.saturating_sub(deletions)
    }
}

/// Contribution count for one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: u32,
}
