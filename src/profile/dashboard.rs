//! Render model for the profile dashboard

use std::fmt;

use chrono::NaiveDate;

use super::types::{ContributionStats, PeriodSummary, ProfileData};
use super::wallet::WalletBadges;

/// Highest heatmap intensity level
pub const MAX_HEAT_LEVEL: u8 = 4;

/// Tag categories, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCategory {
    Role,
    Skill,
    FocusArea,
}

impl TagCategory {
    fn label(self) -> &'static str {
        match self {
            Self::Role => "Roles",
            Self::Skill => "Skills",
            Self::FocusArea => "Focus areas",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagBadge {
    pub category: TagCategory,
    pub label: String,
}

/// One heatmap day; `level` is 0 for no activity, up to [`MAX_HEAT_LEVEL`] at the peak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatCell {
    pub date: NaiveDate,
    pub count: u32,
    pub level: u8,
}

/// Everything the profile page shows, derived from [`ProfileData`]
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub username: String,
    pub stats: ContributionStats,
    pub merge_rate: Option<f64>,
    pub net_lines: i64,
    pub monthly: Vec<PeriodSummary>,
    pub weekly: Vec<PeriodSummary>,
    pub tags: Vec<TagBadge>,
    pub heatmap: Vec<HeatCell>,
    pub active_days: usize,
    pub longest_streak: usize,
    pub wallets: WalletBadges,
}

impl Dashboard {
    pub fn build(data: &ProfileData, wallets: &WalletBadges) -> Self {
        let heatmap = heatmap(data);
        let active_days = heatmap.iter().filter(|cell| cell.count > 0).count();
        let longest_streak = longest_streak(&heatmap);

        Self {
            username: data.username.clone(),
            stats: data.stats,
            merge_rate: data.stats.merge_rate(),
            net_lines: data.stats.net_lines(),
            monthly: data.monthly.clone(),
            weekly: data.weekly.clone(),
            tags: tag_badges(data),
            heatmap,
            active_days,
            longest_streak,
            wallets: wallets.clone(),
        }
    }
}

fn tag_badges(data: &ProfileData) -> Vec<TagBadge> {
    let categories = [
        (TagCategory::Role, &data.tags.roles),
        (TagCategory::Skill, &data.tags.skills),
        (TagCategory::FocusArea, &data.tags.focus_areas),
    ];

    let mut badges = Vec::new();
    for (category, labels) in categories {
        for label in labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            let duplicate = badges
                .iter()
                .any(|b: &TagBadge| b.category == category && b.label.eq_ignore_ascii_case(label));
            if !duplicate {
                badges.push(TagBadge {
                    category,
                    label: label.to_string(),
                });
            }
        }
    }
    badges
}

/// Days sorted ascending, duplicate samples for a day summed
fn heatmap(data: &ProfileData) -> Vec<HeatCell> {
    let mut days: Vec<(NaiveDate, u32)> = Vec::with_capacity(data.daily_activity.len());
    let mut samples = data.daily_activity.clone();
    samples.sort_by_key(|sample| sample.date);
    for sample in samples {
        match days.last_mut() {
            Some((date, count)) if *date == sample.date => {
                *count = count.saturating_add(sample.count)
            }
            _ => days.push((sample.date, sample.count)),
        }
    }

    let peak = days.iter().map(|(_, count)| *count).max().unwrap_or(0);
    days.into_iter()
        .map(|(date, count)| HeatCell {
            date,
            count,
            level: heat_level(count, peak),
        })
        .collect()
}

fn heat_level(count: u32, peak: u32) -> u8 {
    if count == 0 || peak == 0 {
        return 0;
    }
    let scaled = (u64::from(count) * u64::from(MAX_HEAT_LEVEL)).div_ceil(u64::from(peak));
    scaled.clamp(1, u64::from(MAX_HEAT_LEVEL)) as u8
}

fn longest_streak(heatmap: &[HeatCell]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;

    for cell in heatmap {
        if cell.count == 0 {
            current = 0;
        } else if previous.and_then(|p| p.succ_opt()) == Some(cell.date) && current > 0 {
            current += 1;
        } else {
            current = 1;
        }
        longest = longest.max(current);
        previous = Some(cell.date);
    }
    longest
}

impl fmt::Display for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "@{}", self.username)?;
        writeln!(
            f,
            "PRs: {} ({} merged)  XP: {}  Repositories: {}",
            self.stats.total_prs, self.stats.merged_prs, self.stats.total_xp, self.stats.repositories
        )?;
        writeln!(
            f,
            "Lines: +{} -{} (net {})",
            self.stats.additions, self.stats.deletions, self.net_lines
        )?;
        if let Some(rate) = self.merge_rate {
            writeln!(f, "Merge rate: {:.0}%", rate * 100.0)?;
        }
        writeln!(
            f,
            "Active days: {}  Longest streak: {}",
            self.active_days, self.longest_streak
        )?;

        for category in [TagCategory::Role, TagCategory::Skill, TagCategory::FocusArea] {
            let labels: Vec<&str> = self
                .tags
                .iter()
                .filter(|badge| badge.category == category)
                .map(|badge| badge.label.as_str())
                .collect();
            if !labels.is_empty() {
                writeln!(f, "{}: {}", category.label(), labels.join(", "))?;
            }
        }

        if let Some(evm) = &self.wallets.evm {
            writeln!(f, "EVM: {}", evm)?;
        }
        if let Some(solana) = &self.wallets.solana {
            writeln!(f, "Solana: {}", solana)?;
        }
        Ok(())
    }
}
