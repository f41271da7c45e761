//! Ordered table mapping overdue-day bands to reminder tiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::ReminderTier;

/// A band starts at `min_days` and runs until the next band's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBand {
    pub min_days: i64,
    pub tier: ReminderTier,
}

/// Ascending escalation bands over overdue-days.
///
/// Both `min_days` and tiers are strictly increasing, and the first band
/// starts at one day or later. The last band is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierSchedule {
    bands: Vec<TierBand>,
}

impl TierSchedule {
    /// Build a schedule, rejecting empty, unordered, or non-positive bands.
    pub fn new(bands: Vec<TierBand>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::Config("tier schedule needs at least one band".into()));
        }
        if bands[0].min_days < 1 {
            return Err(Error::Config(format!(
                "first tier band must start at 1 day or later, got {}",
                bands[0].min_days
            )));
        }
        for pair in bands.windows(2) {
            if pair[1].min_days <= pair[0].min_days {
                return Err(Error::Config(format!(
                    "tier band starts must increase: {} then {}",
                    pair[0].min_days, pair[1].min_days
                )));
            }
            if pair[1].tier <= pair[0].tier {
                return Err(Error::Config(format!(
                    "tiers must escalate: {} then {}",
                    pair[0].tier, pair[1].tier
                )));
            }
        }
        Ok(Self { bands })
    }

    /// Parse `"1:friendly,4:polite,8:firm,15:urgent"`.
    pub fn parse(spec: &str) -> Result<Self> {
        let bands = spec
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (days, tier) = part.split_once(':').ok_or_else(|| {
                    Error::Config(format!("tier band '{}' is not 'days:tier'", part))
                })?;
                let min_days = days.trim().parse::<i64>().map_err(|_| {
                    Error::Config(format!("tier band '{}' has a non-numeric day count", part))
                })?;
                let tier = tier
                    .parse::<ReminderTier>()
                    .map_err(|e| Error::Config(e.to_string()))?;
                Ok(TierBand { min_days, tier })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(bands)
    }

    /// Read `REMINDER_TIER_BANDS`, falling back to the default table when
    /// unset or invalid.
    pub fn from_env() -> Self {
        match std::env::var("REMINDER_TIER_BANDS") {
            Ok(raw) => Self::parse(&raw).unwrap_or_else(|e| {
                warn!(
                    subsystem = "reminders",
                    component = "schedule",
                    error = %e,
                    "Invalid REMINDER_TIER_BANDS, using defaults"
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Tier for a number of overdue days, or `None` before the first band.
    pub fn tier_for(&self, overdue_days: i64) -> Option<ReminderTier> {
        self.bands
            .iter()
            .rev()
            .find(|band| overdue_days >= band.min_days)
            .map(|band| band.tier)
    }

    pub fn bands(&self) -> &[TierBand] {
        &self.bands
    }
}

impl Default for TierSchedule {
    fn default() -> Self {
        Self::parse(defaults::REMINDER_TIER_BANDS).unwrap_or_else(|_| Self {
            bands: vec![TierBand {
                min_days: 1,
                tier: ReminderTier::Friendly,
            }],
        })
    }
}

impl fmt::Display for TierSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .bands
            .iter()
            .map(|b| format!("{}:{}", b.min_days, b.tier))
            .collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bands() {
        let schedule = TierSchedule::default();
        assert_eq!(schedule.to_string(), defaults::REMINDER_TIER_BANDS);
        assert_eq!(schedule.bands().len(), 4);
    }

    #[test]
    fn test_tier_for_band_edges() {
        let schedule = TierSchedule::default();
        assert_eq!(schedule.tier_for(0), None);
        assert_eq!(schedule.tier_for(-5), None);
        assert_eq!(schedule.tier_for(1), Some(ReminderTier::Friendly));
        assert_eq!(schedule.tier_for(3), Some(ReminderTier::Friendly));
        assert_eq!(schedule.tier_for(4), Some(ReminderTier::Polite));
        assert_eq!(schedule.tier_for(7), Some(ReminderTier::Polite));
        assert_eq!(schedule.tier_for(8), Some(ReminderTier::Firm));
        assert_eq!(schedule.tier_for(14), Some(ReminderTier::Firm));
        assert_eq!(schedule.tier_for(15), Some(ReminderTier::Urgent));
        assert_eq!(schedule.tier_for(400), Some(ReminderTier::Urgent));
    }

    #[test]
    fn test_custom_schedule() {
        let schedule = TierSchedule::parse("3:polite, 30:urgent").unwrap();
        assert_eq!(schedule.tier_for(2), None);
        assert_eq!(schedule.tier_for(3), Some(ReminderTier::Polite));
        assert_eq!(schedule.tier_for(29), Some(ReminderTier::Polite));
        assert_eq!(schedule.tier_for(30), Some(ReminderTier::Urgent));
    }

    #[test]
    fn test_rejects_unordered_days() {
        let err = TierSchedule::parse("4:friendly,2:polite").unwrap_err();
        assert!(err.to_string().contains("must increase"));
    }

    #[test]
    fn test_rejects_non_escalating_tiers() {
        let err = TierSchedule::parse("1:firm,5:polite").unwrap_err();
        assert!(err.to_string().contains("escalate"));
    }

    #[test]
    fn test_rejects_zero_start_and_garbage() {
        assert!(TierSchedule::parse("0:friendly").is_err());
        assert!(TierSchedule::parse("").is_err());
        assert!(TierSchedule::parse("one:friendly").is_err());
        assert!(TierSchedule::parse("1-friendly").is_err());
        assert!(TierSchedule::parse("1:stern").is_err());
    }
}
