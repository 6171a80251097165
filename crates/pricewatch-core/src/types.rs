//! Job model: one tracked product, its target and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::PriceWatchError;

pub type JobId = i64;

/// Lifecycle state of a tracking job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, waiting for confirmation.
    Pending,
    /// Confirmed; a poller should be running.
    Active,
    /// Terminal.
    Stopped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Active => "active",
            JobStatus::Stopped => "stopped",
        }
    }

    /// Allowed edges: pending→active, pending→stopped, active→stopped.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Active)
                | (JobStatus::Pending, JobStatus::Stopped)
                | (JobStatus::Active, JobStatus::Stopped)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = PriceWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "active" => Ok(JobStatus::Active),
            "stopped" => Ok(JobStatus::Stopped),
            other => Err(PriceWatchError::Store(format!("Unknown job status '{other}'"))),
        }
    }
}

/// A tracked product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Deep-link handshake token, unique per job.
    pub token: String,
    pub title: String,
    pub url: String,
    pub image: Option<String>,
    /// Last observed price.
    pub current_price: Option<f64>,
    /// Set once on activation, never changed afterwards.
    pub target_price: Option<f64>,
    /// Target suggested at submission time; only adopted on confirmation.
    pub proposed_target: Option<f64>,
    pub status: JobStatus,
    /// Who receives alerts (Telegram chat id).
    pub recipient: Option<String>,
    pub notification_count: u32,
    pub created_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Job {
    /// True when `price` is at or below the confirmed target.
    pub fn is_triggered_by(&self, price: f64) -> bool {
        self.target_price.is_some_and(|target| price <= target)
    }
}

/// Point-in-time read of a product page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub title: String,
    pub price: f64,
    pub image: Option<String>,
}

/// Parse a human-written price ("₹1,299.00", "1299") keeping digits and dots.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|p| p.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_text() {
        assert_eq!(parse_price_text("₹1,299.00"), Some(1299.0));
        assert_eq!(parse_price_text(" 849. "), Some(849.0));
        assert_eq!(parse_price_text("$19.99"), Some(19.99));
        assert_eq!(parse_price_text("Currently unavailable"), None);
        assert_eq!(parse_price_text("1.2.3"), None);
    }

    #[test]
    fn test_transition_table() {
        use JobStatus::*;
        let all = [Pending, Active, Stopped];
        let allowed = [(Pending, Active), (Pending, Stopped), (Active, Stopped)];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} → {to}"
                );
            }
        }
    }

    #[test]
    fn test_status_roundtrip_text() {
        for status in [JobStatus::Pending, JobStatus::Active, JobStatus::Stopped] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_trigger_requires_target() {
        let mut job = Job {
            id: 1,
            token: "t".into(),
            title: "Kettle".into(),
            url: "https://example.com/kettle".into(),
            image: None,
            current_price: Some(1200.0),
            target_price: None,
            proposed_target: None,
            status: JobStatus::Pending,
            recipient: None,
            notification_count: 0,
            created_at: Utc::now(),
            stopped_at: None,
        };
        assert!(!job.is_triggered_by(1.0));
        job.target_price = Some(1000.0);
        assert!(job.is_triggered_by(1000.0));
        assert!(job.is_triggered_by(999.5));
        assert!(!job.is_triggered_by(1000.01));
    }
}
