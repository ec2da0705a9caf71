//! Alert derivation and expiry.
//!
//! Expiry is evaluated at read time by [`is_alert_active`]; nothing sweeps
//! expired alerts. The stored `active` flag is a manual override that is
//! checked in addition to expiry.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use fleetwatch_types::{Accident, Alert, AlertId, AlertType, GeoPoint, IdentityId};

use crate::config::AlertsConfig;

/// Title given to every accident alert.
pub const ACCIDENT_ALERT_TITLE: &str = "Accident Reported";

/// Message used when the accident has no description.
pub const DEFAULT_ALERT_MESSAGE: &str = "An accident has been detected. Proceed with caution.";

/// Whether `alert` is active at `now`.
///
/// True only while the flag is set and `expires_at` (if any) lies strictly
/// after `now`.
pub fn is_alert_active(alert: &Alert, now: DateTime<Utc>) -> bool {
    alert.active && alert.expires_at.is_none_or(|expires_at| expires_at > now)
}

/// Radius and lifetime applied to newly derived alerts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    /// Alert radius in meters.
    pub radius_m: f64,
    /// Time from creation until expiry.
    pub ttl: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            radius_m: 1500.0,
            ttl: Duration::hours(2),
        }
    }
}

impl AlertPolicy {
    /// Build the policy from the `alerts` config section.
    pub fn from_config(config: &AlertsConfig) -> Self {
        Self {
            radius_m: config.default_radius_m,
            ttl: i64::try_from(config.default_ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or_else(|| Self::default().ttl),
        }
    }

    /// Apply per-report overrides on top of this policy.
    #[must_use]
    pub fn with_overrides(self, radius_m: Option<f64>, ttl_secs: Option<u64>) -> Self {
        Self {
            radius_m: radius_m.unwrap_or(self.radius_m),
            ttl: ttl_secs
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(Duration::try_seconds)
                .unwrap_or(self.ttl),
        }
    }

    /// Derive the alert for a freshly stored accident.
    pub fn derive(&self, accident: &Accident, created_by: IdentityId, now: DateTime<Utc>) -> Alert {
        let message = accident
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_ALERT_MESSAGE)
            .to_owned();

        Alert {
            id: AlertId::new(),
            alert_type: AlertType::Accident,
            accident_id: Some(accident.id),
            position: accident.position,
            radius_m: self.radius_m,
            title: ACCIDENT_ALERT_TITLE.to_owned(),
            message,
            severity: accident.severity,
            active: true,
            expires_at: now.checked_add_signed(self.ttl),
            created_by,
            created_at: now,
        }
    }
}

/// Optional proximity filter for active-alert queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Proximity {
    /// Alerts whose center lies within `radius_m` of `center`.
    Within {
        /// Query point.
        center: GeoPoint,
        /// Search radius in meters.
        radius_m: f64,
    },
    /// Alerts whose own radius covers `point`.
    Covering {
        /// Query point.
        point: GeoPoint,
    },
}

/// An active alert, with its distance when the query was proximity-filtered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlert {
    /// The alert.
    #[serde(flatten)]
    pub alert: Alert,
    /// Distance from the query point in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_m: Option<f64>,
}
