//! Enumeration types for the fleet model.
//!
//! Every enum has a stable lowercase wire form (`as_str`) that is shared by
//! the JSON protocol, query parameters and the `PostgreSQL` text columns.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    /// The enum being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl core::fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

/// Implements `as_str`, `Display` and `FromStr` from a single variant table.
macro_rules! wire_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// Stable lowercase wire form of this variant.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Operational status of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum VehicleStatus {
    /// In service and reporting positions.
    Active,
    /// Parked or decommissioned.
    Inactive,
    /// In the workshop.
    Maintenance,
}

wire_enum!(VehicleStatus, "vehicle status", {
    Active => "active",
    Inactive => "inactive",
    Maintenance => "maintenance",
});

/// Severity of an accident and of the alert derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Severity {
    /// Minor damage, no injuries expected.
    Minor,
    /// The default when a reporter does not classify the accident.
    #[default]
    Moderate,
    /// Serious collision.
    Severe,
    /// Life-threatening.
    Critical,
}

wire_enum!(Severity, "severity", {
    Minor => "minor",
    Moderate => "moderate",
    Severe => "severe",
    Critical => "critical",
});

/// Handling status of an accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AccidentStatus {
    /// Newly reported; every accident starts here.
    #[default]
    Reported,
    /// A dispatcher has picked it up.
    Acknowledged,
    /// Cleared.
    Resolved,
    /// Turned out not to be an accident.
    FalseAlarm,
}

wire_enum!(AccidentStatus, "accident status", {
    Reported => "reported",
    Acknowledged => "acknowledged",
    Resolved => "resolved",
    FalseAlarm => "false_alarm",
});

/// Kind of alert. Only accident alerts exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AlertType {
    /// Derived from an [`Accident`](crate::Accident).
    #[default]
    Accident,
}

wire_enum!(AlertType, "alert type", {
    Accident => "accident",
});

/// Role of an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Full control, including alert deactivation.
    Admin,
    /// May report locations and accidents.
    Driver,
    /// Read-only observer.
    Viewer,
}

wire_enum!(Role, "role", {
    Admin => "admin",
    Driver => "driver",
    Viewer => "viewer",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_matches_serde() {
        let json = serde_json::to_string(&AccidentStatus::FalseAlarm).unwrap_or_default();
        assert_eq!(json, format!("\"{}\"", AccidentStatus::FalseAlarm.as_str()));
    }

    #[test]
    fn parse_rejects_unknown_variant() {
        let err = "catastrophic".parse::<Severity>().err();
        assert_eq!(
            err.map(|e| e.to_string()),
            Some(String::from("unknown severity: \"catastrophic\""))
        );
    }

    #[test]
    fn severity_defaults_to_moderate() {
        assert_eq!(Severity::default(), Severity::Moderate);
    }
}
