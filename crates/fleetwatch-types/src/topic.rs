//! Session topics managed by the gateway's topic router.

use crate::enums::Role;
use crate::ids::IdentityId;

/// A fan-out group of live sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Sessions that asked for vehicle updates.
    AllVehicles,
    /// Sessions that asked for accident alerts.
    AllAlerts,
    /// Every session of one principal.
    Identity(IdentityId),
    /// Every session whose principal holds a role.
    Role(Role),
}

impl core::fmt::Display for Topic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AllVehicles => f.write_str("vehicles:all"),
            Self::AllAlerts => f.write_str("alerts:all"),
            Self::Identity(id) => write!(f, "user:{id}"),
            Self::Role(role) => write!(f, "role:{role}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(Topic::AllVehicles.to_string(), "vehicles:all");
        assert_eq!(Topic::Role(Role::Driver).to_string(), "role:driver");
    }
}
