use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of operation a flight performs on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightRole {
    Create,
    Delete,
    Update,
    Clone,
    RevokeAccess,
    RestoreAccess,
}

impl FlightRole {
    pub const ALL: [Self; 6] = [
        Self::Create,
        Self::Delete,
        Self::Update,
        Self::Clone,
        Self::RevokeAccess,
        Self::RestoreAccess,
    ];

    const fn bit(self) -> u8 {
        match self {
            Self::Create => 1,
            Self::Delete => 1 << 1,
            Self::Update => 1 << 2,
            Self::Clone => 1 << 3,
            Self::RevokeAccess => 1 << 4,
            Self::RestoreAccess => 1 << 5,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Clone => "clone",
            Self::RevokeAccess => "revoke-access",
            Self::RestoreAccess => "restore-access",
        }
    }
}

impl fmt::Display for FlightRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of flight roles a step declares it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlightRoles(u8);

impl FlightRoles {
    pub const NONE: Self = Self(0);
    pub const CREATE: Self = Self::only(FlightRole::Create);
    pub const DELETE: Self = Self::only(FlightRole::Delete);
    pub const UPDATE: Self = Self::only(FlightRole::Update);
    pub const CLONE: Self = Self::only(FlightRole::Clone);
    pub const REVOKE_ACCESS: Self = Self::only(FlightRole::RevokeAccess);
    pub const RESTORE_ACCESS: Self = Self::only(FlightRole::RestoreAccess);

    #[must_use]
    pub const fn only(role: FlightRole) -> Self {
        Self(role.bit())
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, role: FlightRole) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = FlightRole> {
        FlightRole::ALL
            .into_iter()
            .filter(move |role| self.contains(*role))
    }
}

impl FromIterator<FlightRole> for FlightRoles {
    fn from_iter<I: IntoIterator<Item = FlightRole>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::NONE, |roles, role| roles.union(Self::only(role)))
    }
}

impl fmt::Display for FlightRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(FlightRole::as_str).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
