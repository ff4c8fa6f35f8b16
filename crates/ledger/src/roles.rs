//! The two legs of a transfer

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Which side of a transfer a ledger plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The ledger initiating the transfer (`from` in its payload)
    Ledger,
    /// The counterpart (`to` in the initiator's payload)
    Destination,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::Ledger => Role::Destination,
            Role::Destination => Role::Ledger,
        }
    }
}

/// One value per leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles<T> {
    pub ledger: T,
    pub destination: T,
}

impl<T> Roles<T> {
    pub fn new(ledger: T, destination: T) -> Self {
        Self { ledger, destination }
    }

    pub fn get(&self, role: Role) -> &T {
        match role {
            Role::Ledger => &self.ledger,
            Role::Destination => &self.destination,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut T {
        match role {
            Role::Ledger => &mut self.ledger,
            Role::Destination => &mut self.destination,
        }
    }

    pub fn as_ref(&self) -> Roles<&T> {
        Roles::new(&self.ledger, &self.destination)
    }

    pub fn map<U>(self, mut f: impl FnMut(Role, T) -> U) -> Roles<U> {
        Roles::new(f(Role::Ledger, self.ledger), f(Role::Destination, self.destination))
    }

    pub fn try_map<U, E>(self, mut f: impl FnMut(Role, T) -> Result<U, E>) -> Result<Roles<U>, E> {
        Ok(Roles::new(
            f(Role::Ledger, self.ledger)?,
            f(Role::Destination, self.destination)?,
        ))
    }
}
