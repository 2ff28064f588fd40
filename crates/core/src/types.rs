//! Core identifier types for RepCRec
//!
//! This module defines the foundational types:
//! - TxnId: Identifier of a scripted transaction (`T<n>`)
//! - SiteId: Identifier of a data site (`1..=N`)
//! - VarId: Index of a variable (`x<n>`), with its placement rules
//! - Value: The integer payload stored in a variable
//! - Timestamp: Logical engine time

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value stored in a variable
pub type Value = i64;

/// Logical time (one tick per processed instruction)
pub type Timestamp = u64;

/// Identifier of a transaction, as written in the script (`T1` → `TxnId(1)`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u32);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Identifier of a site, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SiteId(pub u32);

impl SiteId {
    /// Zero-based position of this site in an ordered site vector
    ///
    /// Returns None for the invalid id 0.
    pub fn index(self) -> Option<usize> {
        (self.0 as usize).checked_sub(1)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a variable (`x4` → `VarId(4)`)
///
/// Even indices are replicated at every site. Odd indices live at exactly
/// one site, `(index mod num_sites) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl VarId {
    /// True for even indices
    pub fn is_replicated(self) -> bool {
        self.0 % 2 == 0
    }

    /// The single site holding a non-replicated variable
    ///
    /// Returns None for replicated variables.
    pub fn home_site(self, num_sites: u32) -> Option<SiteId> {
        if self.is_replicated() || num_sites == 0 {
            None
        } else {
            Some(SiteId(self.0 % num_sites + 1))
        }
    }

    /// Whether `site` holds a copy of this variable
    pub fn resides_at(self, site: SiteId, num_sites: u32) -> bool {
        match self.home_site(num_sites) {
            Some(home) => home == site,
            None => self.is_replicated(),
        }
    }

    /// Initial value, `10 × index`
    pub fn default_value(self) -> Value {
        10 * Value::from(self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}
