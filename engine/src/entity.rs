//! Entity types that take part in synchronization.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of records the inventory app keeps in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    Categories,
    InventoryItems,
    Customers,
    Orders,
}

impl EntityType {
    /// Order in which entity types are pulled and pushed.
    ///
    /// Referenced entities come first: items point at categories, orders
    /// point at customers.
    pub const SYNC_ORDER: [EntityType; 4] = [
        EntityType::Categories,
        EntityType::InventoryItems,
        EntityType::Customers,
        EntityType::Orders,
    ];

    /// REST path segment for this entity on the remote API.
    pub fn path(self) -> &'static str {
        match self {
            EntityType::Categories => "categories",
            EntityType::InventoryItems => "inventory",
            EntityType::Customers => "customers",
            EntityType::Orders => "orders",
        }
    }

    /// Resolve an entity type from its REST path segment.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::SYNC_ORDER.into_iter().find(|e| e.path() == path)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path(s).ok_or_else(|| Error::UnknownEntity(s.to_string()))
    }
}
