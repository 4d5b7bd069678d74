//! Typed identifiers for every entity in the world.
//!
//! All identifiers are drawn from one monotonic sequence held by
//! [`crate::WorldState`], so for any entity kind ascending id order is also
//! creation order.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

id_type!(
    /// Company (player or bot) identifier.
    CompanyId,
    "company"
);
id_type!(
    /// Region identifier; scopes markets, buildings and inventory.
    RegionId,
    "region"
);
id_type!(
    /// Tradeable item identifier.
    ItemId,
    "item"
);
id_type!(
    /// Building identifier.
    BuildingId,
    "building"
);
id_type!(
    /// Recipe identifier.
    RecipeId,
    "recipe"
);
id_type!(
    /// Production job identifier.
    JobId,
    "job"
);
id_type!(
    /// Market order identifier. Lower ids were created earlier.
    OrderId,
    "order"
);
id_type!(
    /// Trade identifier.
    TradeId,
    "trade"
);
id_type!(
    /// Shipment identifier.
    ShipmentId,
    "shipment"
);
id_type!(
    /// Contract identifier.
    ContractId,
    "contract"
);
