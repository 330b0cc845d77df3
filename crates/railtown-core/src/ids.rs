//! Identifier newtypes.
//!
//! Settlement ids are handed out by the registry from a monotonically
//! increasing counter and never reused, so ordering by id is ordering by
//! registration time.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

id_type!(
    /// A registered settlement.
    SettlementId(u64),
    "town"
);
id_type!(
    /// A platform, unique within its settlement.
    PlatformId(u32),
    "platform"
);
id_type!(
    /// Identity of a visitor, used to key personal storage.
    VisitorId(u64),
    "visitor"
);
id_type!(
    /// A transport carrier reported by the world query.
    CarrierId(u64),
    "carrier"
);
