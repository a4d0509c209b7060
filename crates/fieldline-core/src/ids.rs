//! Strongly typed identifiers.
//!
//! Every persisted entity is keyed by a newtype over [`Uuid`] so that a `JobId` can never
//! be passed where a `ContactId` is expected, mirroring the `SessionId`/`CallId` newtypes
//! in `rvoip-session-core`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

id_type!(TenantId);
id_type!(ContactId);
id_type!(JobId);
id_type!(DepartmentId);
id_type!(WorkerId);
id_type!(RoutingRuleId);
id_type!(SessionId);
id_type!(ConsentId);
id_type!(AuditId);
id_type!(CallId);
