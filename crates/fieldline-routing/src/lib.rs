//! The Routing Engine and Technician Matcher (spec §4.6-§4.7).

pub mod engine;
pub mod matcher;

pub mod prelude {
    pub use crate::engine::{raise_priority_tier, route, RoutingResult};
    pub use crate::matcher::{rank_candidates, MatchOutcome, WorkerMatch, MATCH_THRESHOLD};
}

