//! The Conversation State Machine, industry profiles and the Triage/Intake Engine
//! (spec §4.4-§4.5).

pub mod profile;
pub mod sm;
pub mod triage;

pub mod prelude {
    pub use crate::profile::{
        ActionSpec, ConversationState, IndustryProfile, Intent, IntentRule, SlotDef, SlotSchema,
        TradesProfile,
    };
    pub use crate::sm::{ConversationMachine, TurnEffect, TurnInput, TurnOutcome, TurnSnapshot};
    pub use crate::triage::{ContextModifiers, TriageEngine, TriageResult, TriageRule};
}

