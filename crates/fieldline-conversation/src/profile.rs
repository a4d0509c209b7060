//! Industry profiles as a capability set (spec §9, "Polymorphism across industry
//! modules"): state vocabulary, prompts, intent rules, slot schema, urgency mapping
//! and a post-confirmation action spec, as data plus small functions rather than
//! subclasses of a framework base class. A profile is a value; the state machine
//! only ever calls through the [`IndustryProfile`] trait.

use fieldline_core::prelude::{TradeCategory, Urgency};

/// Shared state skeleton every profile uses (spec §4.4); `Escalation` is reachable
/// from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationState {
    Greeting,
    Intake,
    Classification,
    SlotFill,
    Confirmation,
    Action,
    Farewell,
    Escalation,
}

/// Intents are tie-broken by explicit priority, highest first: emergency >
/// cancellation > new-request > query > chitchat (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Intent {
    Chitchat,
    Query,
    NewRequest,
    Cancellation,
    Emergency,
}

#[derive(Debug, Clone)]
pub struct IntentRule {
    pub intent: Intent,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SlotDef {
    pub key: &'static str,
    pub prompt: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SlotSchema {
    pub slots: Vec<SlotDef>,
}

/// What happens after a Job is confirmed: who gets notified and which channel.
#[derive(Debug, Clone)]
pub struct ActionSpec {
    pub notify_channels: Vec<String>,
    pub auto_book: bool,
}

pub trait IndustryProfile: Send + Sync {
    fn name(&self) -> &str;
    fn intent_rules(&self) -> &[IntentRule];
    fn slot_schema(&self) -> &SlotSchema;
    fn prompt_for(&self, state: ConversationState) -> &str;
    fn urgency_for(&self, trade: &TradeCategory) -> Urgency;
    fn action_spec(&self) -> ActionSpec;

    /// Rule-based intent detection: evaluated before any LLM fallback (spec §4.4 step
    /// 3, "rules are evaluated first and short-circuit"). Returns the highest-priority
    /// matching intent.
    fn detect_intent(&self, normalized_text: &str) -> Option<Intent> {
        self.intent_rules()
            .iter()
            .filter(|rule| rule.patterns.iter().any(|p| normalized_text.contains(p.as_str())))
            .map(|rule| rule.intent)
            .max()
    }

    /// Emergency trigger phrases bypass normal intent resolution entirely (spec §4.4
    /// step 4). Default: emergency intent rules double as the signal set.
    fn detect_emergency(&self, normalized_text: &str) -> bool {
        self.intent_rules()
            .iter()
            .filter(|rule| rule.intent == Intent::Emergency)
            .any(|rule| rule.patterns.iter().any(|p| normalized_text.contains(p.as_str())))
    }
}

/// The trades/Handwerk profile: plumbing, heating, electrical and general repair
/// house calls — the profile this system ships with.
pub struct TradesProfile {
    intent_rules: Vec<IntentRule>,
    slot_schema: SlotSchema,
}

impl TradesProfile {
    pub fn new() -> Self {
        Self {
            intent_rules: vec![
                IntentRule {
                    intent: Intent::Emergency,
                    patterns: vec!["gas".into(), "rauch".into(), "brennt".into(), "ich rieche".into()],
                },
                IntentRule {
                    intent: Intent::Cancellation,
                    patterns: vec!["stornieren".into(), "absagen".into(), "termin absagen".into()],
                },
                IntentRule {
                    intent: Intent::NewRequest,
                    patterns: vec!["kaputt".into(), "repariert".into(), "termin".into(), "hilfe".into()],
                },
                IntentRule {
                    intent: Intent::Query,
                    patterns: vec!["wann".into(), "wie lange".into(), "kostet".into()],
                },
                IntentRule {
                    intent: Intent::Chitchat,
                    patterns: vec!["hallo".into(), "guten tag".into(), "danke".into()],
                },
            ],
            slot_schema: SlotSchema {
                slots: vec![
                    SlotDef { key: "name", prompt: "Wie ist Ihr Name?", required: true },
                    SlotDef { key: "phone", prompt: "Unter welcher Nummer sind Sie erreichbar?", required: true },
                    SlotDef { key: "address", prompt: "Wie lautet die Adresse des Einsatzorts?", required: true },
                    SlotDef {
                        key: "problem_description",
                        prompt: "Können Sie das Problem kurz beschreiben?",
                        required: true,
                    },
                    SlotDef {
                        key: "preferred_time",
                        prompt: "Wann würde es Ihnen am besten passen?",
                        required: false,
                    },
                ],
            },
        }
    }
}

impl Default for TradesProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl IndustryProfile for TradesProfile {
    fn name(&self) -> &str {
        "trades"
    }

    fn intent_rules(&self) -> &[IntentRule] {
        &self.intent_rules
    }

    fn slot_schema(&self) -> &SlotSchema {
        &self.slot_schema
    }

    fn prompt_for(&self, state: ConversationState) -> &str {
        match state {
            ConversationState::Greeting => "Guten Tag, hier ist der Handwerker-Service. Wie kann ich helfen?",
            ConversationState::Intake => "Können Sie mir kurz schildern, worum es geht?",
            ConversationState::Classification => "Einen Moment, ich ordne Ihr Anliegen ein.",
            ConversationState::SlotFill => "Ich brauche noch ein paar Angaben von Ihnen.",
            ConversationState::Confirmation => "Darf ich den Termin so bestätigen?",
            ConversationState::Action => "Ich lege den Auftrag jetzt an.",
            ConversationState::Farewell => "Vielen Dank für Ihren Anruf, auf Wiederhören!",
            ConversationState::Escalation => {
                "Das klingt nach einem Notfall. Bitte verlassen Sie das Gebäude und rufen Sie den Notruf."
            }
        }
    }

    fn urgency_for(&self, trade: &TradeCategory) -> Urgency {
        match trade {
            TradeCategory::PlumbingHeating => Urgency::Urgent,
            TradeCategory::Electrical => Urgency::Urgent,
            TradeCategory::Sanitary => Urgency::Normal,
            TradeCategory::General | TradeCategory::Other(_) => Urgency::Routine,
        }
    }

    fn action_spec(&self) -> ActionSpec {
        ActionSpec { notify_channels: vec!["email".into(), "sms".into()], auto_book: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_outranks_new_request_when_both_match() {
        let profile = TradesProfile::new();
        let intent = profile.detect_intent("ich rieche gas und mein herd ist kaputt");
        assert_eq!(intent, Some(Intent::Emergency));
    }

    #[test]
    fn emergency_phrase_is_flagged_independently() {
        let profile = TradesProfile::new();
        assert!(profile.detect_emergency("Ich rieche Gas in der Küche!".to_lowercase().as_str()));
        assert!(!profile.detect_emergency("meine heizung ist kaputt"));
    }

    #[test]
    fn no_match_returns_none() {
        let profile = TradesProfile::new();
        assert_eq!(profile.detect_intent("xyzxyz"), None);
    }
}
