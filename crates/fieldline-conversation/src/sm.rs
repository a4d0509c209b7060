//! The Conversation State Machine (spec §4.4): per-session flow control shared by
//! every industry profile.
//!
//! Per spec §9 ("Conversation context object"), the machine keeps its own mutable
//! slot store and state, but each turn hands the caller back an immutable
//! [`TurnSnapshot`] plus a list of [`TurnEffect`]s to act on — callers never reach
//! into mutable machine state directly.

use std::collections::HashMap;

use chrono::Utc;
use fieldline_core::prelude::{ConversationMessage, MessageRole};
use fieldline_telephony::prelude::DEFAULT_CONFIDENCE_FLOOR;

use crate::profile::{ConversationState, IndustryProfile, Intent};
use crate::triage::{ContextModifiers, TriageEngine, TriageResult};

const DEFAULT_HISTORY_WINDOW: usize = 8;
/// A second consecutive idle timeout ends the session (spec §4.4).
const MAX_IDLE_TIMEOUTS: u8 = 2;

#[derive(Debug, Clone)]
pub struct TurnInput {
    pub transcript: String,
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct TurnSnapshot {
    pub state: ConversationState,
    pub slots: HashMap<String, String>,
    pub escalated: bool,
}

#[derive(Debug, Clone)]
pub enum TurnEffect {
    Say(String),
    Reprompt(String),
    Escalate { message: String, attempt_transfer: bool },
    RequestJobCreation { triage: TriageResult, slots: HashMap<String, String> },
    EndSession { status: &'static str },
}

pub struct TurnOutcome {
    pub snapshot: TurnSnapshot,
    pub effects: Vec<TurnEffect>,
}

pub struct ConversationMachine<P: IndustryProfile> {
    profile: P,
    triage: TriageEngine,
    state: ConversationState,
    slots: HashMap<String, String>,
    history: Vec<ConversationMessage>,
    history_window: usize,
    escalated: bool,
    idle_timeouts: u8,
    last_triage: Option<TriageResult>,
}

impl<P: IndustryProfile> ConversationMachine<P> {
    pub fn new(profile: P, triage: TriageEngine) -> Self {
        Self {
            profile,
            triage,
            state: ConversationState::Greeting,
            slots: HashMap::new(),
            history: Vec::new(),
            history_window: DEFAULT_HISTORY_WINDOW,
            escalated: false,
            idle_timeouts: 0,
            last_triage: None,
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn snapshot(&self) -> TurnSnapshot {
        TurnSnapshot { state: self.state, slots: self.slots.clone(), escalated: self.escalated }
    }

    /// Drive one user turn (spec §4.4 steps 1-7). Confidence below
    /// [`DEFAULT_CONFIDENCE_FLOOR`] short-circuits into a reprompt without touching
    /// state or invoking the LLM (spec §8 scenario 4).
    pub fn handle_turn(&mut self, input: TurnInput) -> TurnOutcome {
        self.idle_timeouts = 0;

        if input.confidence < DEFAULT_CONFIDENCE_FLOOR {
            let reprompt = "Entschuldigung, könnten Sie das wiederholen?".to_string();
            return TurnOutcome { snapshot: self.snapshot(), effects: vec![TurnEffect::Reprompt(reprompt)] };
        }

        self.record_message(MessageRole::User, input.transcript.clone());
        let normalized = input.transcript.to_lowercase();

        if self.profile.detect_emergency(&normalized) {
            return self.escalate();
        }

        let intent = self.profile.detect_intent(&normalized);
        if intent == Some(Intent::Cancellation) {
            return self.cancel();
        }
        self.advance_state(&input.transcript);

        let mut effects = Vec::new();
        if self.state == ConversationState::Action {
            if let Some(triage) = self.last_triage.clone() {
                effects.push(TurnEffect::RequestJobCreation { triage, slots: self.slots.clone() });
            }
        }

        let utterance = self.profile.prompt_for(self.state).to_string();
        self.record_message(MessageRole::Assistant, utterance.clone());
        effects.push(TurnEffect::Say(utterance));

        if self.state == ConversationState::Farewell {
            effects.push(TurnEffect::EndSession { status: "completed" });
        }

        TurnOutcome { snapshot: self.snapshot(), effects }
    }

    /// A cancellation intent short-circuits the flow from any non-terminal state
    /// (spec §4.4 step 3, tie-break "emergency > cancellation > new-request > query >
    /// chitchat"): no Job gets created, the session just ends.
    fn cancel(&mut self) -> TurnOutcome {
        self.state = ConversationState::Farewell;
        let message = "Verstanden, ich storniere Ihre Anfrage. Auf Wiederhören!".to_string();
        self.record_message(MessageRole::Assistant, message.clone());
        TurnOutcome {
            snapshot: self.snapshot(),
            effects: vec![TurnEffect::Say(message), TurnEffect::EndSession { status: "cancelled" }],
        }
    }

    fn escalate(&mut self) -> TurnOutcome {
        self.state = ConversationState::Escalation;
        self.escalated = true;
        let message = self.profile.prompt_for(ConversationState::Escalation).to_string();
        self.record_message(MessageRole::Assistant, message.clone());
        TurnOutcome {
            snapshot: self.snapshot(),
            effects: vec![TurnEffect::Escalate { message, attempt_transfer: true }],
        }
    }

    fn advance_state(&mut self, transcript: &str) {
        match self.state {
            ConversationState::Greeting => self.state = ConversationState::Intake,
            ConversationState::Intake => {
                self.slots.insert("problem_description".to_string(), transcript.to_string());
                self.state = ConversationState::Classification;
            }
            ConversationState::Classification => {
                let description =
                    self.slots.get("problem_description").cloned().unwrap_or_else(|| transcript.to_string());
                let mut result = self.triage.assess(&description, ContextModifiers::default());
                // The profile's own urgency mapping is a floor: a trade the industry
                // profile always treats as urgent never gets classified down from it.
                let profile_floor = self.profile.urgency_for(&result.trade_category);
                if profile_floor > result.urgency {
                    result.urgency = profile_floor;
                }
                self.last_triage = Some(result);
                self.state = ConversationState::SlotFill;
            }
            ConversationState::SlotFill => {
                if let Some(slot) = self.next_missing_slot() {
                    self.slots.insert(slot.to_string(), transcript.to_string());
                }
                if self.slots_complete() {
                    self.state = ConversationState::Confirmation;
                }
            }
            // Entering CONFIRMATION already implies the turn that produced it filled
            // the last slot; the very next turn treats the Job as confirmed (spec
            // §4.4 step 7 has no separate explicit-affirmation gate).
            ConversationState::Confirmation => self.state = ConversationState::Action,
            ConversationState::Action => self.state = ConversationState::Farewell,
            ConversationState::Farewell | ConversationState::Escalation => {}
        }
    }

    fn next_missing_slot(&self) -> Option<String> {
        self.profile
            .slot_schema()
            .slots
            .iter()
            .find(|s| s.required && !self.slots.contains_key(s.key))
            .map(|s| s.key.to_string())
    }

    fn slots_complete(&self) -> bool {
        self.profile.slot_schema().slots.iter().filter(|s| s.required).all(|s| self.slots.contains_key(s.key))
    }

    /// Turn timeout handling (spec §4.4): the first idle timeout re-prompts once; a
    /// second consecutive one ends the session as `abandoned`.
    pub fn on_idle_timeout(&mut self) -> TurnOutcome {
        self.idle_timeouts += 1;
        if self.idle_timeouts >= MAX_IDLE_TIMEOUTS {
            return TurnOutcome {
                snapshot: self.snapshot(),
                effects: vec![TurnEffect::EndSession { status: "abandoned" }],
            };
        }
        let reprompt = self.profile.prompt_for(self.state).to_string();
        TurnOutcome { snapshot: self.snapshot(), effects: vec![TurnEffect::Reprompt(reprompt)] }
    }

    pub fn on_channel_closed(&mut self) -> TurnOutcome {
        TurnOutcome { snapshot: self.snapshot(), effects: vec![TurnEffect::EndSession { status: "closed" }] }
    }

    fn record_message(&mut self, role: MessageRole, content: String) {
        self.history.push(ConversationMessage { role, content, timestamp: Utc::now() });
        if self.history.len() > self.history_window {
            self.history.remove(0);
        }
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }
}
