//! Telephony provider adapters, the AI pipeline stage interfaces, and the audio
//! bridge that ties them together (spec §4.1-4.3).

pub mod adapter;
pub mod bridge;
pub mod error;
pub mod pipeline;
pub mod webhook;

pub mod prelude {
    pub use crate::adapter::{AudioFrame, CallEvent, MockAdapter, PlaybackHandle, TelephonyAdapter};
    pub use crate::bridge::{AudioBridge, BridgeAction, BridgeState};
    pub use crate::error::{PipelineError, PipelineResult, Result, TelephonyError};
    pub use crate::pipeline::{
        EchoStt, HistoryTurn, LanguageModel, MessageRole, SilentTts, SpeechToText, TemplateLlm,
        TextToSpeech, Transcript, DEFAULT_CONFIDENCE_FLOOR,
    };
    pub use crate::webhook::verify_webhook;
}
