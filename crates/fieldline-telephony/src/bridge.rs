//! The Audio Bridge state machine (spec §4.2): full-duplex audio path between a
//! Telephony Adapter and the AI pipeline, with voice-activity detection, turn
//! boundaries and barge-in.
//!
//! Timing is expressed in accumulated milliseconds rather than wall-clock instants so
//! the machine is driven purely by frame deliveries — callers own the clock, which
//! keeps this deterministic and easy to test (and lets a caller replay a session from
//! a recording at any speed).

/// Silence duration after which an utterance is considered finished.
pub const VAD_SILENCE_END_MS: u64 = 700;
/// Minimum voiced duration an utterance must contain before silence can end it.
pub const VAD_MIN_VOICED_MS: u64 = 200;
/// Sustained user voice duration in SPEAKING that triggers barge-in.
pub const BARGE_IN_MS: u64 = 300;
/// Uninterrupted speech duration in THINKING after which the buffer is flushed as a
/// second utterance.
pub const THINKING_FLUSH_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Listening,
    Thinking,
    Speaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    EnterListening,
    EnterThinking,
    EnterSpeaking,
    EnterIdle,
    /// Hand the accumulated utterance buffer to STT.
    EmitUtterance,
    /// The user kept talking past the THINKING flush window; treat as a second
    /// utterance rather than waiting indefinitely.
    FlushSecondUtterance,
    CancelTts,
}

/// Per-session audio bridge. Not `Send`-bound on purpose — one instance lives on the
/// Session's own task (spec §5, "each Session is a single logical task").
pub struct AudioBridge {
    state: BridgeState,
    voiced_ms: u64,
    silence_ms: u64,
    speaking_voice_ms: u64,
    thinking_elapsed_ms: u64,
    /// Set while a `critical` prompt (e.g. a legal consent read-back) is playing;
    /// barge-in is disabled for the duration (spec §4.2).
    critical_prompt: bool,
}

impl AudioBridge {
    pub fn new() -> Self {
        Self {
            state: BridgeState::Idle,
            voiced_ms: 0,
            silence_ms: 0,
            speaking_voice_ms: 0,
            thinking_elapsed_ms: 0,
            critical_prompt: false,
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn set_critical_prompt(&mut self, critical: bool) {
        self.critical_prompt = critical;
    }

    /// Feed one incoming audio frame. `voiced` is the VAD's per-frame decision.
    pub fn on_audio_frame(&mut self, voiced: bool, frame_ms: u64) -> Vec<BridgeAction> {
        match self.state {
            BridgeState::Idle => {
                self.state = BridgeState::Listening;
                self.voiced_ms = 0;
                self.silence_ms = 0;
                let mut actions = vec![BridgeAction::EnterListening];
                actions.extend(self.accumulate_listening(voiced, frame_ms));
                actions
            }
            BridgeState::Listening => self.accumulate_listening(voiced, frame_ms),
            BridgeState::Thinking => {
                self.thinking_elapsed_ms += frame_ms;
                if self.thinking_elapsed_ms >= THINKING_FLUSH_MS {
                    self.thinking_elapsed_ms = 0;
                    vec![BridgeAction::FlushSecondUtterance]
                } else {
                    vec![]
                }
            }
            BridgeState::Speaking => {
                if voiced {
                    self.speaking_voice_ms += frame_ms;
                } else {
                    self.speaking_voice_ms = 0;
                }
                if self.speaking_voice_ms >= BARGE_IN_MS && !self.critical_prompt {
                    self.state = BridgeState::Listening;
                    self.voiced_ms = 0;
                    self.silence_ms = 0;
                    self.speaking_voice_ms = 0;
                    vec![BridgeAction::CancelTts, BridgeAction::EnterListening]
                } else {
                    vec![]
                }
            }
        }
    }

    fn accumulate_listening(&mut self, voiced: bool, frame_ms: u64) -> Vec<BridgeAction> {
        if voiced {
            self.voiced_ms += frame_ms;
            self.silence_ms = 0;
        } else {
            self.silence_ms += frame_ms;
        }
        if self.silence_ms >= VAD_SILENCE_END_MS && self.voiced_ms >= VAD_MIN_VOICED_MS {
            self.state = BridgeState::Thinking;
            self.thinking_elapsed_ms = 0;
            vec![BridgeAction::EnterThinking, BridgeAction::EmitUtterance]
        } else {
            vec![]
        }
    }

    /// STT/LLM produced a response and TTS is ready to stream (THINKING → SPEAKING).
    pub fn on_tts_ready(&mut self) -> Vec<BridgeAction> {
        self.state = BridgeState::Speaking;
        self.speaking_voice_ms = 0;
        vec![BridgeAction::EnterSpeaking]
    }

    /// TTS playback finished. Per spec §4.2 the machine normally returns to IDLE, but
    /// if user audio arrived in the same window (tracked via `speaking_voice_ms`), the
    /// tie-break favors the user and goes straight to LISTENING instead.
    pub fn on_tts_done(&mut self) -> Vec<BridgeAction> {
        if self.speaking_voice_ms > 0 {
            self.state = BridgeState::Listening;
            self.voiced_ms = self.speaking_voice_ms;
            self.silence_ms = 0;
            self.speaking_voice_ms = 0;
            vec![BridgeAction::EnterListening]
        } else {
            self.state = BridgeState::Idle;
            vec![BridgeAction::EnterIdle]
        }
    }
}

impl Default for AudioBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_enters_listening_on_first_frame() {
        let mut bridge = AudioBridge::new();
        let actions = bridge.on_audio_frame(true, 20);
        assert_eq!(actions[0], BridgeAction::EnterListening);
        assert_eq!(bridge.state(), BridgeState::Listening);
    }

    #[test]
    fn silence_after_voiced_speech_ends_utterance() {
        let mut bridge = AudioBridge::new();
        bridge.on_audio_frame(true, 20);
        for _ in 0..9 {
            bridge.on_audio_frame(true, 20); // 200ms voiced
        }
        assert_eq!(bridge.state(), BridgeState::Listening);
        let mut saw_thinking = false;
        for _ in 0..40 {
            // 800ms of silence
            let actions = bridge.on_audio_frame(false, 20);
            if actions.contains(&BridgeAction::EnterThinking) {
                saw_thinking = true;
                assert!(actions.contains(&BridgeAction::EmitUtterance));
                break;
            }
        }
        assert!(saw_thinking);
        assert_eq!(bridge.state(), BridgeState::Thinking);
    }

    #[test]
    fn brief_silence_does_not_end_utterance() {
        let mut bridge = AudioBridge::new();
        bridge.on_audio_frame(true, 20);
        for _ in 0..9 {
            bridge.on_audio_frame(true, 20);
        }
        for _ in 0..10 {
            // only 200ms silence, below the 700ms threshold
            bridge.on_audio_frame(false, 20);
        }
        assert_eq!(bridge.state(), BridgeState::Listening);
    }

    #[test]
    fn thinking_flushes_second_utterance_past_three_seconds() {
        let mut bridge = AudioBridge::new();
        // hand-drive state straight into Thinking
        bridge.on_audio_frame(true, 250);
        bridge.on_audio_frame(false, 750);
        assert_eq!(bridge.state(), BridgeState::Thinking);

        let mut flushed = false;
        for _ in 0..20 {
            let actions = bridge.on_audio_frame(true, 200);
            if actions.contains(&BridgeAction::FlushSecondUtterance) {
                flushed = true;
                break;
            }
        }
        assert!(flushed);
    }

    #[test]
    fn sustained_user_voice_triggers_barge_in() {
        let mut bridge = AudioBridge::new();
        bridge.on_audio_frame(true, 250);
        bridge.on_audio_frame(false, 750);
        bridge.on_tts_ready();
        assert_eq!(bridge.state(), BridgeState::Speaking);

        let mut barged_in = false;
        for _ in 0..20 {
            let actions = bridge.on_audio_frame(true, 50);
            if actions.contains(&BridgeAction::CancelTts) {
                barged_in = true;
                assert!(actions.contains(&BridgeAction::EnterListening));
                break;
            }
        }
        assert!(barged_in);
        assert_eq!(bridge.state(), BridgeState::Listening);
    }

    #[test]
    fn critical_prompt_disables_barge_in() {
        let mut bridge = AudioBridge::new();
        bridge.on_audio_frame(true, 250);
        bridge.on_audio_frame(false, 750);
        bridge.on_tts_ready();
        bridge.set_critical_prompt(true);

        for _ in 0..20 {
            let actions = bridge.on_audio_frame(true, 50);
            assert!(!actions.contains(&BridgeAction::CancelTts));
        }
        assert_eq!(bridge.state(), BridgeState::Speaking);
    }

    #[test]
    fn tts_done_with_no_concurrent_audio_returns_to_idle() {
        let mut bridge = AudioBridge::new();
        bridge.on_audio_frame(true, 250);
        bridge.on_audio_frame(false, 750);
        bridge.on_tts_ready();
        let actions = bridge.on_tts_done();
        assert_eq!(actions, vec![BridgeAction::EnterIdle]);
        assert_eq!(bridge.state(), BridgeState::Idle);
    }

    #[test]
    fn tts_done_favors_user_when_audio_arrives_in_same_window() {
        let mut bridge = AudioBridge::new();
        bridge.on_audio_frame(true, 250);
        bridge.on_audio_frame(false, 750);
        bridge.on_tts_ready();
        bridge.on_audio_frame(true, 50); // user starts talking, below barge-in threshold
        let actions = bridge.on_tts_done();
        assert_eq!(actions, vec![BridgeAction::EnterListening]);
        assert_eq!(bridge.state(), BridgeState::Listening);
    }
}
