//! AI pipeline stage interfaces (spec §4.3). Real implementations may be local or
//! remote; the core only depends on these traits, so STT/LLM/TTS providers are
//! swappable the way `rvoip-media-core`'s codec backends are.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub confidence: f32,
    pub detected_dialect: Option<String>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, pcm: &[i16], language_hint: Option<&str>) -> PipelineResult<Transcript>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct HistoryTurn {
    pub role: MessageRole,
    pub content: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[HistoryTurn],
        user_message: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> PipelineResult<String>;
}

#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Returns a channel of PCM frames; the receiver end is cancellable at frame
    /// boundaries by simply dropping it (spec §4.3, "stream is cancellable").
    async fn synthesize(&self, text: &str) -> PipelineResult<mpsc::Receiver<Vec<i16>>>;
}

/// Confidence floor below which the Conversation SM reprompts instead of invoking
/// the LLM (spec §4.3, default 0.5).
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.5;

/// Deterministic stand-ins used in tests and for exercising the bridge without real
/// inference backends.
pub struct EchoStt {
    pub fixed_confidence: f32,
}

impl EchoStt {
    pub fn new(fixed_confidence: f32) -> Self {
        Self { fixed_confidence }
    }
}

#[async_trait]
impl SpeechToText for EchoStt {
    async fn transcribe(&self, pcm: &[i16], _language_hint: Option<&str>) -> PipelineResult<Transcript> {
        if pcm.is_empty() {
            return Err(PipelineError::STTUnavailable);
        }
        Ok(Transcript {
            text: format!("<{}-sample utterance>", pcm.len()),
            confidence: self.fixed_confidence,
            detected_dialect: None,
        })
    }
}

pub struct TemplateLlm;

#[async_trait]
impl LanguageModel for TemplateLlm {
    async fn generate(
        &self,
        _system_prompt: &str,
        _history: &[HistoryTurn],
        user_message: &str,
        max_tokens: u32,
        _temperature: f32,
    ) -> PipelineResult<String> {
        let reply = format!("Understood: {user_message}");
        Ok(reply.chars().take(max_tokens as usize).collect())
    }
}

pub struct SilentTts;

#[async_trait]
impl TextToSpeech for SilentTts {
    async fn synthesize(&self, text: &str) -> PipelineResult<mpsc::Receiver<Vec<i16>>> {
        let (tx, rx) = mpsc::channel(4);
        let frame_count = (text.len() / 10).max(1);
        tokio::spawn(async move {
            for _ in 0..frame_count {
                if tx.send(vec![0i16; 160]).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_stt_rejects_empty_audio() {
        let stt = EchoStt::new(0.9);
        let err = stt.transcribe(&[], None).await.unwrap_err();
        assert_eq!(err, PipelineError::STTUnavailable);
    }

    #[tokio::test]
    async fn low_confidence_is_below_default_floor() {
        let stt = EchoStt::new(0.3);
        let transcript = stt.transcribe(&[1, 2, 3], None).await.unwrap();
        assert!(transcript.confidence < DEFAULT_CONFIDENCE_FLOOR);
    }

    #[tokio::test]
    async fn template_llm_echoes_and_truncates() {
        let llm = TemplateLlm;
        let reply = llm.generate("sys", &[], "hello", 5, 0.0).await.unwrap();
        assert_eq!(reply.chars().count(), 5);
    }
}
