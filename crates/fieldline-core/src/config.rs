//! Configuration (spec §6 + ambient additions noted in SPEC_FULL.md).
//!
//! Deserialized from TOML at startup by `fieldline-server`, mirroring the way
//! `rvoip-infra-common::config` layers typed config over a raw provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{ConsentKind, GeoPoint, WeekdayHours};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    /// IETF language tag, e.g. `de-DE`.
    pub default_language: String,
    pub business_hours: HashMap<String, WeekdayHours>,
    pub hq_location: GeoPoint,
    pub service_radius_km: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionLimits {
    pub max_concurrent: usize,
    pub phone_idle_s: u64,
    pub chat_idle_s: u64,
    pub phone_max_s: u64,
    pub chat_max_s: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 100,
            phone_idle_s: 8,
            chat_idle_s: 45,
            phone_max_s: 20 * 60,
            chat_max_s: 2 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InferenceTimeouts {
    pub stt_ms: u64,
    pub llm_soft_ms: u64,
    pub llm_hard_ms: u64,
    pub tts_first_frame_ms: u64,
}

impl Default for InferenceTimeouts {
    fn default() -> Self {
        Self { stt_ms: 5_000, llm_soft_ms: 2_000, llm_hard_ms: 5_000, tts_first_frame_ms: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    /// Retention window in days, per entity kind (e.g. `"audit_log" -> 2555`).
    pub retention_days: HashMap<String, u32>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_url: "sqlite::memory:".to_string(), retention_days: HashMap::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldlineConfig {
    pub tenant: TenantSettings,
    #[serde(default)]
    pub session_limits: SessionLimits,
    #[serde(default)]
    pub inference_timeouts: InferenceTimeouts,
    #[serde(default = "default_frame_ms")]
    pub audio_frame_ms: u32,
    #[serde(default = "default_barge_in_ms")]
    pub barge_in_threshold_ms: u32,
    #[serde(default = "default_rules_version")]
    pub triage_rules_version: u32,
    pub routing_fallback_department_id: Option<String>,
    #[serde(default)]
    pub consent_required_kinds: Vec<ConsentKind>,
    #[serde(default = "default_signature_tolerance")]
    pub webhook_signature_tolerance_s: u64,
    /// Shared HMAC secret telephony providers sign webhook bodies with (spec §4.1).
    #[serde(default)]
    pub webhook_secret: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_frame_ms() -> u32 {
    20
}
fn default_barge_in_ms() -> u32 {
    300
}
fn default_rules_version() -> u32 {
    1
}
fn default_signature_tolerance() -> u64 {
    300
}

impl FieldlineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let limits = SessionLimits::default();
        assert_eq!(limits.phone_idle_s, 8);
        assert_eq!(limits.chat_idle_s, 45);
        let timeouts = InferenceTimeouts::default();
        assert_eq!(timeouts.llm_hard_ms, 5_000);
        assert_eq!(default_barge_in_ms(), 300);
    }
}
