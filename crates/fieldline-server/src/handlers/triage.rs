//! `POST /triage/assess` (spec §6): pure triage evaluation, no side effects.

use axum::Json;
use fieldline_conversation::prelude::{ContextModifiers, TriageEngine, TriageResult};
use fieldline_core::prelude::{PropertyType, TradeCategory};
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub description: String,
    #[serde(default)]
    pub vulnerable_age: bool,
    #[serde(default)]
    pub pregnancy: bool,
    pub property_type: Option<PropertyType>,
    #[serde(default)]
    pub known_vulnerability: bool,
    #[serde(default)]
    pub out_of_hours: bool,
}

pub async fn assess(Json(req): Json<AssessRequest>) -> Result<Json<TriageResult>, ServerError> {
    let preference = TradeCategory::General;
    let engine = TriageEngine::new(TriageEngine::default_rules(), preference);
    let modifiers = ContextModifiers {
        vulnerable_age: req.vulnerable_age,
        pregnancy: req.pregnancy,
        property_type: req.property_type,
        known_vulnerability: req.known_vulnerability,
        out_of_hours: req.out_of_hours,
    };
    Ok(Json(engine.assess(&req.description, modifiers)))
}
