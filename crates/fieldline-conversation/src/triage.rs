//! The Triage / Intake Engine (spec §4.5): pure mapping from a free-text description
//! and structured context to `(urgency, trade_category, recommended_action, reasoning)`.
//!
//! Pure, no I/O beyond reading the rule table handed to it — the same rule set and
//! inputs always produce the same output (spec §8, "Triage determinism").

use fieldline_core::prelude::{PropertyType, TradeCategory, Urgency};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct TriageRule {
    pub name: String,
    /// Lowercase substrings; a rule fires if any pattern is found in the normalized text.
    pub patterns: Vec<String>,
    pub urgency_score: i32,
    pub category: TradeCategory,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextModifiers {
    pub vulnerable_age: bool,
    pub pregnancy: bool,
    pub property_type: Option<PropertyType>,
    pub known_vulnerability: bool,
    pub out_of_hours: bool,
}

// Fixed modifier point table (spec §4.5 step 4).
const MOD_VULNERABLE_AGE: i32 = 15;
const MOD_PREGNANCY: i32 = 10;
const MOD_COMMERCIAL: i32 = 5;
const MOD_INDUSTRIAL: i32 = 10;
const MOD_KNOWN_VULNERABILITY: i32 = 10;
const MOD_OUT_OF_HOURS: i32 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct TriageResult {
    pub urgency: Urgency,
    pub trade_category: TradeCategory,
    pub recommended_action: String,
    pub reasoning: Vec<String>,
}

pub struct TriageEngine {
    rules: Vec<TriageRule>,
    tenant_category_preference: TradeCategory,
}

impl TriageEngine {
    pub fn new(rules: Vec<TriageRule>, tenant_category_preference: TradeCategory) -> Self {
        Self { rules, tenant_category_preference }
    }

    pub fn default_rules() -> Vec<TriageRule> {
        vec![
            TriageRule {
                name: "gas_leak".into(),
                patterns: vec!["gas".into(), "gasgeruch".into()],
                urgency_score: 90,
                category: TradeCategory::PlumbingHeating,
            },
            TriageRule {
                name: "smoke_or_fire".into(),
                patterns: vec!["rauch".into(), "brennt".into(), "feuer".into()],
                urgency_score: 85,
                category: TradeCategory::Electrical,
            },
            TriageRule {
                name: "water_damage".into(),
                patterns: vec!["wasserschaden".into(), "rohrbruch".into(), "undicht".into()],
                urgency_score: 70,
                category: TradeCategory::Sanitary,
            },
            TriageRule {
                name: "power_outage".into(),
                patterns: vec!["stromausfall".into(), "kein strom".into()],
                urgency_score: 65,
                category: TradeCategory::Electrical,
            },
            TriageRule {
                name: "no_heat".into(),
                patterns: vec![
                    "heizung ist kalt".into(),
                    "heizung kalt".into(),
                    "keine heizung".into(),
                    "kein warmwasser".into(),
                ],
                urgency_score: 65,
                category: TradeCategory::PlumbingHeating,
            },
            TriageRule {
                name: "general_repair".into(),
                patterns: vec!["reparatur".into(), "kaputt".into()],
                urgency_score: 20,
                category: TradeCategory::General,
            },
        ]
    }

    /// Lowercase and strip the common German diacritics so "Küche"/"kuche" both match
    /// the same rule pattern (spec §4.5 step 1).
    fn normalize(text: &str) -> String {
        text.to_lowercase()
            .replace('ä', "a")
            .replace('ö', "o")
            .replace('ü', "u")
            .replace('ß', "ss")
            .replace('é', "e")
            .replace('è', "e")
    }

    pub fn assess(&self, description: &str, context: ContextModifiers) -> TriageResult {
        let normalized = Self::normalize(description);

        let mut score: i32 = 0;
        let mut histogram: Vec<(TradeCategory, i32)> = Vec::new();
        let mut reasoning: Vec<String> = Vec::new();

        for rule in &self.rules {
            if rule.patterns.iter().any(|p| normalized.contains(p.as_str())) {
                score += rule.urgency_score;
                reasoning.push(format!("rule:{}", rule.name));
                match histogram.iter_mut().find(|(cat, _)| *cat == rule.category) {
                    Some((_, count)) => *count += 1,
                    None => histogram.push((rule.category.clone(), 1)),
                }
            }
        }

        if context.vulnerable_age {
            score += MOD_VULNERABLE_AGE;
            reasoning.push("modifier:vulnerable_age".into());
        }
        if context.pregnancy {
            score += MOD_PREGNANCY;
            reasoning.push("modifier:pregnancy".into());
        }
        match context.property_type {
            Some(PropertyType::Commercial) => {
                score += MOD_COMMERCIAL;
                reasoning.push("modifier:commercial".into());
            }
            Some(PropertyType::Industrial) => {
                score += MOD_INDUSTRIAL;
                reasoning.push("modifier:industrial".into());
            }
            _ => {}
        }
        if context.known_vulnerability {
            score += MOD_KNOWN_VULNERABILITY;
            reasoning.push("modifier:known_vulnerability".into());
        }
        if context.out_of_hours {
            score += MOD_OUT_OF_HOURS;
            reasoning.push("modifier:out_of_hours".into());
        }

        let urgency = Self::score_to_urgency(score);
        let trade_category = self.resolve_category(&histogram);
        let recommended_action = Self::recommended_action(urgency);

        TriageResult { urgency, trade_category, recommended_action, reasoning }
    }

    fn score_to_urgency(score: i32) -> Urgency {
        match score {
            s if s >= 80 => Urgency::Emergency,
            60..=79 => Urgency::Urgent,
            30..=59 => Urgency::Normal,
            _ => Urgency::Routine,
        }
    }

    fn resolve_category(&self, histogram: &[(TradeCategory, i32)]) -> TradeCategory {
        let Some(&(_, max_count)) = histogram.iter().max_by_key(|(_, count)| *count) else {
            return TradeCategory::General;
        };
        let tied: Vec<&TradeCategory> =
            histogram.iter().filter(|(_, count)| *count == max_count).map(|(cat, _)| cat).collect();

        if tied.len() == 1 {
            return tied[0].clone();
        }
        if tied.contains(&&self.tenant_category_preference) {
            return self.tenant_category_preference.clone();
        }
        if tied.contains(&&TradeCategory::General) {
            return TradeCategory::General;
        }
        tied[0].clone()
    }

    fn recommended_action(urgency: Urgency) -> String {
        match urgency {
            Urgency::Emergency => "dispatch_emergency_technician".into(),
            Urgency::Urgent => "schedule_within_8_hours".into(),
            Urgency::Normal => "schedule_within_48_hours".into(),
            Urgency::Routine => "offer_routine_slot".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TriageEngine {
        TriageEngine::new(TriageEngine::default_rules(), TradeCategory::General)
    }

    #[test]
    fn gas_leak_alone_is_emergency() {
        let result = engine().assess("Ich rieche Gas in der Küche!", ContextModifiers::default());
        assert_eq!(result.urgency, Urgency::Emergency);
        assert_eq!(result.trade_category, TradeCategory::PlumbingHeating);
        assert!(result.reasoning.iter().any(|r| r == "rule:gas_leak"));
    }

    #[test]
    fn no_heat_is_urgent_by_default() {
        let result = engine().assess("Meine Heizung ist kalt", ContextModifiers::default());
        assert_eq!(result.urgency, Urgency::Urgent);
        assert_eq!(result.trade_category, TradeCategory::PlumbingHeating);
    }

    #[test]
    fn vulnerable_occupant_raises_normal_to_urgent() {
        let rules = vec![TriageRule {
            name: "minor_leak".into(),
            patterns: vec!["tropft".into()],
            urgency_score: 45,
            category: TradeCategory::Sanitary,
        }];
        let engine = TriageEngine::new(rules, TradeCategory::General);
        let baseline = engine.assess("Der Wasserhahn tropft", ContextModifiers::default());
        assert_eq!(baseline.urgency, Urgency::Normal);

        let modifiers = ContextModifiers { vulnerable_age: true, ..Default::default() };
        let result = engine.assess("Der Wasserhahn tropft", modifiers);
        assert_eq!(result.urgency, Urgency::Urgent);
    }

    #[test]
    fn identical_inputs_are_deterministic() {
        let engine = engine();
        let a = engine.assess("Wasserschaden im Keller", ContextModifiers::default());
        let b = engine.assess("Wasserschaden im Keller", ContextModifiers::default());
        assert_eq!(a.urgency, b.urgency);
        assert_eq!(a.trade_category, b.trade_category);
        assert_eq!(a.reasoning, b.reasoning);
    }

    #[test]
    fn no_matching_rule_falls_back_to_general_routine() {
        let result = engine().assess("Ich habe eine Frage zur Rechnung", ContextModifiers::default());
        assert_eq!(result.urgency, Urgency::Routine);
        assert_eq!(result.trade_category, TradeCategory::General);
    }
}
