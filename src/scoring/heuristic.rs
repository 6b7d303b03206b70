//! Rule-based scorer for lead records.
//!
//! Deterministic keyword and ratio heuristics over optional record fields:
//! description/notes text, tags, mortgage-balance-to-value ratio,
//! delinquency days, and vacancy.

use anyhow::Result;
use serde_json::Value;

use super::{ScoredRecord, Scorer};

/// Distress signals that boost a record's score.
const KEYWORD_BOOST: &[&str] = &[
    "foreclosure",
    "pre-foreclosure",
    "auction",
    "bankruptcy",
    "tax lien",
    "vacant",
    "delinquent",
    "behind on payments",
];

/// Deterministic, explainable scorer.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    pub fn score_record(&self, record: &Value) -> ScoredRecord {
        let mut base = 0.3f64;

        let desc = string_field(record, &["description", "notes"]);
        let text_boost = text_score(&desc);
        base += text_boost;

        let tags_text = tags_field(record);
        base += text_score(&tags_text) * 0.5;

        let est = number_field(record, &["estimated_value", "est_value"]);
        let mort = number_field(record, &["mortgage_balance", "mortgage"]);
        let bal_ratio = numeric_ratio(mort, est);
        base += bal_ratio * 0.25;

        let days = number_field(record, &["days_delinquent", "daysDelinquent"]) as i64;
        base += match days {
            d if d >= 90 => 0.25,
            d if d >= 30 => 0.12,
            d if d > 0 => 0.05,
            _ => 0.0,
        };

        let vacant = bool_field(record, "vacant");
        if vacant {
            base += 0.18;
        }

        let score = base.clamp(0.0, 1.0);
        let explanation = format!(
            "text_boost={:.2}, tags_text='{}', bal_ratio={:.2}, days={}, vacant={}",
            text_boost, tags_text, bal_ratio, days, vacant
        );

        ScoredRecord {
            score: (score * 10000.0).round() / 10000.0,
            explanation,
        }
    }
}

impl Scorer for HeuristicScorer {
    fn score_records(&self, records: &[Value]) -> Result<Vec<ScoredRecord>> {
        Ok(records.iter().map(|r| self.score_record(r)).collect())
    }
}

/// Keyword contribution, capped at 0.6.
fn text_score(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let score = KEYWORD_BOOST
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .count() as f64
        * 0.15;
    score.min(0.6)
}

fn numeric_ratio(a: f64, b: f64) -> f64 {
    if b <= 0.0 {
        return 0.0;
    }
    (a / b).clamp(0.0, 1.0)
}

fn string_field(record: &Value, names: &[&str]) -> String {
    names
        .iter()
        .find_map(|n| record.get(n).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

fn tags_field(record: &Value) -> String {
    for name in ["tags", "keywords"] {
        match record.get(name) {
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
            }
            Some(Value::String(s)) => return s.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => continue,
        }
    }
    String::new()
}

fn number_field(record: &Value, names: &[&str]) -> f64 {
    names
        .iter()
        .find_map(|n| record.get(n))
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
        .unwrap_or(0.0)
}

fn bool_field(record: &Value, name: &str) -> bool {
    match record.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_baseline_score() {
        let record = json!({"id": 1, "address": "123 Main St"});
        let scored = HeuristicScorer.score_record(&record);
        assert!((scored.score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_boost_capped() {
        let record = json!({
            "description": "vacant foreclosure auction bankruptcy tax lien delinquent"
        });
        let scored = HeuristicScorer.score_record(&record);
        // 0.3 base + 0.6 capped text boost + 0.18 vacancy flag not set
        assert!(scored.score <= 1.0);
        assert!(scored.score >= 0.9);
    }

    #[test]
    fn test_delinquency_tiers() {
        let fresh = HeuristicScorer.score_record(&json!({"days_delinquent": 10}));
        let mid = HeuristicScorer.score_record(&json!({"days_delinquent": 45}));
        let old = HeuristicScorer.score_record(&json!({"days_delinquent": 120}));

        assert!(fresh.score < mid.score);
        assert!(mid.score < old.score);
    }

    #[test]
    fn test_vacancy_from_string() {
        let vacant = HeuristicScorer.score_record(&json!({"vacant": "Yes"}));
        let occupied = HeuristicScorer.score_record(&json!({"vacant": "no"}));
        assert!(vacant.score > occupied.score);
    }

    #[test]
    fn test_scores_clamped() {
        let record = json!({
            "description": "vacant foreclosure auction bankruptcy tax lien",
            "tags": ["delinquent", "behind on payments"],
            "mortgage_balance": 200000,
            "estimated_value": 100000,
            "days_delinquent": 365,
            "vacant": true
        });
        let scored = HeuristicScorer.score_record(&record);
        assert_eq!(scored.score, 1.0);
    }
}
