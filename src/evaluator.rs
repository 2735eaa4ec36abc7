//! LLM-as-judge comparison of pipeline answers.
//!
//! The judge is asked for a strict JSON object. Whatever comes back is either
//! parsed into a complete [`Verdict::Scored`] or preserved verbatim as
//! [`Verdict::Raw`]; evaluation itself never fails.

use crate::error::{RagError, Result};
use crate::llm::{ChatModel, Prompts};
use crate::pipeline::PipelineAnswer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Lowest and highest score the judge may award.
pub const SCORE_RANGE: (u8, u8) = (1, 10);

/// Scores for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub accuracy: u8,
    pub relevance: u8,
    pub cost_efficiency: u8,
}

impl ScoreCard {
    pub fn total(&self) -> u32 {
        self.accuracy as u32 + self.relevance as u32 + self.cost_efficiency as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineScore {
    pub pipeline_id: String,
    #[serde(flatten)]
    pub scores: ScoreCard,
}

/// Outcome of one judging round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Verdict {
    /// Scores for every submitted pipeline, in submission order.
    Scored {
        scores: Vec<PipelineScore>,
        winner: String,
    },
    /// The judge output could not be used; kept as-is for display.
    Raw { raw: String },
}

impl Verdict {
    pub fn winner(&self) -> Option<&str> {
        match self {
            Verdict::Scored { winner, .. } => Some(winner),
            Verdict::Raw { .. } => None,
        }
    }

    pub fn scores_for(&self, pipeline_id: &str) -> Option<&ScoreCard> {
        match self {
            Verdict::Scored { scores, .. } => scores
                .iter()
                .find(|s| s.pipeline_id == pipeline_id)
                .map(|s| &s.scores),
            Verdict::Raw { .. } => None,
        }
    }

    /// Pipelines ordered by total score, best first. Ties keep submission order.
    pub fn ranking(&self) -> Vec<(&str, u32)> {
        let mut ranked: Vec<(&str, u32)> = match self {
            Verdict::Scored { scores, .. } => scores
                .iter()
                .map(|s| (s.pipeline_id.as_str(), s.scores.total()))
                .collect(),
            Verdict::Raw { .. } => Vec::new(),
        };
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }
}

/// Runs the judge and applies the parse-or-fallback rule.
pub struct Evaluator {
    judge: Arc<dyn ChatModel>,
}

impl Evaluator {
    pub fn new(judge: Arc<dyn ChatModel>) -> Self {
        Self { judge }
    }

    /// Judge `answers` to `question`.
    pub async fn evaluate(&self, question: &str, answers: &[PipelineAnswer]) -> Verdict {
        if answers.is_empty() {
            return Verdict::Raw {
                raw: "No pipeline answers to evaluate.".to_string(),
            };
        }

        let texts: Vec<String> = answers.iter().map(PipelineAnswer::answer_text).collect();
        let entries: Vec<(&str, &str, &str)> = answers
            .iter()
            .zip(&texts)
            .map(|(a, text)| (a.pipeline_id.as_str(), a.description.as_str(), text.as_str()))
            .collect();
        let prompt = Prompts::judge(question, &entries);

        let response = match self
            .judge
            .complete(Some(Prompts::judge_system()), &prompt)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "judge request failed");
                return Verdict::Raw {
                    raw: format!("Judge request failed: {}", e),
                };
            }
        };

        let ids: Vec<&str> = answers.iter().map(|a| a.pipeline_id.as_str()).collect();
        match parse_verdict(&response, &ids) {
            Ok(verdict) => {
                info!(winner = verdict.winner().unwrap_or_default(), "judge verdict parsed");
                verdict
            }
            Err(e) => {
                warn!(error = %e, "falling back to raw judge output");
                Verdict::Raw { raw: response }
            }
        }
    }
}

/// Parse the judge output for the given pipeline ids.
///
/// Every id must carry all three integer scores and the winner must be one of
/// the ids (case-insensitive). A score outside [`SCORE_RANGE`] rejects the
/// whole verdict.
pub fn parse_verdict(response: &str, ids: &[&str]) -> Result<Verdict> {
    let json_str = extract_json(response);
    let value: Value = serde_json::from_str(&json_str)
        .map_err(|e| RagError::JudgeParse(format!("not valid JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| RagError::JudgeParse("expected a JSON object".to_string()))?;

    let scores = ids
        .iter()
        .map(|&id| {
            let entry = lookup(object, id)
                .and_then(Value::as_object)
                .ok_or_else(|| RagError::JudgeParse(format!("missing scores for '{}'", id)))?;
            Ok(PipelineScore {
                pipeline_id: id.to_string(),
                scores: ScoreCard {
                    accuracy: score(entry, id, "accuracy")?,
                    relevance: score(entry, id, "relevance")?,
                    cost_efficiency: score(entry, id, "cost_efficiency")?,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let winner_raw = object
        .get("winner")
        .and_then(Value::as_str)
        .ok_or_else(|| RagError::JudgeParse("missing 'winner'".to_string()))?
        .trim();
    let winner = ids
        .iter()
        .find(|id| id.eq_ignore_ascii_case(winner_raw))
        .ok_or_else(|| {
            RagError::JudgeParse(format!("winner '{}' is not a submitted pipeline", winner_raw))
        })?;

    Ok(Verdict::Scored {
        scores,
        winner: winner.to_string(),
    })
}

fn lookup<'a>(object: &'a Map<String, Value>, id: &str) -> Option<&'a Value> {
    object.get(id).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(id))
            .map(|(_, v)| v)
    })
}

fn score(entry: &Map<String, Value>, id: &str, field: &str) -> Result<u8> {
    let value = entry.get(field).ok_or_else(|| {
        RagError::JudgeParse(format!("missing '{}' for '{}'", field, id))
    })?;

    let number = match value.as_i64() {
        Some(n) => n,
        None => match value.as_f64() {
            Some(f) if f.fract() == 0.0 => f as i64,
            _ => {
                return Err(RagError::JudgeParse(format!(
                    "'{}' for '{}' is not an integer: {}",
                    field, id, value
                )));
            }
        },
    };

    let (low, high) = SCORE_RANGE;
    if number < low as i64 || number > high as i64 {
        return Err(RagError::JudgeParse(format!(
            "'{}' for '{}' is outside {}..={}: {}",
            field, id, low, high, number
        )));
    }
    Ok(number as u8)
}

/// Extract JSON from a response that may be wrapped in markdown or prose.
fn extract_json(response: &str) -> String {
    let response = response.trim();

    if response.starts_with("```") {
        if let Some(end) = response.rfind("```") {
            let start = response.find('\n').map(|n| n + 1).unwrap_or(3);
            if end > start {
                return response[start..end].trim().to_string();
            }
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end > start {
                return response[start..=end].to_string();
            }
        }
    }

    response.to_string()
}
