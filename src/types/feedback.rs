//! Feedback record: the terminal, persisted artifact of an evaluation
//!
//! Field order here is the key order of the JSON artifact.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest score a judge may give
pub const MIN_SCORE: u8 = 1;
/// Highest score a judge may give
pub const MAX_SCORE: u8 = 4;

/// One judge's verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opinion {
    pub judge_name: String,
    /// Always within `MIN_SCORE..=MAX_SCORE`
    pub score: u8,
    pub comment: String,
}

impl Opinion {
    /// Build an opinion, rejecting scores outside 1..=4
    pub fn new(
        judge_name: impl Into<String>,
        score: i64,
        comment: impl Into<String>,
    ) -> Result<Self> {
        let judge_name = judge_name.into();
        if score < MIN_SCORE as i64 || score > MAX_SCORE as i64 {
            return Err(Error::ScoreOutOfRange {
                judge: judge_name,
                score,
            });
        }
        Ok(Self {
            judge_name,
            score: score as u8,
            comment: comment.into(),
        })
    }
}

/// Collective panel feedback: one opinion per responding judge plus a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Ordered by judge registration order
    pub opinions: Vec<Opinion>,
    pub summary: String,
}

impl Feedback {
    /// Check the record-level contract: non-empty, unique judges, scores in range.
    pub fn validate(&self) -> Result<()> {
        if self.opinions.is_empty() {
            return Err(Error::schema_extraction("feedback contains no opinions"));
        }
        if self.summary.trim().is_empty() {
            return Err(Error::schema_extraction("feedback summary is empty"));
        }

        for (i, opinion) in self.opinions.iter().enumerate() {
            if opinion.judge_name.trim().is_empty() {
                return Err(Error::schema_extraction(format!(
                    "opinion {} has an empty judge_name",
                    i
                )));
            }
            if !(MIN_SCORE..=MAX_SCORE).contains(&opinion.score) {
                return Err(Error::ScoreOutOfRange {
                    judge: opinion.judge_name.clone(),
                    score: opinion.score as i64,
                });
            }
            if self.opinions[..i]
                .iter()
                .any(|o| o.judge_name == opinion.judge_name)
            {
                return Err(Error::schema_extraction(format!(
                    "judge '{}' appears more than once",
                    opinion.judge_name
                )));
            }
        }

        Ok(())
    }

    pub fn judge_names(&self) -> Vec<&str> {
        self.opinions.iter().map(|o| o.judge_name.as_str()).collect()
    }

    pub fn scores(&self) -> Vec<u8> {
        self.opinions.iter().map(|o| o.score).collect()
    }

    /// Mean score across opinions, None when empty
    pub fn average_score(&self) -> Option<f32> {
        if self.opinions.is_empty() {
            return None;
        }
        let total: u32 = self.opinions.iter().map(|o| o.score as u32).sum();
        Some(total as f32 / self.opinions.len() as f32)
    }
}
