//! Matched/missing split of a job's skills against query tokens.

use serde::{Deserialize, Serialize};

use crate::matching::ranker::round1;

/// Job skills partitioned by whether the query covers them. Both keep job order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillOverlap {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
}

impl SkillOverlap {
    pub fn total(&self) -> usize {
        self.matched.len() + self.missing.len()
    }

    /// Keyword-mode match percentage: matched / total × 100, one decimal.
    /// Zero when the job lists no skills.
    pub fn match_percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        round1(self.matched.len() as f64 / total as f64 * 100.0)
    }
}

/// A job skill is matched when any query token is a substring of it,
/// so "python" covers "python developer".
pub fn score_overlap(job_skills: &[String], query_tokens: &[String]) -> SkillOverlap {
    let (matched, missing) = job_skills.iter().cloned().partition(|skill| {
        query_tokens
            .iter()
            .any(|token| !token.is_empty() && skill.contains(token.as_str()))
    });
    SkillOverlap { matched, missing }
}
