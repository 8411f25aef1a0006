//! Explanation Generator — deterministic, tier-based match rationale.
//!
//! Bands: ≥85 excellent, ≥70 strong, ≥50 fair, otherwise low.

use serde::{Deserialize, Serialize};

use crate::matching::normalize::normalize;

/// How many skills are named before collapsing the rest into "+N more".
const LISTED_SKILLS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Excellent,
    Strong,
    Fair,
    Low,
}

impl MatchTier {
    /// NaN and negative scores fall into `Low`.
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            MatchTier::Excellent
        } else if score >= 70.0 {
            MatchTier::Strong
        } else if score >= 50.0 {
            MatchTier::Fair
        } else {
            MatchTier::Low
        }
    }

    fn headline(self, score: f64, title: &str) -> String {
        match self {
            MatchTier::Excellent => {
                format!("Excellent match ({score:.1}%): your profile is an excellent fit for {title}.")
            }
            MatchTier::Strong => {
                format!("Strong match ({score:.1}%): your skills align well with {title}.")
            }
            MatchTier::Fair => format!(
                "Fair match ({score:.1}%): there is a meaningful overlap between your background and {title}."
            ),
            MatchTier::Low => format!(
                "Low match ({score:.1}%): {title} may require skills you have not highlighted yet."
            ),
        }
    }

    fn call_to_action(self) -> &'static str {
        match self {
            MatchTier::Excellent => {
                "Recommended action: apply now and lead with your strongest matching skills."
            }
            MatchTier::Strong => {
                "Recommended action: apply and tailor your resume to the listed skills."
            }
            MatchTier::Fair => {
                "Recommended action: consider applying after brushing up on the missing skills."
            }
            MatchTier::Low => {
                "Recommended action: treat this as a learning opportunity and upskill in the missing areas, or look for roles closer to your current experience."
            }
        }
    }
}

/// "a, b, c" or "a, b, c (+2 more)".
fn list_skills(skills: &[String]) -> String {
    let shown = skills
        .iter()
        .take(LISTED_SKILLS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if skills.len() > LISTED_SKILLS {
        format!("{shown} (+{} more)", skills.len() - LISTED_SKILLS)
    } else {
        shown
    }
}

fn seniority_remark(job_level: &str) -> Option<&'static str> {
    let level = normalize(job_level);
    if level.contains("senior") {
        Some("This position targets experienced professionals; highlight leadership and impact in your CV.")
    } else if level.contains("junior") || level.contains("entry") || level.contains("associate") {
        Some("This role suits early-career candidates; emphasize projects and learning ability.")
    } else {
        None
    }
}

/// Builds the plain-text rationale for one match. Never empty, never panics.
pub fn explain(
    score: f64,
    matched: &[String],
    missing: &[String],
    job_title: &str,
    job_level: &str,
) -> String {
    let score = if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let tier = MatchTier::from_score(score);
    let title = match job_title.trim() {
        "" => "this role",
        t => t,
    };

    let mut parts = vec![tier.headline(score, title)];

    if matched.is_empty() {
        parts.push("No direct skill overlap was detected from your input.".to_string());
    } else {
        parts.push(format!("You match on: {}.", list_skills(matched)));
    }

    if missing.is_empty() {
        parts.push("No listed skills are missing.".to_string());
    } else {
        parts.push(format!(
            "Consider strengthening: {} to improve your fit.",
            list_skills(missing)
        ));
    }

    if let Some(remark) = seniority_remark(job_level) {
        parts.push(remark.to_string());
    }

    parts.push(tier.call_to_action().to_string());
    parts.join(" ")
}
