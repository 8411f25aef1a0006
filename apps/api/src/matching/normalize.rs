//! Text Normalizer — canonical form for skills, queries, locations and job sentences.
//!
//! Keeps `+`, `-` and `.` so tokens like `c++`, `node.js` and `.net` survive intact.

/// Short-hand skill names mapped to the canonical spelling used in job postings.
const SKILL_ALIASES: &[(&str, &str)] = &[
    ("ml", "machine learning"),
    ("dl", "deep learning"),
    ("ai", "artificial intelligence"),
    ("cv", "computer vision"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("node", "node.js"),
    ("cplus", "c++"),
    ("py", "python"),
    ("k8s", "kubernetes"),
];

/// Lower-cases, drops every character outside `[a-z0-9+-.]` and whitespace,
/// then collapses whitespace runs to single spaces.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .to_lowercase()
        .chars()
        .filter(|c| {
            c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || matches!(c, '+' | '-' | '.')
                || c.is_whitespace()
        })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical skill name for a normalized short-hand token, if it has one.
pub fn map_alias(token: &str) -> Option<&'static str> {
    SKILL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, canonical)| *canonical)
}

/// Normalized, whitespace-split query tokens. A short-hand token is kept as
/// typed and followed by its canonical spelling.
pub fn query_tokens(query: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for token in normalize(query).split_whitespace() {
        tokens.push(token.to_string());
        if let Some(canonical) = map_alias(token) {
            tokens.push(canonical.to_string());
        }
    }
    tokens
}

/// Parses a comma-joined skill string into an ordered, de-duplicated list of
/// normalized skills. Empty entries are dropped.
pub fn split_skills(skills_raw: &str) -> Vec<String> {
    let mut skills: Vec<String> = Vec::new();
    for part in skills_raw.split(',') {
        let skill = normalize(part);
        if skill.is_empty() || skills.contains(&skill) {
            continue;
        }
        skills.push(skill);
    }
    skills
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_domain_tokens() {
        assert_eq!(normalize("C++, Node.js and .NET!"), "c++ node.js and .net");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("  Senior \t Rust\n\nEngineer  "), "senior rust engineer");
    }

    #[test]
    fn test_strips_punctuation() {
        assert_eq!(normalize("Python (3.x) / SQL; Docker*"), "python 3.x sql docker");
    }

    #[test]
    fn test_empty_input_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   !!!  "), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "C++ / Node.js / .NET",
            "  Data   Scientist (ML) ",
            "Zürich, Switzerland",
            "-- weird ++ input ..",
            "",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_alias_mapping() {
        assert_eq!(map_alias("js"), Some("javascript"));
        assert_eq!(map_alias("py"), Some("python"));
        assert_eq!(map_alias("rust"), None);
    }

    #[test]
    fn test_query_tokens_keep_typed_token_and_add_alias() {
        assert_eq!(
            query_tokens("Py, SQL and ML"),
            vec!["py", "python", "sql", "and", "ml", "machine learning"]
        );
    }

    #[test]
    fn test_split_skills_dedupes_in_order() {
        assert_eq!(
            split_skills("Python, SQL, , python,Docker "),
            vec!["python", "sql", "docker"]
        );
    }
}
