//! Skill enrichment: a fixed dictionary of canonical tech terms matched as
//! whole words against a job's title and description, unioned with whatever
//! the scraper already declared.

use crate::models::job::ScrapedJob;

/// Canonical tech-skill dictionary. Storage casing for dictionary hits is
/// the casing listed here.
const TECH_SKILLS: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "java",
    "go",
    "golang",
    "rust",
    "c++",
    "c#",
    "php",
    "ruby",
    "kotlin",
    "swift",
    "scala",
    "react",
    "vue",
    "angular",
    "svelte",
    "node.js",
    "django",
    "flask",
    "rails",
    "spring",
    "laravel",
    "mysql",
    "postgresql",
    "mongodb",
    "redis",
    "elasticsearch",
    "sqlite",
    "aws",
    "azure",
    "gcp",
    "docker",
    "kubernetes",
    "terraform",
    "jenkins",
    "git",
    "github",
    "gitlab",
    "html",
    "css",
    "sass",
    "tailwind",
    "api",
    "rest",
    "graphql",
    "grpc",
    "microservices",
    "devops",
    "ci/cd",
    "linux",
    "machine learning",
    "data science",
    "analytics",
    "sql",
];

/// Returns the union of the scraper-declared skills/tags and dictionary
/// terms found as whole words in the title or description, deduplicated
/// case-insensitively with first-seen casing preserved.
pub fn enrich(job: &ScrapedJob) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();

    let mut add = |skill: &str| {
        let skill = skill.trim();
        if skill.is_empty() {
            return;
        }
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            seen.push(skill.to_string());
        }
    };

    for skill in &job.extracted_skills {
        add(skill);
    }
    for tag in &job.tags {
        add(tag);
    }

    let haystack = format!("{} {}", job.title, job.description).to_lowercase();
    for term in TECH_SKILLS {
        if contains_whole_word(&haystack, term) {
            add(term);
        }
    }

    seen
}

/// Whole-word containment over a lower-cased haystack. Word boundaries are
/// any non-alphanumeric character, which keeps terms like `c++`, `node.js`,
/// and `ci/cd` matchable while rejecting `go` inside `django`.
fn contains_whole_word(haystack: &str, term: &str) -> bool {
    let mut search_from = 0;
    while let Some(pos) = haystack[search_from..].find(term) {
        let start = search_from + pos;
        let end = start + term.len();

        let left_ok = start == 0
            || !haystack[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric());
        let right_ok = end == haystack.len()
            || !haystack[end..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric());

        if left_ok && right_ok {
            return true;
        }
        search_from = start + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(title: &str, description: &str, skills: Vec<&str>, tags: Vec<&str>) -> ScrapedJob {
        ScrapedJob {
            title: title.to_string(),
            company: "Acme".to_string(),
            location: "Remote".to_string(),
            description: description.to_string(),
            apply_url: "https://example.com/j/1".to_string(),
            source: "Test".to_string(),
            posted_at: Utc::now(),
            is_sponsorship_available: false,
            extracted_skills: skills.into_iter().map(String::from).collect(),
            tags: tags.into_iter().map(String::from).collect(),
            salary: None,
            source_id: None,
        }
    }

    #[test]
    fn test_dictionary_terms_found_in_description() {
        let j = job(
            "Backend Engineer",
            "We use Rust and PostgreSQL behind GraphQL.",
            vec![],
            vec![],
        );
        let skills = enrich(&j);
        assert!(skills.contains(&"rust".to_string()));
        assert!(skills.contains(&"postgresql".to_string()));
        assert!(skills.contains(&"graphql".to_string()));
    }

    #[test]
    fn test_whole_word_rejects_substrings() {
        let j = job("Django Developer", "We love django here.", vec![], vec![]);
        let skills = enrich(&j);
        assert!(skills.contains(&"django".to_string()));
        assert!(!skills.contains(&"go".to_string()));
    }

    #[test]
    fn test_symbol_terms_match() {
        let j = job(
            "Systems Engineer",
            "Modern C++ services, Node.js tooling, CI/CD pipelines.",
            vec![],
            vec![],
        );
        let skills = enrich(&j);
        assert!(skills.contains(&"c++".to_string()));
        assert!(skills.contains(&"node.js".to_string()));
        assert!(skills.contains(&"ci/cd".to_string()));
    }

    #[test]
    fn test_declared_skills_and_tags_deduped_first_seen_casing() {
        let j = job(
            "Engineer",
            "rust all day",
            vec!["Rust", "Kafka"],
            vec!["rust", "kafka"],
        );
        let skills = enrich(&j);
        let rust_entries: Vec<_> = skills
            .iter()
            .filter(|s| s.eq_ignore_ascii_case("rust"))
            .collect();
        assert_eq!(rust_entries, vec!["Rust"]);
        let kafka_entries: Vec<_> = skills
            .iter()
            .filter(|s| s.eq_ignore_ascii_case("kafka"))
            .collect();
        assert_eq!(kafka_entries, vec!["Kafka"]);
    }

    #[test]
    fn test_enrichment_never_produces_case_insensitive_duplicates() {
        let j = job(
            "Python Developer",
            "Python, PYTHON, python everywhere. Docker too.",
            vec!["python"],
            vec!["Python"],
        );
        let skills = enrich(&j);
        let mut lowered: Vec<String> = skills.iter().map(|s| s.to_lowercase()).collect();
        let before = lowered.len();
        lowered.sort();
        lowered.dedup();
        assert_eq!(before, lowered.len());
    }
}
