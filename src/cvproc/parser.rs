//! Heuristic CV text parser.
//!
//! Line-scans extracted PDF text into skills / experience / education
//! sections. This parser never fails: unrecognized input yields empty
//! sections and the worker flags the run as low confidence.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::cv::{Education, Experience};

/// Parser output: a partial CV.
#[derive(Debug, Default, Clone)]
pub struct ParsedCv {
    pub skills: Vec<String>,
    pub experiences: Vec<Experience>,
    pub educations: Vec<Education>,
}

impl ParsedCv {
    /// All three sections empty: the text did not look like a CV.
    pub fn is_low_confidence(&self) -> bool {
        self.skills.is_empty() && self.experiences.is_empty() && self.educations.is_empty()
    }
}

static EXPERIENCE_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(experience|work history|employment)\b").expect("valid regex"));
static EDUCATION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(education|academic background)\b").expect("valid regex"));
static SKILLS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(skills|technical proficiencies)\b").expect("valid regex"));

/// Date tokens in the shapes CVs actually use: `Mon YYYY`, `Month YYYY`,
/// `YYYY-MM`, `YYYY/MM`, `MM/YYYY`, or a bare plausible `YYYY`.
static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?P<mon>jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|
           jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|
           dec(?:ember)?)\s+(?P<mon_year>(?:19|20)\d{2})\b
        | \b(?P<ym_year>(?:19|20)\d{2})[-/](?P<ym_month>0?[1-9]|1[0-2])\b
        | \b(?P<my_month>0?[1-9]|1[0-2])/(?P<my_year>(?:19|20)\d{2})\b
        | \b(?P<bare_year>(?:19|20)\d{2})\b
        ",
    )
    .expect("valid regex")
});

const TITLE_KEYWORDS: &[&str] = &[
    "engineer",
    "developer",
    "manager",
    "lead",
    "architect",
    "intern",
    "specialist",
    "analyst",
];

const DEGREE_KEYWORDS: &[&str] = &[
    "bsc", "msc", "bs", "ms", "phd", "bachelor", "master", "doctor", "diploma",
];

const LOCATION_HINTS: &[&str] = &[
    "remote", "berlin", "london", "new york", "san francisco", "toronto", "amsterdam",
    "nairobi", "lagos", "cairo", "accra", "bangalore", "singapore",
];

/// Parses raw extracted text into CV sections. Total: always returns.
pub fn parse(raw_text: &str) -> ParsedCv {
    let text = normalize(raw_text);

    let mut skills_buf = String::new();
    let mut experience_buf = String::new();
    let mut education_buf = String::new();

    #[derive(Clone, Copy, PartialEq)]
    enum Section {
        None,
        Skills,
        Experience,
        Education,
    }

    let mut current = Section::None;
    for line in text.lines() {
        if EXPERIENCE_HEADER.is_match(line) && current != Section::Experience {
            current = Section::Experience;
            continue;
        }
        if EDUCATION_HEADER.is_match(line) && current != Section::Education {
            current = Section::Education;
            continue;
        }
        if SKILLS_HEADER.is_match(line) && current != Section::Skills {
            current = Section::Skills;
            continue;
        }

        let buf = match current {
            Section::None => continue,
            Section::Skills => &mut skills_buf,
            Section::Experience => &mut experience_buf,
            Section::Education => &mut education_buf,
        };
        buf.push_str(line);
        buf.push('\n');
    }

    ParsedCv {
        skills: parse_skills(&skills_buf),
        experiences: parse_experiences(&experience_buf),
        educations: parse_educations(&education_buf),
    }
}

/// CRLF -> LF, tabs -> spaces, runs of three or more blank lines -> two.
fn normalize(raw: &str) -> String {
    static BLANK_RUN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));
    let text = raw.replace("\r\n", "\n").replace('\r', "\n").replace('\t', " ");
    BLANK_RUN.replace_all(&text, "\n\n\n").into_owned()
}

// ── Skills ──────────────────────────────────────────────────────────────────

fn parse_skills(buffer: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();

    for token in buffer.split(['\n', ',', '|', ';', '•', '·']) {
        let token = token
            .trim()
            .trim_start_matches(['•', '-', '*', '–', '—', '·', ' '])
            .trim_end_matches(['.', ',', ';', ':'])
            .trim();
        if token.is_empty() || token.len() > 50 {
            continue;
        }
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(token)) {
            seen.push(token.to_string());
        }
    }

    seen.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()));
    seen
}

// ── Experiences ─────────────────────────────────────────────────────────────

fn parse_experiences(buffer: &str) -> Vec<Experience> {
    blocks(buffer)
        .into_iter()
        .filter_map(|block| parse_experience_block(&block))
        .collect()
}

fn parse_experience_block(lines: &[String]) -> Option<Experience> {
    let header = lines.first()?.clone();
    if header.is_empty() {
        return None;
    }

    let (title, company) = split_role_header(&header);
    let (start_date, end_date) = scan_dates(lines);

    let description = lines
        .iter()
        .skip(1)
        .filter(|line| !is_date_line(line))
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    Some(Experience {
        id: short_hash(&header),
        title,
        company,
        location: pick_location(lines),
        start_date,
        end_date,
        description,
    })
}

/// Splits "Role - Company" style headers once, deciding which side is the
/// title by looking for role keywords.
fn split_role_header(header: &str) -> (String, String) {
    for delim in [" - ", " – ", " — ", " at "] {
        if let Some((left, right)) = header.split_once(delim) {
            let left = left.trim().to_string();
            let right = right.trim().to_string();
            let left_is_title = contains_any(&left, TITLE_KEYWORDS);
            let right_is_title = contains_any(&right, TITLE_KEYWORDS);
            return if right_is_title && !left_is_title {
                (right, left)
            } else {
                (left, right)
            };
        }
    }
    (header.trim().to_string(), String::new())
}

// ── Educations ──────────────────────────────────────────────────────────────

fn parse_educations(buffer: &str) -> Vec<Education> {
    blocks(buffer)
        .into_iter()
        .filter_map(|block| parse_education_block(&block))
        .collect()
}

fn parse_education_block(lines: &[String]) -> Option<Education> {
    let header = lines.first()?.clone();
    if header.is_empty() {
        return None;
    }

    let (degree, institution) = split_degree_header(&header, lines);
    let (graduation, _) = scan_dates(lines);

    Some(Education {
        id: short_hash(&header),
        degree,
        institution,
        location: pick_location(lines),
        graduation_date: graduation,
    })
}

fn split_degree_header(header: &str, lines: &[String]) -> (String, String) {
    for delim in [" - ", " – ", " — ", " at ", ", "] {
        if let Some((left, right)) = header.split_once(delim) {
            let left = left.trim().to_string();
            let right = right.trim().to_string();
            let right_is_degree =
                contains_any(&right, DEGREE_KEYWORDS) && !contains_any(&left, DEGREE_KEYWORDS);
            return if right_is_degree {
                (right, left)
            } else {
                (left, right)
            };
        }
    }

    // No delimiter: the header is whichever role it matches; the other
    // field comes from the next line when present.
    let second = lines
        .get(1)
        .filter(|line| !is_date_line(line))
        .cloned()
        .unwrap_or_default();
    if contains_any(header, DEGREE_KEYWORDS) {
        (header.trim().to_string(), second)
    } else {
        (second, header.trim().to_string())
    }
}

// ── Shared helpers ──────────────────────────────────────────────────────────

/// Splits a section buffer into blocks separated by blank lines, trimming
/// each kept line.
fn blocks(buffer: &str) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in buffer.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let text = text.to_lowercase();
    keywords.iter().any(|kw| {
        text.split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == *kw)
    })
}

/// Scans the first two lines of a block for date tokens; the first is the
/// start, the second (if any) the end.
fn scan_dates(lines: &[String]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let mut found: Vec<NaiveDate> = Vec::new();
    for line in lines.iter().take(2) {
        for caps in DATE_TOKEN.captures_iter(line) {
            if let Some(date) = date_from_captures(&caps) {
                found.push(date);
            }
            if found.len() == 2 {
                break;
            }
        }
        if found.len() == 2 {
            break;
        }
    }
    let mut found = found.into_iter();
    (found.next(), found.next())
}

fn date_from_captures(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    if let (Some(mon), Some(year)) = (caps.name("mon"), caps.name("mon_year")) {
        let month = month_number(mon.as_str())?;
        return NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month, 1);
    }
    if let (Some(year), Some(month)) = (caps.name("ym_year"), caps.name("ym_month")) {
        return NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month.as_str().parse().ok()?, 1);
    }
    if let (Some(month), Some(year)) = (caps.name("my_month"), caps.name("my_year")) {
        return NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month.as_str().parse().ok()?, 1);
    }
    if let Some(year) = caps.name("bare_year") {
        return NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, 1, 1);
    }
    None
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// A line that is nothing but date tokens and range punctuation.
fn is_date_line(line: &str) -> bool {
    let stripped = DATE_TOKEN.replace_all(line, "");
    let leftover: String = stripped
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    !line.trim().is_empty() && (leftover.is_empty() || leftover.eq_ignore_ascii_case("to")
        || leftover.eq_ignore_ascii_case("present")
        || leftover.eq_ignore_ascii_case("current"))
        && DATE_TOKEN.is_match(line)
}

/// Picks a location from the block: text after the first comma of a scanned
/// line when it is 2-40 chars, otherwise the first hint-list match.
fn pick_location(lines: &[String]) -> String {
    for line in lines.iter().take(2) {
        if let Some((_, after)) = line.split_once(',') {
            let after = after.trim().trim_end_matches(['.', ',']);
            if (2..=40).contains(&after.len()) && !DATE_TOKEN.is_match(after) {
                return after.to_string();
            }
        }
    }
    for line in lines {
        let lowered = line.to_lowercase();
        for hint in LOCATION_HINTS {
            if lowered.contains(hint) {
                return (*hint).to_string();
            }
        }
    }
    String::new()
}

/// Short, stable, non-cryptographic identity for a block header (FNV-1a).
fn short_hash(input: &str) -> String {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET;
    for byte in input.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CV: &str = "\
John Doe\n\
Nairobi, Kenya\n\
\n\
Work Experience\n\
\n\
Senior Software Engineer - Acme Corp, Berlin\n\
Jan 2020 - Mar 2023\n\
Built the billing platform.\n\
Scaled ingest to 1M events/day.\n\
\n\
Data Analyst at DataCo\n\
2017 - 2019\n\
Dashboards and reporting.\n\
\n\
Education\n\
\n\
BSc Computer Science - University of Nairobi\n\
2016\n\
\n\
Skills\n\
Rust, Python; PostgreSQL | Docker\n\
• Kubernetes\n\
- AWS\n";

    #[test]
    fn test_sections_are_detected() {
        let cv = parse(SAMPLE_CV);
        assert_eq!(cv.experiences.len(), 2);
        assert_eq!(cv.educations.len(), 1);
        assert!(!cv.skills.is_empty());
        assert!(!cv.is_low_confidence());
    }

    #[test]
    fn test_skills_split_trim_dedupe_sort() {
        let cv = parse(SAMPLE_CV);
        assert_eq!(
            cv.skills,
            vec!["AWS", "Docker", "Kubernetes", "PostgreSQL", "Python", "Rust"]
        );
    }

    #[test]
    fn test_skills_dedupe_is_case_insensitive_first_seen() {
        let skills = parse_skills("Rust, rust, RUST, Tokio");
        assert_eq!(skills, vec!["Rust", "Tokio"]);
    }

    #[test]
    fn test_skills_drop_overlong_tokens() {
        let long = "x".repeat(60);
        let skills = parse_skills(&format!("Rust, {long}"));
        assert_eq!(skills, vec!["Rust"]);
    }

    #[test]
    fn test_experience_header_split_and_dates() {
        let cv = parse(SAMPLE_CV);
        let first = &cv.experiences[0];
        assert_eq!(first.title, "Senior Software Engineer");
        assert_eq!(first.company, "Acme Corp, Berlin");
        assert_eq!(first.start_date, NaiveDate::from_ymd_opt(2020, 1, 1));
        assert_eq!(first.end_date, NaiveDate::from_ymd_opt(2023, 3, 1));
        assert!(first.description.contains("billing platform"));
        assert!(!first.description.contains("Jan 2020"));
    }

    #[test]
    fn test_experience_title_side_heuristic() {
        let (title, company) = split_role_header("Acme Corp - Senior Engineer");
        assert_eq!(title, "Senior Engineer");
        assert_eq!(company, "Acme Corp");

        let (title, company) = split_role_header("Data Analyst at DataCo");
        assert_eq!(title, "Data Analyst");
        assert_eq!(company, "DataCo");
    }

    #[test]
    fn test_experience_bare_year_range() {
        let cv = parse(SAMPLE_CV);
        let second = &cv.experiences[1];
        assert_eq!(second.start_date, NaiveDate::from_ymd_opt(2017, 1, 1));
        assert_eq!(second.end_date, NaiveDate::from_ymd_opt(2019, 1, 1));
    }

    #[test]
    fn test_experience_ids_stable_and_distinct() {
        let a = parse(SAMPLE_CV);
        let b = parse(SAMPLE_CV);
        assert_eq!(a.experiences[0].id, b.experiences[0].id);
        assert_ne!(a.experiences[0].id, a.experiences[1].id);
    }

    #[test]
    fn test_education_degree_and_graduation() {
        let cv = parse(SAMPLE_CV);
        let edu = &cv.educations[0];
        assert_eq!(edu.degree, "BSc Computer Science");
        assert_eq!(edu.institution, "University of Nairobi");
        assert_eq!(edu.graduation_date, NaiveDate::from_ymd_opt(2016, 1, 1));
    }

    #[test]
    fn test_education_degree_side_heuristic() {
        let (degree, institution) =
            split_degree_header("MIT - MSc Electrical Engineering", &[]);
        assert_eq!(degree, "MSc Electrical Engineering");
        assert_eq!(institution, "MIT");
    }

    #[test]
    fn test_location_from_comma_suffix() {
        let cv = parse(SAMPLE_CV);
        assert_eq!(cv.experiences[0].location, "Berlin");
    }

    #[test]
    fn test_location_from_hint_list() {
        let lines = vec!["Engineer - Acme".to_string(), "Fully remote role".to_string()];
        assert_eq!(pick_location(&lines), "remote");
    }

    #[test]
    fn test_unknown_input_is_low_confidence_not_error() {
        let cv = parse("The quick brown fox jumps over the lazy dog.");
        assert!(cv.is_low_confidence());
        assert!(cv.skills.is_empty());
        assert!(cv.experiences.is_empty());
        assert!(cv.educations.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_low_confidence());
    }

    #[test]
    fn test_normalize_collapses_blank_runs_and_tabs() {
        let text = normalize("a\r\n\tb\n\n\n\n\n\nc");
        assert_eq!(text, "a\n b\n\n\nc");
    }

    #[test]
    fn test_date_token_shapes() {
        let lines = |s: &str| vec![s.to_string()];
        assert_eq!(
            scan_dates(&lines("March 2021 - 2022/06")),
            (
                NaiveDate::from_ymd_opt(2021, 3, 1),
                NaiveDate::from_ymd_opt(2022, 6, 1)
            )
        );
        assert_eq!(
            scan_dates(&lines("03/2019 to 2020-11")),
            (
                NaiveDate::from_ymd_opt(2019, 3, 1),
                NaiveDate::from_ymd_opt(2020, 11, 1)
            )
        );
        assert_eq!(scan_dates(&lines("no dates here")), (None, None));
    }
}
