use std::sync::LazyLock;

use regex::Regex;

use crate::driver::PageElement;
use crate::models::{
    JobRecord, PLACEHOLDER_COMPANY, PLACEHOLDER_LOCATION, PLACEHOLDER_TITLE, truncate_chars,
};

/// Flag emoji that mark a location line, with the names substituted into the
/// final location string.
const FLAG_EMOJI: &[(&str, &str)] = &[
    ("\u{1F1EC}\u{1F1E7}", "UK"),
    ("\u{1F1FA}\u{1F1F8}", "USA"),
    ("\u{1F1E8}\u{1F1E6}", "Canada"),
    ("\u{1F1E6}\u{1F1FA}", "Australia"),
    ("\u{1F1E9}\u{1F1EA}", "Germany"),
    ("\u{1F1EB}\u{1F1F7}", "France"),
];

/// Role keywords that make a line a title candidate.
const TITLE_KEYWORDS: &[&str] = &[
    "actuary",
    "analyst",
    "manager",
    "director",
    "senior",
    "junior",
    "consultant",
];

/// Keywords that stop the line after a flag from being absorbed into the
/// location. Narrower than TITLE_KEYWORDS: "consultant" is deliberately
/// absent, matching observed card layouts.
const LOCATION_GUARD_KEYWORDS: &[&str] =
    &["actuary", "analyst", "manager", "director", "senior", "junior"];

/// Lines containing one of these (and short enough) become tags.
const TAG_KEYWORDS: &[&str] = &[
    "actuary",
    "fellow",
    "life",
    "investments",
    "pensions",
    "insurance",
    "risk",
    "analytics",
];

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(London|New York|Chicago|Toronto|Sydney|Berlin|Paris|Remote|Hybrid)")
            .unwrap(),
        Regex::new(r"(?i)([A-Z][a-z]+,\s*[A-Z]{2})").unwrap(),
        Regex::new(r"(?i)(UK|USA|US|Canada|Australia|Germany|France)").unwrap(),
    ]
});

const MAX_FIELD_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

/// Extracts a record from one located element. Never fails: text or anchor
/// lookups that error simply leave their fields at the placeholder defaults.
pub async fn extract<E: PageElement>(element: &E, base_url: &str) -> JobRecord {
    let text = element.text().await.unwrap_or_default();
    let href = match element.find_first("a").await {
        Ok(Some(anchor)) => anchor.attribute("href").await.ok().flatten(),
        _ => None,
    };
    parse_record(&text, href.as_deref(), base_url)
}

/// Turns one element's rendered text (plus its first anchor href) into a
/// normalized record via line-based heuristics. The classification rules are
/// order-sensitive by design; see the per-step comments.
pub fn parse_record(text: &str, href: Option<&str>, base_url: &str) -> JobRecord {
    let mut record = JobRecord::empty();

    if let Some(href) = href {
        record.url = if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{base_url}{href}")
        };
    }

    let all_text = text.trim();
    let lines: Vec<&str> = all_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut location_info: Vec<&str> = Vec::new();
    let mut title_candidates: Vec<&str> = Vec::new();
    let mut company_candidates: Vec<&str> = Vec::new();

    for (i, &line) in lines.iter().enumerate() {
        // A flag emoji claims this line (and usually the next) for the
        // location; such a line is never a title or company candidate.
        if FLAG_EMOJI.iter().any(|(emoji, _)| line.contains(emoji)) {
            let mut parts = vec![line];
            if let Some(&next) = lines.get(i + 1) {
                let next_lower = next.to_lowercase();
                if !LOCATION_GUARD_KEYWORDS
                    .iter()
                    .any(|keyword| next_lower.contains(keyword))
                {
                    parts.push(next);
                }
            }
            location_info = parts;
            continue;
        }

        let lower = line.to_lowercase();
        if TITLE_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
            if line.chars().count() < 100 {
                title_candidates.push(line);
            }
        } else if line.chars().count() < 50 && i < 3 {
            // Company names are short and sit in the first few lines.
            company_candidates.push(line);
        }
    }

    record.title = if let Some(title) = title_candidates.first() {
        title.to_string()
    } else if lines.len() > 1 {
        lines[1].to_string()
    } else if let Some(first) = lines.first() {
        first.to_string()
    } else {
        PLACEHOLDER_TITLE.to_string()
    };

    // Prefer the shortest plausible company name.
    let mut sorted_candidates = company_candidates.clone();
    sorted_candidates.sort_by_key(|candidate| candidate.chars().count());
    for candidate in &sorted_candidates {
        let len = candidate.chars().count();
        if (3..=50).contains(&len) {
            record.company = candidate.to_string();
            break;
        }
    }
    if record.company.is_empty() {
        if let Some(first) = lines.first() {
            if *first != record.title {
                record.company = first.to_string();
            }
        }
    }

    if !location_info.is_empty() {
        let mut location = location_info.join(" ");
        for (emoji, name) in FLAG_EMOJI {
            location = location.replace(emoji, name);
        }
        record.location = location.trim().to_string();
    } else {
        for pattern in LOCATION_PATTERNS.iter() {
            if let Some(found) = pattern.captures(all_text).and_then(|caps| caps.get(1)) {
                record.location = found.as_str().to_string();
                break;
            }
        }
    }

    for line in &lines {
        let lower = line.to_lowercase();
        let is_tag = TAG_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
            && line.chars().count() < 30;
        if is_tag && !record.tags.iter().any(|tag| tag == line) {
            record.tags.push(line.to_string());
        }
    }

    record.description = truncate_chars(
        &lines
            .iter()
            .take(5)
            .copied()
            .collect::<Vec<_>>()
            .join(" "),
        MAX_DESCRIPTION_LEN,
    );

    if record.title.is_empty() {
        record.title = PLACEHOLDER_TITLE.to_string();
    }
    if record.company.is_empty() {
        record.company = PLACEHOLDER_COMPANY.to_string();
    }
    if record.location.is_empty() {
        record.location = PLACEHOLDER_LOCATION.to_string();
    }

    record.title = truncate_chars(&record.title, MAX_FIELD_LEN);
    record.company = truncate_chars(&record.company, MAX_FIELD_LEN);
    record.location = truncate_chars(&record.location, MAX_FIELD_LEN);

    record
}
