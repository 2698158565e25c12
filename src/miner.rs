use std::sync::LazyLock;

use regex::Regex;

use crate::models::{JobRecord, PLACEHOLDER_LOCATION};

/// Title shapes worth recovering from raw markup, in priority order.
static TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(Senior\s+\w+\s+Actuary)").unwrap(),
        Regex::new(r"(?i)(Actuarial\s+\w+)").unwrap(),
        Regex::new(r"(?i)(\w+\s+Actuary)").unwrap(),
        Regex::new(r"(?i)(Risk\s+Analyst)").unwrap(),
        Regex::new(r"(?i)(Insurance\s+\w+)").unwrap(),
    ]
});

static JOB_URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href="([^"]*(?:job|actuarial)[^"]*)""#).unwrap());

/// Matches kept per title pattern before moving to the next one.
const MAX_PER_PATTERN: usize = 5;

/// Last-resort extraction straight from page markup. Produces degraded
/// records: real titles and (positionally zipped) URLs, synthesized
/// everything else. Only called when structural location found nothing.
pub fn mine(markup: &str, max_records: usize) -> Vec<JobRecord> {
    let urls: Vec<&str> = JOB_URL_PATTERN
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();

    let mut titles: Vec<String> = Vec::new();
    for pattern in TITLE_PATTERNS.iter() {
        titles.extend(
            pattern
                .captures_iter(markup)
                .filter_map(|caps| caps.get(1))
                .take(MAX_PER_PATTERN)
                .map(|m| m.as_str().to_string()),
        );
    }
    titles.truncate(max_records);

    titles
        .into_iter()
        .enumerate()
        .map(|(i, title)| {
            let mut record = JobRecord::empty();
            record.company = format!("Company {}", i + 1);
            record.location = PLACEHOLDER_LOCATION.to_string();
            record.tags = vec!["Actuary".to_string()];
            record.description = format!("Actuarial position: {title}");
            record.url = urls.get(i).map(|url| url.to_string()).unwrap_or_default();
            record.title = title;
            record
        })
        .collect()
}
