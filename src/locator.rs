use std::collections::HashSet;

use crate::driver::{Page, PageElement};

/// Selectors known to match actuarylist.com job cards, most specific first.
const SITE_SELECTORS: &[&str] = &[
    r#"[class*="Job_job-card"]"#,
    ".Job_job-card__YgDAV",
    r#"div[class*="job-card"]"#,
    r#"div[class*="Job_job"]"#,
    r#"[class*="job-"]"#,
];

/// Structural patterns that tend to mark job listings on any board.
const GENERIC_SELECTORS: &[&str] = &[
    r#"[class*="job"]"#,
    r#"[id*="job"]"#,
    r#"[class*="listing"]"#,
    r#"[id*="listing"]"#,
    r#"[class*="position"]"#,
    r#"[id*="position"]"#,
    ".card",
    ".item",
    ".entry",
    ".post",
    r#"li[class*="job"]"#,
    r#"li[class*="listing"]"#,
    r#"a[href*="/job"]"#,
    r#"a[href*="/jobs"]"#,
];

/// Elements with less text than this are noise, not postings.
const MIN_TEXT_LEN: usize = 20;

/// Finds the elements that represent individual postings. Tries the
/// site-specific selectors first (with exact-text dedup), then the generic
/// tier (no dedup). An empty result is a valid "fall back to text mining"
/// signal, not an error.
pub async fn locate<P: Page>(page: &P) -> (Vec<P::Elem>, Option<&'static str>) {
    for &selector in SITE_SELECTORS {
        let Ok(elements) = page.find_all(selector).await else {
            continue;
        };
        if elements.is_empty() {
            continue;
        }

        let mut seen_texts = HashSet::new();
        let mut valid = Vec::new();
        for element in elements {
            let Ok(text) = element.text().await else {
                continue;
            };
            let text = text.trim().to_string();
            if text.chars().count() > MIN_TEXT_LEN && seen_texts.insert(text) {
                valid.push(element);
            }
        }

        if !valid.is_empty() {
            return (valid, Some(selector));
        }
    }

    for &selector in GENERIC_SELECTORS {
        let Ok(elements) = page.find_all(selector).await else {
            continue;
        };

        let mut valid = Vec::new();
        for element in elements {
            let Ok(text) = element.text().await else {
                continue;
            };
            if text.trim().chars().count() > MIN_TEXT_LEN {
                valid.push(element);
            }
        }

        if !valid.is_empty() {
            return (valid, Some(selector));
        }
    }

    (Vec::new(), None)
}
