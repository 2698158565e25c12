use anyhow::Result;

use crate::driver::Page;
use crate::loader::PageLoader;
use crate::models::JobRecord;
use crate::{extract, locator, miner};

pub const BASE_URL: &str = "https://www.actuarylist.com";

/// Owns one scrape run: page loading, element location, per-element
/// extraction, and the fallback to text mining. This is the only place that
/// bounds output size or decides routing.
pub struct Pipeline<P: Page> {
    page: P,
    base_url: String,
    loader: PageLoader,
}

impl<P: Page> Pipeline<P> {
    pub fn new(page: P, base_url: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
            loader: PageLoader::default(),
        }
    }

    pub fn with_loader(page: P, base_url: impl Into<String>, loader: PageLoader) -> Self {
        Self {
            page,
            base_url: base_url.into(),
            loader,
        }
    }

    /// Recover the page handle, e.g. to shut the browser session down.
    pub fn into_page(self) -> P {
        self.page
    }

    pub async fn run(&self, url: &str, max_records: usize) -> Result<Vec<JobRecord>> {
        println!("Navigating to {url}");
        self.loader.load(&self.page, url).await?;

        let (elements, selector) = locator::locate(&self.page).await;

        let mut records = Vec::new();
        if elements.is_empty() {
            println!("No job elements could be found");
            println!("Attempting to extract jobs from page source...");
            let markup = self.page.source().await.unwrap_or_default();
            records = miner::mine(&markup, max_records);
            if !records.is_empty() {
                println!("Extracted {} jobs from page source", records.len());
            }
        } else {
            if let Some(selector) = selector {
                println!(
                    "Found {} job elements using selector: {selector}",
                    elements.len()
                );
            }
            println!(
                "Processing up to {} jobs...",
                elements.len().min(max_records)
            );

            // Extraction never fails outright; a broken element still yields
            // a placeholder record, so one bad card cannot sink the batch.
            for element in elements.iter().take(max_records) {
                let record = extract::extract(element, &self.base_url).await;
                println!(
                    "Job {}: {} at {}",
                    records.len() + 1,
                    record.title,
                    record.company
                );
                if !record.url.is_empty() {
                    println!("   URL: {}", record.url);
                }
                records.push(record);
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockElement, MockPage};
    use crate::loader::LoadOptions;
    use crate::models::PLACEHOLDER_TITLE;
    use std::time::Duration;

    const SITE_SELECTOR: &str = r#"[class*="Job_job-card"]"#;

    fn fast_loader() -> PageLoader {
        PageLoader::new(LoadOptions {
            ready_timeout: Duration::ZERO,
            settle: Duration::ZERO,
            overlay_timeout: Duration::ZERO,
            consent_timeout: Duration::ZERO,
            click_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            max_scroll_attempts: 2,
            poll_interval: Duration::ZERO,
        })
    }

    fn card(company: &str, title: &str) -> MockElement {
        MockElement::with_text(&format!("{company}\n{title}\nLondon office, hybrid"))
    }

    fn pipeline_for(page: MockPage) -> Pipeline<MockPage> {
        Pipeline::with_loader(page, BASE_URL, fast_loader())
    }

    #[tokio::test]
    async fn bounds_record_count_and_preserves_order() {
        let mut page = MockPage::default();
        let cards: Vec<MockElement> = (0..10)
            .map(|i| card(&format!("Firm {i}"), &format!("Actuary Role {i}")))
            .collect();
        page.matches.insert(SITE_SELECTOR, cards);

        let records = pipeline_for(page).run(BASE_URL, 3).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].title, "Actuary Role 0");
        assert_eq!(records[2].title, "Actuary Role 2");
    }

    #[tokio::test]
    async fn miner_is_not_invoked_when_elements_exist() {
        let mut page = MockPage {
            page_source: "Senior Pricing Actuary".to_string(),
            ..Default::default()
        };
        page.matches
            .insert(SITE_SELECTOR, vec![card("Acme Insurance", "Risk Analyst")]);

        let records = pipeline_for(page).run(BASE_URL, 10).await.unwrap();
        assert_eq!(records.len(), 1);
        // Mined records carry synthesized company names; extracted ones do not.
        assert_ne!(records[0].company, "Company 1");
    }

    #[tokio::test]
    async fn miner_runs_when_locator_finds_nothing() {
        let page = MockPage {
            page_source: r#"<a href="/jobs/1">x</a> Senior Pricing Actuary"#.to_string(),
            ..Default::default()
        };

        // Cross-pattern duplicates are kept: the same text matches both the
        // "Senior <word> Actuary" and "<word> Actuary" shapes.
        let records = pipeline_for(page).run(BASE_URL, 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Senior Pricing Actuary");
        assert_eq!(records[1].title, "Pricing Actuary");
        assert_eq!(records[0].company, "Company 1");
        assert_eq!(records[0].url, "/jobs/1");
    }

    #[tokio::test]
    async fn broken_element_does_not_abort_the_batch() {
        let mut page = MockPage::default();
        let mut broken = card("Broken Co", "Actuary Role");
        broken.fail_text = true;
        let cards = vec![
            card("Firm 0", "Actuary Role 0"),
            card("Firm 1", "Actuary Role 1"),
            broken,
            card("Firm 3", "Actuary Role 3"),
            card("Firm 4", "Actuary Role 4"),
        ];
        page.matches.insert(SITE_SELECTOR, cards);

        // The unreadable element is dropped during location; the other four
        // still come through in order.
        let records = pipeline_for(page).run(BASE_URL, 10).await.unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[2].title, "Actuary Role 3");
        assert!(records.iter().all(|r| r.title != PLACEHOLDER_TITLE));
    }

    #[tokio::test]
    async fn empty_page_returns_empty_set() {
        let page = MockPage::default();
        let records = pipeline_for(page).run(BASE_URL, 10).await.unwrap();
        assert!(records.is_empty());
    }
}
