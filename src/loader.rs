use std::time::Duration;

use anyhow::Result;
use tokio::time::{Instant, sleep};

use crate::driver::{Page, PageElement};

/// Overlays that indicate content is still rendering. Their disappearance is
/// waited for briefly; a timeout on any one of them is non-fatal.
const LOADING_SELECTORS: &[&str] = &[
    "[class*='loading']",
    "[class*='spinner']",
    "[id*='loading']",
    ".loader",
    "#loader",
    ".loading-overlay",
];

/// Cookie-consent buttons, in priority order. The first clickable match wins.
const CONSENT_SELECTORS: &[&str] = &[
    "button[aria-label*='Accept']",
    "button[aria-label*='accept']",
    ".cookie-accept",
    "#cookie-accept",
    "[data-testid*='accept']",
    ".accept-cookies",
    "#accept-cookies",
];

/// Controls that reveal more postings when clicked.
const LOAD_MORE_SELECTORS: &[&str] = &[
    ".load-more",
    "#load-more",
    ".show-more",
    "#show-more",
    "[data-testid*='load']",
    "[data-testid*='more']",
];

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub ready_timeout: Duration,
    pub settle: Duration,
    pub overlay_timeout: Duration,
    pub consent_timeout: Duration,
    pub click_settle: Duration,
    pub scroll_settle: Duration,
    pub max_scroll_attempts: usize,
    pub poll_interval: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            ready_timeout: Duration::from_secs(20),
            settle: Duration::from_secs(5),
            overlay_timeout: Duration::from_secs(3),
            consent_timeout: Duration::from_secs(3),
            click_settle: Duration::from_secs(2),
            scroll_settle: Duration::from_secs(3),
            max_scroll_attempts: 10,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Drives a page to a fully-loaded state: navigation, settle waits, consent
/// dismissal, and bounded scroll-and-load. Only navigation failure propagates;
/// every other sub-step is best-effort.
pub struct PageLoader {
    options: LoadOptions,
}

impl Default for PageLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

impl PageLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    pub async fn load<P: Page>(&self, page: &P, url: &str) -> Result<()> {
        page.navigate(url).await?;
        self.wait_for_ready(page).await;
        sleep(self.options.settle).await;
        self.dismiss_loading_overlays(page).await;
        self.dismiss_consent(page).await;
        self.scroll_and_load(page).await;
        Ok(())
    }

    async fn wait_for_ready<P: Page>(&self, page: &P) {
        let deadline = Instant::now() + self.options.ready_timeout;
        loop {
            if matches!(page.ready_state().await.as_deref(), Ok("complete")) {
                println!("Page loaded, waiting for dynamic content...");
                return;
            }
            if Instant::now() >= deadline {
                println!("Page load timeout, continuing anyway...");
                return;
            }
            sleep(self.options.poll_interval).await;
        }
    }

    /// Waits for each known loading indicator to become invisible. Absence of
    /// an indicator counts as invisible.
    async fn dismiss_loading_overlays<P: Page>(&self, page: &P) {
        for selector in LOADING_SELECTORS {
            let deadline = Instant::now() + self.options.overlay_timeout;
            loop {
                if self.all_hidden(page, selector).await {
                    break;
                }
                if Instant::now() >= deadline {
                    break;
                }
                sleep(self.options.poll_interval).await;
            }
        }
    }

    async fn all_hidden<P: Page>(&self, page: &P, selector: &str) -> bool {
        let Ok(elements) = page.find_all(selector).await else {
            return true;
        };
        for element in &elements {
            if element.is_displayed().await.unwrap_or(false) {
                return false;
            }
        }
        true
    }

    /// Tries each consent selector in order and clicks the first clickable
    /// match. No match anywhere is a normal outcome.
    async fn dismiss_consent<P: Page>(&self, page: &P) {
        for selector in CONSENT_SELECTORS {
            let deadline = Instant::now() + self.options.consent_timeout;
            loop {
                if let Some(button) = self.first_clickable(page, selector).await {
                    if button.click().await.is_ok() {
                        println!("Cookie consent handled");
                        sleep(self.options.click_settle).await;
                        return;
                    }
                    break;
                }
                if Instant::now() >= deadline {
                    break;
                }
                sleep(self.options.poll_interval).await;
            }
        }
    }

    async fn first_clickable<P: Page>(&self, page: &P, selector: &str) -> Option<P::Elem> {
        let elements = page.find_all(selector).await.ok()?;
        for element in elements {
            let displayed = element.is_displayed().await.unwrap_or(false);
            let enabled = element.is_enabled().await.unwrap_or(false);
            if displayed && enabled {
                return Some(element);
            }
        }
        None
    }

    /// Scrolls to the bottom repeatedly, clicking any "load more" control on
    /// the way, until neither document height nor total element count changes
    /// between iterations or the attempt budget runs out.
    async fn scroll_and_load<P: Page>(&self, page: &P) {
        println!("Attempting to load all jobs...");

        let mut last_height = self.document_height(page).await.unwrap_or(0);
        let mut last_count = 0usize;
        let mut attempts = 0;

        while attempts < self.options.max_scroll_attempts {
            let _ = page
                .execute("window.scrollTo(0, document.body.scrollHeight);")
                .await;
            println!("Scrolled to bottom (attempt {})", attempts + 1);
            sleep(self.options.scroll_settle).await;

            for selector in LOAD_MORE_SELECTORS {
                if let Some(button) = self.first_clickable(page, selector).await {
                    if button.click().await.is_ok() {
                        println!("Clicked load more button");
                        sleep(self.options.scroll_settle).await;
                        break;
                    }
                }
            }

            let new_height = self.document_height(page).await.unwrap_or(last_height);
            let count = page
                .find_all("*")
                .await
                .map(|elements| elements.len())
                .unwrap_or(last_count);

            if new_height == last_height && count == last_count {
                println!("No new content loaded, stopping...");
                break;
            }

            last_height = new_height;
            last_count = count;
            attempts += 1;
        }

        let _ = page.execute("window.scrollTo(0, 0);").await;
        sleep(self.options.click_settle).await;
    }

    async fn document_height<P: Page>(&self, page: &P) -> Option<i64> {
        page.execute("return document.body.scrollHeight")
            .await
            .ok()
            .and_then(|value| value.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockElement, MockPage};

    fn fast_options() -> LoadOptions {
        LoadOptions {
            ready_timeout: Duration::ZERO,
            settle: Duration::ZERO,
            overlay_timeout: Duration::ZERO,
            consent_timeout: Duration::ZERO,
            click_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
            max_scroll_attempts: 10,
            poll_interval: Duration::ZERO,
        }
    }

    fn scroll_downs(page: &MockPage) -> usize {
        page.scripts
            .borrow()
            .iter()
            .filter(|js| js.starts_with("window.scrollTo(0, document"))
            .count()
    }

    #[tokio::test]
    async fn navigation_failure_propagates() {
        let page = MockPage {
            fail_navigate: true,
            ..Default::default()
        };
        let loader = PageLoader::new(fast_options());
        assert!(loader.load(&page, "https://example.com").await.is_err());
    }

    #[tokio::test]
    async fn scroll_loop_stops_when_nothing_changes() {
        let page = MockPage {
            heights: vec![100, 100].into(),
            ..Default::default()
        };
        let loader = PageLoader::new(fast_options());
        loader.load(&page, "https://example.com").await.unwrap();
        // First iteration sees an unchanged height and no elements, so the
        // loop exits after a single scroll.
        assert_eq!(scroll_downs(&page), 1);
    }

    #[tokio::test]
    async fn scroll_loop_respects_attempt_budget() {
        // Heights keep growing, so only the attempt budget can stop the loop.
        let heights: Vec<i64> = (0..40).map(|i| 100 + i * 10).collect();
        let page = MockPage {
            heights: heights.into(),
            ..Default::default()
        };
        let loader = PageLoader::new(fast_options());
        loader.load(&page, "https://example.com").await.unwrap();
        // Budget of 10 attempts plus the final iteration that observes it.
        assert!(scroll_downs(&page) <= 11);
        assert!(scroll_downs(&page) >= 10);
    }

    #[tokio::test]
    async fn consent_button_is_clicked_once() {
        let button = MockElement::with_text("Accept all");
        let clicks = button.clicks.clone();
        let mut page = MockPage {
            heights: vec![100, 100].into(),
            ..Default::default()
        };
        page.matches.insert(".cookie-accept", vec![button]);

        let loader = PageLoader::new(fast_options());
        loader.load(&page, "https://example.com").await.unwrap();
        assert_eq!(clicks.get(), 1);
    }

    #[tokio::test]
    async fn hidden_consent_button_is_ignored() {
        let button = MockElement {
            displayed: false,
            ..MockElement::with_text("Accept")
        };
        let clicks = button.clicks.clone();
        let mut page = MockPage {
            heights: vec![100, 100].into(),
            ..Default::default()
        };
        page.matches.insert(".cookie-accept", vec![button]);

        let loader = PageLoader::new(fast_options());
        loader.load(&page, "https://example.com").await.unwrap();
        assert_eq!(clicks.get(), 0);
    }

    #[tokio::test]
    async fn load_more_control_is_clicked_during_scroll() {
        let button = MockElement::with_text("Show more");
        let clicks = button.clicks.clone();
        let mut page = MockPage {
            heights: vec![100, 200, 200].into(),
            ..Default::default()
        };
        page.matches.insert(".load-more", vec![button]);

        let loader = PageLoader::new(fast_options());
        loader.load(&page, "https://example.com").await.unwrap();
        assert!(clicks.get() >= 1);
    }
}
