use anyhow::{Context, Result};
use serde_json::Value;
use thirtyfour::ChromiumLikeCapabilities;
use thirtyfour::prelude::*;

/// One rendered DOM node: text/attribute queries, visibility, and click.
pub trait PageElement: Sized {
    async fn text(&self) -> Result<String>;
    async fn attribute(&self, name: &str) -> Result<Option<String>>;
    async fn is_displayed(&self) -> Result<bool>;
    async fn is_enabled(&self) -> Result<bool>;
    async fn click(&self) -> Result<()>;
    /// First descendant matching a CSS selector, if any.
    async fn find_first(&self, css: &str) -> Result<Option<Self>>;
}

/// A scriptable browser page. The pipeline only ever talks to this interface,
/// so any compliant driver can stand in for the real WebDriver session.
pub trait Page {
    type Elem: PageElement;

    async fn navigate(&self, url: &str) -> Result<()>;
    async fn ready_state(&self) -> Result<String>;
    async fn execute(&self, js: &str) -> Result<Value>;
    async fn find_all(&self, css: &str) -> Result<Vec<Self::Elem>>;
    async fn source(&self) -> Result<String>;
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Chrome session against a running chromedriver endpoint.
pub struct Browser {
    driver: WebDriver,
}

impl Browser {
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if headless {
            caps.add_arg("--headless=new")?;
        }
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--disable-extensions")?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_arg("--window-size=1920,1080")?;
        caps.add_arg(&format!("--user-agent={USER_AGENT}"))?;

        let driver = WebDriver::new(webdriver_url, caps).await.with_context(|| {
            format!(
                "Failed to start WebDriver session at {webdriver_url}. \
                 Make sure chromedriver is running."
            )
        })?;

        // Mask the automation flag the way a regular browser session looks.
        let _ = driver
            .execute(
                "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})",
                Vec::new(),
            )
            .await;

        Ok(Self { driver })
    }

    pub async fn quit(self) -> Result<()> {
        self.driver
            .quit()
            .await
            .context("Failed to close WebDriver session")
    }
}

impl Page for Browser {
    type Elem = WebElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.driver
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))
    }

    async fn ready_state(&self) -> Result<String> {
        let ret = self
            .driver
            .execute("return document.readyState", Vec::new())
            .await?;
        Ok(ret.convert()?)
    }

    async fn execute(&self, js: &str) -> Result<Value> {
        let ret = self.driver.execute(js, Vec::new()).await?;
        Ok(ret.json().clone())
    }

    async fn find_all(&self, css: &str) -> Result<Vec<WebElement>> {
        Ok(self.driver.find_all(By::Css(css)).await?)
    }

    async fn source(&self) -> Result<String> {
        Ok(self.driver.source().await?)
    }
}

impl PageElement for WebElement {
    async fn text(&self) -> Result<String> {
        Ok(WebElement::text(self).await?)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.attr(name).await?)
    }

    async fn is_displayed(&self) -> Result<bool> {
        Ok(WebElement::is_displayed(self).await?)
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(WebElement::is_enabled(self).await?)
    }

    async fn click(&self) -> Result<()> {
        Ok(WebElement::click(self).await?)
    }

    async fn find_first(&self, css: &str) -> Result<Option<Self>> {
        let mut found = self.find_all(By::Css(css)).await?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.remove(0)))
        }
    }
}
