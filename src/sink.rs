use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::models::JobRecord;

/// Outcome of pushing one batch to the CRUD API.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SendStats {
    pub sent: usize,
    pub errors: usize,
}

/// Writes the batch as one pretty-printed JSON array. serde_json emits UTF-8
/// without escaping non-ASCII, so flag emoji and city names survive intact.
pub fn save_json(path: &Path, records: &[JobRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Data saved to {}", path.display());
    Ok(())
}

/// POSTs one record per request. A non-201 response or transport failure is
/// counted and skipped; there are no retries and the batch always runs to
/// the end.
pub async fn post_to_api(api_url: &str, records: &[JobRecord]) -> Result<SendStats> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let mut stats = SendStats::default();
    for record in records {
        match client.post(api_url).json(&api_payload(record)).send().await {
            Ok(response) if response.status() == StatusCode::CREATED => {
                stats.sent += 1;
                println!("Sent to API: {}", record.title);
            }
            Ok(response) => {
                stats.errors += 1;
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(%status, title = %record.title, %body, "API rejected job");
                println!("Error sending {}: {status}", record.title);
            }
            Err(err) => {
                stats.errors += 1;
                tracing::warn!(error = %err, title = %record.title, "API send failed");
                println!("Network error sending job to API: {err}");
            }
        }
    }

    println!(
        "API upload complete: {} successful, {} errors",
        stats.sent, stats.errors
    );
    Ok(stats)
}

/// The wire shape the CRUD API expects. Required text fields are padded so a
/// degraded record still passes validation.
fn api_payload(record: &JobRecord) -> Value {
    let filled = |value: &str| {
        if value.trim().is_empty() {
            "Not specified".to_string()
        } else {
            value.to_string()
        }
    };
    let tags = if record.tags.is_empty() {
        vec!["Actuary".to_string()]
    } else {
        record.tags.clone()
    };

    json!({
        "title": filled(&record.title),
        "company": filled(&record.company),
        "location": filled(&record.location),
        "job_type": record.job_type,
        "tags": tags,
        "description": record.description,
        "url": record.url,
        "posting_date": record.posting_date.to_rfc3339(),
    })
}
