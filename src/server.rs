use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;

use crate::db::{Database, JobPatch, JobQuery, NewJob, Sort};
use crate::models::{DEFAULT_JOB_TYPE, JOB_TYPES};

pub struct AppState {
    db: Mutex<Database>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/job-types", get(job_types))
        .route("/api/jobs/locations", get(locations))
        .route("/api/jobs/tags", get(tags))
        .route(
            "/api/jobs/:id",
            get(get_job).put(update_job).delete(delete_job),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(db: Database, port: u16) -> Result<()> {
    db.init()?;
    let app = router(Arc::new(AppState::new(db)));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    println!("Job API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

type Reply = (StatusCode, Json<Value>);

fn ok(data: impl serde::Serialize) -> Reply {
    (StatusCode::OK, Json(json!({"success": true, "data": data})))
}

fn not_found() -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "error": "Job not found"})),
    )
}

fn no_data() -> Reply {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": "No data provided"})),
    )
}

fn validation_failed(errors: Vec<String>) -> Reply {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": "Validation failed", "errors": errors})),
    )
}

fn internal(what: &str, err: anyhow::Error) -> Reply {
    tracing::error!(error = %err, "{what}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": what, "message": err.to_string()})),
    )
}

fn job_type_error() -> String {
    format!("job_type must be one of: {}", JOB_TYPES.join(", "))
}

/// Parses an ISO-8601 timestamp, tolerating a missing offset.
fn parse_posting_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    value
        .parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Deserialize)]
struct ListParams {
    job_type: Option<String>,
    location: Option<String>,
    tag: Option<String>,
    search: Option<String>,
    sort: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobInput {
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    job_type: Option<String>,
    tags: Option<Vec<String>>,
    description: Option<String>,
    url: Option<String>,
    posting_date: Option<String>,
}

impl JobInput {
    fn blank(field: &Option<String>) -> bool {
        field.as_deref().map(str::trim).unwrap_or("").is_empty()
    }

    /// Validation for creation: all three core fields must be present.
    fn validate_required(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("title", &self.title),
            ("company", &self.company),
            ("location", &self.location),
        ] {
            if Self::blank(value) {
                errors.push(format!("{name} is required"));
            }
        }
        if let Some(job_type) = &self.job_type {
            if !JOB_TYPES.contains(&job_type.as_str()) {
                errors.push(job_type_error());
            }
        }
        errors
    }

    /// Validation for partial update: only supplied fields are checked.
    fn validate_supplied(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, value) in [
            ("title", &self.title),
            ("company", &self.company),
            ("location", &self.location),
        ] {
            if value.is_some() && Self::blank(value) {
                errors.push(format!("{name} is required"));
            }
        }
        if let Some(job_type) = &self.job_type {
            if !JOB_TYPES.contains(&job_type.as_str()) {
                errors.push(job_type_error());
            }
        }
        errors
    }
}

async fn health() -> Reply {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Job API is running",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Reply {
    let query = JobQuery {
        job_type: params.job_type,
        location: params.location,
        tag: params.tag,
        search: params.search,
        sort: params
            .sort
            .as_deref()
            .map(Sort::from_param)
            .unwrap_or_default(),
    };

    match state.db().list_jobs(&query) {
        Ok(jobs) => {
            let count = jobs.len();
            (
                StatusCode::OK,
                Json(json!({"success": true, "data": jobs, "count": count})),
            )
        }
        Err(err) => internal("Failed to fetch jobs", err),
    }
}

async fn get_job(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Reply {
    match state.db().get_job(id) {
        Ok(Some(job)) => ok(job),
        Ok(None) => not_found(),
        Err(err) => internal("Failed to fetch job", err),
    }
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    input: Option<Json<JobInput>>,
) -> Reply {
    // A missing or malformed body still gets the standard envelope rather
    // than the framework's plain-text rejection.
    let Some(Json(input)) = input else {
        return no_data();
    };

    let errors = input.validate_required();
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let job = NewJob {
        title: input.title.as_deref().unwrap_or("").trim().to_string(),
        company: input.company.as_deref().unwrap_or("").trim().to_string(),
        location: input.location.as_deref().unwrap_or("").trim().to_string(),
        posting_date: input
            .posting_date
            .as_deref()
            .and_then(parse_posting_date)
            .unwrap_or_else(Utc::now),
        job_type: input
            .job_type
            .unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string()),
        tags: input.tags.unwrap_or_default(),
        description: input.description.unwrap_or_default(),
        url: input.url.unwrap_or_default(),
    };

    match state.db().insert_job(&job) {
        Ok(stored) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "data": stored,
                "message": "Job created successfully",
            })),
        ),
        Err(err) => internal("Failed to create job", err),
    }
}

async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    input: Option<Json<JobInput>>,
) -> Reply {
    let Some(Json(input)) = input else {
        return no_data();
    };

    let errors = input.validate_supplied();
    if !errors.is_empty() {
        return validation_failed(errors);
    }

    let patch = JobPatch {
        title: input.title.map(|title| title.trim().to_string()),
        company: input.company.map(|company| company.trim().to_string()),
        location: input.location.map(|location| location.trim().to_string()),
        job_type: input.job_type,
        tags: input.tags,
        description: input.description,
        url: input.url,
        // Unparseable timestamps leave the stored value untouched.
        posting_date: input.posting_date.as_deref().and_then(parse_posting_date),
    };

    match state.db().update_job(id, &patch) {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": job,
                "message": "Job updated successfully",
            })),
        ),
        Ok(None) => not_found(),
        Err(err) => internal("Failed to update job", err),
    }
}

async fn delete_job(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Reply {
    match state.db().delete_job(id) {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": "Job deleted successfully"})),
        ),
        Ok(false) => not_found(),
        Err(err) => internal("Failed to delete job", err),
    }
}

async fn job_types(State(state): State<Arc<AppState>>) -> Reply {
    match state.db().distinct_job_types() {
        Ok(values) => ok(values),
        Err(err) => internal("Failed to fetch job types", err),
    }
}

async fn locations(State(state): State<Arc<AppState>>) -> Reply {
    match state.db().distinct_locations() {
        Ok(values) => ok(values),
        Err(err) => internal("Failed to fetch locations", err),
    }
}

async fn tags(State(state): State<Arc<AppState>>) -> Reply {
    match state.db().distinct_tags() {
        Ok(values) => ok(values),
        Err(err) => internal("Failed to fetch tags", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn_app() -> String {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let app = router(Arc::new(AppState::new(db)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn job_body(title: &str, location: &str) -> Value {
        json!({
            "title": title,
            "company": "Acme Insurance",
            "location": location,
            "job_type": "Full-time",
            "tags": ["Life", "Pensions"],
            "description": "desc",
            "url": "",
            "posting_date": "2026-08-01T12:00:00Z",
        })
    }

    #[tokio::test]
    async fn create_then_fetch_job() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let created = client
            .post(format!("{base}/jobs"))
            .json(&job_body("Senior Actuary", "London, UK"))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status(), 201);
        let body: Value = created.json().await.unwrap();
        assert_eq!(body["success"], true);
        let id = body["data"]["id"].as_i64().unwrap();

        let fetched: Value = client
            .get(format!("{base}/jobs/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched["data"]["title"], "Senior Actuary");
        assert_eq!(fetched["data"]["tags"], json!(["Life", "Pensions"]));
    }

    #[tokio::test]
    async fn create_rejects_missing_fields() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/jobs"))
            .json(&json!({"title": "  ", "company": "Acme"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        let errors = body["errors"].as_array().unwrap();
        assert!(errors.iter().any(|e| e == "title is required"));
        assert!(errors.iter().any(|e| e == "location is required"));
    }

    #[tokio::test]
    async fn missing_or_malformed_body_gets_error_envelope() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/jobs"))
            .header("content-type", "application/json")
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No data provided");

        // A bodyless PUT gets the same envelope, before any id lookup.
        let response = client.put(format!("{base}/jobs/1")).send().await.unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "No data provided");
    }

    #[tokio::test]
    async fn create_rejects_unknown_job_type() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let mut body = job_body("Role", "UK");
        body["job_type"] = json!("Freelance");
        let response = client
            .post(format!("{base}/jobs"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn missing_job_is_404() {
        let base = spawn_app().await;
        let response = reqwest::get(format!("{base}/jobs/999")).await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn list_supports_filter_and_sort() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        for (title, location) in [("B Role", "London, UK"), ("A Role", "New York, USA")] {
            client
                .post(format!("{base}/jobs"))
                .json(&job_body(title, location))
                .send()
                .await
                .unwrap();
        }

        let body: Value = client
            .get(format!("{base}/jobs?location=london"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["title"], "B Role");

        let body: Value = client
            .get(format!("{base}/jobs?sort=title_asc"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["data"][0]["title"], "A Role");
    }

    #[tokio::test]
    async fn partial_update_and_delete() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();

        let created: Value = client
            .post(format!("{base}/jobs"))
            .json(&job_body("Senior Actuary", "London"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = created["data"]["id"].as_i64().unwrap();

        let updated: Value = client
            .put(format!("{base}/jobs/{id}"))
            .json(&json!({"location": "Remote"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(updated["data"]["location"], "Remote");
        assert_eq!(updated["data"]["title"], "Senior Actuary");

        let deleted = client
            .delete(format!("{base}/jobs/{id}"))
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), 200);
        let gone = reqwest::get(format!("{base}/jobs/{id}")).await.unwrap();
        assert_eq!(gone.status(), 404);
    }

    #[tokio::test]
    async fn distinct_value_listings() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();
        client
            .post(format!("{base}/jobs"))
            .json(&job_body("Role", "London, UK"))
            .send()
            .await
            .unwrap();

        let types: Value = client
            .get(format!("{base}/jobs/job-types"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(types["data"], json!(["Full-time"]));

        let tags: Value = client
            .get(format!("{base}/jobs/tags"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tags["data"], json!(["Life", "Pensions"]));
    }

    #[tokio::test]
    async fn health_endpoint() {
        let base = spawn_app().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], true);
    }

    #[test]
    fn posting_date_parsing_tolerates_offsets() {
        assert!(parse_posting_date("2026-08-01T12:00:00Z").is_some());
        assert!(parse_posting_date("2026-08-01T12:00:00+01:00").is_some());
        assert!(parse_posting_date("2026-08-01T12:00:00").is_some());
        assert!(parse_posting_date("not a date").is_none());
    }
}
