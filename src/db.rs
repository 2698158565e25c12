use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::models::StoredJob;

const SELECT_COLS: &str = "SELECT id, title, company, location, posting_date, job_type, tags, \
                           description, url FROM jobs";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sort {
    #[default]
    PostingDateDesc,
    PostingDateAsc,
    TitleAsc,
    CompanyAsc,
}

impl Sort {
    /// Unrecognized values fall back to the default ordering.
    pub fn from_param(value: &str) -> Self {
        match value {
            "posting_date_asc" => Sort::PostingDateAsc,
            "title_asc" => Sort::TitleAsc,
            "company_asc" => Sort::CompanyAsc,
            _ => Sort::PostingDateDesc,
        }
    }

    fn order_clause(self) -> &'static str {
        match self {
            Sort::PostingDateDesc => " ORDER BY posting_date DESC",
            Sort::PostingDateAsc => " ORDER BY posting_date ASC",
            Sort::TitleAsc => " ORDER BY title ASC",
            Sort::CompanyAsc => " ORDER BY company ASC",
        }
    }
}

/// Filter vocabulary shared by the HTTP layer and the `list` command.
#[derive(Debug, Default)]
pub struct JobQuery {
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub sort: Sort,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub posting_date: DateTime<Utc>,
    pub job_type: String,
    pub tags: Vec<String>,
    pub description: String,
    pub url: String,
}

/// Partial update; only the supplied fields change.
#[derive(Debug, Default)]
pub struct JobPatch {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub posting_date: Option<DateTime<Utc>>,
}

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::default_path()?)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn default_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "actlist") {
            Ok(proj_dirs.data_dir().join("jobs.db"))
        } else {
            Ok(PathBuf::from("jobs.db"))
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                posting_date TEXT NOT NULL,
                job_type TEXT NOT NULL DEFAULT 'Full-time',
                tags TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_job_type ON jobs(job_type);
            CREATE INDEX IF NOT EXISTS idx_jobs_posting_date ON jobs(posting_date);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'actlist init' first."));
        }
        Ok(())
    }

    // --- Job operations ---

    pub fn insert_job(&self, job: &NewJob) -> Result<StoredJob> {
        self.conn.execute(
            "INSERT INTO jobs (title, company, location, posting_date, job_type, tags, \
             description, url) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                job.title,
                job.company,
                job.location,
                job.posting_date.to_rfc3339(),
                job.job_type,
                job.tags.join(","),
                job.description,
                job.url,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_job(id)?
            .ok_or_else(|| anyhow!("Job #{id} vanished after insert"))
    }

    pub fn list_jobs(&self, query: &JobQuery) -> Result<Vec<StoredJob>> {
        let mut sql = String::from(SELECT_COLS);
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(job_type) = &query.job_type {
            values.push(Box::new(job_type.clone()));
            clauses.push(format!("job_type = ?{}", values.len()));
        }
        if let Some(location) = &query.location {
            values.push(Box::new(location.clone()));
            clauses.push(format!(
                "LOWER(location) LIKE '%' || LOWER(?{}) || '%'",
                values.len()
            ));
        }
        if let Some(tag) = &query.tag {
            values.push(Box::new(tag.clone()));
            clauses.push(format!(
                "LOWER(tags) LIKE '%' || LOWER(?{}) || '%'",
                values.len()
            ));
        }
        if let Some(search) = &query.search {
            values.push(Box::new(search.clone()));
            let n = values.len();
            clauses.push(format!(
                "(LOWER(title) LIKE '%' || LOWER(?{n}) || '%' \
                 OR LOWER(company) LIKE '%' || LOWER(?{n}) || '%')"
            ));
        }

        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(query.sort.order_clause());

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(values.iter().map(|value| value.as_ref())),
            Self::row_to_job,
        )?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")
    }

    pub fn get_job(&self, id: i64) -> Result<Option<StoredJob>> {
        let result = self.conn.query_row(
            &format!("{SELECT_COLS} WHERE id = ?1"),
            [id],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn update_job(&self, id: i64, patch: &JobPatch) -> Result<Option<StoredJob>> {
        if self.get_job(id)?.is_none() {
            return Ok(None);
        }

        fn set(
            column: &str,
            value: Box<dyn rusqlite::ToSql>,
            sets: &mut Vec<String>,
            values: &mut Vec<Box<dyn rusqlite::ToSql>>,
        ) {
            values.push(value);
            sets.push(format!("{column} = ?{}", values.len()));
        }

        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(title) = &patch.title {
            set("title", Box::new(title.clone()), &mut sets, &mut values);
        }
        if let Some(company) = &patch.company {
            set("company", Box::new(company.clone()), &mut sets, &mut values);
        }
        if let Some(location) = &patch.location {
            set("location", Box::new(location.clone()), &mut sets, &mut values);
        }
        if let Some(job_type) = &patch.job_type {
            set("job_type", Box::new(job_type.clone()), &mut sets, &mut values);
        }
        if let Some(tags) = &patch.tags {
            set("tags", Box::new(tags.join(",")), &mut sets, &mut values);
        }
        if let Some(description) = &patch.description {
            set(
                "description",
                Box::new(description.clone()),
                &mut sets,
                &mut values,
            );
        }
        if let Some(url) = &patch.url {
            set("url", Box::new(url.clone()), &mut sets, &mut values);
        }
        if let Some(posting_date) = &patch.posting_date {
            set(
                "posting_date",
                Box::new(posting_date.to_rfc3339()),
                &mut sets,
                &mut values,
            );
        }

        if !sets.is_empty() {
            values.push(Box::new(id));
            let sql = format!(
                "UPDATE jobs SET {} WHERE id = ?{}",
                sets.join(", "),
                values.len()
            );
            self.conn.execute(
                &sql,
                rusqlite::params_from_iter(values.iter().map(|value| value.as_ref())),
            )?;
        }

        self.get_job(id)
    }

    pub fn delete_job(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    // --- Distinct-value listings ---

    pub fn distinct_job_types(&self) -> Result<Vec<String>> {
        self.distinct_column("job_type")
    }

    pub fn distinct_locations(&self) -> Result<Vec<String>> {
        self.distinct_column("location")
    }

    fn distinct_column(&self, column: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM jobs WHERE {column} != ''"
        ))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to fetch distinct {column}"))
    }

    /// All unique tags across all jobs, sorted. Tags are stored comma-joined.
    pub fn distinct_tags(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT tags FROM jobs WHERE tags != ''")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut all_tags = BTreeSet::new();
        for tags in rows {
            let tags = tags?;
            for tag in tags.split(',') {
                let tag = tag.trim();
                if !tag.is_empty() {
                    all_tags.insert(tag.to_string());
                }
            }
        }
        Ok(all_tags.into_iter().collect())
    }

    fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredJob> {
        let tags: String = row.get(6)?;
        Ok(StoredJob {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            posting_date: row.get(4)?,
            job_type: row.get(5)?,
            tags: tags
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(String::from)
                .collect(),
            description: row.get(7)?,
            url: row.get(8)?,
        })
    }
}
