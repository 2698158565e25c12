mod db;
mod driver;
mod extract;
mod loader;
mod locator;
mod miner;
mod models;
mod pipeline;
mod server;
mod sink;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use db::{Database, JobQuery, Sort};
use driver::Browser;
use models::truncate_chars;
use pipeline::{BASE_URL, Pipeline};

#[derive(Parser)]
#[command(name = "actlist")]
#[command(about = "Actuarial job board scraper - collect, store, and serve job postings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init {
        /// Database file (defaults to the user data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Scrape the job board and hand the results to the output sinks
    Scrape {
        /// Maximum number of jobs to collect
        #[arg(short = 'n', long, default_value = "10")]
        max_jobs: usize,

        /// Run Chrome headless
        #[arg(long)]
        headless: bool,

        /// Running chromedriver endpoint
        #[arg(long, default_value = "http://localhost:9515")]
        webdriver_url: String,

        /// Listings page to scrape
        #[arg(long, default_value = BASE_URL)]
        url: String,

        /// JSON output file
        #[arg(short, long, default_value = "scraped_jobs.json")]
        output: PathBuf,

        /// CRUD API endpoint to push jobs to
        #[arg(long, default_value = "http://localhost:5000/api/jobs")]
        api_url: String,

        /// Skip the API sink
        #[arg(long)]
        no_api: bool,

        /// Skip the JSON file sink
        #[arg(long)]
        no_save: bool,
    },

    /// Run the CRUD API server
    Serve {
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// Database file (defaults to the user data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// List stored jobs
    List {
        /// Filter by exact job type (Full-time, Part-time, Contract, Internship)
        #[arg(long)]
        job_type: Option<String>,

        /// Filter by location substring
        #[arg(long)]
        location: Option<String>,

        /// Filter by tag substring
        #[arg(long)]
        tag: Option<String>,

        /// Search in title and company
        #[arg(long)]
        search: Option<String>,

        /// posting_date_desc, posting_date_asc, title_asc, company_asc
        #[arg(long, default_value = "posting_date_desc")]
        sort: String,

        /// Database file (defaults to the user data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn open_db(path: Option<PathBuf>) -> Result<Database> {
    match path {
        Some(path) => Database::open_at(&path),
        None => Database::open(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init { db } => {
            let db = open_db(db)?;
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Scrape {
            max_jobs,
            headless,
            webdriver_url,
            url,
            output,
            api_url,
            no_api,
            no_save,
        } => {
            scrape(
                max_jobs,
                headless,
                &webdriver_url,
                &url,
                &output,
                &api_url,
                no_api,
                no_save,
            )
            .await?;
        }

        Commands::Serve { port, db } => {
            let db = open_db(db)?;
            server::serve(db, port).await?;
        }

        Commands::List {
            job_type,
            location,
            tag,
            search,
            sort,
            db,
        } => {
            let db = open_db(db)?;
            db.ensure_initialized()?;
            let jobs = db.list_jobs(&JobQuery {
                job_type,
                location,
                tag,
                search,
                sort: Sort::from_param(&sort),
            })?;

            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<6} {:<30} {:<22} {:<20} {:<12}",
                    "ID", "TITLE", "COMPANY", "LOCATION", "TYPE"
                );
                println!("{}", "-".repeat(94));
                for job in jobs {
                    println!(
                        "{:<6} {:<30} {:<22} {:<20} {:<12}",
                        job.id,
                        truncate(&job.title, 28),
                        truncate(&job.company, 20),
                        truncate(&job.location, 18),
                        job.job_type
                    );
                }
            }
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn scrape(
    max_jobs: usize,
    headless: bool,
    webdriver_url: &str,
    url: &str,
    output: &PathBuf,
    api_url: &str,
    no_api: bool,
    no_save: bool,
) -> Result<()> {
    println!("Starting Actuary List scraper...");
    let browser = Browser::connect(webdriver_url, headless).await?;
    println!("Chrome WebDriver session started");

    let pipeline = Pipeline::new(browser, BASE_URL);

    // The browser session must come down on every exit path, including
    // Ctrl-C, so the run result is only inspected after quit.
    let outcome = tokio::select! {
        result = pipeline.run(url, max_jobs) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Scraping interrupted by user");
            Ok(Vec::new())
        }
    };

    let browser = pipeline.into_page();
    match browser.quit().await {
        Ok(()) => println!("WebDriver closed"),
        Err(err) => eprintln!("Warning: {err:#}"),
    }

    let jobs = outcome?;
    if jobs.is_empty() {
        println!("No jobs were scraped successfully");
        return Ok(());
    }

    println!("\nSummary:");
    println!("  Total jobs scraped: {}", jobs.len());
    println!(
        "  Jobs with locations: {}",
        jobs.iter()
            .filter(|job| job.location != models::PLACEHOLDER_LOCATION)
            .count()
    );
    println!(
        "  Jobs with URLs: {}",
        jobs.iter().filter(|job| !job.url.is_empty()).count()
    );

    if !no_save {
        sink::save_json(output, &jobs)?;
    }

    if !no_api {
        let stats = sink::post_to_api(api_url, &jobs).await?;
        println!("Sent {} jobs to API with {} errors", stats.sent, stats.errors);
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        format!("{}...", truncate_chars(s, max.saturating_sub(3)))
    }
}
