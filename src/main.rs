use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use placement_tracker::config::Config;
use placement_tracker::db::{self, PgStore};
use placement_tracker::ingest;
use placement_tracker::models::{Student, StudentFilter};
use placement_tracker::Tracker;

#[derive(Parser)]
#[command(name = "placement-tracker")]
#[command(about = "Student placement tracker with batch reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Validate and merge students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record (or overwrite) a student's score for one period
    Record {
        #[arg(long)]
        student_id: i64,
        #[arg(long)]
        period: String,
        #[arg(long)]
        score: f64,
    },
    /// Delete a student's score for one period
    DeletePeriod {
        #[arg(long)]
        student_id: i64,
        #[arg(long)]
        period: String,
    },
    /// Show one student and their period scores
    Show {
        #[arg(long)]
        email: String,
    },
    /// List students
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        skill: Option<String>,
        #[arg(long)]
        placed: Option<bool>,
        #[arg(long)]
        min_score: Option<f64>,
        /// Only list students with an id greater than this
        #[arg(long)]
        cursor: Option<i64>,
        /// Page size (default 10, at most 100)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete a student and all of their period scores
    DeleteStudent {
        #[arg(long)]
        student_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let tracker = Tracker::new(PgStore::new(pool.clone()));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let summary = db::seed(&pool).await?;
            println!(
                "Seed data loaded: {} inserted, {} updated, {} period scores written.",
                summary.students.inserted, summary.students.updated, summary.period_writes
            );
        }
        Commands::Import { csv } => {
            let rows = ingest::read_rows_from_path(&csv)?;
            let outcome = tracker.validate_and_upsert_batch(&rows).await;

            println!(
                "Batch {}: {} rows accepted, {} rejected.",
                outcome.batch_id,
                outcome.accepted_count,
                outcome.rejected.len()
            );
            for rejection in &outcome.rejected {
                println!("- row {}: {}", rejection.row_index, rejection.reason);
            }

            let summary = outcome
                .applied
                .with_context(|| format!("batch from {} was not applied", csv.display()))?;
            println!(
                "Applied: {} inserted, {} updated, {} unchanged, {} period scores written.",
                summary.students.inserted,
                summary.students.updated,
                summary.students.unchanged,
                summary.period_writes
            );
        }
        Commands::Record {
            student_id,
            period,
            score,
        } => {
            let overall = tracker
                .record_period_score(student_id, &period, score)
                .await?;
            println!("Overall score for student {student_id}: {}", format_score(overall));
        }
        Commands::DeletePeriod { student_id, period } => {
            let overall = tracker.delete_period_score(student_id, &period).await?;
            println!("Overall score for student {student_id}: {}", format_score(overall));
        }
        Commands::Show { email } => {
            let student = tracker.get_student_by_email(&email).await?;
            let periods = tracker.period_records(student.id).await?;
            print_student(&student);
            if periods.is_empty() {
                println!("  No period scores recorded.");
            }
            for record in periods {
                println!("  {}: {:.2}", record.period, record.score);
            }
        }
        Commands::List {
            search,
            skill,
            placed,
            min_score,
            cursor,
            limit,
        } => {
            let filter = StudentFilter {
                search,
                skill,
                placed,
                min_score,
                cursor,
                limit,
            };
            let students = tracker.list_students(&filter).await?;
            if students.is_empty() {
                println!("No students match.");
            }
            for student in &students {
                print_student(student);
            }
            if students.len() == filter.page_size() {
                if let Some(last) = students.last() {
                    println!("More results: --cursor {}", last.id);
                }
            }
        }
        Commands::DeleteStudent { student_id } => {
            tracker.delete_student(student_id).await?;
            println!("Student {student_id} deleted.");
        }
    }

    Ok(())
}

fn format_score(score: Option<f64>) -> String {
    score
        .map(|s| format!("{s:.2}"))
        .unwrap_or_else(|| "unset".to_string())
}

fn print_student(student: &Student) {
    println!(
        "- [{}] {} ({}) overall {} placed {} skills [{}]",
        student.id,
        student.profile.name,
        student.email,
        format_score(student.overall_score),
        student.profile.placed,
        student.profile.skills.join(", ")
    );
}
