mod config;
mod cover_letter;
mod db;
mod form;
mod logging;
mod mailer;
mod models;
mod notify;
mod submit;
mod tui;
mod validation;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use config::AppConfig;
use cover_letter::{fetch_or_absent, Source};
use db::Database;
use form::FormController;
use mailer::EmailJsMailer;
use models::{Field, JobPosting};
use notify::ConsoleNotifier;
use submit::Submission;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "apply")]
#[command(about = "Send a job application email with your CV link and cover letter")]
struct Cli {
    /// Path to config file (default: <config dir>/apply.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to log file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Path to the local cover letter store
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Default)]
struct JobArgs {
    /// Job key used to look up the cover letter
    #[arg(long)]
    job_key: Option<String>,

    /// Job title sent with the application
    #[arg(long)]
    job_title: Option<String>,
}

impl JobArgs {
    fn resolve(self, mut job: JobPosting) -> JobPosting {
        if let Some(key) = self.job_key {
            job.key = key;
        }
        if let Some(title) = self.job_title {
            job.title = title;
        }
        job
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive application form (default)
    Form {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Send one application without the interactive form
    Send {
        /// Company email to send the application to
        #[arg(long)]
        to: String,

        /// Public URL of your CV
        #[arg(long)]
        cv: String,

        /// Cover letter file (default: the stored cover letter for the job)
        #[arg(short, long)]
        letter_file: Option<PathBuf>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Manage stored cover letters
    Letter {
        #[command(subcommand)]
        command: LetterCommands,
    },
}

#[derive(Subcommand)]
enum LetterCommands {
    /// Store the cover letter for a job key
    Set {
        /// Job key
        job_key: String,

        /// Path to cover letter file
        file: PathBuf,
    },

    /// Show the stored cover letter for a job key
    Show {
        /// Job key
        job_key: String,
    },

    /// List stored cover letters
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().unwrap_or_else(config::default_log_path);
    logging::init(&log_path)?;

    let config = AppConfig::load(cli.config.as_deref())?;
    let db_path = cli.db.clone().unwrap_or_else(config::default_db_path);

    match cli.command.unwrap_or(Commands::Form { job: JobArgs::default() }) {
        Commands::Form { job } => {
            let job = job.resolve(config.job.clone());
            let mailer = EmailJsMailer::new(&config.emailjs)?;
            let source = Source::from_config(config.cover_letters.api_url.as_deref(), db_path)?;
            tui::run_form(job, source, mailer)?;
        }

        Commands::Send {
            to,
            cv,
            letter_file,
            job,
        } => {
            let job = job.resolve(config.job.clone());
            let mailer = EmailJsMailer::new(&config.emailjs)?;
            let source = Source::from_config(config.cover_letters.api_url.as_deref(), db_path)?;
            let letter = match letter_file {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read cover letter file: {}", path.display()))?,
                ),
                None => None,
            };
            send_once(job, source, mailer, to, cv, letter)?;
        }

        Commands::Letter { command } => {
            let db = Database::open(&db_path)?;
            match command {
                LetterCommands::Set { job_key, file } => {
                    let text = std::fs::read_to_string(&file)
                        .with_context(|| format!("Failed to read cover letter file: {}", file.display()))?;
                    db.set_cover_letter(&job_key, &text)?;
                    println!(
                        "Stored cover letter for '{}' ({} characters) in {}",
                        job_key,
                        text.chars().count(),
                        db.path().display()
                    );
                }

                LetterCommands::Show { job_key } => match db.get_cover_letter(&job_key)? {
                    Some(letter) => {
                        println!("Cover letter '{}' (updated {})", letter.job_key, letter.updated_at);
                        println!("\n{}", textwrap::fill(&letter.text, 80));
                    }
                    None => {
                        println!("No cover letter stored for '{}'.", job_key);
                    }
                },

                LetterCommands::List => {
                    let letters = db.list_cover_letters()?;
                    if letters.is_empty() {
                        println!("No cover letters stored.");
                    } else {
                        println!("{:<16} {:>8} {:<30}", "JOB KEY", "CHARS", "UPDATED");
                        println!("{}", "-".repeat(56));
                        for letter in letters {
                            println!(
                                "{:<16} {:>8} {:<30}",
                                truncate(&letter.job_key, 16),
                                letter.text.chars().count(),
                                letter.updated_at
                            );
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Drives the form controller once, without a terminal UI.
fn send_once(
    job: JobPosting,
    source: Source,
    mailer: EmailJsMailer,
    to: String,
    cv: String,
    letter: Option<String>,
) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let mut form = FormController::new(job);

    match letter {
        Some(text) => {
            form.set_field(Field::CoverLetterText, text);
        }
        None => {
            let fetched = runtime.block_on(fetch_or_absent(&source, &form.job().key));
            form.prefill(fetched);
        }
    }
    form.set_field(Field::CompanyEmail, to);
    form.set_field(Field::CvUrl, cv);

    let mut notifier = ConsoleNotifier;
    match runtime.block_on(submit::submit(&mut form, &mailer, &mut notifier)) {
        Submission::Sent => Ok(()),
        Submission::Failed => Err(anyhow!("Application was not sent")),
        Submission::Rejected => {
            for error in form.errors().iter() {
                eprintln!("  {}", error);
            }
            Err(anyhow!("Application is invalid"))
        }
        Submission::Ignored => Err(anyhow!("A submission is already in progress")),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
