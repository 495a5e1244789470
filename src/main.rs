use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use leadscout::ai;
use leadscout::config::Config;
use leadscout::input;
use leadscout::logging;
use leadscout::matching::{MatchMode, MatchingEngine};
use leadscout::models::{ContactResult, Match};
use leadscout::normalize;
use leadscout::pipeline::{ResolutionPipeline, dedup_by_company};
use leadscout::providers::ProviderRegistry;
use leadscout::store::Store;

#[derive(Parser)]
#[command(name = "leadscout")]
#[command(about = "Find recruiting contacts for job postings and match postings to prospects")]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Resolve one recruiting contact per job posting
    Resolve {
        /// Scraped job postings (JSON array)
        #[arg(short, long, default_value = "job_posts.json")]
        jobs: PathBuf,

        /// Where to write the results
        #[arg(short, long, default_value = "contacts.json")]
        out: PathBuf,

        /// Number of jobs resolved in parallel (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Also store postings and contacts in the database
        #[arg(long)]
        save: bool,
    },

    /// Match each job posting to the best prospect
    Match {
        /// Scraped job postings (JSON array)
        #[arg(short, long, default_value = "job_posts.json")]
        jobs: PathBuf,

        /// Prospect list (JSON array)
        #[arg(short, long, default_value = "prospects.json")]
        prospects: PathBuf,

        /// Scoring mode (overrides config)
        #[arg(long, value_enum)]
        mode: Option<MatchMode>,

        /// Model alias, e.g. claude-sonnet, claude-haiku, gpt-4o (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Where to write the results
        #[arg(short, long, default_value = "matches.json")]
        out: PathBuf,

        /// Also store the matches in the database
        #[arg(long)]
        save: bool,
    },

    /// Show stored postings, contacts and matches
    Show,

    /// Print the name variations tried for a company
    Variations {
        /// Company name
        company: String,
    },
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let store = Store::open()?;
            store.init()?;
            println!("Database initialized at {}", store.path().display());
        }

        Commands::Resolve { jobs, out, workers, save } => {
            let config = Config::load(cli.config.as_deref())?;
            let store = open_store_if(save)?;
            let jobs = input::load_job_postings(&jobs)?;

            let registry = ProviderRegistry::from_config(&config)?;
            if registry.is_empty() {
                bail!("No contact providers available. Set HUNTER_API_KEY, APOLLO_API_KEY or a LinkedIn roster.");
            }
            let pipeline = ResolutionPipeline::new(registry, config.providers.roles())
                .with_throttle(config.providers.throttle())
                .with_workers(workers.unwrap_or(config.providers.workers));

            let results = pipeline.resolve_all(&jobs);
            write_json(&out, &results)?;
            print_contacts(&results);

            if let Some(store) = store {
                for job in &jobs {
                    store.save_job_posting(job)?;
                }
                for result in dedup_by_company(&results) {
                    store.save_contact(&result)?;
                }
                println!("Saved {} job postings to {}", jobs.len(), store.path().display());
            }

            let found = results.iter().filter(|r| r.contact_info.is_found()).count();
            println!("\nFound contacts for {}/{} jobs. Results written to {}", found, results.len(), out.display());
        }

        Commands::Match { jobs, prospects, mode, model, out, save } => {
            let config = Config::load(cli.config.as_deref())?;
            let store = open_store_if(save)?;
            let jobs = input::load_job_postings(&jobs)?;
            let records = input::load_records(&prospects)?;

            let spec = ai::resolve_model(model.as_deref().unwrap_or(&config.matching.model))?;
            let engine = MatchingEngine::new(ai::create_model(&spec)?, mode.unwrap_or(config.matching.mode));

            let matches = engine.match_all(&jobs, &records);
            write_json(&out, &matches)?;
            print_matches(&matches);

            if let Some(store) = store {
                for m in &matches {
                    store.save_match(m)?;
                }
                println!("Saved {} matches to {}", matches.len(), store.path().display());
            }

            let matched = matches.iter().filter(|m| m.is_matched()).count();
            println!(
                "\nMatched {}/{} jobs using {} ({} mode). Results written to {}",
                matched,
                matches.len(),
                spec.short_name,
                engine.mode(),
                out.display()
            );
        }

        Commands::Show => {
            let store = Store::open()?;
            store.ensure_initialized()?;

            let jobs = store.list_job_postings()?;
            println!("Job postings ({})", jobs.len());
            println!("{:<30} {:<30} {:<15} {:<10}", "TITLE", "COMPANY", "LOCATION", "SOURCE");
            println!("{}", "-".repeat(88));
            for job in &jobs {
                println!(
                    "{:<30} {:<30} {:<15} {:<10}",
                    truncate(&job.job_title, 28),
                    truncate(&job.company_name, 28),
                    truncate(&job.job_location, 13),
                    truncate(&job.source, 10)
                );
            }

            println!();
            print_contacts(&store.list_contacts()?);

            let matches = store.list_matches()?;
            println!("\nMatches ({})", matches.len());
            println!("{:<28} {:<22} {:<24} {:>5}", "JOB", "COMPANY", "PROSPECT", "SCORE");
            println!("{}", "-".repeat(82));
            for row in matches {
                println!(
                    "{:<28} {:<22} {:<24} {:>5}",
                    truncate(&row.job_title, 26),
                    truncate(&row.company_name, 20),
                    truncate(row.prospect_name.as_deref().unwrap_or("-"), 22),
                    row.score
                );
            }
        }

        Commands::Variations { company } => {
            for (i, variation) in normalize::variations(&company).iter().enumerate() {
                println!("{}. {}", i + 1, variation);
            }
        }
    }

    Ok(())
}

fn open_store_if(save: bool) -> Result<Option<Store>> {
    if !save {
        return Ok(None);
    }
    let store = Store::open()?;
    store.ensure_initialized()?;
    Ok(Some(store))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize results")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_contacts(results: &[ContactResult]) {
    if results.is_empty() {
        println!("No contacts.");
        return;
    }
    println!(
        "{:<24} {:<30} {:<20} {:<20} {:>4} {:<16}",
        "COMPANY", "EMAIL", "NAME", "POSITION", "CONF", "SOURCE"
    );
    println!("{}", "-".repeat(119));
    for r in results {
        let c = &r.contact_info;
        let name = c.full_name();
        println!(
            "{:<24} {:<30} {:<20} {:<20} {:>4} {:<16}",
            truncate(&r.company_name, 22),
            truncate(c.email.as_deref().unwrap_or("-"), 28),
            truncate(if name.is_empty() { "-" } else { &name }, 18),
            truncate(&c.position, 18),
            c.confidence_score,
            truncate(&c.source, 16)
        );
    }
}

fn print_matches(matches: &[Match]) {
    if matches.is_empty() {
        println!("No jobs to match.");
        return;
    }
    println!("{:<28} {:<22} {:<24} {:>5}", "JOB", "COMPANY", "PROSPECT", "SCORE");
    println!("{}", "-".repeat(82));
    for m in matches {
        println!(
            "{:<28} {:<22} {:<24} {:>5}",
            truncate(&m.job.job_title, 26),
            truncate(&m.job.company_name, 20),
            truncate(m.prospect.as_ref().map_or("-", |p| p.name.as_str()), 22),
            m.score
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
