use clap::{Parser, Subcommand};
use greetcard::batch::{self, BatchEvent, CardJob};
use greetcard::render::CardRenderer;
use greetcard::store::VersionStore;
use greetcard::{compare, config, export, output, template};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "greetcard")]
#[command(about = "Greeting cards per contact, rendered by headless Chrome and versioned")]
#[command(long_about = "\
Greeting cards per contact, rendered by headless Chrome and versioned

Each card is an HTML template filled with generated text, painted by headless
Chrome, cropped to the card and saved as a PNG. Every card is recorded as a
numbered version in the contact's ledger.

Working layout (paths configurable in greetcard.toml):

  template/
  └── template_1.html          # Card template with {placeholders}
  generate_img/
  ├── wxid_abc.png             # Latest card for the contact
  └── wxid_abc.json            # Generation record for that card
  version_history/
  └── wxid_abc.json            # Every version ever generated, oldest first

Request file for 'greetcard card' (JSON array):

  [{\"contact\": {\"id\": \"wxid_abc\", \"name\": \"Alice\"},
    \"style\": \"warm\",
    \"text\": {\"greeting\": \"…\", \"poem\": \"…,…\", \"idioms\": \"…,…,…\", \"wishes\": \"…\"},
    \"template_number\": 1}]

'greetcard export DEST' copies each contact's history and latest card into
DEST/<name>/.

Run 'greetcard gen-config' for a documented greetcard.toml and
'greetcard gen-template' for a starter template.")]
#[command(version)]
struct Cli {
    /// Config file; stock defaults are used if it doesn't exist
    #[arg(long, default_value = "greetcard.toml", global = true)]
    config: PathBuf,

    /// Log debug detail (browser steps, crop geometry)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render cards from a request file and record each as a new version
    Card {
        /// JSON array of card jobs
        request: PathBuf,
        /// Stop starting new cards after the first failure
        #[arg(long)]
        fail_fast: bool,
    },
    /// List every version recorded for a contact
    History { contact: String },
    /// Show the fields that differ between two versions of a contact
    Compare { contact: String, a: u32, b: u32 },
    /// Copy each contact's history (without avatars) and latest card into
    /// a folder of its own under DEST
    Export {
        dest: PathBuf,
        /// Contacts to export; every contact with a ledger if none are given
        contacts: Vec<String>,
    },
    /// Load config and every ledger, reporting anything skipped or migrated
    Check,
    /// Print a stock greetcard.toml with all options documented
    GenConfig,
    /// Print a starter card template
    GenTemplate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Card { request, fail_fast } => {
            let config = config::load_config(&cli.config)?;
            let jobs = read_jobs(&request, &config.card)?;
            init_thread_pool(&config.processing);

            let store = VersionStore::open(&config.paths.ledger_dir)?;
            let renderer = CardRenderer::new(
                config.render.settings(),
                &config.paths.template_dir,
                &config.paths.image_dir,
            );

            let cancel = Arc::new(AtomicBool::new(false));
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = {
                let cancel = Arc::clone(&cancel);
                std::thread::spawn(move || {
                    for event in rx {
                        if fail_fast && matches!(event, BatchEvent::Failed { .. }) {
                            cancel.store(true, Ordering::SeqCst);
                        }
                        for line in output::format_batch_event(&event) {
                            println!("{}", line);
                        }
                    }
                })
            };
            let summary = batch::run(&renderer, &store, jobs, &cancel, Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer panicked")?;

            for line in output::format_batch_summary(&summary) {
                println!("{}", line);
            }
            if summary.failed() > 0 {
                return Err(format!("{} card(s) failed", summary.failed()).into());
            }
        }
        Command::History { contact } => {
            let config = config::load_config(&cli.config)?;
            let store = VersionStore::open(&config.paths.ledger_dir)?;
            output::print_history(&contact, &store.versions(&contact));
        }
        Command::Compare { contact, a, b } => {
            let config = config::load_config(&cli.config)?;
            let store = VersionStore::open(&config.paths.ledger_dir)?;
            let find = |n: u32| {
                store
                    .version(&contact, n)
                    .ok_or_else(|| format!("{contact} has no version {n}"))
            };
            let (before, after) = (find(a)?, find(b)?);
            let changes = compare::compare(&before, &after);
            output::print_compare(&before, &after, &changes);
        }
        Command::Export { dest, contacts } => {
            let config = config::load_config(&cli.config)?;
            let store = VersionStore::open(&config.paths.ledger_dir)?;
            let contacts = if contacts.is_empty() {
                store.all().into_keys().collect()
            } else {
                contacts
            };
            let outcomes =
                export::export_contacts(&store, &contacts, &dest, &AtomicBool::new(false));
            output::print_export(&outcomes);
            let failed = outcomes
                .iter()
                .filter(|o| matches!(o, export::ExportOutcome::Failed { .. }))
                .count();
            if failed > 0 {
                return Err(format!("{failed} contact(s) failed to export").into());
            }
        }
        Command::Check => {
            let config = config::load_config(&cli.config)?;
            println!("==> Checking {}", config.paths.ledger_dir.display());
            let (store, report) = VersionStore::open_with_report(&config.paths.ledger_dir)?;
            output::print_load_report(&report, &store.all());
            let first = template::template_path(&config.paths.template_dir, 1);
            if !first.is_file() {
                println!("==> Warning: {} not found", first.display());
            }
            println!("==> Config is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::GenTemplate => {
            print!("{}", template::stock_template());
        }
    }

    Ok(())
}

/// Read the request file, filling year and signature from `[card]` where a
/// job leaves them out.
fn read_jobs(
    path: &Path,
    card: &config::CardConfig,
) -> Result<Vec<CardJob>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let mut jobs: Vec<CardJob> = serde_json::from_str(&content)?;
    for job in &mut jobs {
        if job.year.is_none() {
            job.year = card.year.clone();
        }
        if job.signature.is_none() {
            job.signature = card.signature.clone();
        }
    }
    Ok(jobs)
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Each worker runs its own
/// browser, so this also bounds concurrent Chrome processes.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
