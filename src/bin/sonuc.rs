use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use sonuc_crawler::app::{App, ProgressSink};
use sonuc_crawler::config::{ConfigLoader, ConfigOverrides, FailurePolicy};
use sonuc_crawler::domain::Plate;
use sonuc_crawler::error::CrawlError;
use sonuc_crawler::fetcher::HttpFetcher;
use sonuc_crawler::output::{ConsoleOutput, JsonOutput, OutputMode};
use sonuc_crawler::registry::SeedRegistry;

#[derive(Parser)]
#[command(name = "sonuc")]
#[command(about = "Crawl election-result trees (cities, districts, neighborhoods, schools)")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./sonuc.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// City registry file (defaults to ./cities.json)
    #[arg(long, global = true)]
    registry: Option<String>,

    /// Directory that receives the output documents
    #[arg(long, global = true)]
    out: Option<String>,

    /// Maximum number of requests in flight
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Show per-neighborhood and retry progress; log at debug (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print JSON results on stdout instead of progress lines
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Crawl one city by plate (prompts when omitted)")]
    City(CityArgs),
    #[command(about = "Crawl every city in the registry and write tree.json")]
    All(PolicyArgs),
    #[command(about = "List cities known to the remote API")]
    Cities,
    #[command(about = "Fetch ballot-box submissions for every school of a city document")]
    Submissions(SubmissionsArgs),
    #[command(about = "Fetch ballot-box submissions for one school")]
    School(SchoolArgs),
}

#[derive(Args)]
struct CityArgs {
    plate: Option<String>,
}

#[derive(Args)]
struct PolicyArgs {
    /// Keep going when a single root fails
    #[arg(long)]
    isolate: bool,
}

#[derive(Args)]
struct SubmissionsArgs {
    city_document: String,

    #[command(flatten)]
    policy: PolicyArgs,
}

#[derive(Args)]
struct SchoolArgs {
    school_id: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<CrawlError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &CrawlError) -> u8 {
    if error.is_lookup() {
        2
    } else if error.is_network() {
        3
    } else {
        1
    }
}

async fn run() -> miette::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let isolate = match &cli.command {
        Some(Commands::All(args)) => args.isolate,
        Some(Commands::Submissions(args)) => args.policy.isolate,
        _ => false,
    };
    let overrides = ConfigOverrides {
        registry: cli.registry.clone(),
        output_dir: cli.out.clone(),
        failure_policy: isolate.then_some(FailurePolicy::Isolate),
        max_concurrent_requests: cli.max_concurrent,
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?.apply(overrides)?;

    let sink: Arc<dyn ProgressSink> = match output_mode {
        OutputMode::Interactive => Arc::new(ConsoleOutput::new(cli.verbose)),
        OutputMode::NonInteractive => Arc::new(JsonOutput),
    };

    let command = match cli.command {
        Some(command) => command,
        None if matches!(output_mode, OutputMode::Interactive) => {
            Commands::City(CityArgs { plate: None })
        }
        None => {
            return Err(miette::Report::msg("command required (try `sonuc --help`)"));
        }
    };

    let registry = match &command {
        Commands::City(_) | Commands::All(_) => SeedRegistry::load(&config.registry_path)?,
        _ => SeedRegistry::default(),
    };
    let app = App::from_config(&config, registry, sink)?;

    match command {
        Commands::City(args) => run_city(&app, args, output_mode).await,
        Commands::All(_) => run_all(&app, output_mode).await,
        Commands::Cities => {
            let cities = app.list_cities().await?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_cities(&cities).into_diagnostic()?,
                OutputMode::Interactive => {
                    for city in &cities {
                        println!("{} - {}", city.id, city.name);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Submissions(args) => {
            let path = Utf8PathBuf::from(args.city_document);
            let report = app.harvest(&path).await?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_harvest(&report).into_diagnostic()?,
                OutputMode::Interactive => {
                    println!(
                        "Harvested {} of {} schools in {}",
                        report.written.len(),
                        report.schools,
                        report.city
                    );
                    for failure in &report.failures {
                        println!("school {} failed: {}", failure.id, failure.error);
                    }
                }
            }
            Ok(exit_for(report.is_complete()))
        }
        Commands::School(args) => {
            let report = app.fetch_school(args.school_id).await?;
            if matches!(output_mode, OutputMode::NonInteractive) {
                JsonOutput::print_school(&report).into_diagnostic()?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_city(
    app: &App<HttpFetcher>,
    args: CityArgs,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let plate = match args.plate {
        Some(value) => value.parse::<Plate>()?,
        None if matches!(output_mode, OutputMode::Interactive) => prompt_plate()?,
        None => return Err(miette::Report::msg("plate required in non-interactive mode")),
    };

    let report = app.crawl_city(plate).await?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_city(&report).into_diagnostic()?,
        OutputMode::Interactive => println!("Gathered city {}", report.name),
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_all(app: &App<HttpFetcher>, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let report = app.crawl_all().await?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_batch(&report).into_diagnostic()?,
        OutputMode::Interactive => {
            println!("Gathered {} cities", report.cities.len());
            for failure in &report.failures {
                let url = failure.url.as_deref().unwrap_or("-");
                println!("city {} failed at {url}: {}", failure.id, failure.error);
            }
        }
    }
    Ok(exit_for(report.is_complete()))
}

fn exit_for(complete: bool) -> ExitCode {
    if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(3)
    }
}

fn prompt_plate() -> Result<Plate, CrawlError> {
    let mut stdout = io::stdout();
    stdout
        .write_all(b"Enter city plate: ")
        .and_then(|_| stdout.flush())
        .map_err(|err| CrawlError::Prompt(err.to_string()))?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|err| CrawlError::Prompt(err.to_string()))?;
    line.parse()
}
