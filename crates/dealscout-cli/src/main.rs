mod output;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use dealscout_client::config::clamp_max_items;
use dealscout_client::{HttpPageFetcher, RETAILERS, Settings, select_providers};
use dealscout_core::{
    AnyProvider, EventKind, EventPayload, QueryOptions, SearchEngine, SearchOutcome, SortOrder,
};

#[derive(Parser)]
#[command(name = "dealscout", version, about = "Multi-retailer electronics deal search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Aligned text table
    Table,
    /// Final results and summary as JSON
    Json,
    /// Every session event as one JSON line
    Events,
}

#[derive(clap::Args)]
struct SearchArgs {
    /// What to search for, e.g. "nintendo switch lite"
    query: String,

    /// Max listings kept per retailer (5-120, default MAX_ITEMS_PER_SITE)
    #[arg(short, long)]
    limit: Option<usize>,

    /// Skip auction listings
    #[arg(long, default_value_t = false)]
    no_auctions: bool,

    /// relevance, price_low, price_high or ending_soon
    #[arg(short, long, default_value = "relevance")]
    sort: String,

    /// Only search these retailers (comma separated ids, see `providers`)
    #[arg(short, long, value_delimiter = ',')]
    retailers: Vec<String>,

    /// Render pages in headless Chromium instead of plain HTTP
    #[arg(long, default_value_t = false)]
    browser: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search all retailers and print ranked deals
    Search {
        #[command(flatten)]
        args: SearchArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Also write `name,price,url,source` rows to this file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Run a search and report how each retailer did
    Check {
        #[command(flatten)]
        args: SearchArgs,

        /// JSON report path
        #[arg(long, default_value = "qa_report.json")]
        json: PathBuf,

        /// CSV report path
        #[arg(long, default_value = "qa_report.csv")]
        csv: PathBuf,
    },

    /// List supported retailers
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dealscout=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Search { args, format, csv } => {
            let outcome = run_search(&settings, &args, format).await?;
            let mut stdout = std::io::stdout().lock();
            match format {
                Format::Table => {
                    output::write_table(&mut stdout, &outcome.results.listings)?;
                    output::write_summary(&mut std::io::stderr(), &outcome.summary)?;
                }
                Format::Json => {
                    serde_json::to_writer_pretty(&mut stdout, &outcome)?;
                    writeln!(stdout)?;
                }
                Format::Events => {}
            }
            if let Some(path) = csv {
                output::save_listings_csv(&path, &outcome.results.listings)?;
                tracing::info!(path = %path.display(), rows = outcome.results.total, "Saved CSV");
            }
        }
        Commands::Check { args, json, csv } => {
            let outcome = run_search(&settings, &args, Format::Table).await?;
            cmd_check(&outcome, &json, &csv)?;
        }
        Commands::Providers => {
            println!("{:<14}  {:<14}  {:>6}  SEARCH URL", "ID", "NAME", "WEIGHT");
            for r in RETAILERS {
                println!(
                    "{:<14}  {:<14}  {:>6}  {}",
                    r.id, r.name, r.weight, r.search_url
                );
            }
        }
    }

    Ok(())
}

async fn build_providers(settings: &Settings, args: &SearchArgs) -> Result<Vec<AnyProvider>> {
    let providers = if args.browser {
        browser_providers(settings, &args.retailers).await?
    } else {
        let fetcher = HttpPageFetcher::new().context("Failed to create HTTP client")?;
        select_providers(fetcher, &args.retailers)?
    };
    if providers.is_empty() {
        bail!("No retailer matches {:?}", args.retailers);
    }
    Ok(providers)
}

#[cfg(feature = "browser")]
async fn browser_providers(settings: &Settings, ids: &[String]) -> Result<Vec<AnyProvider>> {
    let fetcher = dealscout_client::BrowserPageFetcher::launch(settings.headless)
        .await
        .context("Failed to launch headless browser")?;
    Ok(select_providers(fetcher, ids)?)
}

#[cfg(not(feature = "browser"))]
async fn browser_providers(_settings: &Settings, _ids: &[String]) -> Result<Vec<AnyProvider>> {
    bail!("This build has no browser support; rebuild with `--features browser`")
}

/// Run one session, reporting progress on stderr as retailers finish.
async fn run_search(settings: &Settings, args: &SearchArgs, format: Format) -> Result<SearchOutcome> {
    let providers = build_providers(settings, args).await?;
    let engine = SearchEngine::new(providers, settings.session_config());

    let mut options = QueryOptions::default().with_sort(args.sort.parse().unwrap_or_else(|_| {
        tracing::warn!(sort = %args.sort, "Unknown sort, using relevance");
        SortOrder::Relevance
    }));
    if let Some(limit) = args.limit {
        options = options.with_max_items(clamp_max_items(limit));
    }
    if args.no_auctions {
        options = options.without_auctions();
    }

    let mut handle = engine.start_session(&args.query, options)?;
    tracing::info!(session_id = %handle.id(), query = handle.query().text(), "Searching");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut outcome = None;

    loop {
        let event = tokio::select! {
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                tracing::warn!("Interrupted, finishing with results so far");
                handle.cancel();
                continue;
            }
            event = handle.next_event() => event,
        };
        let Some(event) = event else {
            break;
        };

        if format == Format::Events {
            println!("{}", serde_json::to_string(&event)?);
        }

        match (event.kind, event.payload) {
            (
                EventKind::ProviderDone,
                Some(EventPayload::Provider {
                    summary,
                    completed,
                    total,
                }),
            ) => {
                if format != Format::Events {
                    let detail = match (&summary.error_kind, &summary.error) {
                        (_, Some(error)) => error.clone(),
                        (Some(kind), None) => kind.clone(),
                        (None, None) => format!("{} listings", summary.found),
                    };
                    eprintln!(
                        "[{completed}/{total}] {}: {} ({detail})",
                        summary.name, summary.status
                    );
                }
            }
            (EventKind::FinalResults, Some(EventPayload::Final { results, summary })) => {
                outcome = Some(SearchOutcome { results, summary });
            }
            _ => {}
        }
    }

    outcome.context("Search session ended without results")
}

fn cmd_check(outcome: &SearchOutcome, json_path: &PathBuf, csv_path: &PathBuf) -> Result<()> {
    let rows = output::provider_checks(outcome);

    let report = serde_json::json!({
        "elapsed_seconds": outcome.summary.elapsed_ms as f64 / 1000.0,
        "providers": rows,
    });
    let json_file = std::fs::File::create(json_path)
        .with_context(|| format!("Failed to create {}", json_path.display()))?;
    serde_json::to_writer_pretty(json_file, &report)?;

    let csv_file = std::fs::File::create(csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    output::write_checks_csv(csv_file, &rows)?;

    let empty: Vec<_> = rows.iter().filter(|r| r.count == 0).collect();
    println!(
        "[qa] {} providers checked in {:.2}s",
        rows.len(),
        outcome.summary.elapsed_ms as f64 / 1000.0
    );
    println!("[qa] {} providers returned 0 results", empty.len());
    for row in empty {
        println!(" - {} ({})", row.provider_name, row.status);
    }
    Ok(())
}
