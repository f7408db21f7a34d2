use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod error;
mod export;
mod fetch;
mod models;
mod normalize;
mod ordering;
mod query;
mod report;
mod store;

use fetch::{AuditClient, AuditSource};
use models::Column;
use ordering::DEFAULT_PAGE_SIZE;
use query::{AgentFilter, DateRange, QueryDescriptor, SearchColumn, MAX_SCORE};
use store::{AuditStore, LoadState};

#[derive(Parser)]
#[command(name = "call-audit-explorer")]
#[command(about = "Search, sort, page and export call audit evaluations", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["url", "file"])
        .required(true)
        .multiple(true)
))]
struct SourceArgs {
    /// Call audit listing endpoint
    #[arg(long, env = "CALL_AUDIT_URL")]
    url: Option<String>,
    /// Saved listing response; takes precedence over --url
    #[arg(long)]
    file: Option<PathBuf>,
    /// Bearer token for the endpoint
    #[arg(long, env = "CALL_AUDIT_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: u64,
}

impl SourceArgs {
    fn resolve(self) -> anyhow::Result<AuditSource> {
        match (self.url, self.file) {
            (_, Some(path)) => Ok(AuditSource::File(path)),
            (Some(url), None) => {
                let mut client = AuditClient::new(url, Duration::from_secs(self.timeout_secs))
                    .context("failed to build HTTP client")?;
                if let Some(token) = self.token {
                    client = client.with_token(token);
                }
                Ok(AuditSource::Http(client))
            }
            (None, None) => anyhow::bail!("either --url or --file is required"),
        }
    }
}

#[derive(Args)]
struct QueryArgs {
    /// Case-insensitive text to look for
    #[arg(long)]
    search: Option<String>,
    /// Column to search, or `all`
    #[arg(long, default_value = "all")]
    column: SearchColumn,
    /// Agent name, `All`, or `Unknown` for calls without one
    #[arg(long, default_value = "All")]
    agent: AgentFilter,
    /// Only calls scoring at or below this
    #[arg(long, default_value_t = MAX_SCORE, value_parser = clap::value_parser!(u8).range(0..=10))]
    max_score: u8,
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
    #[arg(long)]
    sort: Option<Column>,
    #[arg(long, requires = "sort")]
    descending: bool,
    #[arg(long, default_value_t = 1)]
    page: usize,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,
}

impl QueryArgs {
    fn descriptor(&self) -> anyhow::Result<QueryDescriptor> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                anyhow::bail!("--from {from} is after --to {to}");
            }
        }
        Ok(QueryDescriptor {
            search_term: self.search.clone().unwrap_or_default(),
            search_column: self.column,
            agent: self.agent.clone(),
            max_score: self.max_score,
            date_range: self.from.zip(self.to).map(|(start, end)| DateRange::new(start, end)),
        })
    }

    fn apply(&self, store: &mut AuditStore) -> anyhow::Result<()> {
        store.set_query(self.descriptor()?);
        if let Some(column) = self.sort {
            store.sort_by(column);
            if self.descending {
                store.sort_by(column);
            }
        }
        store.set_page_size(self.page_size);
        store.set_page(self.page);
        Ok(())
    }

    fn scope_label(&self) -> Option<String> {
        match &self.agent {
            AgentFilter::All => None,
            AgentFilter::Unknown => Some("calls without an agent".to_string()),
            AgentFilter::Named(name) => Some(format!("agent {name}")),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of matching calls
    List {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// List the agents present in the listing
    Agents,
    /// Write matching calls to a CSV file
    Export {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the full audit record for one call
    Show {
        #[arg(long)]
        call_id: String,
    },
    /// Generate a markdown summary of matching calls
    Report {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "call_audit_report.md")]
        out: PathBuf,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let source = cli.source.resolve()?;
    let mut store = AuditStore::new(DEFAULT_PAGE_SIZE);
    let token = store.begin_fetch();
    let result = source.load().await;
    store.complete_fetch(token, result);

    if let LoadState::Failed(message) = store.status() {
        anyhow::bail!("could not load call audits: {message}. Run the command again to retry.");
    }

    match cli.command {
        Commands::List { query } => {
            query.apply(&mut store)?;
            debug!(
                page = store.page(),
                page_size = store.page_size(),
                sort = ?store.sort_state(),
                "rendering call audit page"
            );
            print!("{}", report::render_page(&store.page_view()));
        }
        Commands::Agents => {
            if store.agents().is_empty() {
                println!("No agents found across {} calls.", store.rows().len());
            }
            for agent in store.agents() {
                println!("{agent}");
            }
        }
        Commands::Export { query, out } => {
            query.apply(&mut store)?;
            let Some(file) = store.export(Local::now().date_naive())? else {
                println!("No calls match these filters; nothing exported.");
                return Ok(());
            };
            let path = out.unwrap_or_else(|| PathBuf::from(&file.filename));
            std::fs::write(&path, &file.contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(rows = file.row_count, path = %path.display(), "export written");
            println!("Exported {} calls to {}.", file.row_count, path.display());
        }
        Commands::Show { call_id } => {
            let raw = store
                .detail(&call_id)
                .with_context(|| format!("no call with id {call_id}"))?;
            println!("{}", serde_json::to_string_pretty(raw)?);
        }
        Commands::Report { query, out } => {
            query.apply(&mut store)?;
            let report = report::build_report(query.scope_label().as_deref(), &store.filtered());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
