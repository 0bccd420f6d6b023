use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use incident_console::{
    api::{HttpIncidentApi, InMemoryIncidentApi, IncidentApi},
    config::ClientConfig,
    models::{Cursor, Incident, IncidentId, NewIncident, Severity, Status},
    mutation::{IncidentEdit, MutationCoordinator},
    query::{
        CacheStore, DebouncedInput, DetailQuery, FilterCodec, FilterState, ListLocation,
        ListQuery, ListView, ViewState,
    },
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "incident-console")]
#[command(about = "Browse and edit incidents", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file layered over the built-in defaults
    #[arg(short, long, env = "INCIDENT_CONSOLE_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file
    #[arg(short, long)]
    base_url: Option<String>,

    /// Use a seeded in-process backend instead of HTTP
    #[arg(long)]
    offline: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Free-text search
    #[arg(short, long)]
    search: Option<String>,

    /// SEV1..SEV4
    #[arg(short = 'S', long)]
    severity: Option<Severity>,

    /// OPEN, MITIGATED or RESOLVED
    #[arg(short = 'T', long)]
    status: Option<Status>,

    #[arg(short = 'v', long)]
    service: Option<String>,

    /// Page size (clamped to the configured maximum)
    #[arg(short, long)]
    limit: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of incidents
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Opaque cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Shareable query string, e.g. "status=OPEN&limit=50"
        #[arg(long, conflicts_with_all = ["search", "severity", "status", "service", "limit", "cursor"])]
        location: Option<String>,
    },

    /// Interactive list with paging and debounced search
    Browse {
        #[arg(long)]
        location: Option<String>,
    },

    /// Show one incident
    Get {
        #[arg(value_name = "INCIDENT_ID")]
        id: IncidentId,
    },

    /// Create an incident
    Create {
        #[arg(short, long)]
        title: String,

        #[arg(short = 'v', long)]
        service: String,

        #[arg(short = 'S', long)]
        severity: Option<Severity>,

        #[arg(short = 'T', long)]
        status: Option<Status>,

        #[arg(short, long)]
        owner: Option<String>,

        #[arg(short = 'm', long)]
        summary: Option<String>,
    },

    /// Edit an incident; only fields that differ are sent
    Update {
        #[arg(value_name = "INCIDENT_ID")]
        id: IncidentId,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short = 'v', long)]
        service: Option<String>,

        #[arg(short = 'S', long)]
        severity: Option<Severity>,

        #[arg(short = 'T', long)]
        status: Option<Status>,

        /// Empty string clears the owner
        #[arg(short, long)]
        owner: Option<String>,

        /// Empty string clears the summary
        #[arg(short = 'm', long)]
        summary: Option<String>,
    },
}

/// Shared handles for one invocation
struct Console {
    api: Arc<dyn IncidentApi>,
    cache: CacheStore,
    codec: FilterCodec,
    config: ClientConfig,
}

impl Console {
    fn list_query(&self, location: ListLocation) -> ListQuery {
        ListQuery::new(self.api.clone(), self.cache.clone(), location)
            .with_codec(self.codec)
            .with_stale_after(self.config.query.stale_after())
    }

    fn mutations(&self) -> MutationCoordinator {
        MutationCoordinator::new(self.api.clone(), self.cache.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    }
    .context("Failed to load configuration")?;
    if let Some(base_url) = cli.base_url.clone() {
        config.api.base_url = base_url;
    }
    if cli.json_logs {
        config.observability.json_logs = true;
    }

    init_tracing(&config);
    tracing::debug!(base_url = %config.api.base_url, offline = cli.offline, "Starting incident console");

    let api: Arc<dyn IncidentApi> = if cli.offline {
        Arc::new(seeded_backend())
    } else {
        Arc::new(HttpIncidentApi::new(&config.api)?)
    };
    let console = Console {
        api,
        cache: CacheStore::new(),
        codec: FilterCodec::from(&config.pagination),
        config,
    };

    match cli.command {
        Commands::List {
            filter,
            cursor,
            location,
        } => {
            let location = match location {
                Some(query) => ListLocation::parse(&query, &console.codec),
                None => ListLocation::new(
                    build_filter(&console.codec, filter),
                    cursor.as_deref().and_then(Cursor::parse),
                ),
            };
            let query = console.list_query(location);
            let view = query.read().await;
            print_list(&view, &console.codec);
            if let Some(error) = &view.error {
                bail!("{}", error);
            }
        }

        Commands::Browse { location } => {
            let location = location
                .map(|query| ListLocation::parse(&query, &console.codec))
                .unwrap_or_else(|| ListLocation::new(console.codec.initial(), None));
            browse(&console, location).await?;
        }

        Commands::Get { id } => {
            let detail = DetailQuery::new(console.api.clone(), console.cache.clone(), id);
            let view = detail.read().await;
            match (view.incident, view.error) {
                (Some(incident), _) => print_incident(&incident),
                (None, Some(error)) => bail!("{}", error),
                (None, None) => bail!("Incident {} not found", id),
            }
        }

        Commands::Create {
            title,
            service,
            severity,
            status,
            owner,
            summary,
        } => {
            let draft = NewIncident {
                title,
                service,
                severity,
                status,
                owner,
                summary,
            };
            let incident = console.mutations().create(draft).await?;
            println!("Created incident #{}", incident.id);
            print_incident(&incident);
        }

        Commands::Update {
            id,
            title,
            service,
            severity,
            status,
            owner,
            summary,
        } => {
            // Load the current record so only real changes are sent
            let detail = DetailQuery::new(console.api.clone(), console.cache.clone(), id);
            let current = detail.read().await;
            if let (None, Some(error)) = (&current.incident, &current.error) {
                bail!("{}", error);
            }

            let edit = IncidentEdit {
                title,
                service,
                severity,
                status,
                owner,
                summary,
            };
            match console.mutations().update(id, &edit).await? {
                Some(incident) => {
                    println!("Updated incident #{}", incident.id);
                    print_incident(&incident);
                }
                None => println!("No changes"),
            }
        }
    }

    Ok(())
}

fn init_tracing(config: &ClientConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("incident_console={}", config.observability.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_filter(codec: &FilterCodec, args: FilterArgs) -> FilterState {
    let mut filter = codec
        .initial()
        .with_severity(args.severity)
        .with_status(args.status);
    if let Some(search) = args.search {
        filter = filter.with_search(search);
    }
    if let Some(service) = args.service {
        filter = filter.with_service(service);
    }
    if args.limit.is_some() {
        filter = filter.with_limit(codec.normalize_limit(args.limit.as_deref()));
    }
    filter
}

/// A few incidents so `--offline` has something to page through
fn seeded_backend() -> InMemoryIncidentApi {
    let backend = InMemoryIncidentApi::new();
    let seeds = [
        ("Checkout latency above SLO", "payments", Severity::Sev2, Status::Open, Some("dana")),
        ("Login failures in eu-west", "auth", Severity::Sev1, Status::Mitigated, Some("lee")),
        ("Nightly export delayed", "reporting", Severity::Sev4, Status::Resolved, None),
        ("Search index lagging", "search", Severity::Sev3, Status::Open, None),
        ("Webhook retries piling up", "notifications", Severity::Sev3, Status::Open, Some("kim")),
    ];
    for (round, suffix) in ["", " (replica)", " (follow-up)", " (staging)", " (canary)"]
        .iter()
        .enumerate()
    {
        for (title, service, severity, status, owner) in seeds {
            let mut draft = NewIncident::new(format!("{}{}", title, suffix), service)
                .with_severity(severity)
                .with_status(status);
            if let Some(owner) = owner {
                draft = draft.with_owner(owner);
            }
            if round > 0 {
                draft = draft.with_summary(format!("Seed round {}", round));
            }
            backend.insert(draft.into_payload());
        }
    }
    backend
}

async fn browse(console: &Console, location: ListLocation) -> anyhow::Result<()> {
    let query = console.list_query(location);
    let (search, mut committed) =
        DebouncedInput::new(console.config.query.debounce_window(), query.view().filter.search);

    print_list(&query.read().await, &console.codec);
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(term) = committed.recv() => {
                let filter = query.view().filter.with_search(term);
                print_list(&query.set_filter(filter).await, &console.codec);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (command, arg) = match line.trim().split_once(' ') {
                    Some((command, arg)) => (command.to_string(), arg.trim().to_string()),
                    None => (line.trim().to_string(), String::new()),
                };
                let filter = query.view().filter;
                let view = match command.as_str() {
                    "" => continue,
                    "q" | "quit" | "exit" => break,
                    "h" | "help" => {
                        print_help();
                        continue;
                    }
                    "n" | "next" => query.next_page().await,
                    "p" | "prev" => query.previous_page().await,
                    "r" | "refresh" => query.refresh().await,
                    "s" | "search" => {
                        search.push(arg);
                        continue;
                    }
                    "sev" => match parse_choice(&arg) {
                        Ok(severity) => query.set_filter(filter.with_severity(severity)).await,
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    },
                    "status" => match parse_choice(&arg) {
                        Ok(status) => query.set_filter(filter.with_status(status)).await,
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    },
                    "svc" => query.set_filter(filter.with_service(arg)).await,
                    "limit" => {
                        let limit = console.codec.normalize_limit(Some(&arg));
                        query.set_filter(filter.with_limit(limit)).await
                    }
                    "clear" => {
                        search.sync("");
                        query.set_filter(console.codec.initial()).await
                    }
                    "link" => {
                        println!("?{}", query.location().to_query_string(&console.codec));
                        continue;
                    }
                    "open" => {
                        open_detail(console, &arg).await;
                        continue;
                    }
                    "edit" => {
                        edit_incident(console, &arg).await;
                        query.read().await
                    }
                    other => {
                        println!("Unknown command '{}', type 'help'", other);
                        continue;
                    }
                };
                search.sync(view.filter.search.clone());
                print_list(&view, &console.codec);
            }
        }
    }

    search.dispose();
    query.dispose();
    Ok(())
}

fn print_help() {
    println!("commands: next | prev | refresh | search <text> | sev <SEV1..SEV4|all> | status <OPEN|MITIGATED|RESOLVED|all>");
    println!("          svc <name> | limit <n> | clear | link | open <id> | edit <id> field=value ... | quit");
}

/// `all` or blank means no constraint
fn parse_choice<T: FromStr>(raw: &str) -> anyhow::Result<Option<T>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    match T::from_str(&raw.to_ascii_uppercase()) {
        Ok(value) => Ok(Some(value)),
        Err(_) => bail!("Unrecognized value '{}'", raw),
    }
}

async fn open_detail(console: &Console, arg: &str) {
    let Ok(id) = arg.parse::<IncidentId>() else {
        println!("Usage: open <id>");
        return;
    };
    let view = DetailQuery::new(console.api.clone(), console.cache.clone(), id)
        .read()
        .await;
    match (view.incident, view.error) {
        (Some(incident), _) => print_incident(&incident),
        (None, Some(error)) => println!("Error: {}", error),
        (None, None) => println!("Incident {} not found", id),
    }
}

async fn edit_incident(console: &Console, arg: &str) {
    let mut parts = arg.split_whitespace();
    let Some(Ok(id)) = parts.next().map(str::parse::<IncidentId>) else {
        println!("Usage: edit <id> field=value ...");
        return;
    };

    let mut edit = IncidentEdit::new();
    for pair in parts {
        let (field, value) = pair.split_once('=').unwrap_or((pair, ""));
        // Underscores stand in for spaces on the command line
        let value = value.replace('_', " ");
        match field {
            "title" => edit.title = Some(value),
            "service" => edit.service = Some(value),
            "owner" => edit.owner = Some(value),
            "summary" => edit.summary = Some(value),
            "severity" => match parse_choice(&value) {
                Ok(Some(severity)) => edit.severity = Some(severity),
                _ => println!("Ignoring '{}'", pair),
            },
            "status" => match parse_choice(&value) {
                Ok(Some(status)) => edit.status = Some(status),
                _ => println!("Ignoring '{}'", pair),
            },
            _ => println!("Ignoring '{}'", pair),
        }
    }

    let detail = DetailQuery::new(console.api.clone(), console.cache.clone(), id);
    detail.read().await;
    match console.mutations().update(id, &edit).await {
        Ok(Some(incident)) => println!("Updated incident #{}", incident.id),
        Ok(None) => println!("No changes"),
        Err(e) => println!("Error: {}", e.user_message()),
    }
}

fn print_list(view: &ListView, codec: &FilterCodec) {
    let location = view.location().to_query_string(codec);
    println!("-- incidents ?{} --", location);

    match view.state() {
        ViewState::Idle => println!("(not loaded)"),
        ViewState::Loading => println!("Loading..."),
        ViewState::Error => {
            println!("Error: {}", view.error.as_deref().unwrap_or_default());
            return;
        }
        ViewState::NoMatches => println!("No incidents match these filters."),
        ViewState::Ready => {
            println!(
                "{:>6}  {:<5} {:<10} {:<14} {:<10} {}",
                "ID", "SEV", "STATUS", "SERVICE", "OWNER", "TITLE"
            );
            for incident in &view.items {
                println!(
                    "{:>6}  {:<5} {:<10} {:<14} {:<10} {}",
                    incident.id,
                    incident.severity,
                    incident.status,
                    incident.service,
                    incident.owner.as_deref().unwrap_or("-"),
                    incident.title
                );
            }
            if let Some(error) = &view.error {
                println!("Error: {}", error);
            }
        }
    }

    let mut footer = vec![format!("{} shown", view.items.len())];
    if view.loading {
        footer.push("refreshing".to_string());
    }
    if view.can_go_previous() {
        footer.push("prev available".to_string());
    }
    if view.can_go_next() {
        footer.push("more available".to_string());
    }
    if let Some(next) = &view.next_cursor {
        footer.push(format!("next cursor {}", next));
    }
    println!("[{}]", footer.join(", "));
}

fn print_incident(incident: &Incident) {
    println!("#{} {}", incident.id, incident.title);
    println!("  service:  {}", incident.service);
    println!("  severity: {}", incident.severity);
    println!("  status:   {}", incident.status);
    println!("  owner:    {}", incident.owner.as_deref().unwrap_or("-"));
    println!("  created:  {}", incident.created_at.to_rfc3339());
    println!("  updated:  {}", incident.updated_at.to_rfc3339());
    if let Some(summary) = &incident.summary {
        println!("  summary:  {}", summary);
    }
}
