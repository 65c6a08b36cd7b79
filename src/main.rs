use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use emitron::cache::{
  ContentPersistableState, ContentSummaryState, DataCache, NoopStore, PersistenceStore,
  SqliteStore,
};
use emitron::config::Config;
use emitron::repository::{ContentRepository, DataState, Parameter};
use emitron::service::{response_from_body, ContentsService};

#[derive(Parser, Debug)]
#[command(name = "emitron")]
#[command(about = "Browse a JSON:API contents backend through a local entity cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/emitron/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Parse a local JSON:API document and print its contents
  Ingest {
    file: PathBuf,
  },
  /// List contents page by page
  List {
    /// Request parameter as key=value, e.g. filter[q]=swift
    #[arg(short, long = "filter", value_parser = parse_parameter)]
    filters: Vec<Parameter>,

    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: u32,
  },
  /// Fetch and print one content with its related entities
  Show {
    id: i64,
  },
}

fn parse_parameter(s: &str) -> std::result::Result<Parameter, String> {
  Parameter::parse(s).ok_or_else(|| format!("expected key=value, got {:?}", s))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging()?;

  match args.command {
    Command::Ingest { file } => ingest(&file),
    Command::List { filters, pages } => {
      let config = Config::load(args.config.as_deref())?;
      list(&config, filters, pages).await
    }
    Command::Show { id } => {
      let config = Config::load(args.config.as_deref())?;
      show(&config, id).await
    }
  }
}

/// Log to a daily file so output on stdout stays clean.
fn init_logging() -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("emitron")
    .join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let (writer, guard) =
    tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "emitron.log"));

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("emitron=info")))
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .init();

  Ok(guard)
}

fn open_store(config: &Config) -> Result<Box<dyn PersistenceStore>> {
  if config.storage.enabled {
    Ok(Box::new(SqliteStore::open(config.storage.path.as_deref())?))
  } else {
    Ok(Box::new(NoopStore))
  }
}

/// A cache seeded with everything persisted so far.
fn warm_cache(store: &dyn PersistenceStore) -> DataCache {
  let cache = DataCache::new();
  match store.load_update() {
    Ok(update) => cache.merge(&update),
    Err(e) => warn!("Ignoring unreadable storage: {}", e),
  }
  cache
}

fn persist(cache: &DataCache, store: &dyn PersistenceStore, ids: &[i64]) -> Result<()> {
  let states = ids
    .iter()
    .filter_map(|id| cache.cached_content_persistable_state(*id).ok())
    .collect::<Vec<_>>();
  store.save_states(&states)
}

fn ingest(file: &Path) -> Result<()> {
  let body = std::fs::read(file).map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
  let response = response_from_body(&body)?;

  let cache = DataCache::new();
  cache.merge(&response.update);
  info!("Ingested {}", file.display());

  for content in &response.contents {
    let state = cache.cached_content_summary_state(content.id)?;
    println!("{}", summary_row(&state));
  }
  let counts = cache.counts();
  println!(
    "\n{} contents, {} domains, {} groups, {} relationships",
    counts.contents, counts.domains, counts.groups, counts.relationships
  );
  Ok(())
}

async fn list(config: &Config, filters: Vec<Parameter>, pages: u32) -> Result<()> {
  let store = open_store(config)?;
  let cache = warm_cache(store.as_ref());
  let service = ContentsService::new(config)?;

  let mut parameters = filters;
  parameters.push(Parameter::page_size(config.api.page_size));

  let mut repository = ContentRepository::new(cache.clone(), parameters, move |params| {
    let service = service.clone();
    async move { service.contents(&params).await.map_err(|e| e.to_string()) }
  });

  repository.reload();
  repository.settle().await;

  if repository.state() == DataState::Failed {
    let error = repository.error().unwrap_or_default().to_string();
    if !repository.restore_listing(store.as_ref())? {
      return Err(eyre!("Failed to load contents: {}", error));
    }
    println!("(offline: {})\n", error);
  } else {
    while repository.current_page() < pages && repository.has_more() {
      repository.load_more();
      repository.settle().await;
      if let Some(error) = repository.error() {
        warn!("Stopped paging: {}", error);
        println!("(stopped after page {}: {})", repository.current_page(), error);
        break;
      }
    }
    persist(&cache, store.as_ref(), repository.content_ids())?;
    repository.persist_listing(store.as_ref())?;
  }

  for state in repository.contents() {
    println!("{}", summary_row(state));
  }
  println!(
    "\n{} of {} contents",
    repository.content_ids().len(),
    repository.total_content_num()
  );
  Ok(())
}

async fn show(config: &Config, id: i64) -> Result<()> {
  let store = open_store(config)?;
  let cache = warm_cache(store.as_ref());
  let service = ContentsService::new(config)?;

  match service.content_details(id).await {
    Ok(response) => {
      cache.merge(&response.update);
      persist(&cache, store.as_ref(), &[id])?;
    }
    Err(e) if cache.contains(id) => println!("(offline: {})\n", e),
    Err(e) => return Err(e),
  }

  let state = cache.cached_content_persistable_state(id)?;
  print_details(&state);
  Ok(())
}

fn format_duration(seconds: i64) -> String {
  let minutes = seconds / 60;
  if minutes >= 60 {
    format!("{}h {}m", minutes / 60, minutes % 60)
  } else {
    format!("{}m", minutes)
  }
}

fn summary_row(state: &ContentSummaryState) -> String {
  let content = &state.content;
  let domains = state
    .domains
    .iter()
    .map(|d| d.name.as_str())
    .collect::<Vec<_>>()
    .join(", ");

  let mut row = format!(
    "{:>6}  {:<48}  {:<10}  {:>7}  {}",
    content.id,
    content.name,
    format!("{:?}", content.content_type).to_lowercase(),
    format_duration(content.duration),
    domains
  );
  if let Some(parent) = &state.parent_content {
    row.push_str(&format!("  (in {})", parent.name));
  }
  if state.bookmark.is_some() {
    row.push_str("  *");
  }
  if let Some(progression) = &state.progression {
    if progression.finished() {
      row.push_str("  done");
    } else {
      row.push_str(&format!("  {:.0}%", progression.proportion() * 100.0));
    }
  }
  row
}

fn print_details(state: &ContentPersistableState) {
  let content = &state.content;
  println!("{} ({})", content.name, content.id);
  println!(
    "{:?}, {:?}, {}, released {}",
    content.content_type,
    content.difficulty,
    format_duration(content.duration),
    content.released_at.format("%Y-%m-%d")
  );
  if let Some(technology) = &content.technology_triple_string {
    println!("{}", technology);
  }
  if let Some(contributors) = &content.contributor_string {
    println!("By {}", contributors);
  }
  println!("\n{}\n", content.description_plain_text);

  let names = |names: Vec<&str>| names.join(", ");
  if !state.domains.is_empty() {
    println!(
      "Domains:    {}",
      names(state.domains.iter().map(|d| d.name.as_str()).collect())
    );
  }
  if !state.categories.is_empty() {
    println!(
      "Categories: {}",
      names(state.categories.iter().map(|c| c.name.as_str()).collect())
    );
  }
  if let Some(parent) = &state.parent_content {
    println!("Part of:    {} ({})", parent.name, parent.id);
  }
  if let Some(bookmark) = &state.bookmark {
    println!("Bookmarked: {}", bookmark.created_at.format("%Y-%m-%d"));
  }
  if let Some(progression) = &state.progression {
    println!(
      "Progress:   {}/{}{}",
      progression.progress,
      progression.target,
      if progression.finished() { " (finished)" } else { "" }
    );
  }

  for group in &state.groups {
    println!("\n{}", group.name);
    for child in state
      .child_contents
      .iter()
      .filter(|c| c.group_id == Some(group.id))
    {
      println!("  {:>6}  {:<48}  {:>7}", child.id, child.name, format_duration(child.duration));
    }
  }
}
