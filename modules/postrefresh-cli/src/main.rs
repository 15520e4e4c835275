use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

use postrefresh_common::config::load_config;
use postrefresh_common::{
    FileConfig, FilterConfig, MediaOutlet, ReferenceClock, RefreshConfig, SelectionRequest,
};
use postrefresh_eligibility::{load_whitelist, FilterChain};
use postrefresh_planner::{upsert_user, QueryPlan};

#[derive(Parser)]
#[command(name = "postrefresh", about = "Plan post metric refresh batches")]
struct Cli {
    /// TOML file with default [selection] and [filters] tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the plan and SQL for a selection request
    Plan {
        /// JSON selection request (defaults to [selection] from --config)
        #[arg(long)]
        request: Option<PathBuf>,
    },
    /// Run the eligibility filters over a JSON array of outlet records
    Filter {
        #[arg(long)]
        outlets: PathBuf,

        /// Also plan the configured selection over the accepted outlets
        #[arg(long)]
        plan: bool,
    },
    /// Insert a user or rename an existing one
    UpsertUser {
        #[arg(long)]
        id: i64,

        #[arg(long)]
        name: String,
    },
    /// Print the JSON schema of a selection request
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let clock = ReferenceClock::capture();
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = RefreshConfig::from_env()?;
    let file_config = cli.config.as_deref().map(load_config).transpose()?;

    match cli.command {
        Command::Plan { request } => {
            let request = match request {
                Some(path) => read_json(&path)?,
                None => configured_selection(file_config.as_ref())?,
            };
            print_plan(&request)?;
        }
        Command::Filter { outlets, plan } => {
            let filters = run_filters(&config, file_config.as_ref());
            let whitelist = config
                .whitelist_path
                .as_deref()
                .map(load_whitelist)
                .transpose()?;
            let chain = FilterChain::from_config(&filters, clock, whitelist)?;

            let outlets: Vec<MediaOutlet> = read_json(&outlets)?;
            let media_ids = chain.media_ids(&outlets);
            println!("{}", serde_json::to_string(&media_ids)?);

            if plan {
                let mut request = configured_selection(file_config.as_ref())?;
                request.media_ids = media_ids;
                print_plan(&request)?;
            }
        }
        Command::UpsertUser { id, name } => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for upsert-user")?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await
                .context("Failed to connect to database")?;

            upsert_user(id, &name, &pool).await?;
            info!(id, name = name.as_str(), "User upserted");
        }
        Command::Schema => {
            let schema = schemars::schema_for!(SelectionRequest);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("postrefresh=info".parse()?);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

/// Filters from the config file when it has a [filters] table, env defaults otherwise.
/// The env country fills in when the file names none.
fn run_filters(config: &RefreshConfig, file_config: Option<&FileConfig>) -> FilterConfig {
    let mut filters = file_config
        .and_then(|c| c.filters.clone())
        .unwrap_or_else(|| config.filter_defaults());
    if filters.country.is_none() {
        filters.country = config.country.clone();
    }
    filters
}

fn configured_selection(file_config: Option<&FileConfig>) -> Result<SelectionRequest> {
    file_config
        .and_then(|c| c.selection.clone())
        .context("No selection request: pass --request or a --config with a [selection] table")
}

fn print_plan(request: &SelectionRequest) -> Result<()> {
    let plan = QueryPlan::from_request(request)?;
    info!(mode = ?plan.mode(), "Candidate query planned");
    println!("{}", serde_json::to_string_pretty(&plan)?);
    println!("{}", plan.sql());
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_config() -> RefreshConfig {
        RefreshConfig::from_lookup(|key| match key {
            "POSTREFRESH_COUNTRY" => Some("CL".to_string()),
            "POSTREFRESH_LOCAL_PERCENTAGE" => Some("80".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn env_defaults_apply_without_filters_table() {
        let filters = run_filters(&env_config(), None);
        assert_eq!(filters, env_config().filter_defaults());
    }

    #[test]
    fn file_filters_borrow_env_country() {
        let file_config = FileConfig {
            selection: None,
            filters: Some(FilterConfig {
                local_percentage: Some(60.0),
                ..FilterConfig::default()
            }),
        };
        let filters = run_filters(&env_config(), Some(&file_config));
        assert_eq!(filters.local_percentage, Some(60.0));
        assert_eq!(filters.country.as_deref(), Some("CL"));
        assert_eq!(filters.stale_after_secs, None);
    }

    #[test]
    fn missing_selection_is_an_error() {
        assert!(configured_selection(None).is_err());
    }
}
