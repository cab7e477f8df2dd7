use crate::services::entry_service::DEFAULT_COPY_LIMIT;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Upper bound on `" copy"` name attempts for a single copy.
    pub copy_limit: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Hierarchical file and folder store API")]
pub struct Args {
    /// Host to bind to (overrides ENTRY_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ENTRY_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where entry bodies are stored (overrides ENTRY_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides ENTRY_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Copy name attempts before giving up (overrides ENTRY_STORE_COPY_LIMIT)
    #[arg(long)]
    pub copy_limit: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |name| env::var(name))?, migrate))
    }

    /// CLI values win over the environment, which wins over defaults.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let env_host = lookup("ENTRY_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "ENTRY_STORE_PORT", 3000)?;
        let env_storage =
            lookup("ENTRY_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/entries".into());
        let env_db = lookup("ENTRY_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/entry_store.db".into());
        let env_copy_limit = parse_var(&lookup, "ENTRY_STORE_COPY_LIMIT", DEFAULT_COPY_LIMIT)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            copy_limit: args.copy_limit.unwrap_or(env_copy_limit),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
