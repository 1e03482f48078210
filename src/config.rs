// src/config.rs

use clap::Parser;
use std::path::PathBuf;
use url::Url;

use crate::analytics::{DEFAULT_BLS_KEY, DEFAULT_POPULATION_KEY};
use crate::fetch::population::DEFAULT_POPULATION_URL;
use crate::fetch::DEFAULT_USER_AGENT;
use crate::sync::DEFAULT_PREFIX;

pub const DEFAULT_BLS_BASE: &str = "https://download.bls.gov/pub/time.series/pr/";

/// Ingest: mirror the BLS files and the population dataset into the store.
#[derive(Parser, Debug, Clone)]
#[command(name = "ingest")]
pub struct IngestArgs {
    /// Target bucket
    #[arg(long, env = "REARC_BUCKET")]
    pub bucket: String,

    /// Base URL the data files are resolved against
    #[arg(long, env = "BLS_BASE", default_value = DEFAULT_BLS_BASE)]
    pub bls_base: Url,

    /// Index page listing the data files (defaults to the base URL)
    #[arg(long, env = "BLS_INDEX")]
    pub bls_index: Option<Url>,

    /// Key prefix for mirrored BLS files
    #[arg(long, env = "BLS_PREFIX", default_value = DEFAULT_PREFIX)]
    pub bls_prefix: String,

    /// Key for the population JSON
    #[arg(long, env = "REARC_POP_KEY", default_value = DEFAULT_POPULATION_KEY)]
    pub population_key: String,

    /// Population API endpoint
    #[arg(long, env = "POPULATION_URL", default_value = DEFAULT_POPULATION_URL)]
    pub population_url: Url,

    /// Root directory of the blob store
    #[arg(long, env = "STORE_ROOT", default_value = "blobstore")]
    pub store_root: PathBuf,

    /// User-Agent sent with every request
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl IngestArgs {
    pub fn index_url(&self) -> &Url {
        self.bls_index.as_ref().unwrap_or(&self.bls_base)
    }
}

/// Analytics: summarise the mirrored datasets.
#[derive(Parser, Debug, Clone)]
#[command(name = "analytics")]
pub struct AnalyticsArgs {
    /// Source bucket
    #[arg(long, env = "REARC_BUCKET")]
    pub bucket: String,

    /// Key of the mirrored BLS file
    #[arg(long, env = "BLS_KEY", default_value = DEFAULT_BLS_KEY)]
    pub bls_key: String,

    /// Key of the population JSON
    #[arg(long, env = "POP_KEY", default_value = DEFAULT_POPULATION_KEY)]
    pub population_key: String,

    /// Root directory of the blob store
    #[arg(long, env = "STORE_ROOT", default_value = "blobstore")]
    pub store_root: PathBuf,

    /// Queue message that triggered this run (JSON with a `Records` array)
    #[arg(long)]
    pub event: Option<PathBuf>,
}
