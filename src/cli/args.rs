//! Command line argument parsing for the Kiosk CLI using clap.
//!
//! Every deployment option has a flag and an environment variable, so a
//! deployment can be configured entirely from its environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, KioskConfig, StoreConfig};
use crate::embedding::{DEFAULT_OPENAI_BASE_URL, OpenAIEmbedderConfig};
use crate::hybrid::{FusionMode, HybridSearchConfig, ScoreNormalization};
use crate::ingest::IngestConfig;
use crate::supabase::SupabaseConfig;
use crate::vector_index::DistanceMetric;

/// Kiosk - hybrid semantic and keyword product search
#[derive(Parser, Debug, Clone)]
#[command(name = "kiosk")]
#[command(about = "Hybrid semantic and keyword product search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct KioskArgs {
    /// Verbosity level (repeat for more: -v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub retrieval: RetrievalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl KioskArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n + 1,
            }
        }
    }

    /// Assemble the deployment configuration.
    pub fn to_config(&self) -> KioskConfig {
        let ingest = match &self.command {
            Command::Seed(seed) => IngestConfig {
                batch_size: seed.batch_size,
                concurrency: seed.concurrency.unwrap_or_else(|| IngestConfig::default().concurrency),
            },
            _ => IngestConfig::default(),
        };
        KioskConfig {
            embedding: self.embedding.to_config(),
            store: self.store.to_config(),
            search: self.retrieval.to_config(),
            ingest,
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the HTTP search API
    Serve(ServeArgs),

    /// Wipe the configured stores and reseed them from a seed file
    Seed(SeedArgs),

    /// Run one search and print the ranked products
    Search(SearchArgs),
}

/// Arguments for serving
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (host:port)
    #[arg(long, env = "KIOSK_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,
}

/// Arguments for seeding
#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    /// Seed file: a JSON array of {"imageId", "description"} entries
    #[arg(value_name = "SEED_FILE")]
    pub file: PathBuf,

    /// Texts sent per embedding request
    #[arg(long, env = "KIOSK_INGEST_BATCH_SIZE", default_value_t = 32)]
    pub batch_size: usize,

    /// Requests in flight (defaults to the number of CPUs)
    #[arg(long, env = "KIOSK_INGEST_CONCURRENCY")]
    pub concurrency: Option<usize>,
}

/// Arguments for a one-shot search
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Print fused scores alongside products
    #[arg(long)]
    pub scores: bool,
}

/// Embedding provider options
#[derive(Args, Debug, Clone)]
pub struct EmbeddingArgs {
    /// Embedding provider
    #[arg(long, env = "KIOSK_EMBEDDER", default_value = "openai", global = true)]
    pub embedder: EmbedderKind,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL, global = true)]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(
        long,
        env = "KIOSK_EMBEDDING_MODEL",
        default_value = "text-embedding-3-large",
        global = true
    )]
    pub embedding_model: String,

    /// Output dimensionality shared by indexing and querying
    #[arg(long, env = "KIOSK_EMBEDDING_DIMENSIONS", default_value_t = 384, global = true)]
    pub embedding_dimensions: usize,

    /// Milliseconds before an embedding request times out. With retries this
    /// must fit inside the search timeout
    #[arg(long, env = "KIOSK_EMBEDDING_TIMEOUT_MS", default_value_t = 2000, global = true)]
    pub embedding_timeout_ms: u64,
}

impl EmbeddingArgs {
    pub fn to_config(&self) -> EmbeddingConfig {
        match self.embedder {
            EmbedderKind::Openai => EmbeddingConfig::OpenAi(OpenAIEmbedderConfig {
                api_key: self.openai_api_key.clone().unwrap_or_default(),
                base_url: self.openai_base_url.clone(),
                model: self.embedding_model.clone(),
                dimensions: Some(self.embedding_dimensions),
                timeout: Duration::from_millis(self.embedding_timeout_ms),
                ..Default::default()
            }),
            EmbedderKind::Hashing => EmbeddingConfig::Hashing {
                dimension: self.embedding_dimensions,
            },
        }
    }
}

/// Storage backend options
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Storage backend
    #[arg(long, env = "KIOSK_STORE", default_value = "memory", global = true)]
    pub store: StoreKind,

    /// Seed file loaded into the memory backend at startup
    #[arg(long, env = "KIOSK_SEED_FILE", global = true)]
    pub seed_file: Option<PathBuf>,

    /// Similarity metric of the memory backend
    #[arg(long, env = "KIOSK_METRIC", default_value = "cosine", global = true)]
    pub metric: MetricArg,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub supabase_url: Option<String>,

    /// Supabase anon key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true, global = true)]
    pub supabase_anon_key: Option<String>,

    /// Table holding product embeddings
    #[arg(long, env = "KIOSK_VECTOR_TABLE", default_value = "product_embedding", global = true)]
    pub vector_table: String,

    /// Table holding product records
    #[arg(long, env = "KIOSK_PRODUCT_TABLE", default_value = "products", global = true)]
    pub product_table: String,

    /// Similarity search RPC
    #[arg(long, env = "KIOSK_SIMILARITY_QUERY", default_value = "match_products", global = true)]
    pub similarity_query: String,

    /// Keyword search RPC
    #[arg(long, env = "KIOSK_KEYWORD_QUERY", default_value = "kw_match_products", global = true)]
    pub keyword_query: String,
}

impl StoreArgs {
    pub fn to_config(&self) -> StoreConfig {
        match self.store {
            StoreKind::Memory => StoreConfig::Memory {
                seed_file: self.seed_file.clone(),
                metric: self.metric.into(),
            },
            StoreKind::Supabase => StoreConfig::Supabase(SupabaseConfig {
                url: self.supabase_url.clone().unwrap_or_default(),
                anon_key: self.supabase_anon_key.clone().unwrap_or_default(),
                vector_table: self.vector_table.clone(),
                product_table: self.product_table.clone(),
                similarity_query: self.similarity_query.clone(),
                keyword_query: self.keyword_query.clone(),
                ..Default::default()
            }),
        }
    }
}

/// Retrieval tuning options
#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    /// Candidates fetched from the vector index
    #[arg(long, env = "KIOSK_K_VECTOR", default_value_t = 3, global = true)]
    pub k_vector: usize,

    /// Candidates fetched from the keyword index
    #[arg(long, env = "KIOSK_K_KEYWORD", default_value_t = 10, global = true)]
    pub k_keyword: usize,

    /// Products returned per search
    #[arg(long, env = "KIOSK_LIMIT", default_value_t = 3, global = true)]
    pub limit: usize,

    /// Weight of normalized vector similarity
    #[arg(long, env = "KIOSK_VECTOR_WEIGHT", default_value_t = 0.6, global = true)]
    pub vector_weight: f32,

    /// Weight of normalized keyword relevance
    #[arg(long, env = "KIOSK_KEYWORD_WEIGHT", default_value_t = 0.4, global = true)]
    pub keyword_weight: f32,

    /// Score normalization applied to each index
    #[arg(long, env = "KIOSK_NORMALIZATION", default_value = "min-max", global = true)]
    pub normalization: NormalizationArg,

    /// Fusion strategy
    #[arg(long, env = "KIOSK_FUSION", default_value = "weighted", global = true)]
    pub fusion: FusionArg,

    /// Milliseconds allowed for each external call during a search
    #[arg(long, env = "KIOSK_TIMEOUT_MS", default_value_t = 5000, global = true)]
    pub timeout_ms: u64,
}

impl RetrievalArgs {
    pub fn to_config(&self) -> HybridSearchConfig {
        HybridSearchConfig {
            k_vector: self.k_vector,
            k_keyword: self.k_keyword,
            limit: self.limit,
            vector_weight: self.vector_weight,
            keyword_weight: self.keyword_weight,
            normalization: self.normalization.into(),
            fusion: self.fusion.into(),
            call_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Embedding providers
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedderKind {
    /// OpenAI-compatible embeddings API
    Openai,
    /// Local feature hashing (offline, deterministic)
    Hashing,
}

/// Storage backends
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreKind {
    /// In-process stores
    Memory,
    /// Supabase PostgREST
    Supabase,
}

/// Similarity metrics
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricArg {
    Cosine,
    Dot,
    Euclidean,
}

impl From<MetricArg> for DistanceMetric {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Cosine => DistanceMetric::Cosine,
            MetricArg::Dot => DistanceMetric::DotProduct,
            MetricArg::Euclidean => DistanceMetric::Euclidean,
        }
    }
}

/// Score normalization strategies
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizationArg {
    MinMax,
    Rank,
    None,
}

impl From<NormalizationArg> for ScoreNormalization {
    fn from(arg: NormalizationArg) -> Self {
        match arg {
            NormalizationArg::MinMax => ScoreNormalization::MinMax,
            NormalizationArg::Rank => ScoreNormalization::Rank,
            NormalizationArg::None => ScoreNormalization::None,
        }
    }
}

/// Fusion strategies
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FusionArg {
    /// Weighted sum of normalized vector and keyword scores
    Weighted,
    /// Vector ranking only; the keyword lookup must still succeed
    VectorOnly,
}

impl From<FusionArg> for FusionMode {
    fn from(arg: FusionArg) -> Self {
        match arg {
            FusionArg::Weighted => FusionMode::Weighted,
            FusionArg::VectorOnly => FusionMode::VectorOnly,
        }
    }
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
