use clap::{Parser, ValueEnum};

/// When to run a full ingestion at server startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LoadOnStartup {
    /// Never load automatically.
    Never,
    /// Load only if the product index is empty.
    IfEmpty,
    /// Always load.
    Always,
}

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "prodsync-server")]
#[command(author, version, about = "REST API server for the prodsync ingestion orchestrator")]
pub struct ServerConfig {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value = "10")]
    pub db_max_connections: u32,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Base URL of the remote product catalogue (overrides SOURCE_BASE_URL defaults)
    #[arg(long, env = "SOURCE_BASE_URL")]
    pub source_base_url: Option<String>,

    /// Run a full ingestion at startup
    #[arg(long, env = "LOAD_ON_STARTUP", value_enum, default_value = "if-empty")]
    pub load_on_startup: LoadOnStartup,

    /// Allowed CORS origins, comma separated, or "*" for any
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,
}
