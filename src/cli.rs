//! Command Line Interface (CLI) arguments.

use clap::Parser;

/// Equistat command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "EQUISTAT_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "EQUISTAT_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "EQUISTAT_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/equistat/certs/cert.pem",
        env = "EQUISTAT_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/equistat/certs/key.pem",
        env = "EQUISTAT_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "EQUISTAT_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Directory holding dataset blobs and the metadata index.
    #[arg(long, default_value = "data", env = "EQUISTAT_DATA_DIR")]
    pub data_dir: String,
    /// Number of datasets retained per owner; uploading beyond this evicts the owner's oldest.
    #[arg(long, default_value_t = 5, env = "EQUISTAT_MAX_DATASETS_PER_USER")]
    pub max_datasets_per_user: usize,
    /// Maximum size of an uploaded CSV file, e.g. "16 MiB".
    #[arg(long, default_value = "16 MiB", env = "EQUISTAT_MAX_UPLOAD_SIZE")]
    pub max_upload_size: String,
    /// Optional memory pool for datasets loaded concurrently, e.g. "256 MiB". Unlimited if unset.
    #[arg(long, env = "EQUISTAT_MEMORY_LIMIT")]
    pub memory_limit: Option<String>,
    /// Optional limit on the number of concurrent analysis tasks. Defaults to one less than the
    /// number of CPUs.
    #[arg(long, env = "EQUISTAT_TASK_LIMIT")]
    pub task_limit: Option<usize>,
    /// Whether to use Rayon for execution of CPU-bound tasks.
    #[arg(long, default_value_t = false, env = "EQUISTAT_USE_RAYON")]
    pub use_rayon: bool,
    /// Whether to enable sending traces to Jaeger.
    #[arg(long, default_value_t = false, env = "EQUISTAT_ENABLE_JAEGER")]
    pub enable_jaeger: bool,
    /// Username of an administrator account ensured at startup.
    #[arg(long, env = "EQUISTAT_ADMIN_USERNAME", requires = "admin_password")]
    pub admin_username: Option<String>,
    /// Password of the administrator account ensured at startup.
    #[arg(long, env = "EQUISTAT_ADMIN_PASSWORD", requires = "admin_username")]
    pub admin_password: Option<String>,
    /// Email of the administrator account ensured at startup.
    #[arg(long, env = "EQUISTAT_ADMIN_EMAIL", requires = "admin_username")]
    pub admin_email: Option<String>,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
