use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::TrackerResult;
use crate::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, GeminiConfig, GeminiDrafter};
use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};
use crate::storage::FileStore;
use crate::supabase::{SupabaseConfig, SupabaseStore};
use crate::tracker::Tracker;

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the MCP server
    Serve(ServeArgs),
    /// Print dashboard and profile statistics for the signed-in user
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Create a local profile (file backend)
    Init(InitArgs),
    /// Print version information
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// JSON file on this machine
    File,
    /// Hosted Supabase project
    Supabase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Where projects are stored
    #[arg(long, env = "DEVSTREAK_BACKEND", value_enum, default_value_t = BackendKind::File, global = true)]
    pub backend: BackendKind,

    /// Data file for the file backend [default: ~/.devstreak/data.json]
    #[arg(long, env = "DEVSTREAK_DATA_FILE", global = true)]
    pub data_file: Option<PathBuf>,

    /// Signed-in user id for the file backend
    #[arg(long = "user", env = "DEVSTREAK_USER", global = true)]
    pub user_id: Option<String>,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub supabase_url: Option<String>,

    /// Supabase anon key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true, global = true)]
    pub supabase_anon_key: Option<String>,

    /// Session token of the signed-in Supabase user
    #[arg(long, env = "SUPABASE_ACCESS_TOKEN", hide_env_values = true, global = true)]
    pub supabase_access_token: Option<String>,

    /// Gemini API key; AI drafting is disabled without it
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model used for drafting
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub gemini_model: String,

    /// Timeout for outbound HTTP requests, in seconds
    #[arg(long, env = "DEVSTREAK_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// MCP transport
    #[arg(long, env = "DEVSTREAK_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// Bind address for the streamable HTTP transport
    #[arg(long, env = "DEVSTREAK_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    pub http_addr: String,
}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Username for the new profile; prompted for when omitted
    #[arg(long, conflicts_with = "demo")]
    pub username: Option<String>,

    /// Load the sample workspace and sign in as its owner
    #[arg(long)]
    pub demo: bool,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl BackendArgs {
    /// Validate CLI/environment-derived arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("DEVSTREAK_TIMEOUT_SECS must be greater than zero".to_string());
        }
        if self.gemini_model.trim().is_empty() {
            return Err("GEMINI_MODEL cannot be empty".to_string());
        }
        if self.backend == BackendKind::Supabase {
            if non_blank(&self.supabase_url).is_none() {
                return Err("SUPABASE_URL is required for the supabase backend".to_string());
            }
            if non_blank(&self.supabase_anon_key).is_none() {
                return Err("SUPABASE_ANON_KEY is required for the supabase backend".to_string());
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn data_path(&self) -> TrackerResult<PathBuf> {
        match &self.data_file {
            Some(path) => Ok(path.clone()),
            None => FileStore::default_path(),
        }
    }

    pub fn open_file_store(&self) -> TrackerResult<FileStore> {
        let mut store = FileStore::open(self.data_path()?)?;
        store.set_current_user(non_blank(&self.user_id).map(str::to_string));
        Ok(store)
    }

    pub fn supabase_config(&self) -> Option<SupabaseConfig> {
        Some(SupabaseConfig {
            url: non_blank(&self.supabase_url)?.to_string(),
            anon_key: non_blank(&self.supabase_anon_key)?.to_string(),
            access_token: non_blank(&self.supabase_access_token).map(str::to_string),
            timeout: self.timeout(),
        })
    }

    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        Some(GeminiConfig {
            api_key: non_blank(&self.gemini_api_key)?.to_string(),
            model: self.gemini_model.trim().to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: self.timeout(),
        })
    }

    /// Builds the tracker for the selected backend, with AI drafting when a
    /// Gemini key is configured.
    pub fn tracker(&self) -> TrackerResult<Tracker> {
        let tracker = match self.backend {
            BackendKind::File => Tracker::new(self.open_file_store()?),
            BackendKind::Supabase => {
                let config = self
                    .supabase_config()
                    .ok_or_else(|| crate::error::TrackerError::missing_field("SUPABASE_URL / SUPABASE_ANON_KEY"))?;
                Tracker::new(SupabaseStore::new(config)?)
            }
        };
        match self.gemini_config() {
            Some(config) => Ok(tracker.with_drafter(GeminiDrafter::new(config)?)),
            None => {
                tracing::debug!("no Gemini key configured, AI drafting disabled");
                Ok(tracker)
            }
        }
    }
}

impl ServeArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.transport == Transport::Http {
            self.http_addr
                .parse::<SocketAddr>()
                .map_err(|e| format!("Invalid DEVSTREAK_HTTP_ADDR '{}': {e}", self.http_addr))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("devstreak").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn backend_options_are_accepted_after_the_subcommand() {
        let cli = parse(&["stats", "--json", "--backend", "supabase", "--supabase-url", "abc.supabase.co"]);
        assert!(matches!(cli.command, Command::Stats { json: true }));
        assert_eq!(cli.backend.backend, BackendKind::Supabase);
        assert_eq!(
            cli.backend.validate().unwrap_err(),
            "SUPABASE_ANON_KEY is required for the supabase backend"
        );
    }

    #[test]
    fn serve_validates_http_address() {
        let cli = parse(&["serve", "--transport", "http", "--http-addr", "localhost"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(args.validate().is_err());

        let cli = parse(&["serve"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.transport, Transport::Stdio);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn init_username_conflicts_with_demo() {
        let result = Cli::try_parse_from(["devstreak", "init", "--demo", "--username", "alex"]);
        assert!(result.is_err());
    }

    #[test]
    fn file_tracker_signs_in_the_configured_user() {
        let dir = tempfile::tempdir().unwrap();
        let data_file = dir.path().join("data.json");
        let mut store = FileStore::open(&data_file).unwrap();
        let alex = store.create_user("alex_dev").unwrap();

        let path = data_file.to_string_lossy().to_string();
        let cli = parse(&["stats", "--data-file", &path, "--user", &alex.id]);
        let mut backend = cli.backend;
        backend.gemini_api_key = None;
        let tracker = backend.tracker().unwrap();
        assert_eq!(tracker.current_user().unwrap(), alex);
        assert!(!tracker.has_drafter());
    }
}
