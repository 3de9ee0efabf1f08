use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "documind", about = "Document knowledge and chat-context server")]
pub struct Config {
    /// Address to bind the HTTP server on.
    #[arg(long, env = "DOCUMIND_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Directory where uploaded file bytes are persisted.
    #[arg(long, env = "DOCUMIND_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Base URL of the generation backend.
    #[arg(long, env = "DOCUMIND_BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Ceiling for one generation call, in seconds. Generation may stream
    /// slowly, so the default is deliberately generous.
    #[arg(long, env = "DOCUMIND_GENERATION_TIMEOUT", default_value_t = 300)]
    pub generation_timeout_secs: u64,
}
