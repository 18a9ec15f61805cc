use std::env;
use std::path::PathBuf;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_API_KEY: &str = "dev-secret-key";

/// Runtime settings, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// `BACKEND_ADDR`: listen address.
    pub addr: String,
    /// `BACKEND_DATA_DIR`: directory holding the anchor database (ignored by git).
    pub data_dir: PathBuf,
    /// `API_KEY`: shared secret required on anchor writes.
    pub api_key: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            addr: env::var("BACKEND_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            data_dir: env::var("BACKEND_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            // In production, this should be a strong secret.
            api_key: env::var("API_KEY").unwrap_or_else(|_| DEFAULT_API_KEY.to_string()),
        }
    }

    pub fn db_url(&self) -> String {
        let db_path = self.data_dir.join("anchors.sqlite");
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }
}
