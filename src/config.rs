use std::path::PathBuf;

pub const DEFAULT_API_HOST: &str = "https://api.openai.com/v1";
pub const DEFAULT_PORT: u16 = 8080;

/// Runtime settings read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the chat-completions API, without a trailing slash.
    pub api_host: String,
    /// `None` when `OPENAI_API_KEY` is unset or blank.
    pub api_key: Option<String>,
    pub port: u16,
    /// Directory of static site content served for non-API paths.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_host = non_blank("OPENAI_API_HOST")
            .map(|h| h.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        let port = non_blank("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            api_host,
            api_key: non_blank("OPENAI_API_KEY").map(|k| k.trim().to_string()),
            port,
            static_dir: non_blank("STATIC_DIR").map(PathBuf::from),
        }
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_host)
    }
}
