use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "Config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub token: String,
    pub database: DatabaseConfig,
    /// File that log output is appended to. Logs go to stderr when unset.
    #[serde(default)]
    pub log: Option<PathBuf>,
    /// Command symbol given to servers the bot has not seen before.
    #[serde(default = "default_symbol")]
    pub default_symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Full connection string, takes precedence over the fields above.
    #[serde(skip)]
    pub url: Option<String>,
}

fn default_symbol() -> String {
    String::from("!")
}

fn default_port() -> u16 {
    5432
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Config> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        Config::from_yaml(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Loads the YAML config named by `CONFIG_PATH` (or `Config.yaml`) and
    /// applies `DISCORD_TOKEN` / `DATABASE_URL` overrides from the environment.
    pub fn load() -> Result<Config> {
        dotenvy::dotenv().ok();
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Config::from_file(path)?;
        if let Ok(token) = env::var("DISCORD_TOKEN") {
            config.token = token;
        }
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }
        Ok(config)
    }
}
