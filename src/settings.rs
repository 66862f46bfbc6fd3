use anyhow::{anyhow, Result};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ServerSettings {
    pub server: i64,
    pub c_symbol: String,
    pub game_type: Option<String>,
    pub current_season: i32,
    pub current_round: i32,
    pub admin_role: Option<i64>,
    pub team_size: i32,
}

impl ServerSettings {
    #[cfg(test)]
    pub fn new(server: i64, c_symbol: impl Into<String>) -> ServerSettings {
        ServerSettings {
            server,
            c_symbol: c_symbol.into(),
            game_type: None,
            current_season: 1,
            current_round: 1,
            admin_role: None,
            team_size: 5,
        }
    }
}

/// A single server setting together with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    CommandSymbol(String),
    GameType(String),
    Season(i32),
    Round(i32),
    AdminRole(i64),
    TeamSize(i32),
}

impl Setting {
    pub fn command_symbol(value: &str) -> Result<Setting> {
        if value.is_empty()
            || value.chars().count() > 3
            || value.contains('"')
            || value.chars().any(char::is_whitespace)
        {
            return Err(anyhow!(
                "a command symbol is 1 to 3 characters long and may not contain quotes or spaces"
            ));
        }
        Ok(Setting::CommandSymbol(value.to_string()))
    }

    pub fn season(value: &str) -> Result<Setting> {
        Ok(Setting::Season(positive(value)?))
    }

    pub fn round(value: &str) -> Result<Setting> {
        Ok(Setting::Round(positive(value)?))
    }

    pub fn team_size(value: &str) -> Result<Setting> {
        Ok(Setting::TeamSize(positive(value)?))
    }

    pub fn apply(&self, settings: &mut ServerSettings) {
        match self {
            Setting::CommandSymbol(symbol) => settings.c_symbol = symbol.clone(),
            Setting::GameType(game) => settings.game_type = Some(game.clone()),
            Setting::Season(season) => settings.current_season = *season,
            Setting::Round(round) => settings.current_round = *round,
            Setting::AdminRole(role) => settings.admin_role = Some(*role),
            Setting::TeamSize(size) => settings.team_size = *size,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Setting::CommandSymbol(_) => "command symbol",
            Setting::GameType(_) => "game type",
            Setting::Season(_) => "season",
            Setting::Round(_) => "round",
            Setting::AdminRole(_) => "admin role",
            Setting::TeamSize(_) => "team size",
        }
    }

    pub fn display_value(&self) -> String {
        match self {
            Setting::CommandSymbol(symbol) => format!("`{}`", symbol),
            Setting::GameType(game) => game.clone(),
            Setting::Season(n) | Setting::Round(n) | Setting::TeamSize(n) => n.to_string(),
            Setting::AdminRole(role) => format!("<@&{}>", role),
        }
    }
}

fn positive(value: &str) -> Result<i32> {
    match value.parse::<i32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("`{}` is not a positive number", value)),
    }
}

/// Per-server settings, keyed by guild id.
#[derive(Default)]
pub struct SettingsCache {
    servers: RwLock<HashMap<i64, ServerSettings>>,
}

impl SettingsCache {
    pub async fn load(pool: &PgPool) -> Result<SettingsCache> {
        let rows = ServerSettings::get_all(pool).await?;
        let servers = rows.into_iter().map(|s| (s.server, s)).collect();
        Ok(SettingsCache {
            servers: RwLock::new(servers),
        })
    }

    pub async fn get(&self, server: i64) -> Option<ServerSettings> {
        self.servers.read().await.get(&server).cloned()
    }

    pub async fn insert(&self, settings: ServerSettings) {
        self.servers.write().await.insert(settings.server, settings);
    }

    pub async fn update(&self, server: i64, setting: &Setting) {
        if let Some(settings) = self.servers.write().await.get_mut(&server) {
            setting.apply(settings);
        }
    }

    pub async fn server_count(&self) -> usize {
        self.servers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_settings() {
        let mut settings = ServerSettings::new(1, "!");
        Setting::command_symbol("$").unwrap().apply(&mut settings);
        Setting::round("3").unwrap().apply(&mut settings);
        Setting::AdminRole(42).apply(&mut settings);
        Setting::GameType("rocket league".to_string()).apply(&mut settings);
        assert_eq!(settings.c_symbol, "$");
        assert_eq!(settings.current_round, 3);
        assert_eq!(settings.admin_role, Some(42));
        assert_eq!(settings.game_type.as_deref(), Some("rocket league"));
        assert_eq!(settings.current_season, 1);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Setting::command_symbol("").is_err());
        assert!(Setting::command_symbol("!!!!").is_err());
        assert!(Setting::command_symbol("\"").is_err());
        assert!(Setting::command_symbol("a b").is_err());
        assert!(Setting::command_symbol("!\n").is_err());
        assert!(Setting::season("0").is_err());
        assert!(Setting::team_size("-2").is_err());
        assert!(Setting::round("two").is_err());
        assert_eq!(Setting::team_size("4").unwrap(), Setting::TeamSize(4));
    }

    #[tokio::test]
    async fn cache_updates_in_place() {
        let cache = SettingsCache::default();
        cache.insert(ServerSettings::new(7, "!")).await;
        cache.update(7, &Setting::Season(2)).await;
        cache.update(8, &Setting::Season(9)).await;
        assert_eq!(cache.get(7).await.unwrap().current_season, 2);
        assert!(cache.get(8).await.is_none());
        assert_eq!(cache.server_count().await, 1);
    }
}
