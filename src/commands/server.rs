use anyhow::{anyhow, Result};
use log::info;
use sqlx::PgExecutor;

use super::{Invocation, ERROR_MESSAGE};
use crate::settings::{ServerSettings, Setting};
use crate::Data;

impl ServerSettings {
    pub async fn get_all(executor: impl PgExecutor<'_>) -> Result<Vec<ServerSettings>> {
        Ok(sqlx::query_as::<_, ServerSettings>(
            "SELECT server, c_symbol, game_type, current_season, current_round, admin_role, team_size
                 FROM servers",
        )
        .fetch_all(executor)
        .await?)
    }

    pub async fn get(executor: impl PgExecutor<'_>, server: i64) -> Result<Option<ServerSettings>> {
        Ok(sqlx::query_as::<_, ServerSettings>(
            "SELECT server, c_symbol, game_type, current_season, current_round, admin_role, team_size
                 FROM servers
                 WHERE server = $1",
        )
        .bind(server)
        .fetch_optional(executor)
        .await?)
    }

    /// Inserts default settings for `server`. Returns false if it already had a row.
    pub async fn ensure(executor: impl PgExecutor<'_>, server: i64, c_symbol: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO servers (server, c_symbol) VALUES ($1, $2)
                    ON CONFLICT (server) DO NOTHING",
        )
        .bind(server)
        .bind(c_symbol)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update(executor: impl PgExecutor<'_>, server: i64, setting: &Setting) -> Result<bool> {
        let query = match setting {
            Setting::CommandSymbol(symbol) => {
                sqlx::query("UPDATE servers SET c_symbol = $1 WHERE server = $2").bind(symbol)
            }
            Setting::GameType(game) => {
                sqlx::query("UPDATE servers SET game_type = $1 WHERE server = $2").bind(game)
            }
            Setting::Season(season) => {
                sqlx::query("UPDATE servers SET current_season = $1 WHERE server = $2").bind(season)
            }
            Setting::Round(round) => {
                sqlx::query("UPDATE servers SET current_round = $1 WHERE server = $2").bind(round)
            }
            Setting::AdminRole(role) => {
                sqlx::query("UPDATE servers SET admin_role = $1 WHERE server = $2").bind(role)
            }
            Setting::TeamSize(size) => {
                sqlx::query("UPDATE servers SET team_size = $1 WHERE server = $2").bind(size)
            }
        };
        let result = query.bind(server).execute(executor).await?;
        Ok(result.rows_affected() == 1)
    }
}

/// Makes sure `server` has a settings row and caches it.
pub(crate) async fn register_server(data: &Data, server: i64) -> Result<ServerSettings> {
    if ServerSettings::ensure(&data.pool, server, &data.default_symbol).await? {
        info!("Registered new server {}", server);
    }
    let settings = ServerSettings::get(&data.pool, server)
        .await?
        .ok_or_else(|| anyhow!("settings for server {} missing after insert", server))?;
    data.settings.insert(settings.clone()).await;
    Ok(settings)
}

async fn apply_setting(invocation: &Invocation<'_>, setting: Setting) -> Result<String> {
    let data = invocation.data;
    let server = invocation.server();
    if !ServerSettings::update(&data.pool, server, &setting).await? {
        return Ok(String::from(ERROR_MESSAGE));
    }
    data.settings.update(server, &setting).await;
    info!("Server {} set {} to {:?}", server, setting.label(), setting);
    Ok(format!(
        "The {} is now {}.",
        setting.label(),
        setting.display_value()
    ))
}

async fn apply_parsed(
    invocation: &Invocation<'_>,
    parse: fn(&str) -> Result<Setting>,
) -> Result<String> {
    match parse(&invocation.args[1]) {
        Ok(setting) => apply_setting(invocation, setting).await,
        Err(err) => Ok(format!("<@{}> {}", invocation.author(), err)),
    }
}

pub(crate) async fn setcommandsymbol(invocation: &Invocation<'_>) -> Result<String> {
    apply_parsed(invocation, Setting::command_symbol).await
}

pub(crate) async fn setgametype(invocation: &Invocation<'_>) -> Result<String> {
    let game = invocation.args[1].clone();
    apply_setting(invocation, Setting::GameType(game)).await
}

pub(crate) async fn setseason(invocation: &Invocation<'_>) -> Result<String> {
    apply_parsed(invocation, Setting::season).await
}

pub(crate) async fn setround(invocation: &Invocation<'_>) -> Result<String> {
    apply_parsed(invocation, Setting::round).await
}

pub(crate) async fn setteamsize(invocation: &Invocation<'_>) -> Result<String> {
    apply_parsed(invocation, Setting::team_size).await
}

pub(crate) async fn setadminrole(invocation: &Invocation<'_>) -> Result<String> {
    let Some(role) = invocation.role_arg(1) else {
        return Ok(invocation.usage());
    };
    apply_setting(invocation, Setting::AdminRole(role)).await
}

pub(crate) async fn settings(invocation: &Invocation<'_>) -> Result<String> {
    Ok(describe(&invocation.settings))
}

fn describe(settings: &ServerSettings) -> String {
    let admin_role = match settings.admin_role {
        Some(role) => format!("<@&{}>", role),
        None => String::from("none, the server owner"),
    };
    format!(
        "Command symbol: `{}`\nGame: {}\nSeason: {}\nRound: {}\nTeam size: {}\nAdmin role: {}",
        settings.c_symbol,
        settings.game_type.as_deref().unwrap_or("not set"),
        settings.current_season,
        settings.current_round,
        settings.team_size,
        admin_role
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_defaults() {
        let text = describe(&ServerSettings::new(1, "!"));
        assert!(text.contains("Command symbol: `!`"));
        assert!(text.contains("Game: not set"));
        assert!(text.contains("Admin role: none"));
    }

    #[test]
    fn describes_admin_role() {
        let mut settings = ServerSettings::new(1, "!");
        settings.admin_role = Some(99);
        assert!(describe(&settings).contains("Admin role: <@&99>"));
    }
}
