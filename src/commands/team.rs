use anyhow::Result;
use log::info;
use sqlx::{FromRow, PgExecutor};

use super::Invocation;

#[derive(Debug, Clone, FromRow)]
pub struct Team {
    pub id: i32,
    /// Discord role id of the team.
    pub discord: i64,
}

#[derive(Debug, FromRow)]
pub struct TeamSummary {
    pub discord: i64,
    pub members: i64,
}

impl Team {
    pub async fn create(executor: impl PgExecutor<'_>, server: i64, role: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO teams (server, discord) VALUES ($1, $2)
                    ON CONFLICT (server, discord) DO NOTHING",
        )
        .bind(server)
        .bind(role)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get(executor: impl PgExecutor<'_>, id: i32) -> Result<Team> {
        Ok(
            sqlx::query_as::<_, Team>("SELECT id, discord FROM teams WHERE id = $1")
                .bind(id)
                .fetch_one(executor)
                .await?,
        )
    }

    pub async fn get_by_role(
        executor: impl PgExecutor<'_>,
        server: i64,
        role: i64,
    ) -> Result<Option<Team>> {
        Ok(sqlx::query_as::<_, Team>(
            "SELECT id, discord FROM teams WHERE server = $1 AND discord = $2",
        )
        .bind(server)
        .bind(role)
        .fetch_optional(executor)
        .await?)
    }

    /// Like `get_by_role`, but locks the team row until the transaction ends so
    /// concurrent joins are counted one at a time.
    pub async fn get_by_role_for_update(
        executor: impl PgExecutor<'_>,
        server: i64,
        role: i64,
    ) -> Result<Option<Team>> {
        Ok(sqlx::query_as::<_, Team>(
            "SELECT id, discord FROM teams WHERE server = $1 AND discord = $2 FOR UPDATE",
        )
        .bind(server)
        .bind(role)
        .fetch_optional(executor)
        .await?)
    }

    pub async fn get_all(executor: impl PgExecutor<'_>, server: i64) -> Result<Vec<TeamSummary>> {
        Ok(sqlx::query_as::<_, TeamSummary>(
            "SELECT t.discord, COUNT(p.id) AS members
                 FROM teams t
                    LEFT JOIN players p ON p.team = t.id
                 WHERE t.server = $1
                 GROUP BY t.id, t.discord
                 ORDER BY t.id",
        )
        .bind(server)
        .fetch_all(executor)
        .await?)
    }

    pub async fn delete(executor: impl PgExecutor<'_>, server: i64, role: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM teams WHERE server = $1 AND discord = $2")
            .bind(server)
            .bind(role)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn member_count(&self, executor: impl PgExecutor<'_>) -> Result<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM players WHERE team = $1")
                .bind(self.id)
                .fetch_one(executor)
                .await?,
        )
    }
}

pub(crate) async fn addteam(invocation: &Invocation<'_>) -> Result<String> {
    let Some(role) = invocation.role_arg(1) else {
        return Ok(invocation.usage());
    };
    let pool = &invocation.data.pool;
    if !Team::create(pool, invocation.server(), role).await? {
        return Ok(format!("<@&{}> is already a registered team.", role));
    }
    info!("Server {} registered team {}", invocation.server(), role);
    Ok(format!(
        "<@&{}> is now a registered team. Players can join it with `{}setteam`.",
        role,
        invocation.symbol()
    ))
}

pub(crate) async fn removeteam(invocation: &Invocation<'_>) -> Result<String> {
    let Some(role) = invocation.role_arg(1) else {
        return Ok(invocation.usage());
    };
    let pool = &invocation.data.pool;
    if !Team::delete(pool, invocation.server(), role).await? {
        return Ok(format!("<@&{}> is not a registered team.", role));
    }
    info!("Server {} removed team {}", invocation.server(), role);
    Ok(format!("<@&{}> is no longer a registered team.", role))
}

pub(crate) async fn teams(invocation: &Invocation<'_>) -> Result<String> {
    let teams = Team::get_all(&invocation.data.pool, invocation.server()).await?;
    Ok(list_teams(&teams, invocation.settings.team_size))
}

fn list_teams(teams: &[TeamSummary], team_size: i32) -> String {
    if teams.is_empty() {
        return String::from("No teams have been registered yet.");
    }
    teams
        .iter()
        .map(|t| format!("<@&{}> `{}/{}`", t.discord, t.members, team_size))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ServerSettings;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn create_and_delete_report_affected_rows(pool: PgPool) -> Result<()> {
        ServerSettings::ensure(&pool, 1, "!").await?;
        assert!(!Team::delete(&pool, 1, 100).await?);
        assert!(Team::create(&pool, 1, 100).await?);
        assert!(!Team::create(&pool, 1, 100).await?);
        assert!(Team::delete(&pool, 1, 100).await?);
        assert!(Team::get_by_role(&pool, 1, 100).await?.is_none());
        Ok(())
    }

    #[sqlx::test]
    async fn locked_team_blocks_a_second_join(pool: PgPool) -> Result<()> {
        ServerSettings::ensure(&pool, 1, "!").await?;
        Team::create(&pool, 1, 100).await?;

        let mut first = pool.begin().await?;
        assert!(Team::get_by_role_for_update(&mut first, 1, 100).await?.is_some());

        let mut second = pool.begin().await?;
        sqlx::query("SET LOCAL lock_timeout = '200ms'")
            .execute(&mut second)
            .await?;
        assert!(Team::get_by_role_for_update(&mut second, 1, 100).await.is_err());

        first.rollback().await?;
        Ok(())
    }

    #[test]
    fn lists_teams_with_sizes() {
        let teams = vec![
            TeamSummary {
                discord: 1,
                members: 3,
            },
            TeamSummary {
                discord: 2,
                members: 0,
            },
        ];
        assert_eq!(list_teams(&teams, 5), "<@&1> `3/5`\n<@&2> `0/5`");
    }

    #[test]
    fn empty_team_list() {
        assert_eq!(list_teams(&[], 5), "No teams have been registered yet.");
    }
}
