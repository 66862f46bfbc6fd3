use anyhow::Result;
use sqlx::{FromRow, PgExecutor};

use super::team::Team;
use super::Invocation;

#[derive(Debug, Clone, FromRow)]
pub struct Player {
    pub discord: i64,
    pub ign: String,
    pub team: Option<i32>,
}

impl Player {
    /// Registers a player without a team. Returns false if they are already registered.
    pub async fn add(
        executor: impl PgExecutor<'_>,
        server: i64,
        discord: i64,
        ign: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO players (server, discord, ign) VALUES ($1, $2, $3)
                    ON CONFLICT (server, discord) DO NOTHING",
        )
        .bind(server)
        .bind(discord)
        .bind(ign)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn change_ign(
        executor: impl PgExecutor<'_>,
        server: i64,
        discord: i64,
        ign: &str,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE players SET ign = $3 WHERE server = $1 AND discord = $2")
                .bind(server)
                .bind(discord)
                .bind(ign)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Moves a player onto the team owning `team_role`. Nothing changes unless
    /// both the player and the team are registered in `server`.
    pub async fn set_team(
        executor: impl PgExecutor<'_>,
        server: i64,
        discord: i64,
        team_role: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE players p SET team = t.id
                 FROM teams t
                 WHERE p.server = $1 AND t.server = p.server AND p.discord = $2 AND t.discord = $3",
        )
        .bind(server)
        .bind(discord)
        .bind(team_role)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get(
        executor: impl PgExecutor<'_>,
        server: i64,
        discord: i64,
    ) -> Result<Option<Player>> {
        Ok(sqlx::query_as::<_, Player>(
            "SELECT discord, ign, team FROM players WHERE server = $1 AND discord = $2",
        )
        .bind(server)
        .bind(discord)
        .fetch_optional(executor)
        .await?)
    }

    pub async fn get_by_team(
        executor: impl PgExecutor<'_>,
        server: i64,
        team_role: i64,
    ) -> Result<Vec<Player>> {
        Ok(sqlx::query_as::<_, Player>(
            "SELECT p.discord, p.ign, p.team
                 FROM players p
                    JOIN teams t ON t.id = p.team
                 WHERE t.server = $1 AND t.discord = $2
                 ORDER BY p.ign",
        )
        .bind(server)
        .bind(team_role)
        .fetch_all(executor)
        .await?)
    }
}

pub(crate) async fn addplayer(invocation: &Invocation<'_>) -> Result<String> {
    let ign = &invocation.args[1];
    let author = invocation.author();
    if Player::add(&invocation.data.pool, invocation.server(), author, ign).await? {
        Ok(format!(
            "<@{}> has been registered as **{}**. Join a team with `{}setteam @team-role`.",
            author,
            ign,
            invocation.symbol()
        ))
    } else {
        Ok(format!(
            "<@{}> is already registered, use `{}changeign` to change your ign.",
            author,
            invocation.symbol()
        ))
    }
}

pub(crate) async fn changeign(invocation: &Invocation<'_>) -> Result<String> {
    let ign = &invocation.args[1];
    let author = invocation.author();
    if Player::change_ign(&invocation.data.pool, invocation.server(), author, ign).await? {
        Ok(format!("<@{}> your ign is now **{}**.", author, ign))
    } else {
        Ok(not_registered(author, invocation.symbol()))
    }
}

pub(crate) async fn mentionteam(invocation: &Invocation<'_>) -> Result<String> {
    let Some(role) = invocation.role_arg(1) else {
        return Ok(invocation.usage());
    };
    let players = Player::get_by_team(&invocation.data.pool, invocation.server(), role).await?;
    Ok(mention_players(role, &players))
}

pub(crate) async fn setteam(invocation: &Invocation<'_>) -> Result<String> {
    let Some(role) = invocation.role_arg(1) else {
        return Ok(invocation.usage());
    };
    let server = invocation.server();
    let author = invocation.author();
    let mut transaction = invocation.data.pool.begin().await?;

    let Some(team) = Team::get_by_role_for_update(&mut transaction, server, role).await? else {
        return Ok(format!("<@&{}> is not a registered team.", role));
    };
    let Some(player) = Player::get(&mut transaction, server, author).await? else {
        return Ok(not_registered(author, invocation.symbol()));
    };
    if player.team == Some(team.id) {
        return Ok(format!("<@{}> is already on <@&{}>.", author, role));
    }
    let members = team.member_count(&mut transaction).await?;
    if members >= i64::from(invocation.settings.team_size) {
        return Ok(format!(
            "<@&{}> already has {} players, the maximum team size.",
            role, members
        ));
    }
    if !Player::set_team(&mut transaction, server, author, role).await? {
        return Ok(String::from(super::ERROR_MESSAGE));
    }
    transaction.commit().await?;
    Ok(format!("<@{}> joined <@&{}>.", author, role))
}

fn not_registered(author: i64, symbol: &str) -> String {
    format!(
        "<@{}> you are not registered, use `{}addplayer your-ign` first.",
        author, symbol
    )
}

fn mention_players(role: i64, players: &[Player]) -> String {
    if players.is_empty() {
        return format!("There are no players on <@&{}>.", role);
    }
    let mentions = players
        .iter()
        .map(|p| format!("<@{}> ({})", p.discord, p.ign))
        .collect::<Vec<_>>()
        .join(", ");
    format!("<@&{}>: {}", role, mentions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ServerSettings;
    use sqlx::PgPool;

    fn player(discord: i64, ign: &str) -> Player {
        Player {
            discord,
            ign: ign.to_string(),
            team: Some(1),
        }
    }

    #[test]
    fn mentions_every_player() {
        let players = vec![player(10, "alpha"), player(11, "bravo two")];
        assert_eq!(
            mention_players(7, &players),
            "<@&7>: <@10> (alpha), <@11> (bravo two)"
        );
    }

    #[test]
    fn empty_team_mention() {
        assert_eq!(mention_players(7, &[]), "There are no players on <@&7>.");
    }

    #[test]
    fn not_registered_points_to_addplayer() {
        assert!(not_registered(3, "?").contains("`?addplayer your-ign`"));
    }

    #[sqlx::test]
    async fn duplicate_registration_is_rejected(pool: PgPool) -> Result<()> {
        ServerSettings::ensure(&pool, 1, "!").await?;
        assert!(Player::add(&pool, 1, 10, "alpha").await?);
        assert!(!Player::add(&pool, 1, 10, "other").await?);
        let player = Player::get(&pool, 1, 10).await?.expect("registered player");
        assert_eq!(player.ign, "alpha");
        assert_eq!(player.team, None);
        Ok(())
    }

    #[sqlx::test]
    async fn changing_ign_needs_registration(pool: PgPool) -> Result<()> {
        ServerSettings::ensure(&pool, 1, "!").await?;
        assert!(!Player::change_ign(&pool, 1, 10, "alpha").await?);
        Player::add(&pool, 1, 10, "alpha").await?;
        assert!(Player::change_ign(&pool, 1, 10, "bravo").await?);
        Ok(())
    }

    #[sqlx::test]
    async fn set_team_needs_registered_team(pool: PgPool) -> Result<()> {
        ServerSettings::ensure(&pool, 1, "!").await?;
        Player::add(&pool, 1, 10, "alpha").await?;
        assert!(!Player::set_team(&pool, 1, 10, 100).await?);

        Team::create(&pool, 1, 100).await?;
        assert!(Player::set_team(&pool, 1, 10, 100).await?);
        assert!(!Player::set_team(&pool, 1, 11, 100).await?);

        let players = Player::get_by_team(&pool, 1, 100).await?;
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].discord, 10);
        Ok(())
    }
}
