use anyhow::Result;
use log::info;
use sqlx::{FromRow, PgExecutor};

use super::player::Player;
use super::team::Team;
use super::Invocation;

#[derive(Debug, Clone, FromRow)]
pub struct Match {
    pub id: i32,
    pub team_one: i32,
}

/// A match with its teams resolved to role ids.
#[derive(Debug, Clone, FromRow)]
pub struct MatchView {
    pub id: i32,
    pub team_one_role: i64,
    pub team_two_role: i64,
    pub team_one_score: Option<i32>,
    pub team_two_score: Option<i32>,
}

impl Match {
    /// Adds a match between two registered teams. Returns false if either
    /// role is not a registered team in `server`.
    pub async fn create(
        executor: impl PgExecutor<'_>,
        server: i64,
        season: i32,
        round: i32,
        team_one_role: i64,
        team_two_role: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO matches (server, season, round, team_one, team_two)
                 SELECT $1, $2, $3, a.id, b.id
                 FROM teams a, teams b
                 WHERE a.server = $1 AND a.discord = $4 AND b.server = $1 AND b.discord = $5",
        )
        .bind(server)
        .bind(season)
        .bind(round)
        .bind(team_one_role)
        .bind(team_two_role)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// The match between two teams in the given round, in either team order.
    pub async fn get_between(
        executor: impl PgExecutor<'_>,
        server: i64,
        season: i32,
        round: i32,
        team_a: i32,
        team_b: i32,
    ) -> Result<Option<Match>> {
        Ok(sqlx::query_as::<_, Match>(
            "SELECT id, team_one
                 FROM matches
                 WHERE server = $1 AND season = $2 AND round = $3
                    AND ((team_one = $4 AND team_two = $5) OR (team_one = $5 AND team_two = $4))
                 ORDER BY id
                 LIMIT 1",
        )
        .bind(server)
        .bind(season)
        .bind(round)
        .bind(team_a)
        .bind(team_b)
        .fetch_optional(executor)
        .await?)
    }

    /// Records the scores of a match. Scores can only be set once, a second
    /// attempt changes nothing and returns false.
    pub async fn set_score(
        executor: impl PgExecutor<'_>,
        id: i32,
        team_one_score: i32,
        team_two_score: i32,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE matches SET team_one_score = $2, team_two_score = $3
                 WHERE id = $1 AND team_one_score IS NULL AND team_two_score IS NULL",
        )
        .bind(id)
        .bind(team_one_score)
        .bind(team_two_score)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get_round(
        executor: impl PgExecutor<'_>,
        server: i64,
        season: i32,
        round: i32,
    ) -> Result<Vec<MatchView>> {
        Ok(sqlx::query_as::<_, MatchView>(
            "SELECT m.id, a.discord AS team_one_role, b.discord AS team_two_role,
                    m.team_one_score, m.team_two_score
                 FROM matches m
                    JOIN teams a ON a.id = m.team_one
                    JOIN teams b ON b.id = m.team_two
                 WHERE m.server = $1 AND m.season = $2 AND m.round = $3
                 ORDER BY m.id",
        )
        .bind(server)
        .bind(season)
        .bind(round)
        .fetch_all(executor)
        .await?)
    }

    /// Orders a reported score to match the match's team order.
    pub fn orient(&self, reporting_team: i32, ours: i32, theirs: i32) -> (i32, i32) {
        if self.team_one == reporting_team {
            (ours, theirs)
        } else {
            (theirs, ours)
        }
    }
}

pub(crate) async fn addmatch(invocation: &Invocation<'_>) -> Result<String> {
    let (Some(team_one), Some(team_two)) = (invocation.role_arg(1), invocation.role_arg(2)) else {
        return Ok(invocation.usage());
    };
    if team_one == team_two {
        return Ok(String::from("A team cannot play against itself."));
    }
    let settings = &invocation.settings;
    let server = invocation.server();
    let mut transaction = invocation.data.pool.begin().await?;
    let (Some(one), Some(two)) = (
        Team::get_by_role(&mut transaction, server, team_one).await?,
        Team::get_by_role(&mut transaction, server, team_two).await?,
    ) else {
        return Ok(String::from(
            "Both roles need to be registered teams before they can play a match.",
        ));
    };
    let existing = Match::get_between(
        &mut transaction,
        server,
        settings.current_season,
        settings.current_round,
        one.id,
        two.id,
    )
    .await?;
    if let Some(existing) = existing {
        return Ok(format!(
            "<@&{}> and <@&{}> already play match `#{}` this round.",
            team_one, team_two, existing.id
        ));
    }
    let created = Match::create(
        &mut transaction,
        server,
        settings.current_season,
        settings.current_round,
        team_one,
        team_two,
    )
    .await?;
    if !created {
        return Ok(String::from(super::ERROR_MESSAGE));
    }
    transaction.commit().await?;
    info!(
        "Server {} added match {} vs {} to season {} round {}",
        server, team_one, team_two, settings.current_season, settings.current_round
    );
    Ok(format!(
        "Added <@&{}> vs <@&{}> to round {}.",
        team_one, team_two, settings.current_round
    ))
}

pub(crate) async fn score(invocation: &Invocation<'_>) -> Result<String> {
    let (Ok(ours), Ok(theirs), Some(opponent_role)) = (
        invocation.args[1].parse::<u16>(),
        invocation.args[2].parse::<u16>(),
        invocation.role_arg(3),
    ) else {
        return Ok(invocation.usage());
    };
    let (ours, theirs) = (i32::from(ours), i32::from(theirs));
    let settings = &invocation.settings;
    let server = invocation.server();
    let author = invocation.author();
    let pool = &invocation.data.pool;

    let Some(player) = Player::get(pool, server, author).await? else {
        return Ok(format!(
            "<@{}> you are not registered, use `{}addplayer your-ign` first.",
            author,
            invocation.symbol()
        ));
    };
    let Some(team_id) = player.team else {
        return Ok(format!("<@{}> you are not on a team.", author));
    };
    let team = Team::get(pool, team_id).await?;
    let Some(opponent) = Team::get_by_role(pool, server, opponent_role).await? else {
        return Ok(format!("<@&{}> is not a registered team.", opponent_role));
    };
    if opponent.id == team.id {
        return Ok(String::from("A team cannot play against itself."));
    }
    let Some(found) = Match::get_between(
        pool,
        server,
        settings.current_season,
        settings.current_round,
        team.id,
        opponent.id,
    )
    .await?
    else {
        return Ok(format!(
            "<@&{}> and <@&{}> have no match in round {}.",
            team.discord, opponent.discord, settings.current_round
        ));
    };
    let (team_one_score, team_two_score) = found.orient(team.id, ours, theirs);
    if !Match::set_score(pool, found.id, team_one_score, team_two_score).await? {
        return Ok(format!(
            "The score of match `#{}` has already been recorded.",
            found.id
        ));
    }
    info!(
        "Server {} match {} scored {}-{} by {}",
        server, found.id, team_one_score, team_two_score, author
    );
    Ok(format!(
        "Recorded <@&{}> **{}** - **{}** <@&{}> for round {}.",
        team.discord, ours, theirs, opponent.discord, settings.current_round
    ))
}

pub(crate) async fn matches(invocation: &Invocation<'_>) -> Result<String> {
    let settings = &invocation.settings;
    let matches = Match::get_round(
        &invocation.data.pool,
        invocation.server(),
        settings.current_season,
        settings.current_round,
    )
    .await?;
    Ok(list_matches(
        settings.current_season,
        settings.current_round,
        &matches,
    ))
}

fn format_match(m: &MatchView) -> String {
    match (m.team_one_score, m.team_two_score) {
        (Some(one), Some(two)) => format!(
            "`#{}` <@&{}> **`{}`** - **`{}`** <@&{}>",
            m.id, m.team_one_role, one, two, m.team_two_role
        ),
        _ => format!(
            "`#{}` <@&{}> vs <@&{}>",
            m.id, m.team_one_role, m.team_two_role
        ),
    }
}

fn list_matches(season: i32, round: i32, matches: &[MatchView]) -> String {
    if matches.is_empty() {
        return format!("No matches were found for season {} round {}.", season, round);
    }
    let mut s = format!("**Season {} round {}**\n", season, round);
    for m in matches {
        s.push_str(&format_match(m));
        s.push('\n');
    }
    s
}
