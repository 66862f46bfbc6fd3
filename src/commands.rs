use anyhow::Result;
use log::{debug, error};
use regex::Regex;
use serenity::client::Context;
use serenity::model::channel::Message;
use serenity::model::id::GuildId;
use serenity::utils::MessageBuilder;
use std::str::FromStr;
use std::sync::OnceLock;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::args::tokenize;
use crate::settings::ServerSettings;
use crate::Data;

pub(crate) mod matches;
pub(crate) mod player;
pub(crate) mod server;
pub(crate) mod team;

pub(crate) const ERROR_MESSAGE: &str =
    "There was an error processing your command, please try again later or contact an admin.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub(crate) enum Command {
    Help,
    AddPlayer,
    ChangeIgn,
    MentionTeam,
    SetTeam,
    Teams,
    Matches,
    Score,
    Settings,
    SetCommandSymbol,
    SetGameType,
    SetSeason,
    SetRound,
    SetAdminRole,
    SetTeamSize,
    AddTeam,
    RemoveTeam,
    AddMatch,
}

impl Command {
    pub(crate) fn name(self) -> &'static str {
        self.into()
    }

    /// Placeholder arguments shown in help and usage messages.
    pub(crate) fn usage(self) -> &'static str {
        match self {
            Command::Help | Command::Teams | Command::Matches | Command::Settings => "",
            Command::AddPlayer | Command::ChangeIgn => "your-ign",
            Command::MentionTeam | Command::SetTeam | Command::AddTeam | Command::RemoveTeam => {
                "@team-role"
            }
            Command::Score => "your-score their-score @opponent-role",
            Command::SetCommandSymbol => "symbol",
            Command::SetGameType => "game-type",
            Command::SetSeason => "season",
            Command::SetRound => "round",
            Command::SetAdminRole => "@admin-role",
            Command::SetTeamSize => "players-per-team",
            Command::AddMatch => "@team-one @team-two",
        }
    }

    pub(crate) fn description(self) -> &'static str {
        match self {
            Command::Help => "DMs you this list of commands",
            Command::AddPlayer => "register yourself as a player, you won't have a team until you set one",
            Command::ChangeIgn => "change your registered in-game name",
            Command::MentionTeam => "mention every player on a team",
            Command::SetTeam => "join a registered team",
            Command::Teams => "list the registered teams",
            Command::Matches => "list the matches of the current round",
            Command::Score => "report the score of your team's match against another team this round",
            Command::Settings => "show this server's settings",
            Command::SetCommandSymbol => "change the command symbol",
            Command::SetGameType => "set the game being played",
            Command::SetSeason => "set the current season",
            Command::SetRound => "set the current round",
            Command::SetAdminRole => "set the role allowed to use admin commands",
            Command::SetTeamSize => "set the maximum number of players per team",
            Command::AddTeam => "register a role as a team",
            Command::RemoveTeam => "unregister a team, its players become teamless",
            Command::AddMatch => "add a match between two teams to the current round",
        }
    }

    pub(crate) fn admin_only(self) -> bool {
        matches!(
            self,
            Command::SetCommandSymbol
                | Command::SetGameType
                | Command::SetSeason
                | Command::SetRound
                | Command::SetAdminRole
                | Command::SetTeamSize
                | Command::AddTeam
                | Command::RemoveTeam
                | Command::AddMatch
        )
    }

    /// Number of tokens a correct invocation has, the command itself included.
    pub(crate) fn arg_count(self) -> usize {
        self.usage().split_whitespace().count() + 1
    }
}

/// Returns the command and its arguments if `content` is a command under `symbol`.
pub(crate) fn parse_command(content: &str, symbol: &str) -> Option<(Command, Vec<String>)> {
    if symbol.is_empty() || !content.starts_with(symbol) {
        return None;
    }
    let args = tokenize(content);
    let name = args.first()?.strip_prefix(symbol)?;
    let command = Command::from_str(name).ok()?;
    Some((command, args))
}

/// Extracts the role id from a `<@&id>` mention.
pub(crate) fn role_mention(arg: &str) -> Option<i64> {
    static ROLE_MENTION: OnceLock<Regex> = OnceLock::new();
    let regex = ROLE_MENTION.get_or_init(|| Regex::new(r"^<@&(\d+)>$").expect("valid regex"));
    let id = regex.captures(arg)?.get(1)?.as_str();
    id.parse::<u64>().ok().map(|id| id as i64)
}

pub(crate) fn usage_message(author: i64, symbol: &str, command: Command) -> String {
    let mut usage = format!(
        "<@{}> did not use the command properly.  To use, use the following format:\n`{}{}",
        author,
        symbol,
        command.name()
    );
    if !command.usage().is_empty() {
        usage.push(' ');
        usage.push_str(command.usage());
    }
    usage.push('`');
    match command {
        Command::AddPlayer | Command::ChangeIgn => usage.push_str(
            "\nIf your ign is multiple words, place it in quotes, for example `\"your ign\"`",
        ),
        Command::MentionTeam | Command::SetTeam | Command::AddTeam | Command::RemoveTeam => {
            usage.push_str(" where @team-role is the mention of the team")
        }
        _ => {}
    }
    usage
}

pub(crate) fn help_text(symbol: &str, server_name: &str, admin: bool) -> String {
    let mut builder = MessageBuilder::new();
    builder
        .push("The bot has the following commands that it uses. The ")
        .push_bold_safe(server_name)
        .push(" server uses ")
        .push_mono(symbol)
        .push_line(
            " as its command symbol, but beware as other servers may use a different symbol.",
        );
    let line = |builder: &mut MessageBuilder, command: Command| {
        let mut invocation = format!("{}{}", symbol, command.name());
        if !command.usage().is_empty() {
            invocation.push(' ');
            invocation.push_str(command.usage());
        }
        builder
            .push_mono(invocation)
            .push(" - ")
            .push_line(command.description());
    };
    for command in Command::iter().filter(|c| !c.admin_only()) {
        line(&mut builder, command);
    }
    if admin {
        builder.push_line("").push_italic_line("These are privileged admin commands:");
        for command in Command::iter().filter(|c| c.admin_only()) {
            line(&mut builder, command);
        }
    }
    builder.build()
}

/// Everything a command handler needs to know about one invocation.
pub(crate) struct Invocation<'a> {
    pub(crate) context: &'a Context,
    pub(crate) message: &'a Message,
    pub(crate) data: &'a Data,
    pub(crate) command: Command,
    pub(crate) settings: ServerSettings,
    pub(crate) args: Vec<String>,
}

impl Invocation<'_> {
    pub(crate) fn server(&self) -> i64 {
        self.settings.server
    }

    pub(crate) fn author(&self) -> i64 {
        self.message.author.id.0 as i64
    }

    pub(crate) fn symbol(&self) -> &str {
        &self.settings.c_symbol
    }

    pub(crate) fn usage(&self) -> String {
        usage_message(self.author(), self.symbol(), self.command)
    }

    pub(crate) fn role_arg(&self, index: usize) -> Option<i64> {
        self.args.get(index).and_then(|arg| role_mention(arg))
    }

    /// The guild owner is always an admin, as are members holding the
    /// server's admin role.
    pub(crate) async fn is_admin(&self) -> Result<bool> {
        let guild = GuildId(self.server() as u64)
            .to_partial_guild(self.context)
            .await?;
        let owner = guild.owner_id.0 as i64;
        let author = self.author();
        let roles: Vec<i64> = match self.settings.admin_role {
            Some(_) if owner != author => {
                let member = self.message.member(self.context).await?;
                member.roles.iter().map(|r| r.0 as i64).collect()
            }
            _ => Vec::new(),
        };
        Ok(has_admin_access(owner, author, self.settings.admin_role, &roles))
    }
}

pub(crate) fn has_admin_access(
    owner: i64,
    author: i64,
    admin_role: Option<i64>,
    roles: &[i64],
) -> bool {
    if owner == author {
        return true;
    }
    match admin_role {
        Some(role) => roles.contains(&role),
        None => false,
    }
}

pub(crate) async fn handle_message(context: &Context, message: &Message, data: &Data) -> Result<()> {
    if message.author.bot {
        return Ok(());
    }
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };
    let server = guild_id.0 as i64;
    let settings = match data.settings.get(server).await {
        Some(settings) => settings,
        None => server::register_server(data, server).await?,
    };
    let Some((command, args)) = parse_command(&message.content, &settings.c_symbol) else {
        return Ok(());
    };
    debug!(
        "{} invoked {} in server {} with {:?}",
        message.author.id,
        command.name(),
        server,
        args
    );
    let invocation = Invocation {
        context,
        message,
        data,
        command,
        settings,
        args,
    };
    let reply = match run(&invocation).await {
        Ok(reply) => reply,
        Err(err) => {
            error!("{} failed in server {}: {:#?}", command.name(), server, err);
            String::from(ERROR_MESSAGE)
        }
    };
    message.channel_id.say(context, reply).await?;
    Ok(())
}

async fn run(invocation: &Invocation<'_>) -> Result<String> {
    let command = invocation.command;
    if invocation.args.len() != command.arg_count() {
        return Ok(invocation.usage());
    }
    if command.admin_only() && !invocation.is_admin().await? {
        return Ok(format!(
            "<@{}> only admins can use `{}{}`.",
            invocation.author(),
            invocation.symbol(),
            command.name()
        ));
    }
    match command {
        Command::Help => help(invocation).await,
        Command::AddPlayer => player::addplayer(invocation).await,
        Command::ChangeIgn => player::changeign(invocation).await,
        Command::MentionTeam => player::mentionteam(invocation).await,
        Command::SetTeam => player::setteam(invocation).await,
        Command::Teams => team::teams(invocation).await,
        Command::AddTeam => team::addteam(invocation).await,
        Command::RemoveTeam => team::removeteam(invocation).await,
        Command::Matches => matches::matches(invocation).await,
        Command::AddMatch => matches::addmatch(invocation).await,
        Command::Score => matches::score(invocation).await,
        Command::Settings => server::settings(invocation).await,
        Command::SetCommandSymbol => server::setcommandsymbol(invocation).await,
        Command::SetGameType => server::setgametype(invocation).await,
        Command::SetSeason => server::setseason(invocation).await,
        Command::SetRound => server::setround(invocation).await,
        Command::SetAdminRole => server::setadminrole(invocation).await,
        Command::SetTeamSize => server::setteamsize(invocation).await,
    }
}

async fn help(invocation: &Invocation<'_>) -> Result<String> {
    let guild = GuildId(invocation.server() as u64)
        .to_partial_guild(invocation.context)
        .await?;
    let admin = invocation.is_admin().await?;
    let response = help_text(invocation.symbol(), &guild.name, admin);
    let author = &invocation.message.author;
    if let Err(why) = author
        .dm(invocation.context, |message| message.content(response))
        .await
    {
        error!("Error sending help DM to {}: {:?}", author.id, why);
        return Ok(format!(
            "<@{}> I couldn't DM you, check that you allow direct messages from server members.",
            author.id
        ));
    }
    Ok(String::from("Help info sent via DM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_any_symbol() {
        let (command, args) = parse_command("!addplayer bob", "!").unwrap();
        assert_eq!(command, Command::AddPlayer);
        assert_eq!(args, vec!["!addplayer", "bob"]);

        let (command, _) = parse_command("$$help", "$$").unwrap();
        assert_eq!(command, Command::Help);
    }

    #[test]
    fn command_names_ignore_case() {
        let (command, _) = parse_command("!SetCommandSymbol ?", "!").unwrap();
        assert_eq!(command, Command::SetCommandSymbol);
    }

    #[test]
    fn ignores_non_commands() {
        assert!(parse_command("hello there", "!").is_none());
        assert!(parse_command("?help", "!").is_none());
        assert!(parse_command("!unknown", "!").is_none());
        assert!(parse_command("! help", "!").is_none());
        assert!(parse_command("!help", "").is_none());
        assert!(parse_command("a b help", "a b").is_none());
    }

    #[test]
    fn argument_counts_include_the_command() {
        assert_eq!(Command::Help.arg_count(), 1);
        assert_eq!(Command::AddPlayer.arg_count(), 2);
        assert_eq!(Command::AddMatch.arg_count(), 3);
        assert_eq!(Command::Score.arg_count(), 4);
    }

    #[test]
    fn parses_role_mentions() {
        assert_eq!(role_mention("<@&360201172851621890>"), Some(360201172851621890));
        assert_eq!(role_mention("<@360201172851621890>"), None);
        assert_eq!(role_mention("team"), None);
        assert_eq!(role_mention("<@&12>x"), None);
    }

    #[test]
    fn usage_mentions_author_and_symbol() {
        let usage = usage_message(5, "?", Command::AddPlayer);
        assert!(usage.starts_with("<@5> did not use the command properly."));
        assert!(usage.contains("`?addplayer your-ign`"));
        assert!(usage.contains("place it in quotes"));

        let usage = usage_message(5, "!", Command::Help);
        assert!(usage.contains("`!help`"));
    }

    #[test]
    fn help_hides_admin_commands() {
        let text = help_text("!", "My Server", false);
        assert!(text.contains("My Server"));
        assert!(text.contains("`!addplayer your-ign`"));
        assert!(!text.contains("setcommandsymbol"));

        let text = help_text("!", "My Server", true);
        assert!(text.contains("`!setcommandsymbol symbol`"));
        assert!(text.contains("`!addmatch @team-one @team-two`"));
    }

    #[test]
    fn owner_is_always_admin() {
        assert!(has_admin_access(1, 1, None, &[]));
        assert!(has_admin_access(1, 1, Some(50), &[]));
        assert!(has_admin_access(1, 2, Some(50), &[40, 50]));
        assert!(!has_admin_access(1, 2, Some(50), &[40]));
        assert!(!has_admin_access(1, 2, None, &[50]));
    }

    #[test]
    fn admin_commands() {
        assert!(Command::AddTeam.admin_only());
        assert!(!Command::Score.admin_only());
        assert!(!Command::Help.admin_only());
    }
}
