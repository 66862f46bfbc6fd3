use anyhow::{Context as _, Result};
use log::info;
use serenity::client::Context;
use serenity::model::gateway::GatewayIntents;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::fs::OpenOptions;

use crate::config::Config;
use crate::settings::SettingsCache;

mod args;
mod commands;
mod config;
mod settings;

/// Shared state handed to every event.
pub struct Data {
    pub pool: PgPool,
    pub settings: SettingsCache,
    pub default_symbol: String,
}

fn init_logger(config: &Config) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = &config.log {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("could not open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

async fn event_handler(
    context: &Context,
    event: &poise::Event<'_>,
    data: &Data,
) -> Result<()> {
    match event {
        poise::Event::Message { new_message } => {
            commands::handle_message(context, new_message, data).await?
        }
        poise::Event::GuildCreate { guild, .. } => {
            commands::server::register_server(data, guild.id.0 as i64).await?;
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_logger(&config)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url())
        .await
        .context("could not connect to the database")?;
    sqlx::migrate!().run(&pool).await?;
    let settings = SettingsCache::load(&pool).await?;
    info!("Loaded settings for {} servers", settings.server_count().await);

    let data = Data {
        pool,
        settings,
        default_symbol: config.default_symbol.clone(),
    };
    let framework = poise::Framework::builder()
        .token(&config.token)
        .intents(
            GatewayIntents::GUILDS
                | GatewayIntents::GUILD_MESSAGES
                | GatewayIntents::MESSAGE_CONTENT,
        )
        .options(poise::FrameworkOptions {
            event_handler: |context, event, _framework, data| {
                Box::pin(event_handler(context, event, data))
            },
            ..Default::default()
        })
        .setup(move |_context, ready, _framework| {
            Box::pin(async move {
                info!("{} is connected!", ready.user.name);
                Ok(data)
            })
        });
    framework.run().await?;
    Ok(())
}
