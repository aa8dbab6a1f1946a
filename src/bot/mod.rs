pub mod commands;
pub mod data;

use anyhow::anyhow;
use poise::serenity_prelude as serenity;

use crate::bot::data::BotData;

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, data::BotData, Error>;
pub type Command = poise::Command<data::BotData, Error>;

pub const COMMAND_PREFIX: &str = "!";

/// Every command any bot can serve; profiles pick from this by name.
pub fn all_commands() -> Vec<Command> {
    vec![
        commands::damage::dmg(),
        commands::winrates::winrates(),
        commands::leaderboard::top8(),
        commands::leaderboard::rank(),
        commands::maddy::maddy(),
        commands::noog::noog(),
        commands::tom::tom(),
        commands::help::help(),
    ]
}

/// Commands enabled for one bot, in the order the profile lists them.
/// Unknown names are logged and skipped.
pub fn commands_for(names: &[String]) -> Vec<Command> {
    let mut available = all_commands();
    let mut selected = Vec::with_capacity(names.len());

    for name in names {
        let wanted = name.trim().to_lowercase();
        match available
            .iter()
            .position(|cmd| cmd.name == wanted || cmd.aliases.iter().any(|a| *a == wanted))
        {
            Some(index) => selected.push(available.swap_remove(index)),
            None => log::warn!("Unknown command '{}' in bot profile, skipping", name),
        }
    }
    selected
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            log::error!("Command !{} failed: {:#}", ctx.command().name, error);
            if let Err(why) = ctx.say(format!("Something went wrong: {}", error)).await {
                log::error!("Failed to send error message: {}", why);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                log::error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Connect one Discord client for `data.profile` and run it until it stops.
pub async fn run_bot(token: String, data: BotData) -> Result<(), Error> {
    let profile_name = data.profile.name.clone();
    let commands = commands_for(&data.profile.commands);
    if commands.is_empty() {
        return Err(anyhow!("bot '{}' has no usable commands", profile_name));
    }
    log::info!(
        "Starting bot '{}' with commands: {}",
        profile_name,
        commands
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(COMMAND_PREFIX.into()),
                case_insensitive_commands: true,
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                log::info!("{} is online ({})", ready.user.name, data.profile.name);
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow!("Failed to create Discord client for '{}': {}", profile_name, e))?;

    client
        .start()
        .await
        .map_err(|e| anyhow!("Bot '{}' stopped: {}", profile_name, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_every_command_is_prefix_only() {
        for cmd in all_commands() {
            assert!(cmd.prefix_action.is_some(), "!{} is not a prefix command", cmd.name);
            assert!(cmd.slash_action.is_none());
        }
    }

    #[test]
    fn test_commands_for_profile() {
        let selected = commands_for(&names(&["top8", "RANK", "help"]));
        let picked: Vec<&str> = selected.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(picked, vec!["top8", "rank", "help"]);

        let tombot = commands_for(&names(&["tom", "help"]));
        let picked: Vec<&str> = tombot.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(picked, vec!["tom", "help"]);
    }

    #[test]
    fn test_commands_for_accepts_aliases_and_skips_unknown() {
        let selected = commands_for(&names(&["damage", "winrate", "roll", "dmg"]));
        let picked: Vec<&str> = selected.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(picked, vec!["dmg", "winrates"]);
    }
}
