use crate::bot::{Context, Error};
use crate::utils::damage::parse_profile_args;
use crate::utils::format::damage_table;

const USAGE: &str = "Usage: `!dmg <attacks>a <hit>h <wound>w [rend]r [damage] [crit]`\n\
Example: `!dmg 10a 3h 3w 1r d3 5cm`\n\
Damage is a number, `d3` or `d6`. Crits: `cm` mortal, `cw` auto-wound, `ch` 2 hits, \
optionally prefixed by the roll that crits (`5cm`).";

/// Expected damage of an attack profile against 2+ to 6+ saves
#[poise::command(prefix_command, aliases("damage"))]
pub async fn dmg(ctx: Context<'_>, #[rest] args: Option<String>) -> Result<(), Error> {
    let args = args.unwrap_or_default();
    if args.trim().is_empty() {
        ctx.say(USAGE).await?;
        return Ok(());
    }

    match parse_profile_args(&args) {
        Ok(profile) => {
            log::info!("!dmg {} by {}", args.trim(), ctx.author().name);
            ctx.say(damage_table(&profile)).await?;
        }
        Err(e) => {
            ctx.say(format!("Could not read that profile: {}\n{}", e, USAGE))
                .await?;
        }
    }

    Ok(())
}
