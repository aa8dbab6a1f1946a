use crate::bot::commands::send_embed;
use crate::bot::{COMMAND_PREFIX, Command, Context, Error};
use poise::serenity_prelude as serenity;

fn usage(name: &str) -> Option<&'static str> {
    Some(match name {
        "dmg" => {
            "`!dmg 10a 3h 3w 1r d3 5cm` — attacks, to-hit, to-wound, rend (optional), damage \
             (number, d3, d6; default 1) and an optional crit: `cm` mortal, `cw` auto-wound, \
             `ch` 2 hits, prefixed by the crit roll if it is not 6."
        }
        "winrates" => {
            "`!winrates [all|recent|battlescroll]` lists every faction; \
             `!winrates <alias> [time]` (e.g. `idk`, `rats recent`) shows one."
        }
        "top8" => "`!top8` — the current Cali Masters top eight.",
        "rank" => "`!rank <name>` — position, score and counted events (first, last or full name).",
        "maddy" => {
            "`!maddy <question>` — ask about units, e.g. `!maddy archaon vs skarbrand`. \
             Name units explicitly after a colon, one per line."
        }
        "noog" => "`!noog` — reply to a message (or use it right after one) to hear it dumber.",
        "tom" => "`!tom <question>` — ask about the event pack: schedule, scoring, lists, venue and so on.",
        "help" => "`!help [detailed]` — this message.",
        _ => return None,
    })
}

fn summary_line(cmd: &Command) -> String {
    let mut line = format!("{}{}", COMMAND_PREFIX, cmd.name);
    if !cmd.aliases.is_empty() {
        let aliases: Vec<String> = cmd
            .aliases
            .iter()
            .map(|a| format!("{}{}", COMMAND_PREFIX, a))
            .collect();
        line.push_str(&format!(" ({})", aliases.join(", ")));
    }
    if let Some(description) = cmd.description.as_deref() {
        line.push_str(" — ");
        line.push_str(description);
    }
    line
}

fn help_text(commands: &[Command], detailed: bool) -> String {
    commands
        .iter()
        .map(|cmd| match usage(&cmd.name) {
            Some(text) if detailed => format!("{}\n  {}", summary_line(cmd), text),
            _ => summary_line(cmd),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// List the commands this bot answers to
#[poise::command(prefix_command)]
pub async fn help(ctx: Context<'_>, mode: Option<String>) -> Result<(), Error> {
    let detailed = mode.is_some_and(|m| m.eq_ignore_ascii_case("detailed"));
    let profile = &ctx.data().profile;
    let title = if profile.description.is_empty() {
        profile.name.clone()
    } else {
        profile.description.clone()
    };

    let body = help_text(&ctx.framework().options().commands, detailed);
    send_embed(&ctx, title, body, serenity::Colour::BLURPLE).await
}
