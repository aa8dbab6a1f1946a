pub mod damage;
pub mod help;
pub mod leaderboard;
pub mod maddy;
pub mod noog;
pub mod tom;
pub mod winrates;

use crate::bot::{Context, Error};
use crate::utils::format::{MAX_CHUNK_CHARS, chunk_lines, code_block};
use poise::{CreateReply, serenity_prelude as serenity};

pub(crate) async fn send_embed(
    ctx: &Context<'_>,
    title: impl Into<String>,
    description: String,
    colour: serenity::Colour,
) -> Result<(), Error> {
    let embed = serenity::CreateEmbed::default()
        .title(title.into())
        .description(description)
        .colour(colour);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Send `lines` as one or more code blocks, each under Discord's length limit.
pub(crate) async fn send_code_blocks<S: AsRef<str>>(
    ctx: &Context<'_>,
    lines: &[S],
) -> Result<(), Error> {
    for chunk in chunk_lines(lines, MAX_CHUNK_CHARS) {
        ctx.say(code_block(&chunk)).await?;
    }
    Ok(())
}

/// Send free text that may exceed one message, splitting on line boundaries.
pub(crate) async fn send_long_text(ctx: &Context<'_>, text: &str) -> Result<(), Error> {
    let lines: Vec<&str> = text.lines().collect();
    for chunk in chunk_lines(&lines, MAX_CHUNK_CHARS) {
        if !chunk.trim().is_empty() {
            ctx.say(chunk).await?;
        }
    }
    Ok(())
}
