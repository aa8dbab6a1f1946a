use crate::bot::commands::send_embed;
use crate::bot::{Context, Error};
use crate::utils::aos_events::{COUNTED_EVENTS, LeaderboardEntry};
use poise::serenity_prelude as serenity;

const TOP_N: usize = 8;

fn top_lines(entries: &[LeaderboardEntry]) -> Vec<String> {
    entries
        .iter()
        .take(TOP_N)
        .enumerate()
        .map(|(i, rec)| format!("{}. **{}** — {} pts", i + 1, rec.full_name(), rec.score()))
        .collect()
}

/// `#<pos> **Name** — <score> pts (<n> of 4)` for every entry matching `query`.
fn rank_lines(entries: &[LeaderboardEntry], query: &str) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, rec)| rec.matches(query))
        .map(|(i, rec)| {
            format!(
                "#{} **{}** — {} pts ({} of {})",
                i + 1,
                rec.full_name(),
                rec.score(),
                rec.event_count().min(COUNTED_EVENTS),
                COUNTED_EVENTS
            )
        })
        .collect()
}

/// Show the current Cali Masters top 8
#[poise::command(prefix_command)]
pub async fn top8(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let entries = data.aos_events.fetch_leaderboard().await?;
    if entries.is_empty() {
        ctx.say("No data available.").await?;
        return Ok(());
    }

    let mut lines = top_lines(&entries);
    lines.push(String::new());
    lines.push(format!(
        "Full table: {}",
        data.config.aos_events.leaderboard_page
    ));
    send_embed(
        &ctx,
        "🏆 Cali Masters Top 8 🏆",
        lines.join("\n"),
        serenity::Colour::GOLD,
    )
    .await
}

/// Show rank, score, and event count for a player
#[poise::command(prefix_command)]
pub async fn rank(ctx: Context<'_>, #[rest] query: Option<String>) -> Result<(), Error> {
    let query = query.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        ctx.say("Usage: `!rank <first name | last name | full name>`")
            .await?;
        return Ok(());
    }

    let data = ctx.data();
    if let Some(joke) = data.phrases.rank_joke(query) {
        ctx.say(joke).await?;
        return Ok(());
    }
    if data.phrases.is_acronym_query(query) {
        let expansion = {
            let mut rng = rand::rng();
            data.phrases.random_acronym(&query.to_uppercase(), &mut rng)
        };
        ctx.say(format!(
            "`{}` stands for: **{}**",
            query.to_uppercase(),
            expansion
        ))
        .await?;
        return Ok(());
    }

    let entries = data.aos_events.fetch_leaderboard().await?;
    let lines = rank_lines(&entries, query);
    if lines.is_empty() {
        ctx.say(format!("No player found matching `{}`.", query))
            .await?;
    } else {
        ctx.say(lines.join("\n")).await?;
    }
    Ok(())
}
