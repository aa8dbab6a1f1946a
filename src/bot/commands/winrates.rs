use crate::bot::commands::send_code_blocks;
use crate::bot::{Context, Error};
use crate::models::types::WinratesConfig;
use crate::utils::aos_events::FactionWinrate;

const DEFAULT_TIME_FILTER: &str = "all";

#[derive(Debug, PartialEq)]
enum WinratesQuery {
    Full { time: String },
    Single { faction: String, time: String },
}

fn parse_query(config: &WinratesConfig, args: &str) -> Result<WinratesQuery, String> {
    let mut words = args.split_whitespace();
    let first = words.next().unwrap_or(DEFAULT_TIME_FILTER).to_lowercase();

    if config.is_time_filter(&first) {
        return Ok(WinratesQuery::Full { time: first });
    }
    if let Some(faction) = config.faction_for(&first) {
        let time = words
            .next()
            .map(str::to_lowercase)
            .filter(|t| config.is_time_filter(t))
            .unwrap_or_else(|| DEFAULT_TIME_FILTER.to_string());
        return Ok(WinratesQuery::Single {
            faction: faction.to_string(),
            time,
        });
    }
    Err(format!(
        "Invalid argument '{}'. Use a time ({}) or alias.",
        first,
        config.time_filters.join(", ")
    ))
}

/// Factions minus the excluded ones, best win rate first.
fn ranked<'a>(config: &WinratesConfig, factions: &'a [FactionWinrate]) -> Vec<&'a FactionWinrate> {
    let mut items: Vec<&FactionWinrate> = factions
        .iter()
        .filter(|f| !config.excluded_factions.contains(&f.name))
        .collect();
    items.sort_by(|a, b| b.win_rate().total_cmp(&a.win_rate()));
    items
}

fn faction_line(config: &WinratesConfig, faction: &FactionWinrate) -> String {
    format!(
        "{} {}: {}/{} ({:.2}%)",
        config.emoji_for(&faction.name),
        faction.name,
        faction.wins,
        faction.games,
        faction.win_rate()
    )
}

/// Faction win rates from aos-events: `!winrates [time]` or `!winrates <faction> [time]`
#[poise::command(prefix_command, aliases("winrate"))]
pub async fn winrates(ctx: Context<'_>, #[rest] args: Option<String>) -> Result<(), Error> {
    let data = ctx.data();
    let config = &data.config.winrates;
    let source = &data.config.aos_events.site_url;

    let query = match parse_query(config, args.as_deref().unwrap_or("")) {
        Ok(query) => query,
        Err(message) => {
            ctx.say(message).await?;
            return Ok(());
        }
    };

    match query {
        WinratesQuery::Full { time } => {
            let response = data.aos_events.fetch_winrates(&time).await?;
            let mut lines = vec![format!("AoS Faction Win Rates ({}) sorted:", time)];
            lines.extend(
                ranked(config, &response.factions)
                    .into_iter()
                    .map(|f| faction_line(config, f)),
            );
            lines.push(String::new());
            lines.push(format!("Source: {}", source));
            send_code_blocks(&ctx, &lines).await?;
        }
        WinratesQuery::Single { faction, time } => {
            let response = data.aos_events.fetch_winrates(&time).await?;
            match response.factions.iter().find(|f| f.name == faction) {
                Some(f) => {
                    ctx.say(format!(
                        "{} **{}** ({}): {}/{} ({:.2}%)\nSource: {}",
                        config.emoji_for(&f.name),
                        f.name,
                        time,
                        f.wins,
                        f.games,
                        f.win_rate(),
                        source
                    ))
                    .await?;
                }
                None => {
                    ctx.say(format!("Faction '{}' not found.", faction)).await?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faction(name: &str, wins: f64, games: f64) -> FactionWinrate {
        FactionWinrate {
            name: name.to_string(),
            wins,
            games,
        }
    }

    #[test]
    fn test_parse_query() {
        let config = WinratesConfig::default();
        assert_eq!(
            parse_query(&config, ""),
            Ok(WinratesQuery::Full {
                time: "all".to_string()
            })
        );
        assert_eq!(
            parse_query(&config, "Recent"),
            Ok(WinratesQuery::Full {
                time: "recent".to_string()
            })
        );
        assert_eq!(
            parse_query(&config, "idk battlescroll"),
            Ok(WinratesQuery::Single {
                faction: "Idoneth Deepkin".to_string(),
                time: "battlescroll".to_string()
            })
        );
        assert_eq!(
            parse_query(&config, "rats yesterday"),
            Ok(WinratesQuery::Single {
                faction: "Skaven".to_string(),
                time: "all".to_string()
            })
        );
        assert!(parse_query(&config, "dwarves").is_err());
    }

    #[test]
    fn test_ranked_excludes_and_sorts() {
        let config = WinratesConfig::default();
        let factions = vec![
            faction("Skaven", 4.0, 10.0),
            faction("Bonesplitterz", 9.0, 10.0),
            faction("Seraphon", 6.0, 10.0),
            faction("Kruleboyz", 0.0, 0.0),
        ];
        let names: Vec<&str> = ranked(&config, &factions)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["Seraphon", "Skaven", "Kruleboyz"]);
    }

    #[test]
    fn test_faction_line() {
        let config = WinratesConfig::default();
        assert_eq!(
            faction_line(&config, &faction("Skaven", 1.0, 3.0)),
            "🐀 Skaven: 1/3 (33.33%)"
        );
        assert_eq!(
            faction_line(&config, &faction("Skaven", 10.5, 21.0)),
            "🐀 Skaven: 10.5/21 (50.00%)"
        );
    }
}
