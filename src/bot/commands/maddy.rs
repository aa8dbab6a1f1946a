use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;

use crate::bot::commands::send_long_text;
use crate::bot::{Context, Error};
use crate::utils::api::{ChatMessage, LlmClient};
use crate::utils::reference::{ReferenceData, UnitRecord};
use crate::utils::resolver::ResolveError;
use crate::utils::unit_stats::{DerivedStats, derive_stats, with_derived};

const LLM_TIMEOUT: Duration = Duration::from_secs(60);

const PERSONA: &str = "You are Maddy: a very short, precise, slightly chilly young woman in black \
Victorian dresses. You love soup, dislike jokes (and know it), and value pedantry. Your tone is \
dry and careful. Answers MUST be grounded strictly in the provided JSON; if something is missing, say so.";

const NO_UNIT_REPLY: &str = "I cannot determine any unit from that. Be more specific.";

/// Outcome of turning a question into unit names.
#[derive(Debug, PartialEq)]
enum Selection {
    Units(Vec<String>),
    Ambiguous(Vec<String>),
    /// Nothing resolved locally; these are the nearest names for the LLM to pick from.
    Unresolved(Vec<String>),
}

fn select_units(reference: &ReferenceData, question: &str, max_units: usize, top_k: usize) -> Selection {
    // units named before the colon mean the colon is punctuation, not a list
    let preamble = question.split_once(':').map_or(question, |(head, _)| head);
    if reference.resolver.direct_matches(preamble).is_empty() {
        let explicit = reference.resolver.resolve_explicit_list(question);
        if !explicit.is_empty() {
            return Selection::Units(explicit.into_iter().take(max_units).collect());
        }
    }

    match reference.resolver.resolve(question) {
        Ok(names) => Selection::Units(names.into_iter().take(max_units).collect()),
        Err(ResolveError::Ambiguous(candidates)) => Selection::Ambiguous(candidates),
        Err(ResolveError::NotFound) => Selection::Unresolved(
            reference
                .resolver
                .rank_candidates(question, top_k.max(max_units)),
        ),
    }
}

/// Keep only names from `candidates`, in the order the model gave them.
/// Falls back to the first `max_units` candidates when the reply is unusable.
fn parse_selection(reply: &str, candidates: &[String], max_units: usize) -> Vec<String> {
    let body = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let mut picked: Vec<String> = Vec::new();
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(body) {
        for name in items.iter().filter_map(Value::as_str) {
            if candidates.iter().any(|c| c == name) && !picked.iter().any(|p| p == name) {
                picked.push(name.to_string());
            }
        }
    }
    picked.truncate(max_units);

    if picked.is_empty() {
        candidates.iter().take(max_units).cloned().collect()
    } else {
        picked
    }
}

async fn choose_units_with_llm(
    llm: &LlmClient,
    question: &str,
    candidates: &[String],
    max_units: usize,
) -> Vec<String> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let system = format!(
        "{} From the candidate unit names, select up to N relevant to the user's question. \
         Return only a JSON array of strings.",
        PERSONA
    );
    let user = format!(
        "N={}\nQuestion: {}\nCandidates:\n- {}",
        max_units,
        question,
        candidates.join("\n- ")
    );

    let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
    match timeout(LLM_TIMEOUT, llm.chat(messages, 0.0, None)).await {
        Ok(Ok(reply)) => parse_selection(&reply, candidates, max_units),
        Ok(Err(e)) => {
            log::warn!("Unit selection via LLM failed: {}", e);
            candidates.iter().take(max_units).cloned().collect()
        }
        Err(_) => {
            log::warn!("Unit selection via LLM timed out");
            candidates.iter().take(max_units).cloned().collect()
        }
    }
}

fn answer_messages(question: &str, units: &[UnitRecord]) -> Result<Vec<ChatMessage>, Error> {
    let (system, user) = if let [unit] = units {
        (
            format!(
                "{} Answer strictly and only from the provided unit JSON. For damage or total \
                 health, use the _derived totals. Expected damage = attacks * P(hit) * P(wound) * \
                 avg(damage), summed over profiles, adjusted for crit effects (mortal crits skip \
                 the wound roll and the save); _derived.unit_melee_vs_save and \
                 unit_ranged_vs_save give totals against each save with rend applied. Be concise.",
                PERSONA
            ),
            format!(
                "Question: {}\n\nUnit JSON (full, with _derived):\n{}",
                question,
                serde_json::to_string(&with_derived(unit))?
            ),
        )
    } else {
        let bundle: Vec<Value> = units
            .iter()
            .map(|u| serde_json::json!({ "name": u.name(), "unit": with_derived(u) }))
            .collect();
        (
            format!(
                "{} Compare the units strictly from the provided JSON. Use \
                 _derived.unit_expected_melee/_ranged and unit_total_health when relevant. If any \
                 required value is missing or non-numeric, say so and compare what is available. \
                 Be concise.",
                PERSONA
            ),
            format!(
                "Question: {}\n\nUnits JSON array (full, with _derived):\n{}",
                question,
                serde_json::to_string(&bundle)?
            ),
        )
    };
    Ok(vec![ChatMessage::system(system), ChatMessage::user(user)])
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "?".to_string(), |v| format!("{:.2}", v))
}

fn summarize_unit(unit: &UnitRecord, stats: &DerivedStats) -> String {
    let mut lines = vec![format!("**{}** ({})", unit.name(), unit.faction)];
    lines.push(format!(
        "Models: {} | Health: {} each, {} total",
        stats
            .unit_model_count
            .map_or_else(|| "?".to_string(), |c| c.to_string()),
        fmt_opt(stats.per_model_health),
        fmt_opt(stats.unit_total_health)
    ));
    if stats.per_model_expected_melee.is_some() {
        lines.push(format!(
            "Melee (no save): {} per model, {} per unit",
            fmt_opt(stats.per_model_expected_melee),
            fmt_opt(stats.unit_expected_melee)
        ));
    }
    if stats.per_model_expected_ranged.is_some() {
        lines.push(format!(
            "Ranged (no save): {} per model, {} per unit",
            fmt_opt(stats.per_model_expected_ranged),
            fmt_opt(stats.unit_expected_ranged)
        ));
    }
    for (label, table) in [
        ("Melee", &stats.unit_melee_vs_save),
        ("Ranged", &stats.unit_ranged_vs_save),
    ] {
        if !table.is_empty() {
            let cells: Vec<String> = table
                .iter()
                .map(|(save, dmg)| format!("{}+: {:.2}", save, dmg))
                .collect();
            lines.push(format!("{} vs save: {}", label, cells.join(", ")));
        }
    }
    if !stats.weapons_counted.is_empty() {
        lines.push(format!("Weapons: {}", stats.weapons_counted.join(", ")));
    }
    lines.join("\n")
}

/// Offline answer: the derived numbers for each unit, no prose.
fn local_summary(units: &[UnitRecord]) -> String {
    units
        .iter()
        .map(|u| summarize_unit(u, &derive_stats(&u.data)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Ask Maddy about units: `!maddy how much damage do Chaos Knights do?`
///
/// List units explicitly after a colon, one per line, to skip the guessing.
#[poise::command(prefix_command)]
pub async fn maddy(ctx: Context<'_>, #[rest] question: Option<String>) -> Result<(), Error> {
    let question = question.unwrap_or_default();
    let question = question.trim();
    if question.is_empty() {
        ctx.say("Ask me about one or more units, e.g. `!maddy chaos knights vs skarbrand`.")
            .await?;
        return Ok(());
    }

    let data = ctx.data();
    let preline = {
        let mut rng = rand::rng();
        data.phrases.maddy_preline(&mut rng).to_string()
    };
    ctx.say(preline).await?;
    ctx.defer().await?;

    let settings = &data.config.maddy;
    let selection = {
        let reference = Arc::clone(&data.reference);
        let owned = question.to_string();
        let (max_units, top_k) = (settings.max_units, settings.top_k);
        tokio::task::spawn_blocking(move || select_units(&reference, &owned, max_units, top_k))
            .await?
    };
    let chosen = match selection {
        Selection::Units(names) => names,
        Selection::Ambiguous(candidates) => {
            ctx.say(format!(
                "That could be several units. Which one?\n- {}",
                candidates.join("\n- ")
            ))
            .await?;
            return Ok(());
        }
        Selection::Unresolved(candidates) if data.llm.is_available() => {
            choose_units_with_llm(&data.llm, question, &candidates, settings.max_units).await
        }
        Selection::Unresolved(_) => Vec::new(),
    };

    let units: Vec<UnitRecord> = chosen
        .iter()
        .filter_map(|name| data.reference.unit(name))
        .collect();
    log::info!(
        "!maddy '{}' -> [{}] ({} with data)",
        question,
        chosen.join(", "),
        units.len()
    );
    if units.is_empty() {
        ctx.say(NO_UNIT_REPLY).await?;
        return Ok(());
    }

    if !data.llm.is_available() {
        return send_long_text(&ctx, &local_summary(&units)).await;
    }

    let messages = answer_messages(question, &units)?;
    match timeout(LLM_TIMEOUT, data.llm.chat(messages, 0.1, None)).await {
        Ok(Ok(answer)) => send_long_text(&ctx, &answer).await,
        Ok(Err(e)) => {
            log::error!("Maddy answer failed: {}", e);
            let text = format!("(The oracle is unavailable: {})\n\n{}", e, local_summary(&units));
            send_long_text(&ctx, &text).await
        }
        Err(_) => {
            log::warn!("Maddy answer timed out");
            let text = format!("(The oracle took too long.)\n\n{}", local_summary(&units));
            send_long_text(&ctx, &text).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn reference() -> ReferenceData {
        let names = vec![
            "Archaon the Everchosen".to_string(),
            "Skarbrand".to_string(),
            "Kairos Fateweaver".to_string(),
            "Chaos Knights".to_string(),
            "Chaos Warriors".to_string(),
        ];
        let rules = json!({
            "armies": {
                "Slaves to Darkness": {
                    "units": [
                        {"name": "Chaos Knights", "health": 5, "models": [{"max": 5}]},
                        {"name": "Archaon the Everchosen", "health": 20}
                    ]
                }
            }
        });
        ReferenceData::from_parts(names, &rules, &HashMap::new())
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_units_paths() {
        let reference = reference();
        assert_eq!(
            select_units(&reference, "kairos", 5, 8),
            Selection::Units(names(&["Kairos Fateweaver"]))
        );
        assert_eq!(
            select_units(&reference, "compare:\nskarbrand\nkairos fateweaver", 5, 8),
            Selection::Units(names(&["Skarbrand", "Kairos Fateweaver"]))
        );
        assert_eq!(
            select_units(&reference, "archaon the everchosen vs skarbrand: who wins?", 5, 8),
            Selection::Units(names(&["Archaon the Everchosen", "Skarbrand"]))
        );
        assert!(matches!(
            select_units(&reference, "what is the best soup", 5, 8),
            Selection::Unresolved(c) if c.len() == 5
        ));
    }

    #[test]
    fn test_parse_selection() {
        let candidates = names(&["Skarbrand", "Kairos Fateweaver", "Chaos Knights"]);
        assert_eq!(
            parse_selection(
                "```json\n[\"Chaos Knights\", \"Nope\", \"Chaos Knights\", \"Skarbrand\"]\n```",
                &candidates,
                5
            ),
            names(&["Chaos Knights", "Skarbrand"])
        );
        assert_eq!(
            parse_selection("I refuse.", &candidates, 2),
            names(&["Skarbrand", "Kairos Fateweaver"])
        );
        assert_eq!(
            parse_selection("[\"Skarbrand\", \"Chaos Knights\"]", &candidates, 1),
            names(&["Skarbrand"])
        );
    }

    #[test]
    fn test_answer_messages_shape() {
        let reference = reference();
        let knights = reference.unit("chaos knights").unwrap();
        let single = answer_messages("how tough?", std::slice::from_ref(&knights)).unwrap();
        assert_eq!(single[0].role, "system");
        assert!(single[0].content.contains("mortal crits skip the wound roll"));
        assert!(single[1].content.contains("\"_derived\""));

        let archaon = reference.unit("Archaon the Everchosen").unwrap();
        let pair = answer_messages("who wins?", &[knights, archaon]).unwrap();
        assert!(pair[0].content.contains("Compare the units"));
        assert!(pair[1].content.contains("\"name\":\"Archaon the Everchosen\""));
    }

    #[test]
    fn test_local_summary() {
        let reference = reference();
        let knights = reference.unit("Chaos Knights").unwrap();
        let text = local_summary(&[knights]);
        assert!(text.starts_with("**Chaos Knights** (Slaves to Darkness)"));
        assert!(text.contains("Models: 5 | Health: 5.00 each, 25.00 total"));
    }
}
