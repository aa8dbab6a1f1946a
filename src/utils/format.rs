use crate::utils::damage::{AttackProfile, CriticalEffect, save_table};

/// Discord rejects messages over 2000 characters; leave room for the fences.
pub const MAX_CHUNK_CHARS: usize = 1900;

/// Pack lines into chunks of at most `max_chars` (counting one newline per
/// line). A single line longer than the limit becomes its own chunk.
pub fn chunk_lines<S: AsRef<str>>(lines: &[S], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut count = 0;

    for line in lines {
        let line = line.as_ref();
        let len = line.chars().count() + 1;
        if count + len > max_chars && !buf.is_empty() {
            chunks.push(buf.join("\n"));
            buf.clear();
            count = 0;
        }
        buf.push(line);
        count += len;
    }
    if !buf.is_empty() {
        chunks.push(buf.join("\n"));
    }
    chunks
}

pub fn code_block(body: &str) -> String {
    format!("```\n{}\n```", body)
}

/// Trim to `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// One-line description of a profile, e.g. `10 attacks, 3+ hit, 3+ wound, rend 1, dmg D3, crit 5+ mortal`.
pub fn describe_profile(profile: &AttackProfile) -> String {
    let mut out = format!(
        "{} attacks, {}+ hit, {}+ wound, rend {}, dmg {}",
        trim_number(profile.attacks),
        profile.to_hit,
        profile.to_wound,
        profile.rend,
        profile.damage
    );
    if profile.critical_effect != CriticalEffect::None {
        out.push_str(&format!(
            ", crit {}+ {}",
            profile.critical_threshold,
            profile.critical_effect.label()
        ));
    }
    out
}

/// The `!dmg` reply: profile summary plus expected damage against 2+..6+ saves.
pub fn damage_table(profile: &AttackProfile) -> String {
    let mut lines = vec![describe_profile(profile), String::new(), "Save | Damage".to_string()];
    lines.push("-----+-------".to_string());
    for (save, damage) in save_table(profile) {
        lines.push(format!("{:>3}+ | {:>6.2}", save, damage));
    }
    code_block(&lines.join("\n"))
}
