use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// Shorter query words are too often common English words to trust as partial hits.
pub const MIN_PARTIAL_TOKEN_LEN: usize = 5;
pub const MAX_AMBIGUOUS_CANDIDATES: usize = 6;
pub const SEGMENT_SIMILARITY_THRESHOLD: f64 = 0.6;
const MAX_WINDOW_TOKENS: usize = 6;
/// Only the start of a question is scored when ranking candidates.
const MAX_RANKED_QUERY_TOKENS: usize = 40;
const EXACT_PHRASE_SCORE: f64 = 1.1;

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9 ]+").expect("normalize pattern is valid"));
static COMPARISON_SPLIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:vs|versus|against|or)\b|[,/]").expect("comparison pattern is valid")
});

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("several units match: {}", .0.join(", "))]
    Ambiguous(Vec<String>),
    #[error("no unit matches the query")]
    NotFound,
}

/// Lowercase, turn `-`/`_` into spaces, drop everything outside `[a-z0-9 ]`
/// and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase().replace(['-', '_'], " ");
    let stripped = NON_ALNUM_RE.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whole-word containment over normalized strings.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

/// Gestalt pattern-matching ratio: `2 * matches / (len(a) + len(b))`, where
/// matches are counted over recursively found longest common substrings.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    2.0 * matching_bytes(a, b) as f64 / (a.len() + b.len()) as f64
}

fn matching_bytes(a: &[u8], b: &[u8]) -> usize {
    let (start_a, start_b, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_bytes(&a[..start_a], &b[..start_b])
        + matching_bytes(&a[start_a + len..], &b[start_b + len..])
}

fn longest_common_substring(a: &[u8], b: &[u8]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            current[j] = if a[i - 1] == b[j - 1] {
                previous[j - 1] + 1
            } else {
                0
            };
            if current[j] > best.2 {
                best = (i - current[j], j - current[j], current[j]);
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }
    best
}

/// Best similarity of the shorter string against the longer one or any run
/// of up to six of its words.
pub fn partial_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut best = similarity(short, long);
    let tokens: Vec<&str> = long.split(' ').collect();
    for width in 1..=tokens.len().min(MAX_WINDOW_TOKENS) {
        for window in tokens.windows(width) {
            best = best.max(similarity(short, &window.join(" ")));
        }
    }
    best
}

#[derive(Debug, Clone)]
struct UnitName {
    canonical: String,
    normalized: String,
    tokens: Vec<String>,
}

/// Read-only lookup from free text to canonical unit names.
#[derive(Debug, Default)]
pub struct UnitResolver {
    units: Vec<UnitName>,
    aliases: Vec<(String, Vec<String>)>,
}

impl UnitResolver {
    pub fn new<I, S>(unit_names: I, aliases: &HashMap<String, Vec<String>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut units: Vec<UnitName> = unit_names
            .into_iter()
            .filter_map(|name| {
                let canonical: String = name.into();
                let normalized = normalize(&canonical);
                if normalized.is_empty() {
                    return None;
                }
                let tokens = normalized.split(' ').map(str::to_string).collect();
                Some(UnitName {
                    canonical,
                    normalized,
                    tokens,
                })
            })
            .collect();
        units.sort_by(|a, b| a.canonical.cmp(&b.canonical));
        units.dedup_by(|a, b| a.canonical == b.canonical);

        let by_normalized: HashMap<&str, &str> = units
            .iter()
            .map(|u| (u.normalized.as_str(), u.canonical.as_str()))
            .collect();

        let mut resolved_aliases = Vec::new();
        for (alias, targets) in aliases {
            let alias_norm = normalize(alias);
            if alias_norm.is_empty() {
                continue;
            }
            let mut canonical = Vec::new();
            for target in targets {
                match by_normalized.get(normalize(target).as_str()) {
                    Some(name) => canonical.push(name.to_string()),
                    None => log::warn!("Alias `{}` points at unknown unit `{}`", alias, target),
                }
            }
            if !canonical.is_empty() {
                resolved_aliases.push((alias_norm, canonical));
            }
        }
        resolved_aliases.sort();

        Self {
            units,
            aliases: resolved_aliases,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Resolve a question to the unit(s) it is about.
    ///
    /// Exact and alias hits are returned as-is even when several units match;
    /// only the partial fallback reports ambiguity.
    pub fn resolve(&self, query: &str) -> Result<Vec<String>, ResolveError> {
        let normalized = normalize(query);

        let exact = self.exact_matches(&normalized);
        if !exact.is_empty() {
            return Ok(exact);
        }

        let aliased = self.alias_matches(&normalized);
        if !aliased.is_empty() {
            return Ok(aliased);
        }

        if let Some(compared) = self.comparison_matches(query) {
            return Ok(compared);
        }

        self.partial_matches(&normalized)
    }

    /// Units named outright in `query`, by full name or alias. No fuzzy matching.
    pub fn direct_matches(&self, query: &str) -> Vec<String> {
        let normalized = normalize(query);
        let exact = self.exact_matches(&normalized);
        if exact.is_empty() {
            self.alias_matches(&normalized)
        } else {
            exact
        }
    }

    fn exact_matches(&self, normalized: &str) -> Vec<String> {
        self.units
            .iter()
            .filter(|u| contains_phrase(normalized, &u.normalized))
            .map(|u| u.canonical.clone())
            .collect()
    }

    fn alias_matches(&self, normalized: &str) -> Vec<String> {
        let mut found = Vec::new();
        for (alias, targets) in &self.aliases {
            if contains_phrase(normalized, alias) {
                push_unique(&mut found, targets.iter().cloned());
            }
        }
        found
    }

    fn comparison_matches(&self, query: &str) -> Option<Vec<String>> {
        let lowered = query.to_lowercase();
        let segments: Vec<String> = COMPARISON_SPLIT_RE
            .split(&lowered)
            .map(normalize)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() < 2 {
            return None;
        }

        let mut found = Vec::new();
        for segment in &segments {
            let exact = self.exact_matches(segment);
            if !exact.is_empty() {
                push_unique(&mut found, exact);
                continue;
            }
            let aliased = self.alias_matches(segment);
            if !aliased.is_empty() {
                push_unique(&mut found, aliased);
                continue;
            }
            if let Some((name, score)) = self.best_match(segment) {
                if score >= SEGMENT_SIMILARITY_THRESHOLD {
                    push_unique(&mut found, [name.to_string()]);
                }
            }
        }

        (found.len() >= 2).then_some(found)
    }

    fn partial_matches(&self, normalized: &str) -> Result<Vec<String>, ResolveError> {
        let query_tokens: Vec<&str> = normalized
            .split(' ')
            .filter(|t| t.len() >= MIN_PARTIAL_TOKEN_LEN)
            .collect();

        let matches: Vec<String> = self
            .units
            .iter()
            .filter(|unit| {
                unit.tokens.iter().any(|unit_token| {
                    query_tokens.iter().any(|q| {
                        unit_token == q
                            || unit_token.starts_with(q)
                            || (unit_token.len() >= MIN_PARTIAL_TOKEN_LEN
                                && q.starts_with(unit_token.as_str()))
                    })
                })
            })
            .map(|unit| unit.canonical.clone())
            .collect();

        match matches.len() {
            0 => Err(ResolveError::NotFound),
            1 => Ok(matches),
            _ => Err(ResolveError::Ambiguous(
                matches.into_iter().take(MAX_AMBIGUOUS_CANDIDATES).collect(),
            )),
        }
    }

    /// Most similar unit to a short piece of text, with its score.
    pub fn best_match(&self, text: &str) -> Option<(&str, f64)> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }
        self.units
            .iter()
            .map(|u| (u.canonical.as_str(), partial_similarity(&normalized, &u.normalized)))
            .filter(|(_, score)| *score > 0.0)
            .fold(None, |best: Option<(&str, f64)>, candidate| match best {
                Some(current) if current.1 >= candidate.1 => Some(current),
                _ => Some(candidate),
            })
    }

    /// Top `k` units by similarity to the whole question, best first.
    pub fn rank_candidates(&self, question: &str, k: usize) -> Vec<String> {
        let normalized = normalize(question)
            .split(' ')
            .take(MAX_RANKED_QUERY_TOKENS)
            .collect::<Vec<_>>()
            .join(" ");
        let mut scored: Vec<(&str, f64)> = self
            .units
            .iter()
            .map(|u| {
                let score = if contains_phrase(&normalized, &u.normalized) {
                    EXACT_PHRASE_SCORE
                } else {
                    partial_similarity(&u.normalized, &normalized)
                };
                (u.canonical.as_str(), score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Units named one per line after a colon, e.g. "compare:\nskarbrand\nkairos".
    /// Lines that are not close to any unit name are skipped.
    pub fn resolve_explicit_list(&self, question: &str) -> Vec<String> {
        let Some((_, listed)) = question.split_once(':') else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for line in listed.lines().map(normalize).filter(|l| !l.is_empty()) {
            let best = self
                .units
                .iter()
                .map(|u| (u.canonical.as_str(), similarity(&u.normalized, &line)))
                .filter(|(_, score)| *score >= SEGMENT_SIMILARITY_THRESHOLD)
                .fold(None, |best: Option<(&str, f64)>, candidate| match best {
                    Some(current) if current.1 >= candidate.1 => Some(current),
                    _ => Some(candidate),
                });
            if let Some((name, _)) = best {
                push_unique(&mut found, [name.to_string()]);
            }
        }
        found
    }
}

fn push_unique(found: &mut Vec<String>, names: impl IntoIterator<Item = String>) {
    for name in names {
        if !found.contains(&name) {
            found.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UnitResolver {
        let mut aliases = HashMap::new();
        aliases.insert(
            "BT".to_string(),
            vec!["Bloodthirster of Insensate Rage".to_string()],
        );
        aliases.insert(
            "greater daemons".to_string(),
            vec!["Skarbrand".to_string(), "Kairos Fateweaver".to_string()],
        );
        aliases.insert("ghost".to_string(), vec!["Not A Unit".to_string()]);
        UnitResolver::new(
            [
                "Archaon",
                "Skarbrand",
                "Kairos Fateweaver",
                "Lord of Change",
                "Bloodthirster of Insensate Rage",
                "Chaos Knights",
                "Chaos Warriors",
                "Chaos Chosen",
            ],
            &aliases,
        )
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Flesh-eater_Courts!! "), "flesh eater courts");
        assert_eq!(normalize("Kairos   Fateweaver?"), "kairos fateweaver");
        assert_eq!(normalize("--"), "");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert!((similarity("skarbrnd", "skarbrand") - 16.0 / 17.0).abs() < 1e-12);
        assert!(partial_similarity("archan", "archaon the everchosen") > 0.9);
    }

    #[test]
    fn test_exact_names_win() {
        assert_eq!(
            resolver().resolve("archaon or skarbrand"),
            Ok(vec!["Archaon".to_string(), "Skarbrand".to_string()])
        );
        assert_eq!(
            resolver().resolve("How tough is the Lord-of-Change?"),
            Ok(vec!["Lord of Change".to_string()])
        );
    }

    #[test]
    fn test_alias_match() {
        assert_eq!(
            resolver().resolve("how hard does a bt hit"),
            Ok(vec!["Bloodthirster of Insensate Rage".to_string()])
        );
        assert_eq!(
            resolver().resolve("best greater daemons"),
            Ok(vec!["Skarbrand".to_string(), "Kairos Fateweaver".to_string()])
        );
    }

    #[test]
    fn test_unknown_alias_targets_are_dropped() {
        assert_eq!(resolver().resolve("ghost"), Err(ResolveError::NotFound));
    }

    #[test]
    fn test_comparison_with_typos() {
        assert_eq!(
            resolver().resolve("archan vs skarbrnd"),
            Ok(vec!["Archaon".to_string(), "Skarbrand".to_string()])
        );
    }

    #[test]
    fn test_partial_prefix_match() {
        assert_eq!(
            resolver().resolve("kairos"),
            Ok(vec!["Kairos Fateweaver".to_string()])
        );
        assert_eq!(
            resolver().resolve("what does fatewea do"),
            Ok(vec!["Kairos Fateweaver".to_string()])
        );
    }

    #[test]
    fn test_partial_ambiguity() {
        match resolver().resolve("chaos") {
            Err(ResolveError::Ambiguous(candidates)) => {
                assert_eq!(
                    candidates,
                    vec!["Chaos Chosen", "Chaos Knights", "Chaos Warriors"]
                );
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguity_is_capped() {
        let names: Vec<String> = (0..9).map(|i| format!("Spire Unit{}", i)).collect();
        let resolver = UnitResolver::new(names, &HashMap::new());
        match resolver.resolve("spire") {
            Err(ResolveError::Ambiguous(candidates)) => {
                assert_eq!(candidates.len(), MAX_AMBIGUOUS_CANDIDATES)
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[test]
    fn test_short_words_are_ignored() {
        assert_eq!(resolver().resolve("the of a"), Err(ResolveError::NotFound));
    }

    #[test]
    fn test_rank_candidates() {
        let ranked = resolver().rank_candidates("is skarbrand good", 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0], "Skarbrand");

        let rambling = format!("is skarbrand good {}", "and also ".repeat(1000));
        assert_eq!(resolver().rank_candidates(&rambling, 1), vec!["Skarbrand"]);
    }

    #[test]
    fn test_resolve_explicit_list() {
        let found = resolver()
            .resolve_explicit_list("compare these:\nkairos fateweaver\n\nskarbrnd\nskarbrand");
        assert_eq!(found, vec!["Kairos Fateweaver", "Skarbrand"]);
        assert!(resolver().resolve_explicit_list("no colon here").is_empty());
        assert!(resolver().resolve_explicit_list("archaon: who wins?").is_empty());
    }

    #[test]
    fn test_direct_matches() {
        assert_eq!(
            resolver().direct_matches("Archaon vs Skarbrand"),
            vec!["Archaon", "Skarbrand"]
        );
        assert_eq!(
            resolver().direct_matches("bt"),
            vec!["Bloodthirster of Insensate Rage"]
        );
        assert!(resolver().direct_matches("skarbrnd").is_empty());
    }
}
