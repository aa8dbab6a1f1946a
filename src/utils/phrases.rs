use rand::Rng;
use rand::distr::weighted::WeightedIndex;
use rand::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const PHRASES_FILE: &str = "phrases.json";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PhraseEntry {
    Plain(String),
    Weighted { text: String, weight: f64 },
}

impl PhraseEntry {
    pub fn text(&self) -> &str {
        match self {
            PhraseEntry::Plain(text) => text,
            PhraseEntry::Weighted { text, .. } => text,
        }
    }

    fn weight(&self) -> f64 {
        match self {
            PhraseEntry::Plain(_) => 1.0,
            PhraseEntry::Weighted { weight, .. } => weight.max(0.0),
        }
    }
}

/// Canned responses and word lists that used to live inline in the bot scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhraseBook {
    pub maddy_prelines: Vec<PhraseEntry>,
    /// lowercase query -> fixed reply for `!rank`
    pub rank_jokes: HashMap<String, String>,
    /// queries answered with a made-up acronym expansion
    pub acronym_queries: Vec<String>,
    pub acronym_words: Vec<String>,
}

impl Default for PhraseBook {
    fn default() -> Self {
        let plain = |s: &str| PhraseEntry::Plain(s.to_string());
        Self {
            maddy_prelines: vec![
                plain("Compiling. Precision refuses to hurry."),
                plain("Please wait while I fetch a chair so I can reach the rulebook."),
                plain("Measuring twice, answering once."),
                plain("Brewing clarity. If only this were soup."),
                plain("Climbing the metaphorical bookshelf. Again."),
            ],
            rank_jokes: HashMap::from([
                ("corsairs".to_string(), "utter trash".to_string()),
                ("ligmar".to_string(), "BALLS!".to_string()),
            ]),
            acronym_queries: vec!["tsd".to_string()],
            acronym_words: [
                "amazing", "bold", "crunchy", "daring", "eager", "fancy", "grand", "hungry",
                "idle", "jolly", "keen", "lucky", "mighty", "noble", "odd", "proud", "quick",
                "rowdy", "soggy", "tiny", "unruly", "vast", "wild", "yellow", "zesty", "sigmar",
                "dice", "tournament", "terrain", "dragon", "squad", "strategy", "sandwich",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
        }
    }
}

impl PhraseBook {
    /// Load `phrases.json`, falling back to the built-in tables for anything missing.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(PHRASES_FILE);
        if !path.exists() {
            return Self::default();
        }
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<PhraseBook>(&content).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(mut book) => {
                let defaults = Self::default();
                if book.maddy_prelines.is_empty() {
                    book.maddy_prelines = defaults.maddy_prelines;
                }
                if book.acronym_words.is_empty() {
                    book.acronym_words = defaults.acronym_words;
                }
                book
            }
            Err(e) => {
                log::error!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn maddy_preline<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        choose_weighted(&self.maddy_prelines, rng).unwrap_or("One moment.")
    }

    pub fn rank_joke(&self, query: &str) -> Option<&str> {
        self.rank_jokes
            .get(&query.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn is_acronym_query(&self, query: &str) -> bool {
        let key = query.trim();
        self.acronym_queries
            .iter()
            .any(|q| q.eq_ignore_ascii_case(key))
    }

    /// Expand each letter into a random capitalized word starting with it.
    pub fn random_acronym<R: Rng + ?Sized>(&self, letters: &str, rng: &mut R) -> String {
        letters
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|letter| {
                let lower = letter.to_ascii_lowercase();
                let bucket: Vec<&String> = self
                    .acronym_words
                    .iter()
                    .filter(|w| w.chars().next().map(|c| c.to_ascii_lowercase()) == Some(lower))
                    .collect();
                match bucket.choose(rng) {
                    Some(word) => capitalize(word),
                    None => letter.to_ascii_uppercase().to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub fn choose_weighted<'a, R: Rng + ?Sized>(entries: &'a [PhraseEntry], rng: &mut R) -> Option<&'a str> {
    let weights: Vec<f64> = entries.iter().map(PhraseEntry::weight).collect();
    let index = WeightedIndex::new(&weights).ok()?;
    entries.get(index.sample(rng)).map(PhraseEntry::text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_defaults() {
        let book = PhraseBook::default();
        assert_eq!(book.rank_joke(" Corsairs "), Some("utter trash"));
        assert_eq!(book.rank_joke("someone"), None);
        assert!(book.is_acronym_query("TSD"));
    }

    #[test]
    fn test_random_acronym_uses_matching_letters() {
        let book = PhraseBook::default();
        let mut rng = StdRng::seed_from_u64(7);
        let expansion = book.random_acronym("TSD", &mut rng);
        let initials: String = expansion
            .split(' ')
            .filter_map(|w| w.chars().next())
            .collect();
        assert_eq!(initials, "TSD");

        let unknown = book.random_acronym("x", &mut rng);
        assert_eq!(unknown, "X");
    }

    #[test]
    fn test_weighted_choice_skips_zero_weight() {
        let entries = vec![
            PhraseEntry::Weighted {
                text: "never".to_string(),
                weight: 0.0,
            },
            PhraseEntry::Plain("always".to_string()),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(choose_weighted(&entries, &mut rng), Some("always"));
        }
        assert_eq!(choose_weighted(&[], &mut rng), None);
    }

    #[test]
    fn test_parse_mixed_entries() {
        let book: PhraseBook = serde_json::from_str(
            r#"{"maddy_prelines":["plain",{"text":"heavy","weight":3}],"rank_jokes":{"x":"y"}}"#,
        )
        .unwrap();
        assert_eq!(book.maddy_prelines.len(), 2);
        assert_eq!(book.maddy_prelines[1].text(), "heavy");
        assert_eq!(book.rank_joke("X"), Some("y"));
        assert!(!book.acronym_words.is_empty());
    }
}
