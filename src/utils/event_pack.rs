use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const PACK_FILE: &str = "event_pack.txt";
pub const MAX_CHUNK_CHARS: usize = 500;
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{2,}").expect("paragraph pattern is valid"));

/// Keywords that tag a pack chunk.
const CHUNK_TAGS: &[(&str, &[&str])] = &[
    ("scoring", &["score", "scoring", "tiebreaker", "bcp", "battle point"]),
    ("venue", &["venue", "location", "lake forest", "community center", "where"]),
    ("painting", &["paint", "painting", "model", "appearance"]),
    ("schedule", &["round", "schedule", "start", "registration", "time", "saturday", "sunday"]),
    ("terrain", &["terrain", "table", "layout", "map", "deployment"]),
    ("lists", &["list", "army list", "submit", "submission", "deadline", "lists"]),
    ("food", &["food", "lunch", "snack", "dinner", "meal", "break"]),
    ("faq", &["faq", "question", "ruling", "clarification", "q:"]),
    ("prizes", &["prize", "award", "trophy", "raffle"]),
];

/// Keywords in a question that pull in every chunk with the same tag.
const QUERY_TAGS: &[(&str, &[&str])] = &[
    ("scoring", &["score", "scoring", "points", "tiebreaker", "bcp"]),
    ("venue", &["location", "venue", "where"]),
    ("painting", &["paint", "painting", "model", "appearance"]),
    ("schedule", &["round", "schedule", "start", "registration", "time", "saturday", "sunday"]),
    ("terrain", &["terrain", "table", "layout", "map", "deployment"]),
    ("lists", &["list", "army list", "submit", "submission", "deadline"]),
    ("food", &["food", "lunch", "snack", "dinner", "meal", "break"]),
    ("faq", &["faq", "question", "ruling", "clarification", "q:"]),
    ("prizes", &["prize", "award", "trophy", "raffle"]),
];

/// What an event question is about; each topic may have a hand-written context file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Scoring,
    Venue,
    Painting,
    Schedule,
    Lists,
    Terrain,
    Prizes,
    Rules,
    Faq,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::Scoring,
        Topic::Venue,
        Topic::Painting,
        Topic::Schedule,
        Topic::Lists,
        Topic::Terrain,
        Topic::Prizes,
        Topic::Rules,
        Topic::Faq,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Topic::Scoring => "scoring",
            Topic::Venue => "venue",
            Topic::Painting => "painting",
            Topic::Schedule => "schedule",
            Topic::Lists => "lists",
            Topic::Terrain => "terrain",
            Topic::Prizes => "prizes",
            Topic::Rules => "rules",
            Topic::Faq => "faq",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.label() == label)
    }

    pub fn context_file(self) -> &'static str {
        match self {
            Topic::Scoring => "context_scoring.txt",
            Topic::Venue => "context_location.txt",
            Topic::Painting => "context_painting.txt",
            Topic::Schedule => "context_schedule.txt",
            Topic::Lists => "context_lists.txt",
            Topic::Terrain => "context_terrain.txt",
            Topic::Prizes => "context_prizes.txt",
            Topic::Rules => "context_rules.txt",
            Topic::Faq => "context_faq.txt",
        }
    }
}

/// Topic from a classifier reply such as `"Scoring."`; anything unknown is `Faq`.
pub fn parse_topic(reply: &str) -> Topic {
    let label = reply
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphabetic())
        .to_lowercase();
    Topic::from_label(&label).unwrap_or(Topic::Faq)
}

/// Offline classification: the first topic whose keywords appear in the question.
pub fn keyword_topic(question: &str) -> Topic {
    matching_tags(QUERY_TAGS, question)
        .into_iter()
        .find_map(Topic::from_label)
        .unwrap_or(Topic::Faq)
}

fn matching_tags(table: &[(&'static str, &[&str])], text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    table
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(tag, _)| *tag)
        .collect()
}

/// Group paragraphs into chunks shorter than `max_chars` where possible.
/// A paragraph longer than the limit becomes a chunk of its own.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in PARAGRAPH_BREAK_RE.split(&text) {
        if current.chars().count() + para.chars().count() >= max_chars {
            let done = current.trim();
            if !done.is_empty() {
                chunks.push(done.to_string());
            }
            current.clear();
        }
        current.push_str(para);
        current.push_str("\n\n");
    }
    let done = current.trim();
    if !done.is_empty() {
        chunks.push(done.to_string());
    }
    chunks
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Smoothed TF-IDF with L2-normalized rows; scores are cosine similarities.
#[derive(Debug, Default)]
struct TfIdfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    rows: Vec<HashMap<usize, f64>>,
}

impl TfIdfIndex {
    fn fit(docs: &[String]) -> Self {
        let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d)).collect();
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: Vec<usize> = Vec::new();

        for tokens in &tokenized {
            let mut seen = HashSet::new();
            for token in tokens {
                let next = vocabulary.len();
                let id = *vocabulary.entry(token.clone()).or_insert(next);
                if id == doc_freq.len() {
                    doc_freq.push(0);
                }
                if seen.insert(id) {
                    doc_freq[id] += 1;
                }
            }
        }

        let n = docs.len() as f64;
        let idf = doc_freq
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();
        let mut index = Self {
            vocabulary,
            idf,
            rows: Vec::new(),
        };
        let rows = tokenized.iter().map(|t| index.vectorize(t)).collect();
        index.rows = rows;
        index
    }

    fn vectorize(&self, tokens: &[String]) -> HashMap<usize, f64> {
        let mut weights: HashMap<usize, f64> = HashMap::new();
        for token in tokens {
            if let Some(&id) = self.vocabulary.get(token) {
                *weights.entry(id).or_insert(0.0) += self.idf[id];
            }
        }
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in weights.values_mut() {
                *weight /= norm;
            }
        }
        weights
    }

    fn scores(&self, query: &str) -> Vec<f64> {
        let query = self.vectorize(&tokenize(query));
        self.rows
            .iter()
            .map(|row| {
                query
                    .iter()
                    .filter_map(|(id, w)| row.get(id).map(|r| r * w))
                    .sum()
            })
            .collect()
    }
}

#[derive(Debug)]
struct TaggedChunk {
    text: String,
    tags: Vec<&'static str>,
}

/// The full event pack, split into tagged, searchable chunks.
#[derive(Debug)]
pub struct EventPack {
    chunks: Vec<TaggedChunk>,
    index: TfIdfIndex,
}

impl EventPack {
    pub fn from_text(text: &str) -> Self {
        let texts = split_into_chunks(text, MAX_CHUNK_CHARS);
        let index = TfIdfIndex::fit(&texts);
        let chunks = texts
            .into_iter()
            .map(|text| {
                let tags = matching_tags(CHUNK_TAGS, &text);
                TaggedChunk { text, tags }
            })
            .collect();
        Self { chunks, index }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks tagged like the question, then the `top_k` best TF-IDF matches.
    pub fn relevant_context(&self, question: &str, top_k: usize) -> String {
        let scores = self.index.scores(question);
        let mut order: Vec<usize> = (0..self.chunks.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        let top: Vec<&str> = order
            .into_iter()
            .take(top_k)
            .map(|i| self.chunks[i].text.as_str())
            .collect();

        let wanted = matching_tags(QUERY_TAGS, question);
        let mut injected: Vec<&str> = Vec::new();
        for chunk in &self.chunks {
            let text = chunk.text.as_str();
            if chunk.tags.iter().any(|t| wanted.contains(t))
                && !top.contains(&text)
                && !injected.contains(&text)
            {
                injected.push(text);
            }
        }

        injected
            .into_iter()
            .chain(top)
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }
}

/// Everything `!tom` knows about one event: hand-written topic files and the pack.
#[derive(Debug, Default)]
pub struct EventContext {
    pub event_name: String,
    topics: HashMap<Topic, String>,
    pack: Option<EventPack>,
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            log::error!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

impl EventContext {
    pub fn load(dir: &Path, event_name: &str) -> Self {
        let topics = Topic::ALL
            .into_iter()
            .filter_map(|t| read_text(&dir.join(t.context_file())).map(|text| (t, text)))
            .collect();
        let pack_text = read_text(&dir.join(PACK_FILE));
        let context = Self::from_parts(event_name, topics, pack_text.as_deref());

        if context.is_empty() {
            log::warn!("No event context under {}; !tom has nothing to say", dir.display());
        } else {
            log::info!(
                "Loaded {} topic files and {} pack chunks for {} from {}",
                context.topics.len(),
                context.pack.as_ref().map_or(0, EventPack::len),
                event_name,
                dir.display()
            );
        }
        context
    }

    pub fn from_parts(event_name: &str, topics: HashMap<Topic, String>, pack_text: Option<&str>) -> Self {
        let pack = pack_text
            .map(EventPack::from_text)
            .filter(|pack| !pack.is_empty());
        Self {
            event_name: event_name.to_string(),
            topics,
            pack,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty() && self.pack.is_none()
    }

    /// The topic's own file, else retrieval over the pack, else the FAQ file.
    pub fn context_for(&self, topic: Topic, question: &str, top_k: usize) -> Option<String> {
        self.topics
            .get(&topic)
            .cloned()
            .or_else(|| {
                self.pack
                    .as_ref()
                    .map(|pack| pack.relevant_context(question, top_k))
                    .filter(|text| !text.is_empty())
            })
            .or_else(|| self.topics.get(&Topic::Faq).cloned())
    }
}
