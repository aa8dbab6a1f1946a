use crate::utils::api::ApiConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub bots: Vec<BotProfile>,
    /// Overridden by `MADDY_DATA_DIR` when set.
    pub data_dir: String,
    pub log_file: Option<String>,
    pub aos_events: AosEventsConfig,
    pub llm: ApiConfig,
    pub winrates: WinratesConfig,
    pub maddy: MaddyConfig,
    pub tom: TomConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            bots: vec![
                BotProfile {
                    name: "leaderboard".to_string(),
                    token_env: "DISCORD_TOKEN".to_string(),
                    description: "Cali Masters Leaderboard Bot".to_string(),
                    commands: vec!["top8".into(), "rank".into(), "help".into()],
                },
                BotProfile {
                    name: "aos".to_string(),
                    token_env: "DISCORD_TOKEN_AOSEVENTS".to_string(),
                    description: "AoS Win Rates Bot".to_string(),
                    commands: vec![
                        "winrates".into(),
                        "dmg".into(),
                        "maddy".into(),
                        "noog".into(),
                        "help".into(),
                    ],
                },
                BotProfile {
                    name: "tom".to_string(),
                    token_env: "DISCORD_TOKEN_TOMBOT".to_string(),
                    description: "TomBot, event pack questions".to_string(),
                    commands: vec!["tom".into(), "help".into()],
                },
            ],
            data_dir: "data".to_string(),
            log_file: Some("bot.log".to_string()),
            aos_events: AosEventsConfig::default(),
            llm: ApiConfig::default(),
            winrates: WinratesConfig::default(),
            maddy: MaddyConfig::default(),
            tom: TomConfig::default(),
        }
    }
}

/// One Discord client: the env var holding its token and the commands it serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotProfile {
    pub name: String,
    pub token_env: String,
    #[serde(default)]
    pub description: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AosEventsConfig {
    pub winrates_url: String,
    pub leaderboard_url: String,
    pub site_url: String,
    pub leaderboard_page: String,
}

impl Default for AosEventsConfig {
    fn default() -> Self {
        Self {
            winrates_url: "https://aos-events.com/api/winrates".to_string(),
            leaderboard_url: "https://aos-events.com/api/california_itc_scores".to_string(),
            site_url: "https://aos-events.com".to_string(),
            leaderboard_page: "https://aos-events.com/calimasters".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WinratesConfig {
    pub time_filters: Vec<String>,
    pub excluded_factions: Vec<String>,
    /// alias (lowercase) -> faction name
    pub aliases: BTreeMap<String, String>,
    /// faction name -> emoji
    pub emoji: BTreeMap<String, String>,
}

impl WinratesConfig {
    pub fn is_time_filter(&self, value: &str) -> bool {
        self.time_filters.iter().any(|t| t.eq_ignore_ascii_case(value))
    }

    pub fn faction_for(&self, alias: &str) -> Option<&str> {
        self.aliases.get(&alias.to_lowercase()).map(String::as_str)
    }

    pub fn emoji_for(&self, faction: &str) -> &str {
        self.emoji.get(faction).map(String::as_str).unwrap_or("")
    }
}

const FACTION_ALIASES: &[(&str, &str)] = &[
    ("fec", "Flesh-eater Courts"),
    ("flesh-eater courts", "Flesh-eater Courts"),
    ("idk", "Idoneth Deepkin"),
    ("idoneth", "Idoneth Deepkin"),
    ("deepkin", "Idoneth Deepkin"),
    ("lrl", "Lumineth Realm-lords"),
    ("lumineth", "Lumineth Realm-lords"),
    ("realm-lords", "Lumineth Realm-lords"),
    ("dot", "Disciples of Tzeentch"),
    ("tzeentch", "Disciples of Tzeentch"),
    ("sons", "Sons of Behemat"),
    ("sob", "Sons of Behemat"),
    ("trees", "Sylvaneth"),
    ("sylvaneth", "Sylvaneth"),
    ("lizards", "Seraphon"),
    ("seraphon", "Seraphon"),
    ("sbgl", "Soulblight Gravelords"),
    ("soulblight", "Soulblight Gravelords"),
    ("bok", "Blades of Khorne"),
    ("khorne", "Blades of Khorne"),
    ("sce", "Stormcast Eternals"),
    ("stormcast", "Stormcast Eternals"),
    ("hos", "Hedonites of Slaanesh"),
    ("slaanesh", "Hedonites of Slaanesh"),
    ("cos", "Cities of Sigmar"),
    ("cities", "Cities of Sigmar"),
    ("dok", "Daughters of Khaine"),
    ("daughters", "Daughters of Khaine"),
    ("ogors", "Ogor Mawtribes"),
    ("mawtribes", "Ogor Mawtribes"),
    ("std", "Slaves to Darkness"),
    ("slaves", "Slaves to Darkness"),
    ("s2d", "Slaves to Darkness"),
    ("mon", "Maggotkin of Nurgle"),
    ("nurgle", "Maggotkin of Nurgle"),
    ("obr", "Ossiarch Bonereapers"),
    ("ossiarch bonereapers", "Ossiarch Bonereapers"),
    ("ij", "Ironjawz"),
    ("ironjawz", "Ironjawz"),
    ("ko", "Kharadron Overlords"),
    ("kharadron overlords", "Kharadron Overlords"),
    ("nh", "Nighthaunt"),
    ("ghosts", "Nighthaunt"),
    ("rats", "Skaven"),
    ("skaven", "Skaven"),
    ("kb", "Kruleboyz"),
    ("kruleboyz", "Kruleboyz"),
    ("fs", "Fyreslayers"),
    ("fyreslayers", "Fyreslayers"),
    ("gitz", "Gloomspite Gitz"),
    ("gloomspite gitz", "Gloomspite Gitz"),
];

const FACTION_EMOJI: &[(&str, &str)] = &[
    ("Flesh-eater Courts", "🦴"),
    ("Idoneth Deepkin", "🌊"),
    ("Lumineth Realm-lords", "💡"),
    ("Disciples of Tzeentch", "🔮"),
    ("Sons of Behemat", "🍖"),
    ("Sylvaneth", "🌳"),
    ("Seraphon", "🦎"),
    ("Soulblight Gravelords", "🩸"),
    ("Blades of Khorne", "🔥"),
    ("Stormcast Eternals", "⚡"),
    ("Hedonites of Slaanesh", "🎵"),
    ("Cities of Sigmar", "🏙️"),
    ("Daughters of Khaine", "🩸"),
    ("Ogor Mawtribes", "🍖"),
    ("Slaves to Darkness", "⛓️"),
    ("Maggotkin of Nurgle", "🪱"),
    ("Ossiarch Bonereapers", "💀"),
    ("Ironjawz", "🔨"),
    ("Kharadron Overlords", "⚓"),
    ("Nighthaunt", "👻"),
    ("Skaven", "🐀"),
    ("Kruleboyz", "👺"),
    ("Fyreslayers", "🪓"),
    ("Gloomspite Gitz", "🍄"),
];

fn owned_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for WinratesConfig {
    fn default() -> Self {
        Self {
            time_filters: vec!["all".into(), "recent".into(), "battlescroll".into()],
            excluded_factions: vec!["Beasts of Chaos".into(), "Bonesplitterz".into()],
            aliases: owned_map(FACTION_ALIASES),
            emoji: owned_map(FACTION_EMOJI),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaddyConfig {
    pub max_units: usize,
    /// Local candidates offered to the LLM when nothing resolves directly.
    pub top_k: usize,
}

impl Default for MaddyConfig {
    fn default() -> Self {
        Self {
            max_units: 5,
            top_k: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomConfig {
    pub event_name: String,
    /// Topic files and `event_pack.txt`, relative to the data directory.
    pub context_dir: String,
    /// Pack chunks retrieved by similarity, on top of the keyword-tagged ones.
    pub top_k: usize,
}

impl Default for TomConfig {
    fn default() -> Self {
        Self {
            event_name: "Roar in 24".to_string(),
            context_dir: "tombot".to_string(),
            top_k: 3,
        }
    }
}
