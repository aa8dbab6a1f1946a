use crate::models::types::AosEventsConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Only the best four events count towards the Cali Masters score.
pub const COUNTED_EVENTS: usize = 4;

static EVENT_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^event_(\d+)_id$").expect("event key pattern is valid"));

#[derive(Debug, Error)]
pub enum AosEventsError {
    #[error("aos-events request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactionWinrate {
    pub name: String,
    /// Draws can be counted as half wins, so both are fractional.
    #[serde(default)]
    pub wins: f64,
    #[serde(default)]
    pub games: f64,
}

impl FactionWinrate {
    pub fn win_rate(&self) -> f64 {
        if self.games <= 0.0 {
            0.0
        } else {
            self.wins / self.games * 100.0
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WinratesResponse {
    #[serde(default)]
    pub factions: Vec<FactionWinrate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardEntry {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub top4_sum: Value,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl LeaderboardEntry {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn score(&self) -> String {
        match &self.top4_sum {
            Value::String(s) => s.clone(),
            Value::Null => "0".to_string(),
            other => other.to_string(),
        }
    }

    /// Number of `event_<n>_id` fields that are filled in.
    pub fn event_count(&self) -> usize {
        self.extra
            .iter()
            .filter(|(key, value)| EVENT_KEY_RE.is_match(key) && is_truthy(value))
            .count()
    }

    pub fn matches(&self, query: &str) -> bool {
        let key = query.trim().to_lowercase();
        key == self.full_name().to_lowercase()
            || key == self.first_name.to_lowercase()
            || key == self.last_name.to_lowercase()
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// `<base>?time=<filter>`, adding `/api/winrates` unless the base already points there.
pub fn winrates_url(base: &str, time_filter: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.to_lowercase().ends_with("winrates") {
        format!("{}?time={}", base, time_filter)
    } else {
        format!("{}/api/winrates?time={}", base, time_filter)
    }
}

#[derive(Debug, Clone)]
pub struct AosEventsClient {
    http: reqwest::Client,
    config: AosEventsConfig,
}

impl AosEventsClient {
    pub fn new(http: reqwest::Client, config: AosEventsConfig) -> Self {
        Self { http, config }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, AosEventsError> {
        log::info!("Fetching {}", url);
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    pub async fn fetch_winrates(&self, time_filter: &str) -> Result<WinratesResponse, AosEventsError> {
        self.fetch_json(&winrates_url(&self.config.winrates_url, time_filter))
            .await
    }

    pub async fn fetch_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, AosEventsError> {
        self.fetch_json(&self.config.leaderboard_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winrates_url() {
        assert_eq!(
            winrates_url("https://aos-events.com/api/winrates/", "recent"),
            "https://aos-events.com/api/winrates?time=recent"
        );
        assert_eq!(
            winrates_url("https://aos-events.com", "all"),
            "https://aos-events.com/api/winrates?time=all"
        );
    }

    #[test]
    fn test_win_rate() {
        let faction = FactionWinrate {
            name: "Skaven".to_string(),
            wins: 3.0,
            games: 4.0,
        };
        assert_eq!(faction.win_rate(), 75.0);
        let empty = FactionWinrate {
            name: "Nobody".to_string(),
            wins: 0.0,
            games: 0.0,
        };
        assert_eq!(empty.win_rate(), 0.0);
    }

    #[test]
    fn test_leaderboard_entry() {
        let entries: Vec<LeaderboardEntry> = serde_json::from_str(
            r#"[{"first_name":"Ada","last_name":"Lovelace","top4_sum":312.5,
                 "event_1_id":17,"event_2_id":null,"event_3_id":"","event_4_id":"abc",
                 "event_5_id":9,"event_6_id":4,"event_name":"x"}]"#,
        )
        .unwrap();
        let entry = &entries[0];
        assert_eq!(entry.full_name(), "Ada Lovelace");
        assert_eq!(entry.score(), "312.5");
        assert_eq!(entry.event_count(), 4);
        assert!(entry.matches("  ada lovelace "));
        assert!(entry.matches("LOVELACE"));
        assert!(!entry.matches("ada l"));
    }

    #[test]
    fn test_winrates_response_defaults() {
        let parsed: WinratesResponse =
            serde_json::from_str(r#"{"factions":[{"name":"Seraphon","wins":5}]}"#).unwrap();
        assert_eq!(parsed.factions[0].games, 0.0);
        let empty: WinratesResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.factions.is_empty());
    }

    #[test]
    fn test_fractional_wins() {
        let parsed: WinratesResponse = serde_json::from_str(
            r#"{"factions":[{"name":"Skaven","wins":10.5,"games":21},{"name":"Seraphon","wins":3,"games":4}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.factions[0].wins, 10.5);
        assert_eq!(parsed.factions[0].win_rate(), 50.0);
        assert_eq!(parsed.factions[1].win_rate(), 75.0);
    }
}
