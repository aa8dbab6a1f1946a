use std::sync::Arc;

use crate::models::types::{BotProfile, GlobalConfig};
use crate::utils::aos_events::AosEventsClient;
use crate::utils::api::LlmClient;
use crate::utils::event_pack::EventContext;
use crate::utils::phrases::PhraseBook;
use crate::utils::reference::ReferenceData;

/// Per-bot state handed to every command. Everything behind the `Arc`s is
/// loaded once at start-up and never mutated.
#[derive(Clone)]
pub struct BotData {
    pub profile: Arc<BotProfile>,
    pub config: Arc<GlobalConfig>,
    pub reference: Arc<ReferenceData>,
    pub phrases: Arc<PhraseBook>,
    pub event: Arc<EventContext>,
    pub aos_events: AosEventsClient,
    pub llm: LlmClient,
}

impl BotData {
    pub fn new(
        profile: BotProfile,
        config: Arc<GlobalConfig>,
        reference: Arc<ReferenceData>,
        phrases: Arc<PhraseBook>,
        event: Arc<EventContext>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            profile: Arc::new(profile),
            aos_events: AosEventsClient::new(http.clone(), config.aos_events.clone()),
            llm: LlmClient::new(http, config.llm.clone()),
            config,
            reference,
            phrases,
            event,
        }
    }
}
