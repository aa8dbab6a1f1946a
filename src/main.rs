mod bot;
mod models;
mod utils;

use std::env;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;

use crate::bot::data::BotData;
use crate::utils::config::ConfigManager;
use crate::utils::env_watcher::EnvWatcher;
use crate::utils::event_pack::EventContext;
use crate::utils::phrases::PhraseBook;
use crate::utils::reference::ReferenceData;

const CONFIG_PATH: &str = "config.json";
const ENV_PATH: &str = ".env";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), bot::Error> {
    dotenvy::dotenv().ok();

    let config_manager =
        ConfigManager::new(CONFIG_PATH).map_err(|e| anyhow!("Failed to load {}: {}", CONFIG_PATH, e))?;

    let log_file = config_manager.global.log_file.clone();
    if let Err(e) = utils::logger::BotLogger::init(log_file.as_deref()) {
        eprintln!("Logger initialisation failed: {}", e);
    }
    log::info!(
        "Config loaded from {} ({} bot profiles)",
        CONFIG_PATH,
        config_manager.bot_profiles().len()
    );

    // keep the watcher alive for the whole run
    let _env_watcher = if Path::new(ENV_PATH).exists() {
        match EnvWatcher::new(ENV_PATH) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                log::warn!("Not watching {}: {}", ENV_PATH, e);
                None
            }
        }
    } else {
        None
    };

    let data_dir = config_manager.data_dir();
    let reference = Arc::new(ReferenceData::load(&data_dir));
    let phrases = Arc::new(PhraseBook::load(&data_dir));
    let tom = &config_manager.global.tom;
    let event = Arc::new(EventContext::load(
        &data_dir.join(&tom.context_dir),
        &tom.event_name,
    ));
    let profiles = config_manager.bot_profiles().to_vec();
    let config = Arc::new(config_manager.into_global());

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

    let mut bots = Vec::new();
    for profile in profiles {
        let token = match env::var(&profile.token_env) {
            Ok(token) if !token.trim().is_empty() => token,
            _ => {
                log::warn!(
                    "{} is not set, bot '{}' will not start",
                    profile.token_env,
                    profile.name
                );
                continue;
            }
        };
        let data = BotData::new(
            profile,
            Arc::clone(&config),
            Arc::clone(&reference),
            Arc::clone(&phrases),
            Arc::clone(&event),
            http.clone(),
        );
        bots.push(tokio::spawn(bot::run_bot(token, data)));
    }

    if bots.is_empty() {
        return Err(anyhow!(
            "No bot token found. Set the token variables named in {} (e.g. DISCORD_TOKEN).",
            CONFIG_PATH
        ));
    }

    // the first bot to fail takes the process down with it
    let running = bots.into_iter().map(|handle| async move {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("Bot task aborted: {}", e)),
        }
    });
    futures::future::try_join_all(running).await?;
    Ok(())
}
