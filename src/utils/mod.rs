pub mod aos_events;
pub mod api;
pub mod config;
pub mod damage;
pub mod dice;
pub mod env_watcher;
pub mod event_pack;
pub mod format;
pub mod logger;
pub mod phrases;
pub mod reference;
pub mod resolver;
pub mod unit_stats;
