// Round Watcher - live round-result signal relay
// Streams round results, derives BIG/SMALL + EVEN/ODD signals and pushes
// them to a web endpoint (with optional Telegram mirroring)

pub mod backfill;
pub mod config;
pub mod deduplicator;
pub mod heartbeat;
pub mod parser;
pub mod pipeline;
pub mod push;
pub mod signal;
pub mod stream;
pub mod telegram;
pub mod types;
