//! # overlay-churn - Stochastic Churn Mocker for Overlay Networks
//!
//! Generates, at a fixed interval, a stream of node join/leave and link
//! up/down events that drive a simulated overlay towards a target size and
//! average degree. Consumers (visualisers, test drivers) subscribe to the
//! event feed; no traffic or latency is simulated.
//!
//! ## Core Components
//!
//! - **ChurnEngine**: node partition, link pool and the per-round step
//! - **EventSink**: publish-only feed the engine writes transitions to
//! - **spawn_mocker**: tokio timer loop stepping one engine per tick
//! - **random_node_ids**: x25519-derived seed population
//!
//! ```no_run
//! use overlay_churn::{random_node_ids, spawn_mocker, ChannelSink, ChurnEngine, MockerConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MockerConfig::default();
//! let ids = random_node_ids(config.node_count)?;
//! let (sink, mut feed) = ChannelSink::new();
//!
//! let engine = ChurnEngine::new(config, ids, sink)?;
//! let engine = spawn_mocker(engine, Some(10)).join().await?;
//! drop(engine); // closes the feed
//!
//! while let Some((round, event)) = feed.recv().await {
//!     println!("{} {:?}", round, event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod churn_config;
pub mod churn_engine;
pub mod churn_identity;
pub mod churn_interface;
pub mod churn_sinks;
pub mod churn_ticker;

// Re-export commonly used types
pub use churn_config::{parse_seed_hex, ConfigError, MockerConfig};
pub use churn_engine::{plan_tick, ChurnEngine, TickPlan, TickReport};
pub use churn_identity::{random_node_id, random_node_ids, IdentityError};
pub use churn_interface::{ChurnEvent, EventSink, Link, LinkKey, NoOpSink, NodeId, Round};
pub use churn_sinks::{
    ChannelSink, CollectorEventSink, CsvEventSink, LoggingEventSink, StatsSink,
};
pub use churn_ticker::{spawn_mocker, MockerError, MockerHandle};
