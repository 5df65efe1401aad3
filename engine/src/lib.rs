use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod db;
pub mod leaderboard;
pub mod lock;
pub mod meta;
pub mod providers;

pub use shared::{Counts, Provider, Scope, Window};

pub fn init_tracing() {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().pretty());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}
