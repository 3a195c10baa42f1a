//! Order Client - customer app and KDS runtime
//!
//! - [`OrderApi`]: typed calls to the order server REST API
//! - [`VenueSubscription`]: reconnecting per-venue live event subscription
//! - [`OrderTracker`]: detects status transitions between two fetches
//! - [`NotificationService`]: fans transitions out to local notification sinks
//! - [`OrderWatcher`]: polling + live events driving the tracker

pub mod config;
pub mod error;
pub mod http;
pub mod notify;
pub mod subscription;
pub mod tracker;
pub mod watcher;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::OrderApi;
pub use notify::{
    Channel, ChannelSink, ClientRole, FilePreferenceStore, MemoryPreferenceStore, Notification,
    NotificationPreferences, NotificationService, NotificationSink, PreferenceStore,
    PushPermission,
};
pub use subscription::{ConnectionState, VenueSubscription};
pub use tracker::{OrderTracker, StatusTransition};
pub use watcher::{OrderWatcher, WatchTarget};

// Re-export shared types for convenience
pub use shared::{LiveEvent, LiveEventKind, OrderSignal, OrderStatus};
