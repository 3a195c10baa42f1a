//! Local notifications for order status changes
//!
//! [`NotificationService`] is constructed once per client session with an
//! injected [`PreferenceStore`]. Preferences are loaded by `init` and written
//! back by `teardown`; device resources held by sinks are released on
//! teardown.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::OrderStatus;
use tokio::sync::{Mutex, mpsc};

use crate::{ClientError, ClientResult, StatusTransition};

/// Key under which preferences are persisted
pub const PREFERENCES_KEY: &str = "order-notifications";

/// Notification output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Toast,
    Sound,
    Vibration,
    Browser,
    /// Web push subscription (customer app only)
    Push,
}

/// Which app the session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    #[default]
    Customer,
    /// Dashboard / KDS
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushPermission {
    #[default]
    NotAsked,
    Granted,
    Denied,
}

/// Persisted per-device notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub toast: bool,
    pub sound: bool,
    pub vibration: bool,
    pub browser: bool,
    pub push_permission: PushPermission,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            toast: true,
            sound: true,
            vibration: true,
            browser: true,
            push_permission: PushPermission::NotAsked,
        }
    }
}

/// Rendered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub order_id: i64,
    pub venue_id: i64,
    pub status: OrderStatus,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_transition(transition: &StatusTransition, role: ClientRole) -> Self {
        let title = match (role, transition.table_id) {
            (ClientRole::Customer, _) => "Your order".to_string(),
            (ClientRole::Staff, Some(table_id)) => format!("Table {table_id}"),
            (ClientRole::Staff, None) => "Takeaway".to_string(),
        };
        let phrase = match transition.to {
            OrderStatus::New => "was received",
            OrderStatus::Preparing => "is being prepared",
            OrderStatus::Ready => "is ready",
            OrderStatus::Served => "has been served",
            OrderStatus::Cancelled => "was cancelled",
        };

        Self {
            order_id: transition.order_id,
            venue_id: transition.venue_id,
            status: transition.to,
            title,
            body: format!("Order #{} {phrase}", transition.order_id),
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// A device output (toast layer, audio, vibration motor, push subscription)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> ClientResult<()>;

    /// Release held device resources
    async fn release(&self) {}
}

/// Forwards notifications to the UI loop over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver(&self, notification: &Notification) -> ClientResult<()> {
        self.tx
            .send(notification.clone())
            .map_err(|_| ClientError::SinkClosed("receiver dropped".to_string()))
    }
}

// =============================================================================
// Preference stores
// =============================================================================

/// Local key-value store backing the preferences
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> ClientResult<Option<String>>;
    async fn set(&self, key: &str, value: String) -> ClientResult<()>;
}

#[async_trait]
impl<T: PreferenceStore + ?Sized> PreferenceStore for Arc<T> {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: String) -> ClientResult<()> {
        (**self).set(key, value).await
    }
}

#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> ClientResult<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// JSON object file of string entries
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> ClientResult<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PreferenceStore for FilePreferenceStore {
    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.read_entries().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> ClientResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&entries)?).await?;
        Ok(())
    }
}

// =============================================================================
// Service
// =============================================================================

/// Turns status transitions into local notifications
pub struct NotificationService<S: PreferenceStore> {
    store: S,
    role: ClientRole,
    preferences: NotificationPreferences,
    sinks: Vec<(Channel, Arc<dyn NotificationSink>)>,
    initialized: bool,
}

impl<S: PreferenceStore> NotificationService<S> {
    pub fn new(store: S, role: ClientRole) -> Self {
        Self {
            store,
            role,
            preferences: NotificationPreferences::default(),
            sinks: Vec::new(),
            initialized: false,
        }
    }

    /// Attach a sink for `channel`
    pub fn with_sink(mut self, channel: Channel, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push((channel, sink));
        self
    }

    /// Load preferences. A corrupt entry falls back to defaults.
    pub async fn init(&mut self) -> ClientResult<()> {
        self.preferences = match self.store.get(PREFERENCES_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable notification preferences: {e}");
                NotificationPreferences::default()
            }),
            None => NotificationPreferences::default(),
        };
        self.initialized = true;
        tracing::debug!(role = ?self.role, sinks = self.sinks.len(), "Notification service initialized");
        Ok(())
    }

    /// Release sinks and persist preferences
    pub async fn teardown(&mut self) -> ClientResult<()> {
        if !self.initialized {
            return Ok(());
        }
        for (_, sink) in self.sinks.drain(..) {
            sink.release().await;
        }
        self.initialized = false;
        self.persist().await
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    pub fn preferences(&self) -> &NotificationPreferences {
        &self.preferences
    }

    pub async fn update_preferences(
        &mut self,
        preferences: NotificationPreferences,
    ) -> ClientResult<()> {
        self.preferences = preferences;
        self.persist().await
    }

    /// Record the answer to the push permission prompt
    pub async fn set_push_permission(&mut self, permission: PushPermission) -> ClientResult<()> {
        self.preferences.push_permission = permission;
        self.persist().await
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        let prefs = &self.preferences;
        match channel {
            Channel::Toast => prefs.toast,
            Channel::Sound => prefs.sound,
            Channel::Vibration => prefs.vibration,
            Channel::Browser => prefs.browser,
            Channel::Push => {
                self.role == ClientRole::Customer
                    && prefs.push_permission == PushPermission::Granted
            }
        }
    }

    /// Deliver `transition` to every enabled sink; returns the channels reached.
    ///
    /// Delivery failures are logged and never propagated.
    pub async fn notify(&self, transition: &StatusTransition) -> Vec<Channel> {
        if !self.initialized {
            tracing::debug!(order_id = transition.order_id, "Notification service not initialized");
            return Vec::new();
        }

        let notification = Notification::for_transition(transition, self.role);
        let mut delivered = Vec::new();
        for (channel, sink) in &self.sinks {
            if !self.is_enabled(*channel) {
                continue;
            }
            match sink.deliver(&notification).await {
                Ok(()) => delivered.push(*channel),
                Err(e) => tracing::warn!(
                    channel = ?channel,
                    order_id = transition.order_id,
                    "Notification delivery failed: {e}"
                ),
            }
        }
        delivered
    }

    async fn persist(&self) -> ClientResult<()> {
        let raw = serde_json::to_string(&self.preferences)?;
        self.store.set(PREFERENCES_KEY, raw).await
    }
}
