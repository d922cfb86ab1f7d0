//! # Live Synchronization Client
//!
//! Keeps client-side entity collections consistent under three inputs:
//! paginated bulk loads, the local user's optimistic mutations, and pushes
//! from the real-time channel.
//!
//! ## Architecture
//!
//! - **Connection**: push channel lifecycle, heartbeat and reconnect backoff
//! - **Store**: immutable entity snapshots and the reconciliation reducer
//! - **Notifications**: de-duplicated, prioritized, serially delivered alerts
//! - **Live**: per-collection facade tying the above together
//! - **Context**: [`SyncContext`], built once and passed to whoever needs it
//!
//! Everything runs on one thread; shared pieces are `Rc<RefCell<_>>` and
//! nothing is global.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vcms_sync::client::SyncContext;
//! use vcms_sync::shared::{PageRequest, SyncConfig};
//! use vcms_sync::shared::models::BerthAllocation;
//!
//! # async fn example() -> Result<(), vcms_sync::shared::SyncError> {
//! let mut context = SyncContext::new(SyncConfig::default())?;
//! let allocations = context.collection::<BerthAllocation>();
//!
//! context.connect().await?;
//! context.bind("entity-updates", &allocations).await?;
//! context.load(&allocations, &PageRequest::new(0, 50)).await?;
//!
//! // Drive the push channel
//! context.connection_mut().run().await;
//! # Ok(())
//! # }
//! ```

pub mod api_client;
pub mod connection;
pub mod live;
pub mod notifications;
pub mod store;
pub mod subscription;
pub mod sync;

pub use api_client::{ApiClient, EntityApi};
pub use connection::{ConnectionManager, ConnectionState, ScriptedTransport, Transport, WsTransport};
pub use live::{LiveCollection, UpdateTicket};
pub use notifications::{Notification, NotificationCenter, NotificationRequest, Severity};
pub use store::{EntityStore, Outcome, SyncEvent};
pub use subscription::SubscriptionToken;

use crate::client::notifications::connection_notification;
use crate::client::sync::scheduler::{Clock, SystemClock};
use crate::shared::api::PageRequest;
use crate::shared::config::SyncConfig;
use crate::shared::error::SyncError;
use crate::shared::event::PushEventType;
use crate::shared::models::{Entity, EntityId};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

/// Shared handle to a live collection
pub type SharedCollection<E> = Rc<RefCell<LiveCollection<E>>>;

/// Everything the synchronization layer needs, constructed once
pub struct SyncContext<T: Transport = WsTransport> {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    connection: ConnectionManager<T>,
    api: ApiClient,
    notifications: Rc<RefCell<NotificationCenter>>,
}

impl<T: Transport> std::fmt::Debug for SyncContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("config", &self.config)
            .field("connection", &self.connection)
            .finish()
    }
}

impl SyncContext<WsTransport> {
    /// Context talking WebSocket to `config.push_channel_url`
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        Self::with_transport(config, WsTransport::new(), Arc::new(SystemClock))
    }
}

impl<T: Transport> SyncContext<T> {
    pub fn with_transport(config: SyncConfig, transport: T, clock: Arc<dyn Clock>) -> Result<Self, SyncError> {
        config
            .validate()
            .map_err(|e| SyncError::validation("config", e.to_string()))?;

        let api = ApiClient::new(&config)?;
        let notifications = Rc::new(RefCell::new(NotificationCenter::new(&config, clock.clone())));
        let mut connection = ConnectionManager::with_clock(transport, &config, clock.clone());

        let center = notifications.clone();
        connection.on_status(move |change| {
            if let Some(request) = connection_notification(change) {
                center.borrow_mut().notify(request);
            }
        });

        tracing::info!(
            "[Connection] Sync context ready (api {}, push {})",
            config.api_base_url,
            config.push_channel_url
        );
        Ok(Self {
            config,
            clock,
            connection,
            api,
            notifications,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.connection
    }

    pub fn notifications(&self) -> Rc<RefCell<NotificationCenter>> {
        self.notifications.clone()
    }

    pub async fn connect(&mut self) -> Result<(), SyncError> {
        self.connection.connect().await
    }

    /// Close the channel; bound collections must be bound again after the next connect
    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await
    }

    /// New empty collection wired to this context's notifications
    pub fn collection<E: Entity>(&self) -> SharedCollection<E> {
        Rc::new(RefCell::new(
            LiveCollection::new(self.config.debounce(), self.clock.clone())
                .with_notifications(self.notifications.clone()),
        ))
    }

    /// Route pushes for `E` on `topic` into `collection`
    pub async fn bind<E: Entity>(
        &mut self,
        topic: &str,
        collection: &SharedCollection<E>,
    ) -> Result<SubscriptionToken, SyncError> {
        let target = Rc::clone(collection);
        self.connection
            .subscribe(topic, PushEventType::for_kind(E::KIND), move |message| {
                if let Err(e) = target.borrow_mut().apply_push(message) {
                    tracing::warn!("[Store] Dropping push {}: {}", message.id, e);
                }
            })
            .await
    }

    pub async fn unbind(&mut self, token: SubscriptionToken) -> bool {
        self.connection.unsubscribe(token).await
    }

    // The REST helpers below return futures that own a clone of the API
    // client and of the collection handle, so the push channel can be driven
    // through `connection_mut` while a request is in flight.

    pub fn load<E: Entity>(
        &self,
        collection: &SharedCollection<E>,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Outcome, SyncError>> {
        let (collection, api, request) = (Rc::clone(collection), self.api.clone(), request.clone());
        async move { live::load_page(&collection, &api, &request).await }
    }

    /// Load the collection's debounced filter if it is due
    pub fn load_due_filter<E: Entity>(
        &self,
        collection: &SharedCollection<E>,
    ) -> impl Future<Output = Result<Option<Outcome>, SyncError>> {
        let (collection, api) = (Rc::clone(collection), self.api.clone());
        async move { live::load_due_filter(&collection, &api).await }
    }

    pub fn update<E: Entity>(
        &self,
        collection: &SharedCollection<E>,
        id: EntityId,
        changes: E::Changes,
    ) -> impl Future<Output = Result<E, SyncError>> {
        let (collection, api) = (Rc::clone(collection), self.api.clone());
        async move { live::submit_update(&collection, &api, id, changes).await }
    }

    pub fn create<E: Entity>(
        &self,
        collection: &SharedCollection<E>,
        draft: E,
    ) -> impl Future<Output = Result<E, SyncError>> {
        let (collection, api) = (Rc::clone(collection), self.api.clone());
        async move { live::submit_create(&collection, &api, draft).await }
    }

    pub fn delete<E: Entity>(
        &self,
        collection: &SharedCollection<E>,
        id: EntityId,
    ) -> impl Future<Output = Result<(), SyncError>> {
        let (collection, api) = (Rc::clone(collection), self.api.clone());
        async move { live::submit_delete(&collection, &api, id).await }
    }
}
