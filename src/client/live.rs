//! # Live Collections
//!
//! A [`LiveCollection`] owns the current snapshot of one entity store and is
//! the only place that snapshot changes. Every input (bulk load, local
//! mutation, server answer, remote push) goes through
//! [`reconcile`](crate::client::store::reconcile); the resulting snapshot
//! replaces the old one, listeners are told synchronously, and notices go
//! to the notification center.
//!
//! User mutations are split in two so the optimistic change is visible
//! before any request leaves:
//!
//! ```text
//! begin_update (sync, optimistic)  ->  API request  ->  finish_update (confirm | rollback)
//! ```
//!
//! The `submit_*` and [`load_page`] helpers run that sequence against an
//! [`EntityApi`] without holding the collection borrowed across the await.

use crate::client::api_client::EntityApi;
use crate::client::notifications::{notice_notification, push_notification, NotificationCenter, NotificationRequest, Severity};
use crate::client::store::{
    reconcile, DiscardReason, EntityStore, LocalMutation, Outcome, SyncEvent,
};
use crate::client::subscription::{Subscribers, SubscriptionToken};
use crate::client::sync::conflict_resolver::ConflictRecord;
use crate::client::sync::scheduler::{Clock, Debouncer};
use crate::shared::api::{ApiPaginatedResponse, PageRequest};
use crate::shared::error::SyncError;
use crate::shared::event::PushMessage;
use crate::shared::models::{Entity, EntityId};
use chrono::Utc;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An optimistic update waiting for the server
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTicket<E: Entity> {
    pub id: EntityId,
    pub changes: E::Changes,
    /// Server values of the changed fields, used on rejection
    pub original: E::Changes,
}

pub struct LiveCollection<E: Entity> {
    store: EntityStore<E>,
    notifications: Option<Rc<RefCell<NotificationCenter>>>,
    listeners: Subscribers<EntityStore<E>>,
    filter: Debouncer<PageRequest>,
}

impl<E: Entity> fmt::Debug for LiveCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCollection")
            .field("store", &self.store)
            .field("listeners", &self.listeners.len())
            .field("filter_pending", &self.filter.is_pending())
            .finish()
    }
}

impl<E: Entity> LiveCollection<E> {
    pub fn new(debounce: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: EntityStore::new(),
            notifications: None,
            listeners: Subscribers::new(),
            filter: Debouncer::new(debounce, clock),
        }
    }

    pub fn with_notifications(mut self, center: Rc<RefCell<NotificationCenter>>) -> Self {
        self.notifications = Some(center);
        self
    }

    /// Current snapshot
    pub fn snapshot(&self) -> EntityStore<E> {
        self.store.clone()
    }

    pub fn store(&self) -> &EntityStore<E> {
        &self.store
    }

    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.store.get(id)
    }

    pub fn conflicts(&self) -> Vec<ConflictRecord> {
        self.store.conflicts()
    }

    /// Called with every new snapshot
    pub fn on_change(&mut self, handler: impl FnMut(&EntityStore<E>) + 'static) -> SubscriptionToken {
        self.listeners.subscribe(handler)
    }

    pub fn remove_listener(&mut self, token: SubscriptionToken) -> bool {
        self.listeners.unsubscribe(token)
    }

    /// Feed one event through the reconciliation policy
    pub fn dispatch(&mut self, event: SyncEvent<E>) -> Result<Outcome, SyncError> {
        let result = match reconcile(&self.store, event, Utc::now()) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("[Store] {} event rejected: {}", E::KIND, e);
                return Err(e);
            }
        };

        if result.changed(&self.store) {
            self.store = result.store;
            self.listeners.emit(&self.store);
        }
        for notice in &result.notices {
            self.raise(notice_notification(notice));
        }
        Ok(result.outcome)
    }

    /// Apply a message from the push channel
    pub fn apply_push(&mut self, message: &PushMessage) -> Result<Outcome, SyncError> {
        let before = self.store.clone();
        let outcome = self.dispatch(SyncEvent::from_push(message)?)?;
        if !self.store.same_snapshot(&before) {
            self.raise(push_notification(message));
        }
        Ok(outcome)
    }

    /// Replace the collection with a loaded page
    pub fn apply_page(&mut self, page: ApiPaginatedResponse<E>) -> Result<Outcome, SyncError> {
        self.dispatch(SyncEvent::BulkLoad {
            entities: page.data,
            total: page.total_items,
        })
    }

    /// Apply `changes` optimistically; the returned ticket finishes the update
    pub fn begin_update(&mut self, id: EntityId, changes: E::Changes) -> Result<UpdateTicket<E>, SyncError> {
        let Some(current) = self.store.get(id) else {
            return Err(SyncError::validation("id", format!("{} {} is not loaded", E::KIND, id)));
        };
        // Roll back to the server's version, not to an earlier optimistic one
        let base = self
            .store
            .pending(id)
            .and_then(|p| p.original.as_ref())
            .unwrap_or(current);
        let original = base.capture_fields(&changes);

        match self.dispatch(SyncEvent::LocalMutation(LocalMutation::Update {
            id,
            changes: changes.clone(),
        }))? {
            Outcome::Discarded {
                reason: DiscardReason::UnknownEntity,
                ..
            } => Err(SyncError::validation("id", format!("{} {} is not loaded", E::KIND, id))),
            _ => Ok(UpdateTicket { id, changes, original }),
        }
    }

    /// Confirm or roll back an update with the server's answer
    pub fn finish_update(&mut self, ticket: UpdateTicket<E>, response: Result<E, SyncError>) -> Result<E, SyncError> {
        match response {
            Ok(entity) => {
                self.dispatch(SyncEvent::LocalMutation(LocalMutation::Confirmed {
                    id: ticket.id,
                    entity: entity.clone(),
                }))?;
                Ok(entity)
            }
            Err(error) => {
                self.dispatch(SyncEvent::LocalMutation(LocalMutation::Rejected {
                    id: ticket.id,
                    original: ticket.original,
                    reason: error.to_string(),
                }))?;
                Err(error)
            }
        }
    }

    /// Insert `draft` under a temporary id
    pub fn begin_create(&mut self, draft: E) -> Result<EntityId, SyncError> {
        match self.dispatch(SyncEvent::LocalMutation(LocalMutation::Create { draft }))? {
            Outcome::Created { temp_id } => Ok(temp_id),
            other => Err(SyncError::conflict(format!("create was not applied: {:?}", other))),
        }
    }

    /// Swap the temporary entry for the server's entity, or drop it
    pub fn finish_create(&mut self, temp_id: EntityId, response: Result<E, SyncError>) -> Result<E, SyncError> {
        match response {
            Ok(entity) => {
                self.dispatch(SyncEvent::LocalMutation(LocalMutation::Confirmed {
                    id: temp_id,
                    entity: entity.clone(),
                }))?;
                Ok(entity)
            }
            Err(error) => {
                self.dispatch(SyncEvent::LocalMutation(LocalMutation::Rejected {
                    id: temp_id,
                    original: E::Changes::default(),
                    reason: error.to_string(),
                }))?;
                Err(error)
            }
        }
    }

    /// Remove `id` once the server confirmed the deletion
    pub fn finish_delete(&mut self, id: EntityId, response: Result<(), SyncError>) -> Result<(), SyncError> {
        match response {
            Ok(()) => {
                self.dispatch(SyncEvent::LocalMutation(LocalMutation::Deleted { id }))?;
                Ok(())
            }
            Err(error) => {
                self.raise(
                    NotificationRequest::new(
                        format!("Could not delete {} {}: {}", E::KIND, id, error),
                        Severity::Error,
                    )
                    .title("Delete Failed")
                    .priority(5)
                    .persistent(true),
                );
                Err(error)
            }
        }
    }

    /// Submit a filter change; only the last one after the quiet period is loaded
    pub fn set_filter(&mut self, request: PageRequest) {
        self.filter.push(request);
    }

    pub fn filter_deadline(&self) -> Option<Instant> {
        self.filter.deadline()
    }

    /// The filter to load now, if its quiet period has elapsed
    pub fn take_due_filter(&mut self) -> Option<PageRequest> {
        self.filter.poll()
    }

    fn raise(&self, request: NotificationRequest) {
        if let Some(center) = &self.notifications {
            center.borrow_mut().notify(request);
        }
    }
}

/// Load a page and apply it
pub async fn load_page<E, A>(
    collection: &RefCell<LiveCollection<E>>,
    api: &A,
    request: &PageRequest,
) -> Result<Outcome, SyncError>
where
    E: Entity,
    A: EntityApi<E>,
{
    let page = api.list(request).await?;
    collection.borrow_mut().apply_page(page)
}

/// Optimistic update, request, then confirm or roll back
pub async fn submit_update<E, A>(
    collection: &RefCell<LiveCollection<E>>,
    api: &A,
    id: EntityId,
    changes: E::Changes,
) -> Result<E, SyncError>
where
    E: Entity,
    A: EntityApi<E>,
{
    let ticket = collection.borrow_mut().begin_update(id, changes)?;
    let response = api.update(id, &ticket.changes).await;
    collection.borrow_mut().finish_update(ticket, response)
}

/// Optimistic create, request, then confirm or drop the temporary entry
pub async fn submit_create<E, A>(
    collection: &RefCell<LiveCollection<E>>,
    api: &A,
    draft: E,
) -> Result<E, SyncError>
where
    E: Entity,
    A: EntityApi<E>,
{
    let request_body = draft.clone();
    let temp_id = collection.borrow_mut().begin_create(draft)?;
    let response = api.create(&request_body).await;
    collection.borrow_mut().finish_create(temp_id, response)
}

/// Delete on the server, then locally
pub async fn submit_delete<E, A>(
    collection: &RefCell<LiveCollection<E>>,
    api: &A,
    id: EntityId,
) -> Result<(), SyncError>
where
    E: Entity,
    A: EntityApi<E>,
{
    let response = api.delete(id).await;
    collection.borrow_mut().finish_delete(id, response)
}

/// Load the pending filter if its quiet period is over
pub async fn load_due_filter<E, A>(
    collection: &RefCell<LiveCollection<E>>,
    api: &A,
) -> Result<Option<Outcome>, SyncError>
where
    E: Entity,
    A: EntityApi<E>,
{
    let due = collection.borrow_mut().take_due_filter();
    match due {
        Some(request) => load_page(collection, api, &request).await.map(Some),
        None => Ok(None),
    }
}
