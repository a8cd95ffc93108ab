//! Router events and a typed subscription registry.
//!
//! Subscribers register a callback per event kind and get back a
//! `SubscriptionId` they can use to unsubscribe. Callbacks run synchronously
//! on the emitting task, outside the registry lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use warden_contracts::{agent::AgentId, operation::OperationType, tool::Tool};

/// Discriminant used to subscribe to one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    AgentRegistered,
    AgentUnregistered,
    RequestReceived,
    RequestRouted,
    RequestCompleted,
    RequestFailed,
    PermissionDenied,
    ToolAccessGranted,
    ToolAccessDenied,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        EventKind::AgentRegistered,
        EventKind::AgentUnregistered,
        EventKind::RequestReceived,
        EventKind::RequestRouted,
        EventKind::RequestCompleted,
        EventKind::RequestFailed,
        EventKind::PermissionDenied,
        EventKind::ToolAccessGranted,
        EventKind::ToolAccessDenied,
    ];
}

/// Everything the router announces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RouterEvent {
    AgentRegistered {
        agent_id: AgentId,
    },
    AgentUnregistered {
        agent_id: AgentId,
    },
    RequestReceived {
        request_id: String,
        operation: OperationType,
    },
    RequestRouted {
        request_id: String,
        agent_id: AgentId,
    },
    RequestCompleted {
        request_id: String,
        agent_id: AgentId,
        success: bool,
    },
    RequestFailed {
        request_id: String,
        error: String,
    },
    PermissionDenied {
        request_id: String,
        agent_id: AgentId,
        reason: String,
    },
    ToolAccessGranted {
        request_id: String,
        agent_id: AgentId,
        tool: Tool,
    },
    ToolAccessDenied {
        request_id: String,
        agent_id: AgentId,
        tool: Tool,
    },
}

impl RouterEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RouterEvent::AgentRegistered { .. } => EventKind::AgentRegistered,
            RouterEvent::AgentUnregistered { .. } => EventKind::AgentUnregistered,
            RouterEvent::RequestReceived { .. } => EventKind::RequestReceived,
            RouterEvent::RequestRouted { .. } => EventKind::RequestRouted,
            RouterEvent::RequestCompleted { .. } => EventKind::RequestCompleted,
            RouterEvent::RequestFailed { .. } => EventKind::RequestFailed,
            RouterEvent::PermissionDenied { .. } => EventKind::PermissionDenied,
            RouterEvent::ToolAccessGranted { .. } => EventKind::ToolAccessGranted,
            RouterEvent::ToolAccessDenied { .. } => EventKind::ToolAccessDenied,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type EventCallback = Arc<dyn Fn(&RouterEvent) + Send + Sync>;

/// Per-kind callback lists.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, EventCallback)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&RouterEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        subscribers
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for callbacks in subscribers.values_mut() {
            let before = callbacks.len();
            callbacks.retain(|(sub, _)| *sub != id);
            removed |= callbacks.len() != before;
        }
        removed
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
        subscribers.get(&kind).map(Vec::len).unwrap_or(0)
    }

    pub fn emit(&self, event: &RouterEvent) {
        let callbacks: Vec<EventCallback> = {
            let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
            subscribers
                .get(&event.kind())
                .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };
        for callback in callbacks {
            callback(event);
        }
    }
}
