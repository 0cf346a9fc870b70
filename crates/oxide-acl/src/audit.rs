//! Change notifications for compliance logging.
//!
//! Every GRANT, DENY and REVOKE that changes the store produces one
//! [`AuditEvent`] per affected entry. Sinks are fire-and-forget: recording
//! cannot fail and cannot veto the change.
//!
//! Events reach the sink after the change is committed, so events from
//! concurrent writers may arrive out of order. `seq` and `at` are assigned
//! while the change is being applied; sort by `seq` to recover commit order.

use std::fmt;
use std::sync::mpsc::Sender;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::permission::{Effect, EntryKey, PermissionEntry, PermissionKind};
use crate::principal::PrincipalId;
use crate::securable::SecurableId;
use crate::store::RevokeOutcome;

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// A GRANT was written.
    Grant,
    /// A DENY was written.
    Deny,
    /// An entry was revoked directly.
    Revoke,
    /// A delegated grant was revoked by `CASCADE`.
    CascadeRevoke,
    /// The grant option was removed from a GRANT.
    RevokeGrantOption,
}

impl fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Grant => "GRANT",
            Self::Deny => "DENY",
            Self::Revoke => "REVOKE",
            Self::CascadeRevoke => "REVOKE CASCADE",
            Self::RevokeGrantOption => "REVOKE GRANT OPTION",
        };
        f.write_str(text)
    }
}

/// One change to one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in commit order, unique per
    /// [`AccessControl`](crate::AccessControl) instance.
    #[serde(default)]
    pub seq: u64,
    /// When the change was applied.
    pub at: DateTime<Utc>,
    /// Grantor of the affected entry.
    pub actor: PrincipalId,
    /// Kind of change.
    pub operation: AuditOperation,
    /// Holder of the affected entry.
    pub principal: PrincipalId,
    /// Permission of the affected entry.
    pub permission: PermissionKind,
    /// Scope of the affected entry.
    pub securable: SecurableId,
    /// Effect before the change, `None` if the key was empty.
    pub before: Option<Effect>,
    /// Effect after the change, `None` if the key is now empty.
    pub after: Option<Effect>,
}

impl AuditEvent {
    /// Event for a GRANT or DENY written at `key`.
    #[must_use]
    pub fn written(
        actor: PrincipalId,
        key: EntryKey,
        before: Option<Effect>,
        after: Effect,
    ) -> Self {
        let operation = match after {
            Effect::Grant => AuditOperation::Grant,
            Effect::Deny => AuditOperation::Deny,
        };
        Self {
            seq: 0,
            at: Utc::now(),
            actor,
            operation,
            principal: key.principal,
            permission: key.permission,
            securable: key.securable,
            before,
            after: Some(after),
        }
    }

    fn removed(entry: PermissionEntry, operation: AuditOperation) -> Self {
        Self {
            seq: 0,
            at: Utc::now(),
            actor: entry.granted_by,
            operation,
            principal: entry.principal,
            permission: entry.permission,
            securable: entry.securable,
            before: Some(entry.effect),
            after: None,
        }
    }

    /// Events for a revoke: the targeted entry followed by cascaded ones.
    ///
    /// With `grant_option_only` the target keeps its effect.
    #[must_use]
    pub fn revoked(outcome: RevokeOutcome, grant_option_only: bool) -> Vec<Self> {
        let mut events = Vec::with_capacity(1 + outcome.cascaded.len());
        if let Some(target) = outcome.target {
            if grant_option_only {
                let effect = target.effect;
                let mut event = Self::removed(target, AuditOperation::RevokeGrantOption);
                event.after = Some(effect);
                events.push(event);
            } else {
                events.push(Self::removed(target, AuditOperation::Revoke));
            }
        }
        events.extend(
            outcome
                .cascaded
                .into_iter()
                .map(|entry| Self::removed(entry, AuditOperation::CascadeRevoke)),
        );
        events
    }
}

/// Receiver of audit events.
pub trait AuditSink: Send + Sync {
    /// Records an event. Must not block for long and cannot fail.
    fn record(&self, event: &AuditEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Emits each event as a structured `tracing` event on target
/// `oxide_acl::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        info!(
            target: "oxide_acl::audit",
            actor = %event.actor,
            seq = event.seq,
            operation = %event.operation,
            principal = %event.principal,
            permission = %event.permission,
            securable = %event.securable,
            before = ?event.before,
            after = ?event.after,
            "Permission changed"
        );
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the recorded events.
    pub fn take(&self) -> Vec<AuditEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns whether no event has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forwards events over a channel. Events are dropped once the receiver
/// is gone.
#[derive(Debug)]
pub struct ChannelAuditSink {
    sender: Mutex<Sender<AuditEvent>>,
}

impl ChannelAuditSink {
    /// Wraps the sending half of a channel.
    #[must_use]
    pub fn new(sender: Sender<AuditEvent>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl AuditSink for ChannelAuditSink {
    fn record(&self, event: &AuditEvent) {
        let _ = self.sender.lock().send(event.clone());
    }
}
