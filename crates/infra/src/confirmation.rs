//! Two-step confirmation for destructive operations.
//!
//! `issue` hands out a token naming what would be deleted; nothing changes until the
//! token is taken back with `take`. Tokens are single-use and expire after a fixed
//! lifetime.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use storefront_orders::OrderId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfirmationToken {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfirmationError {
    /// Never issued, already used, or cancelled.
    #[error("unknown or already used confirmation")]
    UnknownConfirmation,
    #[error("confirmation expired at {0}")]
    ConfirmationExpired(DateTime<Utc>),
    #[error("confirmation store unavailable")]
    Poisoned,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    order_id: OrderId,
    target: T,
    expires_at: DateTime<Utc>,
}

/// Outstanding confirmations for targets of type `T` (a package id, a payment id).
#[derive(Debug)]
pub struct PendingConfirmations<T> {
    ttl: Duration,
    pending: Mutex<HashMap<Uuid, Pending<T>>>,
}

impl<T: Clone> PendingConfirmations<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, order_id: OrderId, target: T, now: DateTime<Utc>) -> Result<ConfirmationToken, ConfirmationError> {
        let mut pending = self.pending.lock().map_err(|_| ConfirmationError::Poisoned)?;
        // Abandoned confirmations are dropped lazily.
        pending.retain(|_, p| p.expires_at > now);

        let token = ConfirmationToken {
            id: Uuid::now_v7(),
            expires_at: now + self.ttl,
        };
        pending.insert(
            token.id,
            Pending {
                order_id,
                target,
                expires_at: token.expires_at,
            },
        );
        Ok(token)
    }

    /// Consume a token. An expired token is consumed too and reported as expired.
    pub fn take(&self, token: Uuid, now: DateTime<Utc>) -> Result<(OrderId, T), ConfirmationError> {
        let mut pending = self.pending.lock().map_err(|_| ConfirmationError::Poisoned)?;
        let entry = pending
            .remove(&token)
            .ok_or(ConfirmationError::UnknownConfirmation)?;
        if entry.expires_at <= now {
            return Err(ConfirmationError::ConfirmationExpired(entry.expires_at));
        }
        Ok((entry.order_id, entry.target))
    }

    pub fn cancel(&self, token: Uuid) -> Result<(), ConfirmationError> {
        let mut pending = self.pending.lock().map_err(|_| ConfirmationError::Poisoned)?;
        pending
            .remove(&token)
            .map(|_| ())
            .ok_or(ConfirmationError::UnknownConfirmation)
    }

    pub fn outstanding(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}
