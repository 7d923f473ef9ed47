//! Booking uids held by in-flight operations.
//!
//! A create, reschedule or cancel claims every uid it may write before it
//! calls any adapter. A second operation on a claimed uid is turned away
//! instead of racing the first one through the providers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

#[derive(Debug, Default)]
pub(crate) struct Claims {
    held: Mutex<HashSet<String>>,
}

impl Claims {
    /// Claims `uid` until the returned guard is dropped. Returns `None` while
    /// another operation holds it.
    pub(crate) fn claim(self: &Arc<Self>, uid: &str) -> Option<Claim> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(uid.to_string()) {
            debug!(uid, "uid is held by another operation");
            return None;
        }
        Some(Claim {
            claims: self.clone(),
            uid: uid.to_string(),
        })
    }

    fn release(&self, uid: &str) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid);
    }
}

/// Releases its uid on drop.
#[derive(Debug)]
pub(crate) struct Claim {
    claims: Arc<Claims>,
    uid: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claims.release(&self.uid);
    }
}
