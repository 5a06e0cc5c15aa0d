//! Two-level admission control for concurrent checks
//!
//! A global semaphore bounds the total number of in-flight checks; a
//! per-tunnel semaphore bounds how many of those may share one upstream
//! tunnel. The global gate is always the outer scope: a check only waits on
//! a tunnel slot while it already holds a global slot, so tunnel waiters can
//! never pin the global budget from the outside.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Both permits held for the duration of one check.
///
/// Field order matters: Rust drops fields in declaration order, so the
/// tunnel permit is released before the global one on every exit path,
/// mirroring the acquisition order in reverse.
#[derive(Debug)]
pub struct Admission {
    _tunnel: Option<OwnedSemaphorePermit>,
    _global: OwnedSemaphorePermit,
}

/// Admit one check: global slot first, then the tunnel slot when the check
/// goes through an upstream tunnel. `tunnel = None` is a no-op pass-through
/// so the acquire/release shape is uniform for direct checks.
pub async fn admit(global: Arc<Semaphore>, tunnel: Option<Arc<Semaphore>>) -> Admission {
    // Acquire only fails if the semaphore is closed, which won't happen
    // here since the checker owns the Arc for the lifetime of the scan.
    let global_permit = global
        .acquire_owned()
        .await
        .expect("global semaphore closed unexpectedly");
    let tunnel_permit = match tunnel {
        Some(gate) => Some(
            gate.acquire_owned()
                .await
                .expect("tunnel semaphore closed unexpectedly"),
        ),
        None => None,
    };
    Admission {
        _tunnel: tunnel_permit,
        _global: global_permit,
    }
}
