//! Interrupt-backed completion events.
//!
//! A trap packet carries a 28-bit interrupt context; when the engine
//! executes it, the interrupt path fires the [`EventSignaler`] whose id
//! matches, waking any thread blocked in [`InterruptEvent::wait_timeout`].
//! Pairing a fence write with the trap lets a waiter distinguish "packet
//! processed" from the weaker cursor-based "packet fetched".

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Sentinel a paired fence writes once the packets ahead of it have been
/// processed.
pub const FENCE_SIGNALED: u32 = 0x5AFE_F00D;

struct Shared {
    fired: Mutex<bool>,
    cond: Condvar,
}

/// A one-shot waitable completion event.
pub struct InterruptEvent {
    id: u32,
    fence_addr: u64,
    shared: Arc<Shared>,
}

impl InterruptEvent {
    /// `id` is the interrupt context the trap packet carries (28 bits);
    /// `fence_addr` is where the paired fence writes [`FENCE_SIGNALED`].
    pub fn new(id: u32, fence_addr: u64) -> InterruptEvent {
        InterruptEvent {
            id,
            fence_addr,
            shared: Arc::new(Shared {
                fired: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn fence_addr(&self) -> u64 {
        self.fence_addr
    }

    /// The handle the interrupt path (or a simulated engine) fires.
    pub fn signaler(&self) -> EventSignaler {
        EventSignaler {
            id: self.id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Blocks until the event fires or `timeout` elapses. Returns whether
    /// the event fired; a signal delivered before the wait is not lost.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut fired = match self.shared.fired.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !*fired {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = match self.shared.cond.wait_timeout(fired, deadline - now) {
                Ok(r) => r,
                Err(poisoned) => poisoned.into_inner(),
            };
            fired = guard;
        }
        true
    }
}

impl std::fmt::Debug for InterruptEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterruptEvent").field("id", &self.id).finish()
    }
}

/// Cloneable firing side of an [`InterruptEvent`].
#[derive(Clone)]
pub struct EventSignaler {
    id: u32,
    shared: Arc<Shared>,
}

impl EventSignaler {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn signal(&self) {
        let mut fired = match self.shared.fired.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *fired = true;
        self.shared.cond.notify_all();
    }
}
