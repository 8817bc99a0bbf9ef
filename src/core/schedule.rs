//! Callback schedules and listener bookkeeping for the single-threaded host loop.
//!
//! The engine hands out [`ScheduleHandle`]s for its frame and timer callbacks. Hosts check
//! them before invoking a callback; teardown cancels each exactly once, before any resource
//! is released.

use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::input::ListenerKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    Frame,
    Timer,
}

/// Shared cancellation flag for one scheduled callback.
#[derive(Debug, Clone)]
pub struct ScheduleHandle {
    kind: ScheduleKind,
    cancelled: Rc<Cell<bool>>,
}

impl ScheduleHandle {
    pub fn new(kind: ScheduleKind) -> Self {
        Self {
            kind,
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.get()
    }

    /// Cancel the schedule. Returns true only for the call that actually cancelled it.
    pub fn cancel(&self) -> bool {
        if self.cancelled.replace(true) {
            return false;
        }
        debug!(kind = ?self.kind, "schedule cancelled");
        true
    }
}

/// Where viewport-resize notifications come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeSource {
    /// Resize observation of the rendering element itself.
    ElementObserver,
    /// Window-level resize signal.
    Window,
}

/// Optional host facilities, probed once at mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformCapabilities {
    pub element_resize_observer: bool,
}

impl PlatformCapabilities {
    pub fn resize_source(&self) -> ResizeSource {
        if self.element_resize_observer {
            ResizeSource::ElementObserver
        } else {
            debug!("element resize observation unavailable; using window resize");
            ResizeSource::Window
        }
    }
}

/// Listeners registered at mount and removed exactly once at teardown.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    active: Vec<ListenerKind>,
    resize_source: Option<ResizeSource>,
    torn_down: bool,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every listener. A second registration (or one after teardown) is ignored.
    pub fn register_all(&mut self, resize_source: ResizeSource) -> bool {
        if self.torn_down || !self.active.is_empty() {
            warn!("listeners already registered or torn down");
            return false;
        }
        self.active.extend_from_slice(&ListenerKind::ALL);
        self.resize_source = Some(resize_source);
        debug!(count = self.active.len(), ?resize_source, "listeners registered");
        true
    }

    /// Deregister everything. Returns how many listeners were removed (0 on repeat calls).
    pub fn deregister_all(&mut self) -> usize {
        let removed = self.active.len();
        self.active.clear();
        self.torn_down = true;
        if removed > 0 {
            debug!(removed, "listeners deregistered");
        }
        removed
    }

    pub fn is_listening(&self, kind: ListenerKind) -> bool {
        self.active.contains(&kind)
    }

    pub fn resize_source(&self) -> Option<ResizeSource> {
        self.resize_source
    }
}
