//! Change capture: turns bursts of scene mutations into single snapshot requests.
//!
//! A mutation listener on the [`Scene`] (re)starts a single-slot debounce
//! timer. The host loop calls [`ChangeCapture::poll`]; once the scene has
//! been quiet for the whole window, `poll` reports that a snapshot is due.
//!
//! While history is replayed onto the scene the listener is detached through
//! [`ChangeCapture::suspend`], so restored objects never come back as new
//! user actions.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;
use std::time::Duration;

use crate::clock::Clock;
use crate::scene::{ListenerId, Scene, SceneMutation};

/// Default quiescence window in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Default quiescence window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(DEFAULT_DEBOUNCE_MS);

/// Debounce timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureTimer {
    /// Nothing scheduled.
    #[default]
    Idle,
    /// A snapshot is due once the clock reaches `deadline_ms`.
    Pending {
        /// Absolute deadline in clock milliseconds.
        deadline_ms: u64,
    },
}

impl CaptureTimer {
    /// Whether a capture is scheduled.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    timer: CaptureTimer,
    notifications: u64,
}

/// Debounced mutation observer.
pub struct ChangeCapture {
    state: Rc<RefCell<CaptureState>>,
    clock: Rc<dyn Clock>,
    window_ms: u64,
    listener: Option<ListenerId>,
}

impl ChangeCapture {
    /// Create a detached capture with the given quiescence window.
    #[must_use]
    pub fn new(clock: Rc<dyn Clock>, window: Duration) -> Self {
        // Windows beyond u64 milliseconds are not meaningful
        #[allow(clippy::cast_possible_truncation)]
        let window_ms = window.as_millis() as u64;
        Self {
            state: Rc::new(RefCell::new(CaptureState::default())),
            clock,
            window_ms,
            listener: None,
        }
    }

    /// Start observing `scene`. Any listener from an earlier attach is removed first.
    pub fn attach(&mut self, scene: &mut Scene) {
        self.detach(scene);

        let state = Rc::clone(&self.state);
        let clock = Rc::clone(&self.clock);
        let window_ms = self.window_ms;
        let id = scene.on_mutation(Box::new(move |mutation: &SceneMutation| {
            let deadline_ms = clock.now_ms().saturating_add(window_ms);
            let mut state = state.borrow_mut();
            state.notifications += 1;
            state.timer = CaptureTimer::Pending { deadline_ms };
            tracing::trace!("Mutation {mutation:?}, capture due at {deadline_ms}");
        }));
        self.listener = Some(id);
        tracing::debug!("Change capture attached");
    }

    /// Stop observing `scene`.
    pub fn detach(&mut self, scene: &mut Scene) {
        if let Some(id) = self.listener.take() {
            scene.off_mutation(id);
            tracing::debug!("Change capture detached");
        }
    }

    /// Whether a listener is registered.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// (Re)start the debounce window from now.
    pub fn schedule(&self) {
        let deadline_ms = self.clock.now_ms().saturating_add(self.window_ms);
        self.state.borrow_mut().timer = CaptureTimer::Pending { deadline_ms };
    }

    /// Drop any pending capture.
    pub fn cancel(&self) {
        self.state.borrow_mut().timer = CaptureTimer::Idle;
    }

    /// Current timer state.
    #[must_use]
    pub fn timer(&self) -> CaptureTimer {
        self.state.borrow().timer
    }

    /// Mutation notifications received since creation.
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.state.borrow().notifications
    }

    /// Quiescence window.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Fire the timer if its deadline has passed.
    ///
    /// Returns `true` exactly once per quiet burst; the caller then captures
    /// and saves a snapshot.
    pub fn poll(&self) -> bool {
        let now = self.clock.now_ms();
        let mut state = self.state.borrow_mut();
        match state.timer {
            CaptureTimer::Pending { deadline_ms } if now >= deadline_ms => {
                state.timer = CaptureTimer::Idle;
                true
            }
            _ => false,
        }
    }

    /// Detach from `scene` until the returned guard is dropped.
    ///
    /// Any pending capture is cancelled. The guard dereferences to the scene
    /// and reattaches on drop if capture was attached when suspended.
    pub fn suspend<'a>(&'a mut self, scene: &'a mut Scene) -> SuspendedCapture<'a> {
        let reattach = self.is_attached();
        self.detach(scene);
        self.cancel();
        SuspendedCapture {
            capture: self,
            scene,
            reattach,
        }
    }
}

impl std::fmt::Debug for ChangeCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeCapture")
            .field("timer", &self.timer())
            .field("window_ms", &self.window_ms)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

/// Scene access with change capture suspended.
pub struct SuspendedCapture<'a> {
    capture: &'a mut ChangeCapture,
    scene: &'a mut Scene,
    reattach: bool,
}

impl Deref for SuspendedCapture<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        &*self.scene
    }
}

impl DerefMut for SuspendedCapture<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        &mut *self.scene
    }
}

impl Drop for SuspendedCapture<'_> {
    fn drop(&mut self) {
        if self.reattach {
            self.capture.attach(&mut *self.scene);
        }
    }
}
