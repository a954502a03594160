//! The cooperative polling loop.
//!
//! The scheduler owns the ordered collection of attached units and
//! steps each of them once per pass. Units may register or detach
//! units (including themselves) from inside their own step; the pass
//! in progress works on a snapshot, so:
//!
//! - a unit detached mid-pass is skipped for the rest of that pass and
//!   never stepped again;
//! - a unit registered mid-pass is first stepped in the next pass.
//!
//! There is no error isolation between units. A failing step halts the
//! loop and surfaces from [`Scheduler::run`].

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::{LoopError, LoopResult};
use crate::unit::{Schedulable, UnitId};

/// Shared loop state. Only the scheduling thread ever touches it.
///
/// Ids grow monotonically, so key order is registration order.
struct LoopState {
    units: RefCell<BTreeMap<UnitId, Rc<dyn Schedulable>>>,
    next_id: Cell<u64>,
}

impl LoopState {
    fn register(self: &Rc<Self>, unit: Rc<dyn Schedulable>) -> LoopResult<UnitId> {
        let id = UnitId::new(self.next_id.get());
        let owner = LoopHandle {
            state: Rc::downgrade(self),
        };

        // A filled slot means the unit is already in some collection.
        unit.slot().attach(id, owner)?;
        self.next_id.set(id.get() + 1);

        debug!(unit = %id, label = unit.label(), "unit registered");
        self.units.borrow_mut().insert(id, unit);
        Ok(id)
    }

    fn deregister(&self, id: UnitId) -> bool {
        let removed = self.units.borrow_mut().remove(&id);
        let Some(unit) = removed else {
            return false;
        };
        debug!(unit = %id, label = unit.label(), "unit deregistered");

        // Removed by id rather than through its own detach: the slot
        // still points here, so run the unit's teardown now.
        if unit.slot().id() == Some(id) {
            unit.detach();
        }
        true
    }

    fn contains(&self, id: UnitId) -> bool {
        self.units.borrow().contains_key(&id)
    }

    fn len(&self) -> usize {
        self.units.borrow().len()
    }

    fn snapshot(&self) -> Vec<(UnitId, Rc<dyn Schedulable>)> {
        self.units
            .borrow()
            .iter()
            .map(|(id, unit)| (*id, Rc::clone(unit)))
            .collect()
    }
}

/// Non-owning reference to a scheduler, held by attached units.
#[derive(Clone)]
pub struct LoopHandle {
    state: Weak<LoopState>,
}

impl LoopHandle {
    /// Attach `unit`; it is first stepped in the next full pass.
    pub fn register(&self, unit: Rc<dyn Schedulable>) -> LoopResult<UnitId> {
        let state = self.state.upgrade().ok_or(LoopError::Stopped)?;
        state.register(unit)
    }

    /// Remove the unit with `id`. No-op if absent.
    pub fn deregister(&self, id: UnitId) -> bool {
        self.state
            .upgrade()
            .is_some_and(|state| state.deregister(id))
    }

    pub fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }
}

/// Cross-thread request to end [`Scheduler::run`] after the current pass.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
}

impl StopToken {
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The cooperative polling loop.
pub struct Scheduler {
    state: Rc<LoopState>,
    stop: StopToken,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: Rc::new(LoopState {
                units: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(1),
            }),
            stop: StopToken::default(),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            state: Rc::downgrade(&self.state),
        }
    }

    pub fn register(&self, unit: Rc<dyn Schedulable>) -> LoopResult<UnitId> {
        self.state.register(unit)
    }

    pub fn deregister(&self, id: UnitId) -> bool {
        self.state.deregister(id)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.state.contains(id)
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Run `iterations` passes (`0` = until stopped), sleeping `pause`
    /// between passes.
    pub fn run(&self, iterations: u64, pause: Duration) -> LoopResult<()> {
        info!(
            iterations,
            pause_ms = pause.as_millis() as u64,
            units = self.len(),
            "scheduler running"
        );

        let mut pass: u64 = 0;
        while iterations == 0 || pass < iterations {
            if self.stop.is_stopped() {
                info!(passes = pass, "scheduler stop requested");
                break;
            }

            self.run_pass()?;
            pass += 1;

            let more = iterations == 0 || pass < iterations;
            if more && !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        Ok(())
    }

    /// Step every unit attached at the start of the pass, once, in
    /// registration order.
    pub fn run_pass(&self) -> LoopResult<()> {
        for (id, unit) in self.state.snapshot() {
            if !self.state.contains(id) {
                continue;
            }

            if let Err(source) = unit.step() {
                error!(
                    unit = %id,
                    label = unit.label(),
                    error = %format!("{source:#}"),
                    "unit step failed, halting scheduler"
                );
                return Err(LoopError::UnitFailed { unit: id, source });
            }
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
