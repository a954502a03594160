//! The Schedulable Unit contract.
//!
//! A unit is anything the [`Scheduler`](crate::Scheduler) steps. Each
//! unit embeds a [`UnitSlot`] holding its non-owning back-reference to
//! the scheduler it is attached to; the slot is filled on registration
//! and emptied on detach.

use std::cell::RefCell;
use std::fmt;

use crate::error::{LoopError, LoopResult};
use crate::scheduler::LoopHandle;

/// Identity of a unit within one scheduler, assigned on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u64);

impl UnitId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A participant of the cooperative loop.
///
/// `step` must never block: work that cannot finish now is left for a
/// later pass. Units are shared (`Rc`) between the scheduler and their
/// collaborators, so mutable state lives behind interior mutability.
pub trait Schedulable {
    /// The back-reference slot embedded in this unit.
    fn slot(&self) -> &UnitSlot;

    /// Invoked once per scheduler pass while attached.
    ///
    /// An error halts the scheduler.
    fn step(&self) -> anyhow::Result<()>;

    /// Remove the unit from its scheduler. Returns `false` if it was not
    /// attached.
    fn detach(&self) -> bool {
        self.slot().detach()
    }

    /// Short label used in log output.
    fn label(&self) -> &'static str {
        "unit"
    }
}

#[derive(Clone)]
struct Attachment {
    id: UnitId,
    owner: LoopHandle,
}

/// Back-reference from a unit to the scheduler that owns it.
///
/// The reference is weak and exists only so a unit can detach itself
/// or register sibling units; it never keeps the scheduler alive.
#[derive(Default)]
pub struct UnitSlot {
    attachment: RefCell<Option<Attachment>>,
}

impl UnitSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, id: UnitId, owner: LoopHandle) -> LoopResult<()> {
        let mut attachment = self.attachment.borrow_mut();
        if attachment.is_some() {
            return Err(LoopError::AlreadyAttached);
        }
        *attachment = Some(Attachment { id, owner });
        Ok(())
    }

    /// Clear the back-reference and remove the unit from its scheduler.
    ///
    /// Idempotent: only the first call after attachment does anything.
    pub fn detach(&self) -> bool {
        let attachment = self.attachment.borrow_mut().take();
        match attachment {
            Some(Attachment { id, owner }) => {
                owner.deregister(id);
                true
            }
            None => false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.borrow().is_some()
    }

    pub fn id(&self) -> Option<UnitId> {
        self.attachment.borrow().as_ref().map(|a| a.id)
    }

    /// Handle to the owning scheduler, for registering further units.
    pub fn handle(&self) -> Option<LoopHandle> {
        self.attachment.borrow().as_ref().map(|a| a.owner.clone())
    }

    /// Like [`handle`](Self::handle) but an error when detached.
    pub fn owner(&self) -> LoopResult<LoopHandle> {
        self.handle().ok_or(LoopError::Detached)
    }
}

impl fmt::Debug for UnitSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitSlot").field("id", &self.id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_id_display() {
        assert_eq!(UnitId::new(3).to_string(), "#3");
        assert_eq!(UnitId::new(3).get(), 3);
    }

    #[test]
    fn fresh_slot_is_detached() {
        let slot = UnitSlot::new();
        assert!(!slot.is_attached());
        assert!(slot.id().is_none());
        assert!(slot.handle().is_none());
        assert!(matches!(slot.owner(), Err(LoopError::Detached)));
        assert!(!slot.detach());
    }
}
