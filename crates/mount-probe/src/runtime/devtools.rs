//! Devtools diagnostic channel.
//!
//! The runtime reports lifecycle and emission events to at most one hook per
//! thread. Attaching a hook returns a [`HookAttachment`] handle; attaching
//! another hook detaches the previous one (calling its
//! [`DevtoolsHook::detached`]) so no listener is ever left half-installed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::app::{AppId, InstanceId};
use super::vnode::EventArg;

/// Event published on the channel
#[derive(Debug, Clone)]
pub enum DevtoolsEvent {
    /// An app was created
    AppInit {
        /// App identifier
        app: AppId,
    },
    /// A component instance finished mounting
    ComponentAdded {
        /// App identifier
        app: AppId,
        /// Instance identifier
        instance: InstanceId,
    },
    /// A component instance re-rendered
    ComponentUpdated {
        /// App identifier
        app: AppId,
        /// Instance identifier
        instance: InstanceId,
    },
    /// A component instance was unmounted
    ComponentRemoved {
        /// App identifier
        app: AppId,
        /// Instance identifier
        instance: InstanceId,
    },
    /// A component instance emitted an event
    ComponentEmit {
        /// App identifier
        app: AppId,
        /// Emitting instance
        instance: InstanceId,
        /// Event name
        event: String,
        /// Emitted arguments
        args: Vec<EventArg>,
    },
}

/// Listener on the devtools channel
pub trait DevtoolsHook {
    /// Receive an event
    fn emit(&self, event: &DevtoolsEvent);

    /// Called once when the hook is detached or replaced
    fn detached(&self) {}
}

/// Handle returned by [`attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookAttachment(u64);

struct Slot {
    attachment: HookAttachment,
    hook: Rc<dyn DevtoolsHook>,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("attachment", &self.attachment)
            .finish_non_exhaustive()
    }
}

thread_local! {
    static HOOK: RefCell<Option<Slot>> = const { RefCell::new(None) };
    static NEXT_ATTACHMENT: std::cell::Cell<u64> = const { std::cell::Cell::new(1) };
}

/// Install `hook`, replacing and detaching any previous hook
pub fn attach(hook: Rc<dyn DevtoolsHook>) -> HookAttachment {
    let attachment = HookAttachment(NEXT_ATTACHMENT.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    }));
    let previous = HOOK.with(|slot| slot.borrow_mut().replace(Slot { attachment, hook }));
    if let Some(previous) = previous {
        tracing::debug!(previous = previous.attachment.0, "devtools hook replaced");
        previous.hook.detached();
    }
    tracing::trace!(attachment = attachment.0, "devtools hook attached");
    attachment
}

/// Remove the hook if `attachment` is still the current one
pub fn detach(attachment: HookAttachment) -> bool {
    let removed = HOOK.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.as_ref().is_some_and(|s| s.attachment == attachment) {
            slot.take()
        } else {
            None
        }
    });
    match removed {
        Some(slot) => {
            tracing::trace!(attachment = attachment.0, "devtools hook detached");
            slot.hook.detached();
            true
        }
        None => false,
    }
}

/// True while `attachment` is the installed hook
#[must_use]
pub fn is_attached(attachment: HookAttachment) -> bool {
    HOOK.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|s| s.attachment == attachment)
    })
}

/// Handle of the installed hook, if any
#[must_use]
pub fn current() -> Option<HookAttachment> {
    HOOK.with(|slot| slot.borrow().as_ref().map(|s| s.attachment))
}

/// Publish an event to the installed hook
pub(crate) fn notify(event: &DevtoolsEvent) {
    let hook = HOOK.with(|slot| slot.borrow().as_ref().map(|s| Rc::clone(&s.hook)));
    if let Some(hook) = hook {
        hook.emit(event);
    }
}
