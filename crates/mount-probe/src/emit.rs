//! Emission recording.
//!
//! An [`EmitRecorder`] listens on the devtools channel for the lifetime of a
//! mount and records every event emitted by components of that mount. While
//! attached it swallows the "emitted event ... neither declared" console
//! warning; every other console message passes through. Detaching (explicitly,
//! on drop, or because another recorder replaced it) removes the filter.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::mount::MountId;
use crate::runtime::console::{self, ConsoleMessage, FilterId, WarningKind};
use crate::runtime::devtools::{self, DevtoolsEvent, DevtoolsHook, HookAttachment};
use crate::runtime::{AppId, EventArg, InstanceId};

/// Argument lists recorded for one event name, oldest first
pub type EventCalls = Vec<Vec<EventArg>>;

/// One recorded emission
#[derive(Debug, Clone)]
pub struct Emission {
    /// Event name
    pub event: String,
    /// Emitting instance
    pub instance: InstanceId,
    /// Arguments as emitted
    pub args: Vec<EventArg>,
}

/// Emissions of one mount
#[derive(Debug, Clone, Default)]
pub struct EmissionLog {
    by_event: BTreeMap<String, EventCalls>,
    order: Vec<Emission>,
}

impl EmissionLog {
    /// Empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an emission
    pub fn record(&mut self, emission: Emission) {
        self.by_event
            .entry(emission.event.clone())
            .or_default()
            .push(emission.args.clone());
        self.order.push(emission);
    }

    /// Argument lists per event name
    #[must_use]
    pub fn events(&self) -> &BTreeMap<String, EventCalls> {
        &self.by_event
    }

    /// Argument lists for one event
    #[must_use]
    pub fn get(&self, event: &str) -> Option<&EventCalls> {
        self.by_event.get(event)
    }

    /// Every emission in the order it happened
    #[must_use]
    pub fn ordered(&self) -> &[Emission] {
        &self.order
    }

    /// The subset emitted by one instance
    #[must_use]
    pub fn for_instance(&self, instance: InstanceId) -> Self {
        let mut log = Self::new();
        for emission in self.order.iter().filter(|e| e.instance == instance) {
            log.record(emission.clone());
        }
        log
    }

    /// Number of emissions
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when nothing was emitted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct RecorderHook {
    app: AppId,
    mount_id: MountId,
    log: RefCell<EmissionLog>,
    filter: Cell<Option<FilterId>>,
}

impl DevtoolsHook for RecorderHook {
    fn emit(&self, event: &DevtoolsEvent) {
        if let DevtoolsEvent::ComponentEmit {
            app,
            instance,
            event,
            args,
        } = event
        {
            if *app != self.app {
                return;
            }
            tracing::trace!(mount_id = %self.mount_id, event = event.as_str(), %instance, "recorded emission");
            self.log.borrow_mut().record(Emission {
                event: event.clone(),
                instance: *instance,
                args: args.clone(),
            });
        }
    }

    fn detached(&self) {
        if let Some(filter) = self.filter.take() {
            console::remove_filter(filter);
        }
        tracing::debug!(mount_id = %self.mount_id, "emission recorder detached");
    }
}

/// Records the emissions of one mount
pub struct EmitRecorder {
    hook: Rc<RecorderHook>,
    attachment: HookAttachment,
}

impl fmt::Debug for EmitRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitRecorder")
            .field("app", &self.hook.app)
            .field("mount_id", &self.hook.mount_id)
            .field("attachment", &self.attachment)
            .field("recorded", &self.hook.log.borrow().len())
            .finish()
    }
}

impl EmitRecorder {
    /// Attach to the devtools channel, replacing any previous listener
    #[must_use]
    pub fn attach(app: AppId, mount_id: MountId) -> Self {
        let hook = Rc::new(RecorderHook {
            app,
            mount_id,
            log: RefCell::new(EmissionLog::new()),
            filter: Cell::new(None),
        });
        let attachment = devtools::attach(Rc::clone(&hook) as Rc<dyn DevtoolsHook>);
        let filter = console::add_filter(Rc::new(move |message: &ConsoleMessage| {
            message.kind == WarningKind::UnhandledEmit && message.app == Some(app)
        }));
        hook.filter.set(Some(filter));
        tracing::debug!(mount_id = %mount_id, "emission recorder attached");
        Self { hook, attachment }
    }

    /// True until detached or replaced
    #[must_use]
    pub fn is_attached(&self) -> bool {
        devtools::is_attached(self.attachment)
    }

    /// Detach from the channel and restore the console
    pub fn detach(&self) {
        if !devtools::detach(self.attachment) {
            self.hook.detached();
        }
    }

    /// Snapshot of the log
    #[must_use]
    pub fn log(&self) -> EmissionLog {
        self.hook.log.borrow().clone()
    }

    /// Argument lists per event name
    #[must_use]
    pub fn emitted(&self) -> BTreeMap<String, EventCalls> {
        self.hook.log.borrow().events().clone()
    }

    /// Argument lists for one event
    #[must_use]
    pub fn emitted_event(&self, event: &str) -> Option<EventCalls> {
        self.hook.log.borrow().get(event).cloned()
    }

    /// Every emission in order
    #[must_use]
    pub fn ordered(&self) -> Vec<Emission> {
        self.hook.log.borrow().ordered().to_vec()
    }
}

impl Drop for EmitRecorder {
    fn drop(&mut self) {
        self.detach();
    }
}
