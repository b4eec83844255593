//! Diagnostic console of the host runtime.
//!
//! Framework warnings go through a single thread-local sink. The default sink
//! forwards to `tracing::warn!` with target `mount_probe::console`; tests can
//! swap it for a [`ConsoleCapture`] to assert on what was printed.
//!
//! Filters are scoped: [`add_filter`] returns a [`FilterId`] and the filter
//! stays active until [`remove_filter`] is called with it. A filter that
//! returns `true` swallows the message before it reaches the sink.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::app::AppId;

/// Console message severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsoleSeverity {
    /// Informational
    Info,
    /// Framework warning
    Warn,
    /// Error
    Error,
}

impl fmt::Display for ConsoleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Category of a framework warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A component emitted an event that is neither declared nor listened to
    UnhandledEmit,
    /// `resolve(name)` found no registered component
    UnresolvedComponent,
    /// An update kept re-queueing itself
    RecursiveUpdate,
    /// Anything else
    Other,
}

/// A message written to the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    /// Severity level
    pub severity: ConsoleSeverity,
    /// Warning category
    pub kind: WarningKind,
    /// Message text
    pub text: String,
    /// App that produced the message, when one did
    pub app: Option<AppId>,
}

impl ConsoleMessage {
    /// Create a warning
    #[must_use]
    pub fn warn(kind: WarningKind, text: impl Into<String>) -> Self {
        Self {
            severity: ConsoleSeverity::Warn,
            kind,
            text: text.into(),
            app: None,
        }
    }

    /// Attribute the message to an app
    #[must_use]
    pub fn with_app(mut self, app: AppId) -> Self {
        self.app = Some(app);
        self
    }
}

impl fmt::Display for ConsoleMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text)
    }
}

/// Receives every message that passes the filters
pub type ConsoleSink = Rc<dyn Fn(&ConsoleMessage)>;

/// Returns `true` to swallow a message
pub type ConsoleFilter = Rc<dyn Fn(&ConsoleMessage) -> bool>;

/// Handle to an installed filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterId(u64);

struct ConsoleState {
    sink: ConsoleSink,
    filters: Vec<(FilterId, ConsoleFilter)>,
    next_filter: u64,
}

thread_local! {
    static CONSOLE: RefCell<ConsoleState> = RefCell::new(ConsoleState {
        sink: default_sink(),
        filters: Vec::new(),
        next_filter: 0,
    });
}

fn default_sink() -> ConsoleSink {
    Rc::new(|message: &ConsoleMessage| match message.severity {
        ConsoleSeverity::Info => {
            tracing::info!(target: "mount_probe::console", kind = ?message.kind, "{}", message.text);
        }
        ConsoleSeverity::Warn => {
            tracing::warn!(target: "mount_probe::console", kind = ?message.kind, "{}", message.text);
        }
        ConsoleSeverity::Error => {
            tracing::error!(target: "mount_probe::console", kind = ?message.kind, "{}", message.text);
        }
    })
}

/// Write a message through the filters to the sink
pub fn write(message: &ConsoleMessage) {
    let (filters, sink) = CONSOLE.with(|state| {
        let state = state.borrow();
        let filters: Vec<ConsoleFilter> = state.filters.iter().map(|(_, f)| Rc::clone(f)).collect();
        (filters, Rc::clone(&state.sink))
    });
    if filters.iter().any(|filter| filter(message)) {
        tracing::trace!(kind = ?message.kind, "console message suppressed");
        return;
    }
    sink(message);
}

/// Write a framework warning
pub fn warn(kind: WarningKind, text: impl Into<String>) {
    write(&ConsoleMessage::warn(kind, text));
}

/// Replace the sink, returning the previous one
pub fn set_sink(sink: ConsoleSink) -> ConsoleSink {
    CONSOLE.with(|state| std::mem::replace(&mut state.borrow_mut().sink, sink))
}

/// Restore the `tracing` sink
pub fn reset_sink() {
    set_sink(default_sink());
}

/// Install a filter
pub fn add_filter(filter: ConsoleFilter) -> FilterId {
    CONSOLE.with(|state| {
        let mut state = state.borrow_mut();
        let id = FilterId(state.next_filter);
        state.next_filter += 1;
        state.filters.push((id, filter));
        id
    })
}

/// Remove a filter; returns `false` if it was already gone
pub fn remove_filter(id: FilterId) -> bool {
    CONSOLE.with(|state| {
        let mut state = state.borrow_mut();
        let before = state.filters.len();
        state.filters.retain(|(fid, _)| *fid != id);
        state.filters.len() != before
    })
}

/// Number of active filters
#[must_use]
pub fn filter_count() -> usize {
    CONSOLE.with(|state| state.borrow().filters.len())
}

/// Captures console output until dropped, then restores the previous sink
pub struct ConsoleCapture {
    messages: Rc<RefCell<Vec<ConsoleMessage>>>,
    previous: Option<ConsoleSink>,
}

impl fmt::Debug for ConsoleCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleCapture")
            .field("messages", &self.messages.borrow().len())
            .finish()
    }
}

impl ConsoleCapture {
    /// Start capturing
    #[must_use]
    pub fn start() -> Self {
        let messages = Rc::new(RefCell::new(Vec::new()));
        let sink_messages = Rc::clone(&messages);
        let previous = set_sink(Rc::new(move |message: &ConsoleMessage| {
            sink_messages.borrow_mut().push(message.clone());
        }));
        Self {
            messages,
            previous: Some(previous),
        }
    }

    /// Every captured message
    #[must_use]
    pub fn messages(&self) -> Vec<ConsoleMessage> {
        self.messages.borrow().clone()
    }

    /// Captured warnings
    #[must_use]
    pub fn warnings(&self) -> Vec<ConsoleMessage> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.severity == ConsoleSeverity::Warn)
            .cloned()
            .collect()
    }

    /// Captured messages of one category
    #[must_use]
    pub fn of_kind(&self, kind: WarningKind) -> Vec<ConsoleMessage> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    /// Forget captured messages
    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }
}

impl Drop for ConsoleCapture {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            set_sink(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_warnings() {
        let capture = ConsoleCapture::start();
        warn(WarningKind::Other, "first");
        warn(WarningKind::UnresolvedComponent, "second");
        assert_eq!(capture.warnings().len(), 2);
        assert_eq!(capture.of_kind(WarningKind::UnresolvedComponent)[0].text, "second");
        capture.clear();
        assert!(capture.messages().is_empty());
    }

    #[test]
    fn filter_swallows_only_matching_kind() {
        let capture = ConsoleCapture::start();
        let id = add_filter(Rc::new(|m: &ConsoleMessage| m.kind == WarningKind::UnhandledEmit));
        warn(WarningKind::UnhandledEmit, "hidden");
        warn(WarningKind::Other, "shown");
        assert_eq!(capture.messages().len(), 1);
        assert_eq!(capture.messages()[0].text, "shown");

        assert!(remove_filter(id));
        assert!(!remove_filter(id));
        warn(WarningKind::UnhandledEmit, "visible again");
        assert_eq!(capture.of_kind(WarningKind::UnhandledEmit).len(), 1);
    }

    #[test]
    fn nested_captures_restore_in_order() {
        let outer = ConsoleCapture::start();
        {
            let inner = ConsoleCapture::start();
            warn(WarningKind::Other, "inner");
            assert_eq!(inner.messages().len(), 1);
        }
        warn(WarningKind::Other, "outer");
        assert_eq!(outer.messages().len(), 1);
        assert_eq!(outer.messages()[0].text, "outer");
    }

    #[test]
    fn message_display_includes_severity() {
        let message = ConsoleMessage::warn(WarningKind::Other, "careful");
        assert_eq!(message.to_string(), "[warn] careful");
    }
}
