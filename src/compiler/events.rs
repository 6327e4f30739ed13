//! Event logging for the optimization pipeline.
//!
//! Every change a pass makes can be recorded as an [`Event`]: an eliminated
//! expression, a synthesized merge parameter, a purged heap cache. Events can be
//! inspected for debugging and testing or safely ignored.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Append-only collection with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events, recorded on drop
//!
//! # Example
//!
//! ```rust
//! use cseflow::compiler::{EventKind, EventLog};
//! use cseflow::analysis::MethodRef;
//!
//! let log = EventLog::new();
//! log.record(EventKind::ExpressionEliminated)
//!     .at(MethodRef::new(1), 3)
//!     .message("v7 = int_add v1, v2 -> v5");
//! log.info("cse removed 1 ops");
//!
//! assert_eq!(log.count_kind(EventKind::ExpressionEliminated), 1);
//! assert_eq!(log.summary(), "1 expression eliminated");
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::analysis::MethodRef;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A pure computation was replaced by an earlier result.
    ExpressionEliminated,
    /// A heap read was replaced by the known content of its location.
    LoadEliminated,
    /// A heap write storing the value already present was removed.
    StoreEliminated,
    /// A block parameter was added to carry a merged cache entry.
    PhiSynthesized,
    /// Heap cache entries were purged by a write or a loop.
    HeapInvalidated,
    /// A copy was propagated to its uses.
    CopyPropagated,
    /// An operation with constant operands was folded.
    ConstantFolded,
    /// An operation was removed.
    InstructionRemoved,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ExpressionEliminated => "expression eliminated",
            Self::LoadEliminated => "load eliminated",
            Self::StoreEliminated => "store eliminated",
            Self::PhiSynthesized => "phi synthesized",
            Self::HeapInvalidated => "heap invalidated",
            Self::CopyPropagated => "copy propagated",
            Self::ConstantFolded => "constant folded",
            Self::InstructionRemoved => "instruction removed",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::ExpressionEliminated
                | Self::LoadEliminated
                | Self::StoreEliminated
                | Self::PhiSynthesized
                | Self::CopyPropagated
                | Self::ConstantFolded
                | Self::InstructionRemoved
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function where the event occurred (if applicable).
    pub method: Option<MethodRef>,
    /// Block within the function.
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<&'static str>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            method: None,
            location: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.method, self.location) {
            (Some(method), Some(block)) => {
                write!(f, "[{}] {method}:B{block} {}", self.kind, self.message)
            }
            (Some(method), None) => write!(f, "[{}] {method} {}", self.kind, self.message),
            _ => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    method: Option<MethodRef>,
    location: Option<usize>,
    message: Option<String>,
    pass: Option<&'static str>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            method: None,
            location: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function and block where the event occurred.
    pub fn at(mut self, method: MethodRef, block: usize) -> Self {
        self.method = Some(method);
        self.location = Some(block);
        self
    }

    /// Sets only the function. `None` leaves the event unattributed.
    pub fn method(mut self, method: impl Into<Option<MethodRef>>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets only the block.
    pub fn location(mut self, block: usize) -> Self {
        self.location = Some(block);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a pass.
    pub fn pass(mut self, pass_name: &'static str) -> Self {
        self.pass = Some(pass_name);
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            method: self.method.take(),
            location: self.location.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of events produced by passes.
///
/// This type is thread-safe: events can be appended concurrently from
/// multiple threads using shared references (`&self`).
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events for a specific function.
    pub fn filter_method(&self, method: MethodRef) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.method == Some(method))
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Returns an iterator over error events.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.iter().filter(|e| e.kind.is_transformation()).count()
    }

    /// Returns the number of distinct functions with events.
    #[must_use]
    pub fn methods_affected(&self) -> usize {
        self.iter()
            .filter_map(|e| e.method)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of the transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{count} {}", kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert_eq!(log.summary(), "no events");
    }

    #[test]
    fn test_record_event() {
        let log = EventLog::new();
        log.record(EventKind::LoadEliminated)
            .at(MethodRef::new(7), 2)
            .pass("cse");

        let event = log.iter().next().unwrap();
        assert_eq!(event.kind, EventKind::LoadEliminated);
        assert_eq!(event.method, Some(MethodRef::new(7)));
        assert_eq!(event.location, Some(2));
        assert_eq!(event.pass, Some("cse"));
        assert_eq!(event.message, "load eliminated");
    }

    #[test]
    fn test_diagnostics_are_not_transformations() {
        let log = EventLog::new();
        log.info("hello");
        log.warn("careful");
        log.error("broken");
        assert_eq!(log.len(), 3);
        assert_eq!(log.transformation_count(), 0);
        assert_eq!(log.warnings().count(), 1);
        assert_eq!(log.errors().count(), 1);
        assert_eq!(log.summary(), "3 events");
    }

    #[test]
    fn test_merge_and_clone() {
        let a = EventLog::new();
        a.record(EventKind::PhiSynthesized).method(MethodRef::new(1));
        let b = EventLog::new();
        b.record(EventKind::PhiSynthesized).method(MethodRef::new(2));
        a.merge(&b);

        let copy = a.clone();
        assert_eq!(copy.count_kind(EventKind::PhiSynthesized), 2);
        assert_eq!(copy.methods_affected(), 2);
        assert_eq!(copy.filter_method(MethodRef::new(2)).count(), 1);
    }

    #[test]
    fn test_summary_is_sorted() {
        let log = EventLog::new();
        log.record(EventKind::StoreEliminated);
        log.record(EventKind::ExpressionEliminated);
        log.record(EventKind::ExpressionEliminated);
        assert_eq!(
            log.summary(),
            "1 store eliminated, 2 expression eliminated"
        );
    }
}
