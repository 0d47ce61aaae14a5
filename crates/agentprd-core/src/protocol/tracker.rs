use std::collections::BTreeMap;

use super::frames::{ToolEvent, ToolEventKind};

/// Where a single tool invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallState {
    Started,
    Called,
    Completed,
}

/// Tracks tool invocations by call id so a front end can show how many
/// tools are still running without keeping the full event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallTracker {
    calls: BTreeMap<String, ToolCallState>,
}

impl ToolCallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Events without a call id (step boundaries) are
    /// ignored, and a completed call never moves back to running.
    pub fn observe(&mut self, event: &ToolEvent) {
        let Some(id) = event.tool_call_id.as_deref() else {
            return;
        };
        let next = match event.kind {
            ToolEventKind::CallStart => ToolCallState::Started,
            ToolEventKind::Call => ToolCallState::Called,
            ToolEventKind::Result => ToolCallState::Completed,
            ToolEventKind::StepFinish => return,
        };
        let state = self.calls.entry(id.to_string()).or_insert(next);
        if *state != ToolCallState::Completed {
            *state = next;
        }
    }

    pub fn state(&self, id: &str) -> Option<ToolCallState> {
        self.calls.get(id).copied()
    }

    /// Ids of calls that have not produced a result yet, in id order.
    pub fn active_ids(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|(_, state)| **state != ToolCallState::Completed)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.calls
            .values()
            .filter(|state| **state != ToolCallState::Completed)
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lifecycle_moves_through_states() {
        let mut tracker = ToolCallTracker::new();
        tracker.observe(&ToolEvent::call_start("a", "get_prd"));
        assert_eq!(tracker.state("a"), Some(ToolCallState::Started));
        assert_eq!(tracker.active_count(), 1);

        tracker.observe(&ToolEvent::call("a", "get_prd", json!({})));
        assert_eq!(tracker.state("a"), Some(ToolCallState::Called));

        tracker.observe(&ToolEvent::result("a", "get_prd", json!({"ok": true})));
        assert_eq!(tracker.state("a"), Some(ToolCallState::Completed));
        assert!(tracker.is_idle());
    }

    #[test]
    fn interleaved_calls_are_tracked_independently() {
        let mut tracker = ToolCallTracker::new();
        tracker.observe(&ToolEvent::call("b", "save_note", json!({})));
        tracker.observe(&ToolEvent::call("a", "get_note", json!({})));
        tracker.observe(&ToolEvent::result("b", "save_note", json!({})));
        assert_eq!(tracker.active_ids(), vec!["a"]);
    }

    #[test]
    fn step_finish_and_anonymous_events_are_ignored() {
        let mut tracker = ToolCallTracker::new();
        tracker.observe(&ToolEvent::step_finish(true));
        assert!(tracker.is_idle());
        assert_eq!(tracker.active_ids(), Vec::<&str>::new());
    }

    #[test]
    fn completed_call_stays_completed() {
        let mut tracker = ToolCallTracker::new();
        tracker.observe(&ToolEvent::result("a", "get_prd", json!(null)));
        tracker.observe(&ToolEvent::call("a", "get_prd", json!({})));
        assert_eq!(tracker.state("a"), Some(ToolCallState::Completed));
    }
}
