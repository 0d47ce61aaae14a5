//! Reasoning detection for display.
//!
//! Some models open a reply by thinking out loud. When `show_reasoning` is
//! enabled the front ends style such replies differently. Detection only
//! affects presentation; decoded content is never changed.

/// Openers that mark a reply as reasoning, matched case-insensitively.
const REASONING_OPENERS: &[&str] = &[
    "let me think",
    "let me consider",
    "let's think",
    "thinking through",
    "first, i'll",
    "i need to figure out",
    "reasoning:",
];

/// Classifies a message from its first non-blank chunk. Later chunks never
/// change the verdict.
#[derive(Debug, Clone, Default)]
pub struct ReasoningDetector {
    enabled: bool,
    verdict: Option<bool>,
}

impl ReasoningDetector {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            verdict: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Feed a text delta; returns whether the message counts as reasoning.
    pub fn observe(&mut self, chunk: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(verdict) = self.verdict {
            return verdict;
        }
        let trimmed = chunk.trim_start();
        if trimmed.is_empty() {
            return false;
        }
        let lower = trimmed.to_lowercase();
        let verdict = REASONING_OPENERS.iter().any(|p| lower.starts_with(p));
        self.verdict = Some(verdict);
        verdict
    }

    pub fn is_reasoning(&self) -> bool {
        self.verdict.unwrap_or(false)
    }

    /// Forget the verdict before the next message.
    pub fn reset(&mut self) {
        self.verdict = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_never_flags() {
        let mut d = ReasoningDetector::new(false);
        assert!(!d.observe("Let me think about this"));
        assert!(!d.is_reasoning());
    }

    #[test]
    fn first_chunk_wins() {
        let mut d = ReasoningDetector::new(true);
        assert!(!d.observe("   "));
        assert!(d.observe("Let me think about pricing."));
        assert!(d.observe("Here is the answer."));

        let mut d = ReasoningDetector::new(true);
        assert!(!d.observe("Here is the answer."));
        assert!(!d.observe("let me think again"));
    }

    #[test]
    fn reset_clears_verdict() {
        let mut d = ReasoningDetector::new(true);
        d.observe("Let me consider the options");
        assert!(d.is_reasoning());
        d.reset();
        assert!(!d.is_reasoning());
    }
}
