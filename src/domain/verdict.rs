//! Safety verdicts produced by the judgment collaborator or the
//! keyword fallback.

/// Outcome of judging a subject's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Verdict {
    /// The subject is okay; no escalation.
    Safe,
    /// The subject needs help; escalate.
    Danger,
    /// The response could not be interpreted; re-ask within the retry
    /// budget, then escalate.
    Unknown,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Safe => write!(f, "SAFE"),
            Verdict::Danger => write!(f, "DANGER"),
            Verdict::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A structured judgment: the verdict itself, how it was reached, and
/// what to say back to the subject.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JudgedVerdict {
    /// The safety verdict.
    pub verdict: Verdict,
    /// Human-readable reasoning, recorded in the status record.
    pub reason: String,
    /// Message spoken back to the subject.
    pub reply_message: String,
}

impl JudgedVerdict {
    /// Build a judged verdict.
    pub fn new(
        verdict: Verdict,
        reason: impl Into<String>,
        reply_message: impl Into<String>,
    ) -> Self {
        Self {
            verdict,
            reason: reason.into(),
            reply_message: reply_message.into(),
        }
    }
}
