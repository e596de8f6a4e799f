//! Keyword fallback for safety judgment.
//!
//! When the judgment collaborator is unavailable or returns something
//! unusable, this policy decides SAFE vs DANGER from the transcript
//! alone. It never returns [`Verdict::Unknown`], so a confirmation
//! session that reaches it always terminates.

use crate::domain::{JudgedVerdict, Verdict};

/// Ordered allow-list of phrases that mark a response as safe.
///
/// Matching is case-insensitive substring search over the transcript.
/// Anything that matches no phrase is treated as DANGER: an
/// uninterpretable response is not assumed safe.
#[derive(Debug, Clone)]
pub struct KeywordPolicy {
    safe_phrases: Vec<String>,
}

impl Default for KeywordPolicy {
    fn default() -> Self {
        Self {
            safe_phrases: [
                "fine", "okay", "ok", "yes", "good", "alright",
                "exercising", "stretching", "sleeping", "resting",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl KeywordPolicy {
    /// Policy with a custom phrase list (stored lowercased).
    pub fn new(safe_phrases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            safe_phrases: safe_phrases
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }

    /// Judge a transcript. `None` means nothing was heard, which is
    /// always DANGER.
    pub fn judge(&self, transcript: Option<&str>) -> JudgedVerdict {
        let Some(transcript) = transcript else {
            return JudgedVerdict::new(
                Verdict::Danger,
                "no response heard",
                "I could not hear you. Contacting your caregiver now.",
            );
        };

        let lowered = transcript.to_lowercase();
        if let Some(phrase) = self.safe_phrases.iter().find(|p| lowered.contains(p.as_str())) {
            JudgedVerdict::new(
                Verdict::Safe,
                format!("response matched safe phrase \"{phrase}\""),
                "Understood. Take care.",
            )
        } else {
            JudgedVerdict::new(
                Verdict::Danger,
                format!("response \"{transcript}\" matched no safe phrase"),
                "I am contacting your caregiver now. Help is on the way.",
            )
        }
    }
}
