//! Fall confirmation state machine.
//!
//! Drives one device's session lifecycle:
//! Idle → Asking → Listening → Judging → Cooldown(Safe|Alert) → Idle
//!
//! The machine is pure: it consumes events and returns the commands the
//! runner must execute (speak, listen, judge, write status, start a
//! cooldown timer). All timing and I/O live in
//! [`super::agent::DeviceAgent`].

use std::time::Duration;

use crate::config::DeviceConfig;
use crate::domain::{
    Classification, DevicePhase, DeviceState, DeviceStatusRecord, JudgedVerdict, Verdict,
};
use crate::judgment::KeywordPolicy;

/// A side effect requested by the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Speak text to the subject.
    Speak(String),
    /// Listen for a single utterance.
    Listen,
    /// Judge a transcript.
    Judge(String),
    /// Write the device's status record to the shared store.
    WriteStatus(DeviceStatusRecord),
    /// Arm the quiet-period timer.
    StartCooldown(Duration),
}

/// The per-device fall confirmation machine.
///
/// Classification ticks arriving outside `Idle` are dropped: an
/// in-flight confirmation owns the decision until it reaches a
/// cooldown.
pub struct ConfirmationMachine {
    config: DeviceConfig,
    fallback: KeywordPolicy,
    phase: DevicePhase,
    retry_count: u32,
    last_committed: Option<DeviceState>,
    last_utterance: Option<String>,
}

impl ConfirmationMachine {
    /// Create a machine in `Idle` with the default keyword fallback.
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_fallback(config, KeywordPolicy::default())
    }

    /// Create a machine with a custom keyword fallback policy.
    pub fn with_fallback(config: DeviceConfig, fallback: KeywordPolicy) -> Self {
        Self {
            config,
            fallback,
            phase: DevicePhase::Idle,
            retry_count: 0,
            last_committed: None,
            last_utterance: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> DevicePhase {
        self.phase
    }

    /// Re-prompts consumed in the current session.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Consume one classification tick.
    ///
    /// In `Idle`, a fall label above the confidence threshold opens a
    /// session; any other tick commits a SAFE record, debounced so the
    /// store sees one write per state change rather than one per tick.
    pub fn tick(&mut self, classification: &Classification) -> Vec<Command> {
        if self.phase != DevicePhase::Idle {
            return Vec::new();
        }

        if self.is_candidate_fall(classification) {
            self.phase = DevicePhase::Asking;
            self.retry_count = 0;
            self.last_utterance = None;
            return vec![Command::Speak(self.config.prompt_text.clone())];
        }

        if self.last_committed != Some(DeviceState::Safe) {
            self.last_committed = Some(DeviceState::Safe);
            return vec![Command::WriteStatus(DeviceStatusRecord::safe(
                classification.confidence_percent(),
            ))];
        }

        Vec::new()
    }

    /// The confirmation prompt finished playing.
    pub fn prompt_done(&mut self) -> Vec<Command> {
        if self.phase != DevicePhase::Asking {
            return Vec::new();
        }
        self.phase = DevicePhase::Listening;
        vec![Command::Listen]
    }

    /// A transcript was heard.
    pub fn transcript(&mut self, text: &str) -> Vec<Command> {
        if self.phase != DevicePhase::Listening {
            return Vec::new();
        }
        self.phase = DevicePhase::Judging;
        self.last_utterance = Some(text.to_string());
        vec![Command::Judge(text.to_string())]
    }

    /// Listening failed or timed out. No response is not assumed safe:
    /// once the retry budget is exhausted the verdict is forced DANGER.
    pub fn listen_failed(&mut self) -> Vec<Command> {
        if self.phase != DevicePhase::Listening {
            return Vec::new();
        }
        self.retry(JudgedVerdict::new(
            Verdict::Danger,
            format!("no response after {} prompts", self.retry_count + 1),
            "I could not hear you. Contacting your caregiver now.",
        ))
    }

    /// The judgment collaborator answered, or (`None`) failed outright.
    ///
    /// A failed or malformed judgment falls back to the keyword policy,
    /// which always terminates the session. An `Unknown` verdict is
    /// handled like a listening timeout: re-ask within the retry
    /// budget, then force DANGER.
    pub fn judged(&mut self, outcome: Option<JudgedVerdict>) -> Vec<Command> {
        if self.phase != DevicePhase::Judging {
            return Vec::new();
        }

        let Some(judged) = outcome else {
            let fallback = self.fallback.judge(self.last_utterance.as_deref());
            return self.finalize(fallback);
        };

        match judged.verdict {
            Verdict::Safe | Verdict::Danger => self.finalize(judged),
            Verdict::Unknown => self.retry(JudgedVerdict::new(
                Verdict::Danger,
                format!(
                    "response could not be interpreted after {} prompts",
                    self.retry_count + 1
                ),
                "I could not understand you. Contacting your caregiver now.",
            )),
        }
    }

    /// The quiet period ended; resume evaluating ticks.
    pub fn cooldown_elapsed(&mut self) -> Vec<Command> {
        match self.phase {
            DevicePhase::CooldownSafe | DevicePhase::CooldownAlert => {
                self.phase = DevicePhase::Idle;
            }
            _ => {}
        }
        Vec::new()
    }

    fn is_candidate_fall(&self, classification: &Classification) -> bool {
        self.config.fall_labels.iter().any(|l| l == &classification.label)
            && classification.confidence > self.config.fall_confidence_threshold
    }

    /// Consume one retry, re-prompting if budget remains and otherwise
    /// finalizing the given forced-DANGER verdict.
    fn retry(&mut self, forced: JudgedVerdict) -> Vec<Command> {
        self.retry_count += 1;
        if self.retry_count < self.config.max_retries {
            self.phase = DevicePhase::Asking;
            vec![Command::Speak(self.config.prompt_text.clone())]
        } else {
            self.finalize(forced)
        }
    }

    fn finalize(&mut self, judged: JudgedVerdict) -> Vec<Command> {
        let (state, confidence, phase, cooldown) = match judged.verdict {
            Verdict::Safe => (
                DeviceState::Safe,
                0,
                DevicePhase::CooldownSafe,
                self.config.safe_cooldown,
            ),
            // Unknown never reaches here; retry() converts it.
            Verdict::Danger | Verdict::Unknown => (
                DeviceState::Fall,
                100,
                DevicePhase::CooldownAlert,
                self.config.alert_cooldown,
            ),
        };

        self.phase = phase;
        self.last_committed = Some(state);
        let record = DeviceStatusRecord::incident(
            state,
            confidence,
            judged.reason,
            judged.reply_message.clone(),
            self.last_utterance.take(),
        );

        vec![
            Command::Speak(judged.reply_message),
            Command::WriteStatus(record),
            Command::StartCooldown(cooldown),
        ]
    }
}
