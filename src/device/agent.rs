//! Async runner for one device's confirmation machine.
//!
//! The agent owns the machine, the collaborator handles, and the
//! cooldown timer. It is single-threaded and cooperative: exactly one
//! of {evaluate tick, await prompt, await transcript, await verdict}
//! is in flight at a time, and ticks arriving mid-session are dropped.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Sleep};

use crate::collab::{ClassificationSource, DialogueService, JudgmentService};
use crate::config::DeviceConfig;
use crate::domain::{Classification, DeviceEvent, DeviceId, DevicePhase, GroupId};
use crate::store::StatusStore;
use crate::Result;

use super::machine::{Command, ConfirmationMachine};

/// Runs one device's confirmation machine against its collaborators.
pub struct DeviceAgent {
    group: GroupId,
    device: DeviceId,
    config: DeviceConfig,
    machine: ConfirmationMachine,
    dialogue: Arc<dyn DialogueService>,
    judgment: Arc<dyn JudgmentService>,
    store: Arc<dyn StatusStore>,
    events: broadcast::Sender<DeviceEvent>,
    published_phase: DevicePhase,
}

/// Handle to a spawned device agent.
///
/// Dropping the handle does not stop the agent; call [`shutdown`] to
/// tear the session down. Teardown aborts the run task, which cancels
/// any pending re-prompt or cooldown timer with it, so no timer
/// callback can write stale state afterwards.
///
/// [`shutdown`]: DeviceHandle::shutdown
pub struct DeviceHandle {
    device: DeviceId,
    events: broadcast::Sender<DeviceEvent>,
    task: tokio::task::JoinHandle<()>,
}

impl DeviceHandle {
    /// The device this handle controls.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// Subscribe to the device's status events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// True once the agent's run loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the agent, cancelling any in-flight speech operation and
    /// pending timers.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl DeviceAgent {
    /// Create an agent for one device.
    pub fn new(
        group: GroupId,
        device: DeviceId,
        config: DeviceConfig,
        dialogue: Arc<dyn DialogueService>,
        judgment: Arc<dyn JudgmentService>,
        store: Arc<dyn StatusStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity);
        let machine = ConfirmationMachine::new(config.clone());
        Self {
            group,
            device,
            config,
            machine,
            dialogue,
            judgment,
            store,
            events,
            published_phase: DevicePhase::Idle,
        }
    }

    /// Subscribe to the device's status events before spawning.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Subscribe to the classification source and spawn the run loop.
    pub async fn spawn(self, source: Arc<dyn ClassificationSource>) -> Result<DeviceHandle> {
        let ticks = source.subscribe(&self.device).await?;
        Ok(self.spawn_with_stream(ticks))
    }

    /// Spawn the run loop over an already-open tick stream.
    pub fn spawn_with_stream(self, ticks: mpsc::Receiver<Classification>) -> DeviceHandle {
        let device = self.device.clone();
        let events = self.events.clone();
        let task = tokio::spawn(self.run(ticks));
        DeviceHandle {
            device,
            events,
            task,
        }
    }

    /// Run until the tick stream closes.
    pub async fn run(mut self, mut ticks: mpsc::Receiver<Classification>) {
        tracing::debug!(group = %self.group, device = %self.device, "device agent started");
        let mut cooldown: Option<Pin<Box<Sleep>>> = None;

        loop {
            let wake = match cooldown.as_mut() {
                Some(sleep) => {
                    tokio::select! {
                        _ = sleep.as_mut() => Wake::CooldownElapsed,
                        tick = ticks.recv() => Wake::Tick(tick),
                    }
                }
                None => Wake::Tick(ticks.recv().await),
            };

            match wake {
                Wake::CooldownElapsed => {
                    cooldown = None;
                    let commands = self.machine.cooldown_elapsed();
                    self.execute(commands, &mut cooldown).await;
                }
                Wake::Tick(None) => break,
                Wake::Tick(Some(classification)) => {
                    let commands = self.machine.tick(&classification);
                    self.execute(commands, &mut cooldown).await;

                    // A session may have run to completion just now;
                    // ticks that queued up behind the dialogue are
                    // stale fall evidence and must be dropped, not
                    // evaluated.
                    if self.machine.phase() != DevicePhase::Idle {
                        while ticks.try_recv().is_ok() {}
                    }
                }
            }
        }
        tracing::debug!(group = %self.group, device = %self.device, "device agent stopped");
    }

    /// Execute machine commands, feeding collaborator outcomes back in
    /// until the machine settles.
    async fn execute(&mut self, commands: Vec<Command>, cooldown: &mut Option<Pin<Box<Sleep>>>) {
        // The machine call that produced these commands may itself have
        // changed phase (including back to Idle, with no commands).
        self.publish_phase();

        let mut queue: VecDeque<Command> = commands.into();

        while let Some(command) = queue.pop_front() {
            let followups = match command {
                Command::Speak(text) => {
                    match timeout(self.config.prompt_timeout, self.dialogue.speak(&text)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::warn!(device = %self.device, error = %e, "speak failed")
                        }
                        Err(_) => {
                            tracing::warn!(device = %self.device, "speak timed out")
                        }
                    }
                    // A failed prompt still moves on to listening; the
                    // listen timeout bounds the session either way.
                    self.machine.prompt_done()
                }
                Command::Listen => {
                    match timeout(self.config.prompt_timeout, self.dialogue.listen()).await {
                        Ok(Ok(transcript)) => self.machine.transcript(&transcript),
                        Ok(Err(e)) => {
                            tracing::debug!(device = %self.device, error = %e, "listen failed");
                            self.machine.listen_failed()
                        }
                        Err(_) => {
                            tracing::debug!(device = %self.device, "listen timed out");
                            self.machine.listen_failed()
                        }
                    }
                }
                Command::Judge(transcript) => {
                    let outcome =
                        match timeout(self.config.prompt_timeout, self.judgment.judge(&transcript))
                            .await
                        {
                            Ok(Ok(judged)) => Some(judged),
                            Ok(Err(e)) => {
                                tracing::warn!(
                                    device = %self.device,
                                    error = %e,
                                    "judgment failed, using keyword fallback"
                                );
                                None
                            }
                            Err(_) => {
                                tracing::warn!(
                                    device = %self.device,
                                    "judgment timed out, using keyword fallback"
                                );
                                None
                            }
                        };
                    self.machine.judged(outcome)
                }
                Command::WriteStatus(record) => {
                    // Best effort: the next state change writes again,
                    // and an unconfirmed record must not block the
                    // machine.
                    if let Err(e) = self
                        .store
                        .write_status(&self.group, &self.device, record)
                        .await
                    {
                        tracing::warn!(device = %self.device, error = %e, "status write failed");
                    }
                    Vec::new()
                }
                Command::StartCooldown(duration) => {
                    *cooldown = Some(Box::pin(tokio::time::sleep(duration)));
                    Vec::new()
                }
            };

            queue.extend(followups);
            self.publish_phase();
        }
    }

    fn publish_phase(&mut self) {
        let phase = self.machine.phase();
        if phase != self.published_phase {
            self.published_phase = phase;
            tracing::debug!(device = %self.device, phase = phase.status_line(), "phase change");
            // No subscribers is fine.
            let _ = self
                .events
                .send(DeviceEvent::phase_change(self.device.clone(), phase));
        }
    }
}

enum Wake {
    Tick(Option<Classification>),
    CooldownElapsed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceState, JudgedVerdict};
    use crate::store::MemoryStatusStore;
    use crate::{Result, WatchError};
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Dialogue stub: speak always succeeds, listen pops scripted
    /// outcomes and pends forever once the script runs out (so the
    /// listen timeout fires).
    struct ScriptedDialogue {
        listens: Mutex<VecDeque<Result<String>>>,
        spoken: Mutex<Vec<String>>,
    }

    impl ScriptedDialogue {
        fn new(listens: Vec<Result<String>>) -> Self {
            Self {
                listens: Mutex::new(listens.into()),
                spoken: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl DialogueService for ScriptedDialogue {
        async fn speak(&self, text: &str) -> Result<()> {
            self.spoken.lock().push(text.to_string());
            Ok(())
        }

        async fn listen(&self) -> Result<String> {
            let next = self.listens.lock().pop_front();
            match next {
                Some(outcome) => outcome,
                None => std::future::pending().await,
            }
        }
    }

    /// Judgment stub that always fails, forcing the keyword fallback.
    struct UnavailableJudgment;

    #[async_trait::async_trait]
    impl JudgmentService for UnavailableJudgment {
        async fn judge(&self, _transcript: &str) -> Result<JudgedVerdict> {
            Err(WatchError::Judgment("service unavailable".into()))
        }
    }

    fn test_config() -> DeviceConfig {
        DeviceConfig::builder()
            .prompt_timeout(Duration::from_secs(5))
            .build()
    }

    fn agent(dialogue: Arc<dyn DialogueService>, store: Arc<dyn StatusStore>) -> DeviceAgent {
        DeviceAgent::new(
            GroupId::new("g"),
            DeviceId::new("cam"),
            test_config(),
            dialogue,
            Arc::new(UnavailableJudgment),
            store,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_ticks_write_once() {
        let store = Arc::new(MemoryStatusStore::new());
        let dialogue = Arc::new(ScriptedDialogue::new(vec![]));
        let a = agent(dialogue, store.clone());

        let (tx, rx) = mpsc::channel(16);
        for _ in 0..5 {
            tx.send(Classification::new("Standing", 0.8)).await.unwrap();
        }
        drop(tx);
        a.run(rx).await;

        let snapshot = store.read_group(&GroupId::new("g")).await.unwrap();
        let record = &snapshot.records[&DeviceId::new("cam")];
        assert_eq!(record.state, DeviceState::Safe);
        // One write survived the debounce; updated_at proves a single
        // record, and the store never saw a FALL.
        assert!(!record.is_fall());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_listen_timeouts_force_danger() {
        let store = Arc::new(MemoryStatusStore::new());
        // Empty script: every listen pends until the timeout.
        let dialogue = Arc::new(ScriptedDialogue::new(vec![]));
        let a = agent(dialogue.clone(), store.clone());

        let (tx, rx) = mpsc::channel(16);
        tx.send(Classification::new("Fall", 0.95)).await.unwrap();
        drop(tx);
        a.run(rx).await;

        let snapshot = store.read_group(&GroupId::new("g")).await.unwrap();
        let record = &snapshot.records[&DeviceId::new("cam")];
        assert!(record.is_fall());
        assert_eq!(record.confidence, 100);

        // Prompt, re-prompt, then the forced-danger reply.
        let spoken = dialogue.spoken.lock();
        assert_eq!(spoken.len(), 3);
        assert_eq!(spoken[0], "Are you okay?");
        assert_eq!(spoken[1], "Are you okay?");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcript_judged_by_fallback_when_service_down() {
        let store = Arc::new(MemoryStatusStore::new());
        let dialogue = Arc::new(ScriptedDialogue::new(vec![Ok(
            "I'm fine, just exercising".to_string()
        )]));
        let a = agent(dialogue, store.clone());

        let (tx, rx) = mpsc::channel(16);
        tx.send(Classification::new("Fall", 0.95)).await.unwrap();
        drop(tx);
        a.run(rx).await;

        let snapshot = store.read_group(&GroupId::new("g")).await.unwrap();
        let record = &snapshot.records[&DeviceId::new("cam")];
        assert_eq!(record.state, DeviceState::Safe);
        assert_eq!(record.confidence, 0);
        assert_eq!(
            record.subject_utterance.as_deref(),
            Some("I'm fine, just exercising")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_suppresses_and_then_rearms() {
        let store = Arc::new(MemoryStatusStore::new());
        let dialogue = Arc::new(ScriptedDialogue::new(vec![]));
        let a = agent(dialogue.clone(), store.clone());

        let (tx, rx) = mpsc::channel(16);
        let handle = a.spawn_with_stream(rx);

        tx.send(Classification::new("Fall", 0.95)).await.unwrap();
        // Let the session run to the forced-danger cooldown.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(dialogue.spoken.lock().len(), 3);

        // Still inside the 60 s alert cooldown: a new fall is ignored.
        tx.send(Classification::new("Fall", 0.99)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(dialogue.spoken.lock().len(), 3);

        // After the cooldown the machine re-arms.
        tokio::time::sleep(Duration::from_secs(60)).await;
        tx.send(Classification::new("Fall", 0.99)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(dialogue.spoken.lock().len(), 4, "new session prompts again");

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_events_reach_subscribers() {
        let store = Arc::new(MemoryStatusStore::new());
        let dialogue = Arc::new(ScriptedDialogue::new(vec![]));
        let a = agent(dialogue, store);
        let mut events = a.subscribe_events();

        let (tx, rx) = mpsc::channel(16);
        tx.send(Classification::new("Fall", 0.95)).await.unwrap();
        drop(tx);
        a.run(rx).await;

        let first = events.recv().await.unwrap();
        assert_eq!(first.phase, DevicePhase::Asking);
        assert_eq!(first.message, "checking on subject");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_cooldown() {
        let store = Arc::new(MemoryStatusStore::new());
        let dialogue = Arc::new(ScriptedDialogue::new(vec![]));
        let a = agent(dialogue, store.clone());

        let (tx, rx) = mpsc::channel(16);
        let handle = a.spawn_with_stream(rx);

        tx.send(Classification::new("Fall", 0.95)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        handle.shutdown();
        tokio::time::sleep(Duration::from_secs(120)).await;

        // The record written before teardown is the last one; no timer
        // fired after shutdown to disturb it.
        let snapshot = store.read_group(&GroupId::new("g")).await.unwrap();
        assert!(snapshot.records[&DeviceId::new("cam")].is_fall());
    }
}
