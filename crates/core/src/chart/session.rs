use crate::chart::context::{ChartContext, ContextRegistry};
use crate::chart::persist::{encode_expanded, load_expanded, SessionStore};
use crate::chart::provider::ChartSeriesProvider;
use crate::chart::series::ChartSeries;
use crate::chart::{normalize_code, TimeFrame};
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    Expanded {
        code: String,
        time_frame: TimeFrame,
    },
    Collapsed {
        code: String,
    },
    TimeFrameChanged {
        code: String,
        time_frame: TimeFrame,
    },
    SeriesReady {
        code: String,
        time_frame: TimeFrame,
        context_id: Uuid,
        points: usize,
    },
    SeriesFailed {
        code: String,
        time_frame: TimeFrame,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "camelCase")]
pub enum PanelStatus {
    Loading,
    Ready,
    /// Recoverable; `retry` re-issues the fetch.
    Failed(String),
}

#[derive(Debug)]
struct Panel {
    time_frame: TimeFrame,
    ticket: u64,
    status: PanelStatus,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct FetchCompletion {
    code: String,
    time_frame: TimeFrame,
    ticket: u64,
    result: Result<ChartSeries>,
}

/// Owned by a fetch task. If the task ends without delivering (provider panic, task dropped
/// by the runtime), a failure is reported for the same ticket so the panel never stays
/// `Loading`. Receiver is gone only when the manager was dropped.
struct CompletionSlot {
    tx: mpsc::UnboundedSender<FetchCompletion>,
    code: String,
    time_frame: TimeFrame,
    ticket: u64,
    delivered: bool,
}

impl CompletionSlot {
    fn deliver(mut self, result: Result<ChartSeries>) {
        self.delivered = true;
        self.send(result);
    }

    fn send(&mut self, result: Result<ChartSeries>) {
        let _ = self.tx.send(FetchCompletion {
            code: std::mem::take(&mut self.code),
            time_frame: self.time_frame,
            ticket: self.ticket,
            result,
        });
    }
}

impl Drop for CompletionSlot {
    fn drop(&mut self) {
        if !self.delivered {
            self.send(Err(anyhow::anyhow!(
                "chart series fetch for {} ended without a result",
                self.code
            )));
        }
    }
}

/// Per-code chart panel state: `Collapsed -> Expanded(time_frame) -> Collapsed`.
///
/// Fetches run as independent tasks and report back over a channel. A completion is applied
/// only while its ticket is still the panel's current one, so results for collapsed or
/// re-selected panels are dropped on arrival. Each code holds at most one live context.
pub struct ChartSessionManager {
    provider: Arc<dyn ChartSeriesProvider>,
    store: Arc<dyn SessionStore>,
    default_frame: TimeFrame,
    panels: BTreeMap<String, Panel>,
    contexts: ContextRegistry,
    next_ticket: u64,
    tx: mpsc::UnboundedSender<FetchCompletion>,
    rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl ChartSessionManager {
    /// Reads the persisted expanded set once and starts a fetch for every restored code at
    /// the default time-frame. Must be called inside a tokio runtime.
    pub fn restore(
        provider: Arc<dyn ChartSeriesProvider>,
        store: Arc<dyn SessionStore>,
        default_frame: TimeFrame,
    ) -> Self {
        let restored = load_expanded(store.as_ref());
        let (tx, rx) = mpsc::unbounded_channel();
        let mut manager = Self {
            provider,
            store,
            default_frame,
            panels: BTreeMap::new(),
            contexts: ContextRegistry::default(),
            next_ticket: 0,
            tx,
            rx,
        };

        let mut dropped = 0;
        for raw in &restored {
            let code = match normalize_code(raw) {
                Ok(code) => code,
                Err(err) => {
                    tracing::warn!(code = %raw, error = %err, "dropping invalid persisted chart code");
                    dropped += 1;
                    continue;
                }
            };
            manager.insert_panel(code.clone());
            manager.spawn_fetch(&code);
        }
        if dropped > 0 {
            manager.persist();
        }
        tracing::info!(
            restored = manager.panels.len(),
            provider = manager.provider.provider_name(),
            "chart session restored"
        );
        manager
    }

    pub fn toggle(&mut self, code: &str) -> Result<SessionEvent> {
        let code = normalize_code(code)?;

        if let Some(mut panel) = self.panels.remove(&code) {
            if let Some(task) = panel.task.take() {
                task.abort();
            }
            self.contexts.release(&code);
            self.persist();
            tracing::info!(code = %code, "chart panel collapsed");
            return Ok(SessionEvent::Collapsed { code });
        }

        self.insert_panel(code.clone());
        self.persist();
        self.spawn_fetch(&code);
        tracing::info!(code = %code, time_frame = %self.default_frame, "chart panel expanded");
        Ok(SessionEvent::Expanded {
            code,
            time_frame: self.default_frame,
        })
    }

    pub fn select_time_frame(&mut self, code: &str, time_frame: TimeFrame) -> Result<SessionEvent> {
        let code = normalize_code(code)?;
        let Some(panel) = self.panels.get_mut(&code) else {
            anyhow::bail!("chart panel {code} is not expanded");
        };
        panel.time_frame = time_frame;

        self.contexts.release(&code);
        self.spawn_fetch(&code);
        tracing::info!(code = %code, %time_frame, "chart time-frame changed");
        Ok(SessionEvent::TimeFrameChanged { code, time_frame })
    }

    /// Re-issues the fetch for the panel's current time-frame.
    pub fn retry(&mut self, code: &str) -> Result<()> {
        let code = normalize_code(code)?;
        anyhow::ensure!(self.panels.contains_key(&code), "chart panel {code} is not expanded");
        self.spawn_fetch(&code);
        Ok(())
    }

    pub fn is_expanded(&self, code: &str) -> bool {
        self.panels.contains_key(code.trim())
    }

    pub fn expanded_codes(&self) -> BTreeSet<String> {
        self.panels.keys().cloned().collect()
    }

    pub fn time_frame(&self, code: &str) -> Option<TimeFrame> {
        self.panels.get(code.trim()).map(|p| p.time_frame)
    }

    pub fn status(&self, code: &str) -> Option<&PanelStatus> {
        self.panels.get(code.trim()).map(|p| &p.status)
    }

    pub fn context(&self, code: &str) -> Option<&ChartContext> {
        self.contexts.get(code.trim())
    }

    pub fn live_contexts(&self) -> usize {
        self.contexts.live_count()
    }

    pub fn pending_fetches(&self) -> usize {
        self.panels
            .values()
            .filter(|p| p.status == PanelStatus::Loading)
            .count()
    }

    /// Waits for the next fetch outcome that still applies. `None` once nothing is loading.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        while self.pending_fetches() > 0 {
            let completion = self.rx.recv().await?;
            if let Some(event) = self.apply(completion) {
                return Some(event);
            }
        }
        None
    }

    /// Applies every completion that has already arrived without waiting.
    pub fn drain_ready(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(event) = self.apply(completion) {
                events.push(event);
            }
        }
        events
    }

    /// Cancels all fetches and releases every context. The persisted set is left as is.
    pub fn shutdown(mut self) -> usize {
        self.abort_all();
        let released = self.contexts.release_all();
        tracing::info!(released, "chart session shut down");
        released
    }

    fn insert_panel(&mut self, code: String) {
        self.panels.insert(
            code,
            Panel {
                time_frame: self.default_frame,
                ticket: 0,
                status: PanelStatus::Loading,
                task: None,
            },
        );
    }

    fn spawn_fetch(&mut self, code: &str) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let Some(panel) = self.panels.get_mut(code) else {
            return;
        };
        if let Some(task) = panel.task.take() {
            task.abort();
        }
        panel.ticket = ticket;
        panel.status = PanelStatus::Loading;

        let time_frame = panel.time_frame;
        let provider = Arc::clone(&self.provider);
        let slot = CompletionSlot {
            tx: self.tx.clone(),
            code: code.to_string(),
            time_frame,
            ticket,
            delivered: false,
        };
        tracing::debug!(code, %time_frame, ticket, "chart series fetch started");
        panel.task = Some(tokio::spawn(async move {
            let code = slot.code.clone();
            let result = provider.fetch_series(&code, time_frame).await;
            slot.deliver(result);
        }));
    }

    fn apply(&mut self, done: FetchCompletion) -> Option<SessionEvent> {
        let Some(panel) = self.panels.get_mut(&done.code) else {
            tracing::debug!(code = %done.code, ticket = done.ticket, "discarding series for collapsed panel");
            return None;
        };
        if panel.ticket != done.ticket {
            tracing::debug!(
                code = %done.code,
                ticket = done.ticket,
                current = panel.ticket,
                "discarding stale chart series"
            );
            return None;
        }
        panel.task = None;

        match done.result {
            Ok(series) => {
                panel.status = PanelStatus::Ready;
                let ctx = self.contexts.acquire(&done.code, done.time_frame, series);
                Some(SessionEvent::SeriesReady {
                    code: done.code.clone(),
                    time_frame: done.time_frame,
                    context_id: ctx.id,
                    points: ctx.series.len(),
                })
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(
                    code = %done.code,
                    time_frame = %done.time_frame,
                    error = %message,
                    "chart series fetch failed"
                );
                panel.status = PanelStatus::Failed(message.clone());
                self.contexts.release(&done.code);
                Some(SessionEvent::SeriesFailed {
                    code: done.code,
                    time_frame: done.time_frame,
                    message,
                })
            }
        }
    }

    fn persist(&self) {
        let saved = encode_expanded(&self.expanded_codes()).and_then(|raw| self.store.save(&raw));
        if let Err(err) = saved {
            tracing::warn!(error = %format!("{err:#}"), "failed to persist chart session");
        }
    }

    fn abort_all(&mut self) {
        for panel in self.panels.values_mut() {
            if let Some(task) = panel.task.take() {
                task.abort();
            }
        }
    }
}

impl Drop for ChartSessionManager {
    fn drop(&mut self) {
        self.abort_all();
    }
}
