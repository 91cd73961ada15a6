//! The render loop worker.
//!
//! ```text
//!                 store published
//!                 and size known
//!  WAITING_FOR_STORE ─────────────► READY ──► DRAW ──► BLOCKED_ON_CHANGE
//!        │                                     ▲              │
//!        │                                     └── change / ──┘
//!        │                                         resize / color
//!        └──────────── shutdown (any state) ──────────────► STOPPED
//! ```
//!
//! The worker runs on its own thread with a current-thread tokio runtime.
//! Every wait is one `select!` over the command channel and whatever the
//! current state waits on (the store slot, or the store's change watch), so
//! a shutdown always lands on the first poll.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{mpsc, watch};

use drawx_core::{CanvasTransform, Rgba};
use drawx_store::{ChangeWatcher, StrokeStore};

use crate::canvas::FrameSink;
use crate::config::RenderConfig;
use crate::error::{RenderError, SinkError};
use crate::scene::{self, FrameStats};

/// Messages from the UI thread to the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderCommand {
    Resize { width: u32, height: u32 },
    SelectColor(Rgba),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WaitingForStore,
    Ready,
    Drawing,
    BlockedOnChange,
    Stopped,
}

/// Running totals for one loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_presented: u64,
    /// Frames abandoned because the sink failed.
    pub frames_skipped: u64,
    pub strokes_drawn: u64,
    /// Strokes that could not be drawn.
    pub strokes_skipped: u64,
    /// Store wake-ups, after coalescing.
    pub wakeups: u64,
}

#[derive(Default)]
struct Counters {
    frames_presented: AtomicU64,
    frames_skipped: AtomicU64,
    strokes_drawn: AtomicU64,
    strokes_skipped: AtomicU64,
    wakeups: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> RenderStats {
        RenderStats {
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            strokes_drawn: self.strokes_drawn.load(Ordering::Relaxed),
            strokes_skipped: self.strokes_skipped.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
        }
    }
}

/// Where the loop starts.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub config: RenderConfig,
    /// Surface size, if already known.
    pub size: Option<(u32, u32)>,
    /// Fallback paint for unrecognized stroke colors.
    pub selected: Rgba,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            config: RenderConfig::default(),
            size: None,
            selected: drawx_core::SwatchColor::default().rgba(),
        }
    }
}

/// Owner's side of a running loop. Dropping it shuts the loop down and
/// joins the worker.
pub struct RenderLoopHandle {
    commands: mpsc::UnboundedSender<RenderCommand>,
    state: watch::Receiver<LoopState>,
    frames: watch::Receiver<FrameStats>,
    counters: Arc<Counters>,
    thread: Option<JoinHandle<()>>,
}

impl RenderLoopHandle {
    fn send(&self, cmd: RenderCommand) -> Result<(), RenderError> {
        self.commands.send(cmd).map_err(|_| RenderError::Stopped)
    }

    pub fn resize(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.send(RenderCommand::Resize { width, height })
    }

    pub fn select_color(&self, color: Rgba) -> Result<(), RenderError> {
        self.send(RenderCommand::SelectColor(color))
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.clone()
    }

    /// Watch presented frames. The value is the most recent frame's stats.
    pub fn subscribe_frames(&self) -> watch::Receiver<FrameStats> {
        self.frames.clone()
    }

    pub fn last_frame(&self) -> FrameStats {
        *self.frames.borrow()
    }

    pub fn stats(&self) -> RenderStats {
        self.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the loop and wait for the worker to exit.
    pub fn shutdown(mut self) -> Result<RenderStats, RenderError> {
        self.stop()?;
        Ok(self.counters.snapshot())
    }

    fn stop(&mut self) -> Result<(), RenderError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // Already gone if the worker exited on its own.
        let _ = self.commands.send(RenderCommand::Shutdown);
        thread.join().map_err(|_| RenderError::WorkerPanicked)
    }
}

impl Drop for RenderLoopHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Render loop did not stop cleanly: {e}");
        }
    }
}

pub struct RenderLoop<S: FrameSink> {
    sink: S,
    config: RenderConfig,
    transform: Option<CanvasTransform>,
    selected: Rgba,
    commands: mpsc::UnboundedReceiver<RenderCommand>,
    slot: watch::Receiver<Option<StrokeStore>>,
    state: watch::Sender<LoopState>,
    frames: watch::Sender<FrameStats>,
    counters: Arc<Counters>,
    frame_seq: u64,
}

/// What ended a wait.
enum Wake {
    Command(RenderCommand),
    StoreReady(StrokeStore),
    Changed,
    /// Woken without anything to act on.
    Idle,
    Stop,
}

impl<S> RenderLoop<S>
where
    S: FrameSink + Send + 'static,
{
    /// Start a loop on a new thread. `slot` is the store hand-off channel
    /// (see `drawx_store::StoreSlot::watch`).
    pub fn spawn(
        sink: S,
        slot: watch::Receiver<Option<StrokeStore>>,
        options: LoopOptions,
    ) -> Result<RenderLoopHandle, RenderError> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LoopState::WaitingForStore);
        let (frames_tx, frames_rx) = watch::channel(FrameStats::default());
        let counters = Arc::new(Counters::default());

        let transform = options
            .size
            .and_then(|(w, h)| CanvasTransform::with_edge(w, h, options.config.edge_width));
        let worker = RenderLoop {
            sink,
            config: options.config,
            transform,
            selected: options.selected,
            commands: cmd_rx,
            slot,
            state: state_tx,
            frames: frames_tx,
            counters: counters.clone(),
            frame_seq: 0,
        };

        let thread = std::thread::Builder::new()
            .name("drawx-render".into())
            .spawn(move || worker.run_blocking())?;

        Ok(RenderLoopHandle {
            commands: cmd_tx,
            state: state_rx,
            frames: frames_rx,
            counters,
            thread: Some(thread),
        })
    }

    fn run_blocking(mut self) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("Render loop could not start its runtime: {e}");
                self.set_state(LoopState::Stopped);
                return;
            }
        };
        runtime.block_on(self.run());
    }

    fn set_state(&self, state: LoopState) {
        self.state.send_replace(state);
    }

    async fn run(&mut self) {
        log::info!("Render loop started");
        let mut store: Option<StrokeStore> = None;
        let mut watcher: Option<ChangeWatcher> = None;
        let mut background_shown = false;
        let mut slot_closed = false;

        loop {
            let wake = match (store.as_ref(), watcher.as_mut()) {
                (Some(s), Some(w)) if self.transform.is_some() => {
                    self.set_state(LoopState::Drawing);
                    // Seen before the read, so a commit racing it wakes us again.
                    w.mark_seen();
                    self.draw_strokes(s);
                    self.set_state(LoopState::BlockedOnChange);
                    self.wait_blocked(w).await
                }
                _ => {
                    // A held store with no usable size is still ready.
                    self.set_state(if store.is_some() {
                        LoopState::Ready
                    } else {
                        LoopState::WaitingForStore
                    });
                    if self.transform.is_some() && !background_shown {
                        self.draw_background();
                        background_shown = true;
                    }
                    self.wait_for_store(store.is_some(), &mut slot_closed).await
                }
            };

            match wake {
                Wake::Stop | Wake::Command(RenderCommand::Shutdown) => break,
                Wake::Command(RenderCommand::Resize { width, height }) => {
                    self.sink.resized(width, height);
                    self.transform =
                        CanvasTransform::with_edge(width, height, self.config.edge_width);
                    background_shown = false;
                    log::debug!("Render loop resized to {width}×{height}");
                }
                Wake::Command(RenderCommand::SelectColor(color)) => {
                    self.selected = color;
                }
                Wake::StoreReady(s) => {
                    watcher = Some(s.changes());
                    store = Some(s);
                    self.set_state(LoopState::Ready);
                    log::info!("Render loop has a store handle");
                }
                Wake::Changed => {
                    self.counters.wakeups.fetch_add(1, Ordering::Relaxed);
                }
                Wake::Idle => {}
            }
        }

        drop(watcher);
        drop(store);
        self.set_state(LoopState::Stopped);
        let stats = self.counters.snapshot();
        log::info!(
            "Render loop stopped after {} frame(s) ({} skipped)",
            stats.frames_presented,
            stats.frames_skipped
        );
    }

    async fn wait_for_store(&mut self, have_store: bool, slot_closed: &mut bool) -> Wake {
        let watch_slot = !have_store && !*slot_closed;
        tokio::select! {
            biased;
            cmd = self.commands.recv() => match cmd {
                Some(cmd) => Wake::Command(cmd),
                None => Wake::Stop,
            },
            res = self.slot.wait_for(|s| s.is_some()), if watch_slot => match res {
                Ok(guard) => match guard.as_ref() {
                    Some(s) => Wake::StoreReady(s.clone()),
                    None => Wake::Idle,
                },
                Err(_) => {
                    log::warn!("Store slot closed before a store was published");
                    *slot_closed = true;
                    Wake::Idle
                }
            },
        }
    }

    async fn wait_blocked(&mut self, watcher: &mut ChangeWatcher) -> Wake {
        tokio::select! {
            biased;
            cmd = self.commands.recv() => match cmd {
                Some(cmd) => Wake::Command(cmd),
                None => Wake::Stop,
            },
            res = watcher.wait_for_change() => match res {
                Ok(_) => Wake::Changed,
                Err(e) => {
                    log::warn!("Change watch ended: {e}");
                    Wake::Stop
                }
            },
        }
    }

    fn draw_background(&mut self) {
        let result = self.sink.acquire().and_then(|mut frame| {
            scene::draw_background(&mut frame, &self.config);
            self.sink.present(frame)
        });
        match result {
            Ok(()) => self.frame_presented(FrameStats::default()),
            Err(e) => self.frame_failed(&e),
        }
    }

    fn draw_strokes(&mut self, store: &StrokeStore) {
        let Some(transform) = self.transform else {
            return;
        };
        let snapshot = store.query_all();
        let mut frame = match self.sink.acquire() {
            Ok(frame) => frame,
            Err(e) => return self.frame_failed(&e),
        };
        let mut stats = scene::draw_scene(
            &mut frame,
            snapshot.iter(),
            &transform,
            &self.config,
            self.selected,
        );
        if let Err(e) = self.sink.present(frame) {
            return self.frame_failed(&e);
        }

        stats.version = snapshot.version();
        self.counters
            .strokes_drawn
            .fetch_add(stats.strokes as u64, Ordering::Relaxed);
        self.counters
            .strokes_skipped
            .fetch_add(stats.skipped as u64, Ordering::Relaxed);
        self.frame_presented(stats);
    }

    fn frame_presented(&mut self, mut stats: FrameStats) {
        self.frame_seq += 1;
        stats.frame = self.frame_seq;
        let total = self.counters.frames_presented.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!(
            "Frame {}: {} stroke(s), {} segment(s), version {}",
            stats.frame,
            stats.strokes,
            stats.segments,
            stats.version
        );
        let interval = self.config.stats_log_interval;
        if interval > 0 && total % interval == 0 {
            log::info!(
                "Frame {total}: {} stroke(s), {} segment(s), {} skipped",
                stats.strokes,
                stats.segments,
                stats.skipped
            );
        }
        self.frames.send_replace(stats);
    }

    fn frame_failed(&mut self, e: &SinkError) {
        self.counters.frames_skipped.fetch_add(1, Ordering::Relaxed);
        log::warn!("Skipping frame: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingSink;
    use drawx_core::Point;
    use drawx_store::StoreSlot;
    use std::time::Duration;

    fn options(size: Option<(u32, u32)>) -> LoopOptions {
        LoopOptions {
            config: RenderConfig::for_testing(),
            size,
            ..LoopOptions::default()
        }
    }

    async fn wait_state(handle: &RenderLoopHandle, want: LoopState) {
        let mut rx = handle.subscribe_state();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
            .await
            .expect("state not reached")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_before_store() {
        let slot = StoreSlot::new();
        let sink = RecordingSink::new(400, 800);
        let log = sink.log();
        let handle = RenderLoop::spawn(sink, slot.watch(), options(None)).unwrap();
        wait_state(&handle, LoopState::WaitingForStore).await;

        let stats = handle.shutdown().unwrap();
        assert_eq!(stats.frames_presented, 0);
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_background_before_store() {
        let slot = StoreSlot::new();
        let sink = RecordingSink::new(400, 800);
        let log = sink.log();
        let handle = RenderLoop::spawn(sink, slot.watch(), options(Some((400, 800)))).unwrap();

        let mut frames = handle.subscribe_frames();
        tokio::time::timeout(Duration::from_secs(5), frames.wait_for(|f| f.frame >= 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.state(), LoopState::WaitingForStore);
        assert!(log.last().unwrap().is_background_only());
        handle.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_draws_after_store_and_redraws_on_change() {
        let slot = StoreSlot::new();
        let sink = RecordingSink::new(683, 683);
        let log = sink.log();
        let handle = RenderLoop::spawn(sink, slot.watch(), options(Some((683, 683)))).unwrap();

        let store = StrokeStore::in_memory();
        slot.publish(store.clone());
        wait_state(&handle, LoopState::BlockedOnChange).await;

        let mut txn = store.begin();
        txn.create_stroke("Peach", Point::new(0.0, 0.0)).unwrap();
        let version = txn.commit().unwrap().version;

        let mut frames = handle.subscribe_frames();
        tokio::time::timeout(
            Duration::from_secs(5),
            frames.wait_for(|f| f.version >= version && f.strokes == 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(log.last().unwrap().strokes().count(), 1);

        let stats = handle.shutdown().unwrap();
        assert!(stats.frames_presented >= 2);
        assert_eq!(stats.strokes_drawn, 1);
    }

    #[tokio::test]
    async fn test_acquire_failure_skips_frame() {
        let slot = StoreSlot::new();
        let sink = RecordingSink::new(683, 683);
        let log = sink.log();
        log.fail_next_acquires(1);
        let store = StrokeStore::in_memory();
        slot.publish(store.clone());

        let handle = RenderLoop::spawn(sink, slot.watch(), options(Some((683, 683)))).unwrap();
        wait_state(&handle, LoopState::BlockedOnChange).await;

        // The background frame failed; the first stroke frame still lands.
        let mut frames = handle.subscribe_frames();
        tokio::time::timeout(Duration::from_secs(5), frames.wait_for(|f| f.frame >= 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.acquire_failures(), 1);
        assert!(handle.stats().frames_skipped >= 1);
        handle.shutdown().unwrap();
    }

    #[tokio::test]
    async fn test_closed_slot_is_not_a_wakeup() {
        let slot = StoreSlot::new();
        let handle =
            RenderLoop::spawn(RecordingSink::new(10, 10), slot.watch(), options(None)).unwrap();
        wait_state(&handle, LoopState::WaitingForStore).await;
        drop(slot);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(handle.is_running());
        let stats = handle.shutdown().unwrap();
        assert_eq!(stats.wakeups, 0);
        assert_eq!(stats.frames_presented, 0);
    }

    #[tokio::test]
    async fn test_zero_size_with_store_reports_ready() {
        let slot = StoreSlot::new();
        slot.publish(StrokeStore::in_memory());
        let handle = RenderLoop::spawn(
            RecordingSink::new(683, 683),
            slot.watch(),
            options(Some((683, 683))),
        )
        .unwrap();
        wait_state(&handle, LoopState::BlockedOnChange).await;

        handle.resize(0, 683).unwrap();
        wait_state(&handle, LoopState::Ready).await;

        handle.resize(683, 683).unwrap();
        wait_state(&handle, LoopState::BlockedOnChange).await;
        handle.shutdown().unwrap();
    }

    #[test]
    fn test_handle_drop_stops_worker() {
        let slot = StoreSlot::new();
        let handle =
            RenderLoop::spawn(RecordingSink::new(10, 10), slot.watch(), options(None)).unwrap();
        let state = handle.subscribe_state();
        drop(handle);
        assert_eq!(*state.borrow(), LoopState::Stopped);
    }
}
