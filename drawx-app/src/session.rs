//! One drawing session: the state an activity owns between start and stop.
//!
//! ```text
//!   pointer ─► InputCapture ─► StrokeWriter ─┐
//!                                            ▼
//!   connect task ─► StoreSlot ──────────► StrokeStore ─► change watch
//!                        │                                   │
//!                        └──────────► RenderLoop ◄───────────┘
//! ```
//!
//! The session lives on the UI thread. The render loop is started per
//! surface lifetime and stopped when the surface goes away; the store handle
//! and the writer outlive surfaces.

use std::path::PathBuf;

use tokio::sync::watch;

use drawx_core::{DrawSettings, SwatchColor};
use drawx_render::{
    FrameSink, FrameStats, LoopOptions, LoopState, RenderError, RenderLoop, RenderLoopHandle, RenderStats,
};
use drawx_store::{connect_with_retry, StoreError, StoreSlot, StrokeStore};

use crate::config::AppConfig;
use crate::input::{InputCapture, PointerEvent, StrokeAction};
use crate::writer::{StrokeWriter, WriteOutcome};

pub struct DrawSession {
    config: AppConfig,
    settings: DrawSettings,
    settings_path: PathBuf,
    selected: SwatchColor,
    slot: StoreSlot,
    writer: StrokeWriter,
    input: InputCapture,
    render: Option<RenderLoopHandle>,
}

impl DrawSession {
    /// Build a session. Nothing is opened yet; call [`DrawSession::connect`]
    /// or [`DrawSession::spawn_connect`] to resolve the store.
    pub fn new(config: AppConfig) -> Self {
        let settings_path = config.settings_path();
        let settings = DrawSettings::load(&settings_path).unwrap_or_else(|e| {
            log::warn!("Could not read {}: {e}", settings_path.display());
            DrawSettings::default()
        });
        let selected = settings.last_swatch();
        let slot = StoreSlot::new();
        log::info!("Session created, pencil {selected}");

        Self {
            writer: StrokeWriter::new(slot.clone()),
            input: InputCapture::with_edge(config.render.edge_width),
            config,
            settings,
            settings_path,
            selected,
            slot,
            render: None,
        }
    }

    /// Open the store and publish it. On failure the session stays waiting:
    /// input is dropped and the render loop keeps showing the background.
    pub async fn connect(&self) -> Result<StrokeStore, StoreError> {
        resolve_store(self.config.clone(), self.slot.clone()).await
    }

    /// Run [`DrawSession::connect`] in the background on `runtime`.
    pub fn spawn_connect(&self, runtime: &tokio::runtime::Handle) -> tokio::task::JoinHandle<()> {
        let config = self.config.clone();
        let slot = self.slot.clone();
        runtime.spawn(async move {
            // Already logged.
            let _ = resolve_store(config, slot).await;
        })
    }

    /// A drawing surface appeared. Any loop left from an earlier surface is
    /// stopped first.
    pub fn surface_created<S>(&mut self, width: u32, height: u32, sink: S) -> Result<(), RenderError>
    where
        S: FrameSink + Send + 'static,
    {
        self.stop_render();
        self.input.set_surface(width, height);
        let options = LoopOptions {
            config: self.config.render.clone(),
            size: Some((width, height)),
            selected: self.selected.rgba(),
        };
        self.render = Some(RenderLoop::spawn(sink, self.slot.watch(), options)?);
        log::info!("Surface created {width}x{height}");
        Ok(())
    }

    pub fn surface_resized(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.input.set_surface(width, height);
        match &self.render {
            Some(render) => render.resize(width, height),
            None => Ok(()),
        }
    }

    /// The surface went away: end any gesture and stop the loop.
    pub fn surface_destroyed(&mut self) -> Option<RenderStats> {
        self.input.clear_surface();
        if self.writer.current().is_some() {
            if let Err(e) = self.writer.abort_stroke() {
                log::warn!("Could not close stroke on surface loss: {e}");
            }
        }
        self.stop_render()
    }

    fn stop_render(&mut self) -> Option<RenderStats> {
        let render = self.render.take()?;
        match render.shutdown() {
            Ok(stats) => {
                log::info!(
                    "Render loop stopped: {} frames, {} skipped",
                    stats.frames_presented,
                    stats.frames_skipped
                );
                Some(stats)
            }
            Err(e) => {
                log::error!("Render loop stop failed: {e}");
                None
            }
        }
    }

    /// Route one pointer event to the writer. `Ok(None)` when the event
    /// mapped to nothing.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> Result<Option<WriteOutcome>, StoreError> {
        let Some(action) = self.input.map(event) else {
            return Ok(None);
        };
        let outcome = match action {
            StrokeAction::Begin(p) => self.writer.begin_stroke(p, self.selected.name())?,
            StrokeAction::Extend(p) => self.writer.extend_stroke(p)?,
            StrokeAction::Finish(p) => self.writer.finish_stroke(p)?,
            StrokeAction::Abort => self.writer.abort_stroke()?,
        };
        Ok(Some(outcome))
    }

    /// Pick a pencil. Only a change is persisted.
    pub fn select_color(&mut self, color: SwatchColor) {
        if color == self.selected {
            return;
        }
        self.selected = color;
        self.settings.last_color = color.name().to_string();
        if let Err(e) = self.settings.save(&self.settings_path) {
            log::warn!("Could not save settings: {e}");
        }
        if let Some(render) = &self.render {
            if let Err(e) = render.select_color(color.rgba()) {
                log::debug!("Color change not delivered: {e}");
            }
        }
        log::debug!("Selected {color}");
    }

    /// Remove every stroke in one transaction.
    pub fn clear_canvas(&self) -> Result<WriteOutcome, StoreError> {
        let Some(store) = self.slot.get() else {
            log::debug!("Dropping clear: store not ready");
            return Ok(WriteOutcome::Dropped);
        };
        let info = store.delete_all()?;
        log::info!("Canvas cleared at version {}", info.version);
        Ok(WriteOutcome::Committed {
            version: info.version,
        })
    }

    pub fn selected(&self) -> SwatchColor {
        self.selected
    }

    pub fn settings(&self) -> &DrawSettings {
        &self.settings
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn slot(&self) -> &StoreSlot {
        &self.slot
    }

    pub fn store(&self) -> Option<StrokeStore> {
        self.slot.get()
    }

    pub fn input(&self) -> &InputCapture {
        &self.input
    }

    pub fn render_state(&self) -> Option<LoopState> {
        self.render.as_ref().map(|r| r.state())
    }

    pub fn render_stats(&self) -> Option<RenderStats> {
        self.render.as_ref().map(|r| r.stats())
    }

    /// Per-frame stats of the running loop.
    pub fn frames(&self) -> Option<watch::Receiver<FrameStats>> {
        self.render.as_ref().map(|r| r.subscribe_frames())
    }

    /// Stop rendering, close any open stroke and flush the store.
    pub fn shutdown(mut self) -> Result<Option<RenderStats>, StoreError> {
        let stats = self.surface_destroyed();
        if let Some(store) = self.slot.clear() {
            store.flush()?;
            log::info!("Session closed at version {}", store.version());
        }
        Ok(stats)
    }
}

async fn resolve_store(config: AppConfig, slot: StoreSlot) -> Result<StrokeStore, StoreError> {
    match connect_with_retry(config.store, &config.retry).await {
        Ok(store) => {
            slot.publish(store.clone());
            Ok(store)
        }
        Err(e) => {
            log::error!("Store unavailable, input will be dropped: {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drawx_core::Point;
    use drawx_render::RecordingSink;

    fn session_in(dir: &tempfile::TempDir) -> DrawSession {
        let mut config = AppConfig::for_testing();
        config.settings_path = Some(dir.path().join("settings.json"));
        DrawSession::new(config)
    }

    #[test]
    fn test_initial_color_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = DrawSettings {
            last_color: "Mulberry".into(),
            ..DrawSettings::default()
        };
        settings.save(&path).unwrap();

        let session = session_in(&dir);
        assert_eq!(session.selected(), SwatchColor::Mulberry);
    }

    #[test]
    fn test_select_color_persists_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        assert_eq!(session.selected(), SwatchColor::Indigo);

        session.select_color(SwatchColor::Indigo);
        assert!(!dir.path().join("settings.json").exists());

        session.select_color(SwatchColor::Peach);
        let saved = DrawSettings::load(&dir.path().join("settings.json")).unwrap();
        assert_eq!(saved.last_color, "Peach");
    }

    #[tokio::test]
    async fn test_pointer_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.connect().await.unwrap();
        session.surface_created(683, 683, RecordingSink::new(683, 683)).unwrap();

        session.handle_pointer(&PointerEvent::down(1, 10.0, 10.0)).unwrap();
        session.handle_pointer(&PointerEvent::moved(1, 20.0, 20.0)).unwrap();
        let out = session.handle_pointer(&PointerEvent::up(1, 30.0, 10.0)).unwrap();
        assert_eq!(out, Some(WriteOutcome::Committed { version: 3 }));

        let snapshot = session.store().unwrap().query_all();
        let stroke = snapshot.iter().next().unwrap();
        assert_eq!(stroke.color, "Indigo");
        assert!(stroke.completed);
        assert_eq!(stroke.points[2], Point::new(30.0, 10.0));

        assert!(session.surface_destroyed().is_some());
        assert_eq!(session.render_state(), None);
    }

    #[tokio::test]
    async fn test_clear_before_store_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);
        assert_eq!(session.clear_canvas().unwrap(), WriteOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_surface_loss_closes_open_stroke() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        let store = session.connect().await.unwrap();
        session.surface_created(100, 100, RecordingSink::new(100, 100)).unwrap();
        session.handle_pointer(&PointerEvent::down(1, 5.0, 5.0)).unwrap();

        session.surface_destroyed();
        assert_eq!(store.query_all().in_progress().count(), 0);
        assert_eq!(store.query_all().len(), 1);
    }
}
