//! Render thread and the frames it draws.
//!
//! The tick thread never draws. It publishes a [`SceneSource`] into a shared
//! [`RenderSlot`]; the render thread turns that into a [`Frame`] (taking a
//! battle snapshot under the simulation's own locks) and hands it to a
//! [`Renderer`].

use crate::components::Layer;
use crate::config::{RENDER_FRAME_INTERVAL, RENDER_LOG_INTERVAL};
use crate::simulation::{BattleSimulation, BattleSnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One frame of whatever the current game state shows.
#[derive(Debug, Clone, Serialize)]
pub enum Frame {
    Build { turrets: usize },
    Connect { status: String },
    Battle(BattleSnapshot),
}

impl Frame {
    pub fn label(&self) -> &'static str {
        match self {
            Frame::Build { .. } => "build",
            Frame::Connect { .. } => "connect",
            Frame::Battle(_) => "battle",
        }
    }
}

/// What the render thread should draw from.
#[derive(Clone, Default)]
pub enum SceneSource {
    #[default]
    Empty,
    Static(Frame),
    Battle(BattleSimulation),
}

impl SceneSource {
    pub fn frame(&self) -> Option<Frame> {
        match self {
            SceneSource::Empty => None,
            SceneSource::Static(frame) => Some(frame.clone()),
            SceneSource::Battle(battle) => Some(Frame::Battle(battle.snapshot())),
        }
    }
}

#[derive(Clone, Default)]
pub struct RenderSlot {
    source: Arc<Mutex<SceneSource>>,
}

impl RenderSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, source: SceneSource) {
        *self.source.lock().unwrap_or_else(PoisonError::into_inner) = source;
    }

    pub fn clear(&self) {
        self.set(SceneSource::Empty);
    }

    /// Builds the current frame. The slot lock is released before any
    /// battle snapshot is taken.
    pub fn frame(&self) -> Option<Frame> {
        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        source.frame()
    }
}

pub trait Renderer: Send {
    fn render(&mut self, frame: &Frame);
}

/// Headless renderer: logs a one-line summary of the frame at a fixed interval.
pub struct LogRenderer {
    last_log: Option<Instant>,
    frames: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self {
            last_log: None,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &Frame) {
        self.frames += 1;
        if self
            .last_log
            .is_some_and(|last| last.elapsed() < RENDER_LOG_INTERVAL)
        {
            return;
        }
        self.last_log = Some(Instant::now());

        match frame {
            Frame::Build { turrets } => info!(turrets, "building ship"),
            Frame::Connect { status } => info!(%status, "connecting"),
            Frame::Battle(snapshot) => {
                let count = |layer| snapshot.ships.iter().filter(|s| s.layer == layer).count();
                info!(
                    tick = snapshot.tick,
                    home = count(Layer::Home),
                    away = count(Layer::Away),
                    projectiles = snapshot.projectiles.len(),
                    finished = snapshot.finished,
                    "battle"
                );
            }
        }
    }
}

/// Owns the render thread. Stopping (or dropping) joins it.
pub struct RenderThread {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RenderThread {
    pub fn spawn(slot: RenderSlot, mut renderer: Box<dyn Renderer>) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = thread::Builder::new()
            .name("render".into())
            .spawn(move || {
                debug!("render thread started");
                while flag.load(Ordering::Acquire) {
                    if let Some(frame) = slot.frame() {
                        renderer.render(&frame);
                    }
                    thread::sleep(RENDER_FRAME_INTERVAL);
                }
                debug!("render thread stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("render thread panicked");
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}
