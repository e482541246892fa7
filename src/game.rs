//! Game states and the main loop.
//!
//! The [`GameManager`] owns exactly one [`GameState`] at a time. States never
//! replace themselves: they return a [`NextState`] and the manager tears the
//! old state down completely before building the new one.

use crate::build::ShipBuild;
use crate::components::{Layer, ProjectileKind};
use crate::config::{MAX_TICKS_PER_FRAME, Settings};
use crate::error::{InputError, NetError};
use crate::hull::{DamageMask, HullSprite};
use crate::network::{ConnectCancel, NetworkManager};
use crate::render::{Frame, RenderSlot, RenderThread, Renderer, SceneSource};
use crate::simulation::BattleSimulation;
use crate::tuning::{
    FIELD_HEIGHT, FIELD_WIDTH, HOST_SPAWN, JOINER_SPAWN, KEY_SIZE_FACTOR, LOCAL_SPAWN_OFFSET,
    SpawnPoint,
};
use crate::wire_format::PeerMessage;
use rapier2d::prelude::Point;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Headless stand-in for mouse and keyboard input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Move(Point<f32>),
    Fire(Point<f32>),
    PlaceTurret {
        kind: ProjectileKind,
        position: Point<f32>,
    },
    ClearArea(Point<f32>),
    DebugBuild(ProjectileKind),
    Local,
    Host,
    Join(IpAddr),
    Back,
    Quit,
}

impl InputEvent {
    /// Parses one command line such as `move 100 250` or `join 10.0.0.2`.
    pub fn parse(line: &str) -> Result<Self, InputError> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(InputError::Empty)?.to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let bad = |usage| InputError::BadArguments {
            command: command.clone(),
            usage,
        };
        let point = |args: &[&str], usage| -> Result<Point<f32>, InputError> {
            match args {
                [x, y] => match (x.parse(), y.parse()) {
                    (Ok(x), Ok(y)) => Ok(Point::new(x, y)),
                    _ => Err(bad(usage)),
                },
                _ => Err(bad(usage)),
            }
        };
        let kind = |word: &str| match word.to_ascii_lowercase().as_str() {
            "laser" => Some(ProjectileKind::Laser),
            "missile" => Some(ProjectileKind::Missile),
            "plasma" => Some(ProjectileKind::Plasma),
            _ => None,
        };

        let event = match command.as_str() {
            "move" => InputEvent::Move(point(&args[..], "move <x> <y>")?),
            "fire" => InputEvent::Fire(point(&args[..], "fire <x> <y>")?),
            "turret" => {
                const USAGE: &str = "turret <laser|missile|plasma> <x> <y>";
                let (first, rest) = args.split_first().ok_or_else(|| bad(USAGE))?;
                InputEvent::PlaceTurret {
                    kind: kind(*first).ok_or_else(|| bad(USAGE))?,
                    position: point(rest, USAGE)?,
                }
            }
            "clear" => InputEvent::ClearArea(point(&args[..], "clear <x> <y>")?),
            "debug" => match args.as_slice() {
                [] => InputEvent::DebugBuild(ProjectileKind::Laser),
                [word] => InputEvent::DebugBuild(
                    kind(*word).ok_or_else(|| bad("debug [laser|missile|plasma]"))?,
                ),
                _ => return Err(bad("debug [laser|missile|plasma]")),
            },
            "local" => InputEvent::Local,
            "host" => InputEvent::Host,
            "join" => match args.as_slice() {
                [ip] => InputEvent::Join(ip.parse().map_err(|_| bad("join <ip>"))?),
                _ => return Err(bad("join <ip>")),
            },
            "back" => InputEvent::Back,
            "quit" | "exit" => InputEvent::Quit,
            _ => return Err(InputError::UnknownCommand(command.clone())),
        };
        Ok(event)
    }
}

/// Data that outlives individual states.
pub struct GameContext {
    pub settings: Settings,
    pub hull: Arc<HullSprite>,
    pub build: ShipBuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    Host,
    Join(IpAddr),
}

/// The state a [`GameState`] asks the manager to switch to.
pub enum NextState {
    Build,
    Connect(ConnectMode),
    LocalBattle,
    NetworkBattle(NetworkManager),
}

pub enum GameState {
    Build(BuildState),
    Connect(ConnectState),
    Battle(BattleState),
}

impl GameState {
    pub fn name(&self) -> &'static str {
        match self {
            GameState::Build(_) => "build",
            GameState::Connect(_) => "connect",
            GameState::Battle(_) => "battle",
        }
    }

    pub fn handle_input(&mut self, event: &InputEvent, context: &mut GameContext) -> Option<NextState> {
        match self {
            GameState::Build(state) => state.handle_input(event, context),
            GameState::Connect(state) => state.handle_input(event, context),
            GameState::Battle(state) => state.handle_input(event),
        }
    }

    pub fn update(&mut self, dt: f32) -> Option<NextState> {
        match self {
            GameState::Build(_) => None,
            GameState::Connect(state) => state.update(),
            GameState::Battle(state) => state.update(dt),
        }
    }

    pub fn render_frame(&self) -> Frame {
        match self {
            GameState::Build(state) => Frame::Build {
                turrets: state.build.len(),
            },
            GameState::Connect(state) => Frame::Connect {
                status: state.status.clone(),
            },
            GameState::Battle(state) => Frame::Battle(state.battle.snapshot()),
        }
    }

    /// What the render thread should draw while this state is current.
    pub fn scene(&self) -> SceneSource {
        match self {
            GameState::Battle(state) => SceneSource::Battle(state.battle.clone()),
            _ => SceneSource::Static(self.render_frame()),
        }
    }
}

/// Turret placement on the player's hull.
pub struct BuildState {
    build: ShipBuild,
    mask: DamageMask,
}

impl BuildState {
    pub fn new(context: &GameContext) -> Self {
        Self {
            build: context.build.clone(),
            mask: DamageMask::from_hull(&context.hull, KEY_SIZE_FACTOR),
        }
    }

    pub fn build(&self) -> &ShipBuild {
        &self.build
    }

    fn handle_input(&mut self, event: &InputEvent, context: &mut GameContext) -> Option<NextState> {
        match event {
            InputEvent::PlaceTurret { kind, position } => {
                if !self.build.add_turret(&self.mask, *kind, *position) {
                    info!(x = position.x, y = position.y, "turret placement blocked");
                }
                None
            }
            InputEvent::ClearArea(position) => {
                let removed = self.build.clear_area(*position);
                debug!(removed, "cleared build area");
                None
            }
            InputEvent::DebugBuild(kind) => {
                self.build = ShipBuild::debug_full(&context.hull, *kind);
                info!(turrets = self.build.len(), "debug build");
                None
            }
            InputEvent::Local => {
                context.build = self.build.clone();
                Some(NextState::LocalBattle)
            }
            InputEvent::Host => {
                context.build = self.build.clone();
                Some(NextState::Connect(ConnectMode::Host))
            }
            InputEvent::Join(ip) => {
                context.build = self.build.clone();
                Some(NextState::Connect(ConnectMode::Join(*ip)))
            }
            _ => None,
        }
    }
}

type Attempt = thread::JoinHandle<(NetworkManager, Result<SocketAddr, NetError>)>;

/// Waits for a host or join attempt on a background thread.
pub struct ConnectState {
    status: String,
    manager: Option<NetworkManager>,
    attempt: Option<(Attempt, ConnectCancel)>,
}

impl ConnectState {
    pub fn new(context: &GameContext, mode: ConnectMode) -> Self {
        let mut state = Self {
            status: String::new(),
            manager: None,
            attempt: None,
        };
        match NetworkManager::new(&context.settings) {
            Ok(manager) => {
                state.manager = Some(manager);
                state.start(mode);
            }
            Err(e) => {
                warn!(error = %e, "network unavailable");
                state.status = format!("network unavailable: {e}");
            }
        }
        state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn start(&mut self, mode: ConnectMode) {
        let Some(mut manager) = self.manager.take() else {
            return;
        };
        let cancel = manager.cancel_handle();
        self.status = match mode {
            ConnectMode::Host => "waiting for a peer to join".to_string(),
            ConnectMode::Join(ip) => format!("joining {ip}"),
        };

        let spawned = thread::Builder::new()
            .name("connect".into())
            .spawn(move || {
                let result = match mode {
                    ConnectMode::Host => manager.host(),
                    ConnectMode::Join(ip) => manager.join(ip),
                };
                (manager, result)
            });
        match spawned {
            Ok(handle) => self.attempt = Some((handle, cancel)),
            Err(e) => {
                warn!(error = %e, "could not start connection thread");
                self.status = format!("could not start connection: {e}");
            }
        }
    }

    fn handle_input(&mut self, event: &InputEvent, _context: &mut GameContext) -> Option<NextState> {
        match event {
            InputEvent::Back => Some(NextState::Build),
            InputEvent::Host if self.attempt.is_none() => {
                self.start(ConnectMode::Host);
                None
            }
            InputEvent::Join(ip) if self.attempt.is_none() => {
                self.start(ConnectMode::Join(*ip));
                None
            }
            _ => None,
        }
    }

    fn update(&mut self) -> Option<NextState> {
        if !self
            .attempt
            .as_ref()
            .is_some_and(|(handle, _)| handle.is_finished())
        {
            return None;
        }
        let (handle, _) = self.attempt.take()?;
        match handle.join() {
            Ok((manager, Ok(peer))) => {
                info!(%peer, host = manager.is_host(), "peer found");
                Some(NextState::NetworkBattle(manager))
            }
            Ok((manager, Err(e))) => {
                warn!(error = %e, "connection failed");
                self.status = format!("connection failed: {e}");
                self.manager = Some(manager);
                None
            }
            Err(_) => {
                warn!("connection thread panicked");
                self.status = "connection failed".to_string();
                None
            }
        }
    }
}

impl Drop for ConnectState {
    fn drop(&mut self) {
        if let Some((handle, cancel)) = self.attempt.take() {
            cancel.cancel();
            if handle.join().is_err() {
                warn!("connection thread panicked");
            }
        }
    }
}

/// A running battle, local or against a peer.
pub struct BattleState {
    battle: BattleSimulation,
    network: Option<NetworkManager>,
    peer_lost: bool,
}

impl BattleState {
    /// Two mirrored ships built from the same turret list.
    pub fn local(context: &GameContext) -> Self {
        let battle = BattleSimulation::new(context.hull.clone());
        let centre = Point::new(FIELD_WIDTH / 2.0, FIELD_HEIGHT / 2.0);
        let offset = rapier2d::prelude::Vector::new(LOCAL_SPAWN_OFFSET[0], LOCAL_SPAWN_OFFSET[1]);
        let turrets = context.build.turrets();

        battle.create_ship(Layer::Home, centre - offset, HOST_SPAWN.angle(), turrets);
        battle.create_ship(Layer::Away, centre + offset, JOINER_SPAWN.angle(), turrets);
        info!("local battle started");

        Self {
            battle,
            network: None,
            peer_lost: false,
        }
    }

    /// Creates only the local ship; the peer's arrives with its CONNECT.
    pub fn networked(context: &GameContext, mut network: NetworkManager) -> Result<Self, NetError> {
        let battle = BattleSimulation::new(context.hull.clone());
        let spawn: SpawnPoint = if network.is_host() {
            HOST_SPAWN
        } else {
            JOINER_SPAWN
        };
        let turrets = context.build.turrets();
        let position = Point::new(spawn.position[0], spawn.position[1]);
        battle.create_ship(Layer::Home, position, spawn.angle(), turrets);

        network.start_session(battle.clone())?;
        network.send(PeerMessage::Connect {
            position: spawn.position,
            angle: spawn.angle(),
            turrets: turrets.to_vec(),
        })?;
        info!(host = network.is_host(), peer = ?network.peer_addr(), "network battle started");

        Ok(Self {
            battle,
            network: Some(network),
            peer_lost: false,
        })
    }

    pub fn battle(&self) -> &BattleSimulation {
        &self.battle
    }

    /// Moves the local ship and mirrors the order to the peer.
    pub fn command_move(&self, destination: Point<f32>) {
        self.battle.issue_move_command(Layer::Home, 0, destination);
        self.mirror(PeerMessage::Move {
            ship: 0,
            destination: [destination.x, destination.y],
        });
    }

    /// Fires the local ship at the opposing layer and mirrors the order.
    pub fn command_fire(&self, target: Point<f32>) {
        self.battle
            .issue_fire_command(Layer::Home, 0, target, Layer::Home.opposing());
        self.mirror(PeerMessage::Fire {
            ship: 0,
            target: [target.x, target.y],
        });
    }

    fn mirror(&self, message: PeerMessage) {
        if let Some(network) = &self.network
            && let Err(e) = network.send(message)
        {
            debug!(error = %e, "command not mirrored");
        }
    }

    fn handle_input(&mut self, event: &InputEvent) -> Option<NextState> {
        match event {
            InputEvent::Move(destination) => self.command_move(*destination),
            InputEvent::Fire(target) => self.command_fire(*target),
            InputEvent::Back => return Some(NextState::Build),
            _ => {}
        }
        None
    }

    fn update(&mut self, dt: f32) -> Option<NextState> {
        let report = self.battle.advance_tick(dt);

        if !self.peer_lost
            && let Some(network) = &self.network
            && !network.is_connected()
        {
            self.peer_lost = true;
            info!("peer left the battle");
        }

        // Leaving is decided only after the whole tick has run.
        report.finished.then_some(NextState::Build)
    }
}

impl Drop for BattleState {
    fn drop(&mut self) {
        if let Some(mut network) = self.network.take() {
            network.close_all_connections();
            network.wait();
        }
    }
}

/// Fixed-timestep accumulator.
#[derive(Debug, Clone)]
pub struct FixedStep {
    interval: Duration,
    accumulator: Duration,
    last: Instant,
}

impl FixedStep {
    /// The first call to [`advance`](Self::advance) always yields a tick.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            accumulator: interval,
            last: now,
        }
    }

    pub fn dt(&self) -> f32 {
        self.interval.as_secs_f32()
    }

    /// Number of ticks owed at `now`. A long stall is capped at
    /// [`MAX_TICKS_PER_FRAME`] and the remainder dropped.
    pub fn advance(&mut self, now: Instant) -> u32 {
        self.accumulator += now.saturating_duration_since(self.last);
        self.last = now;

        let mut ticks = 0;
        while self.accumulator >= self.interval {
            if ticks == MAX_TICKS_PER_FRAME {
                warn!(dropped = ?self.accumulator, "tick loop falling behind");
                self.accumulator = Duration::ZERO;
                break;
            }
            self.accumulator -= self.interval;
            ticks += 1;
        }
        ticks
    }
}

pub struct GameManager {
    context: GameContext,
    state: Option<GameState>,
    slot: RenderSlot,
    inputs: Receiver<InputEvent>,
}

impl GameManager {
    pub fn new(context: GameContext, inputs: Receiver<InputEvent>) -> Self {
        let state = GameState::Build(BuildState::new(&context));
        let slot = RenderSlot::new();
        slot.set(state.scene());
        Self {
            context,
            state: Some(state),
            slot,
            inputs,
        }
    }

    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn context(&self) -> &GameContext {
        &self.context
    }

    pub fn render_slot(&self) -> RenderSlot {
        self.slot.clone()
    }

    /// Replaces the current state. The old state is dropped, with its
    /// connections closed and tasks joined, before the new one is built.
    pub fn set_state(&mut self, next: NextState) {
        self.slot.clear();
        if let Some(old) = self.state.take() {
            debug!(from = old.name(), "leaving state");
            drop(old);
        }

        let state = match next {
            NextState::Build => GameState::Build(BuildState::new(&self.context)),
            NextState::Connect(mode) => GameState::Connect(ConnectState::new(&self.context, mode)),
            NextState::LocalBattle => GameState::Battle(BattleState::local(&self.context)),
            NextState::NetworkBattle(network) => {
                match BattleState::networked(&self.context, network) {
                    Ok(battle) => GameState::Battle(battle),
                    Err(e) => {
                        warn!(error = %e, "could not start network battle");
                        GameState::Build(BuildState::new(&self.context))
                    }
                }
            }
        };
        info!(state = state.name(), "entered state");
        self.slot.set(state.scene());
        self.state = Some(state);
    }

    /// Applies one input event. Returns false when the game should exit.
    pub fn handle_input(&mut self, event: &InputEvent) -> bool {
        if *event == InputEvent::Quit {
            return false;
        }
        let next = self
            .state
            .as_mut()
            .and_then(|state| state.handle_input(event, &mut self.context));
        match next {
            Some(next) => self.set_state(next),
            None => {
                if let Some(state) = &self.state
                    && !matches!(state, GameState::Battle(_))
                {
                    self.slot.set(state.scene());
                }
            }
        }
        true
    }

    /// Runs `ticks` fixed updates, stopping early on a state change.
    pub fn update(&mut self, ticks: u32, dt: f32) {
        for _ in 0..ticks {
            let next = self.state.as_mut().and_then(|state| state.update(dt));
            if let Some(next) = next {
                self.set_state(next);
                break;
            }
        }
    }

    /// Runs until `quit` or the input channel closes.
    pub fn run(&mut self, renderer: Box<dyn Renderer>) -> std::io::Result<()> {
        let mut render = RenderThread::spawn(self.slot.clone(), renderer)?;
        let mut step = FixedStep::new(self.context.settings.tick_interval(), Instant::now());

        'game: loop {
            loop {
                match self.inputs.try_recv() {
                    Ok(event) => {
                        if !self.handle_input(&event) {
                            break 'game;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("input closed");
                        break 'game;
                    }
                }
            }

            let ticks = step.advance(Instant::now());
            self.update(ticks, step.dt());
            thread::sleep(Duration::from_millis(1));
        }

        self.slot.clear();
        self.state = None;
        render.stop();
        info!("game stopped");
        Ok(())
    }
}
