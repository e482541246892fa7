//! Peer-to-peer link between the two battle participants.
//!
//! [`NetworkManager`] owns a single-worker tokio runtime that serves as the
//! network thread. Connection setup (`host`, `join`) blocks the caller with a
//! timeout. Once a session starts, a receive task applies incoming commands
//! to the battle's `Away` layer and a writer task drains outbound messages.

use crate::components::Layer;
use crate::config::Settings;
use crate::error::NetError;
use crate::simulation::BattleSimulation;
use crate::wire_format::{PeerMessage, decode_payload, read_frame, write_frame};
use rapier2d::prelude::Point;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

struct Session {
    peer: SocketAddr,
    outbound: Option<mpsc::UnboundedSender<PeerMessage>>,
    shutdown: Arc<Notify>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

pub struct NetworkManager {
    runtime: Runtime,
    settings: Settings,
    is_host: bool,
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
    cancel: Arc<Notify>,
    session: Option<Session>,
}

impl NetworkManager {
    pub fn new(settings: &Settings) -> Result<Self, NetError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("peer-network")
            .enable_all()
            .build()
            .map_err(NetError::Runtime)?;

        Ok(Self {
            runtime,
            settings: settings.clone(),
            is_host: false,
            listener: None,
            stream: None,
            cancel: Arc::new(Notify::new()),
            session: None,
        })
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// Whether a session is running and the peer has not gone away.
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.connected.load(Ordering::Acquire))
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(|session| session.peer)
    }

    /// Listens on the configured port on every interface.
    pub fn listen(&mut self) -> Result<SocketAddr, NetError> {
        self.listen_on(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            self.settings.port,
        ))
    }

    pub fn listen_on(&mut self, addr: SocketAddr) -> Result<SocketAddr, NetError> {
        let listener = self
            .runtime
            .block_on(TcpListener::bind(addr))
            .map_err(NetError::Bind)?;
        let local = listener.local_addr().map_err(NetError::Bind)?;
        info!(%local, "waiting for peer");
        self.listener = Some(listener);
        self.is_host = true;
        Ok(local)
    }

    /// Waits for one peer on the listener opened by [`listen`](Self::listen).
    pub fn accept(&mut self) -> Result<SocketAddr, NetError> {
        let listener = self.listener.take().ok_or(NetError::NotConnected)?;
        let cancel = self.cancel.clone();
        let wait = self.settings.accept_timeout;

        let (stream, peer) = self.runtime.block_on(async move {
            tokio::select! {
                result = timeout(wait, listener.accept()) => match result {
                    Ok(Ok(accepted)) => Ok(accepted),
                    Ok(Err(e)) => Err(NetError::Accept(e)),
                    Err(_) => Err(NetError::Timeout),
                },
                _ = cancel.notified() => Err(NetError::Cancelled),
            }
        })?;

        info!(%peer, "peer connected");
        self.install_stream(stream);
        Ok(peer)
    }

    /// Listens on the configured port and waits for a peer.
    pub fn host(&mut self) -> Result<SocketAddr, NetError> {
        self.listen()?;
        self.accept()
    }

    /// Connects to a hosting peer on the configured port.
    pub fn join(&mut self, ip: IpAddr) -> Result<SocketAddr, NetError> {
        self.join_addr(SocketAddr::new(ip, self.settings.port))
    }

    pub fn join_addr(&mut self, addr: SocketAddr) -> Result<SocketAddr, NetError> {
        let cancel = self.cancel.clone();
        let wait = self.settings.connect_timeout;

        let stream = self.runtime.block_on(async move {
            tokio::select! {
                result = timeout(wait, TcpStream::connect(addr)) => match result {
                    Ok(Ok(stream)) => Ok(stream),
                    Ok(Err(e)) => Err(NetError::Connect(e)),
                    Err(_) => Err(NetError::Timeout),
                },
                _ = cancel.notified() => Err(NetError::Cancelled),
            }
        })?;

        info!(%addr, "connected to host");
        self.is_host = false;
        self.install_stream(stream);
        Ok(addr)
    }

    fn install_stream(&mut self, stream: TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable nagle");
        }
        self.stream = Some(stream);
    }

    /// Starts the receive and send tasks for the connected stream.
    ///
    /// Incoming commands are applied to `battle`.
    pub fn start_session(&mut self, battle: BattleSimulation) -> Result<(), NetError> {
        let stream = self.stream.take().ok_or(NetError::NotConnected)?;
        let peer = stream
            .peer_addr()
            .map_err(|_| NetError::NotConnected)?;
        let (read_half, write_half) = stream.into_split();

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());
        let peer_gone = Arc::new(Notify::new());
        let connected = Arc::new(AtomicBool::new(true));

        let reader = self.runtime.spawn(receive_loop(
            read_half,
            battle,
            shutdown.clone(),
            peer_gone.clone(),
            connected.clone(),
        ));
        let writer = self
            .runtime
            .spawn(send_loop(write_half, outbound_rx, peer_gone));

        self.session = Some(Session {
            peer,
            outbound: Some(outbound),
            shutdown,
            connected,
            reader,
            writer,
        });
        Ok(())
    }

    /// Queues a message for the peer.
    pub fn send(&self, message: PeerMessage) -> Result<(), NetError> {
        let outbound = self
            .session
            .as_ref()
            .and_then(|session| session.outbound.as_ref())
            .ok_or(NetError::NotConnected)?;
        outbound.send(message).map_err(|_| NetError::NotConnected)
    }

    /// Handle that aborts an accept or connect running on another thread.
    pub fn cancel_handle(&self) -> ConnectCancel {
        ConnectCancel {
            notify: self.cancel.clone(),
        }
    }

    /// Cancels any pending accept or connect and closes the peer link.
    ///
    /// A live peer is sent DISCONNECT first. Call [`wait`](Self::wait)
    /// afterwards to join the network tasks.
    pub fn close_all_connections(&mut self) {
        self.cancel_handle().cancel();
        self.listener = None;
        self.stream = None;

        if let Some(session) = self.session.as_mut()
            && let Some(outbound) = session.outbound.take()
        {
            if session.connected.load(Ordering::Acquire) {
                let _ = outbound.send(PeerMessage::Disconnect);
            }
            session.shutdown.notify_one();
            info!(peer = %session.peer, "closing peer link");
        }
    }

    /// Joins the network tasks of the current session.
    ///
    /// Blocks until the peer goes away unless
    /// [`close_all_connections`](Self::close_all_connections) was called first.
    pub fn wait(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.runtime.block_on(async move {
            if let Err(e) = session.reader.await {
                warn!(error = %e, "receive task failed");
            }
            if let Err(e) = session.writer.await {
                warn!(error = %e, "send task failed");
            }
        });
    }
}

/// Aborts the connection attempt of a [`NetworkManager`].
///
/// A cancel issued while no attempt is running applies to the next one.
#[derive(Clone)]
pub struct ConnectCancel {
    notify: Arc<Notify>,
}

impl ConnectCancel {
    pub fn cancel(&self) {
        self.notify.notify_one();
    }
}

impl Drop for NetworkManager {
    fn drop(&mut self) {
        self.close_all_connections();
        self.wait();
    }
}

/// Applies one received command to the battle. Returns false once the peer
/// has asked to disconnect.
pub fn apply_peer_message(battle: &BattleSimulation, message: PeerMessage) -> bool {
    match message {
        PeerMessage::Connect {
            position,
            angle,
            turrets,
        } => {
            battle.create_ship(
                Layer::Away,
                Point::new(position[0], position[1]),
                angle,
                &turrets,
            );
        }
        PeerMessage::Move { ship, destination } => {
            battle.issue_move_command(
                Layer::Away,
                ship as usize,
                Point::new(destination[0], destination[1]),
            );
        }
        PeerMessage::Fire { ship, target } => {
            battle.issue_fire_command(
                Layer::Away,
                ship as usize,
                Point::new(target[0], target[1]),
                Layer::Away.opposing(),
            );
        }
        PeerMessage::Disconnect => {
            info!("peer sent disconnect");
            return false;
        }
    }
    true
}

async fn receive_loop(
    mut read_half: OwnedReadHalf,
    battle: BattleSimulation,
    shutdown: Arc<Notify>,
    peer_gone: Arc<Notify>,
    connected: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            frame = read_frame(&mut read_half) => match frame {
                Ok(Some(payload)) => match decode_payload(&payload) {
                    Ok(message) => {
                        debug!(kind = ?message.kind(), "peer message");
                        if !apply_peer_message(&battle, message) {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, len = payload.len(), "dropping malformed peer message"),
                },
                Ok(None) => {
                    info!("peer closed the connection");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "peer read failed");
                    break;
                }
            },
        }
    }

    connected.store(false, Ordering::Release);
    peer_gone.notify_one();
}

async fn send_loop(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<PeerMessage>,
    peer_gone: Arc<Notify>,
) {
    loop {
        // Drain queued messages before honouring the peer going away, so a
        // final DISCONNECT still reaches the socket.
        tokio::select! {
            biased;
            message = outbound.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = write_frame(&mut write_half, &message).await {
                    warn!(error = %e, "peer write failed");
                    break;
                }
            }
            _ = peer_gone.notified() => break,
        }
    }

    if let Err(e) = write_half.shutdown().await {
        debug!(error = %e, "peer socket already closed");
    }
}
