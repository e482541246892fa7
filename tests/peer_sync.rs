use ship_battles::components::{Layer, ProjectileKind, TurretBuild};
use ship_battles::config::Settings;
use ship_battles::error::NetError;
use ship_battles::hull::HullSprite;
use ship_battles::network::NetworkManager;
use ship_battles::simulation::BattleSimulation;
use ship_battles::wire_format::PeerMessage;
use rapier2d::prelude::Point;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn settings() -> Settings {
    Settings {
        connect_timeout: Duration::from_secs(2),
        accept_timeout: Duration::from_secs(5),
        ..Settings::default()
    }
}

fn battle() -> BattleSimulation {
    BattleSimulation::new(Arc::new(HullSprite::solid(64, 64).unwrap()))
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    done()
}

/// Host and joiner connected over loopback, each with a running session.
fn connected_pair() -> (NetworkManager, BattleSimulation, NetworkManager, BattleSimulation) {
    let mut host = NetworkManager::new(&settings()).unwrap();
    let addr = host
        .listen_on(SocketAddr::from(([127, 0, 0, 1], 0)))
        .unwrap();
    let accepting = thread::spawn(move || {
        let peer = host.accept();
        (host, peer)
    });

    let mut joiner = NetworkManager::new(&settings()).unwrap();
    assert_eq!(joiner.join_addr(addr).unwrap(), addr);
    let (mut host, peer) = accepting.join().unwrap();
    peer.unwrap();
    assert!(host.is_host());
    assert!(!joiner.is_host());

    let host_battle = battle();
    let joiner_battle = battle();
    host.start_session(host_battle.clone()).unwrap();
    joiner.start_session(joiner_battle.clone()).unwrap();
    (host, host_battle, joiner, joiner_battle)
}

fn connect_message(position: [f32; 2]) -> PeerMessage {
    PeerMessage::Connect {
        position,
        angle: 0.0,
        turrets: vec![TurretBuild::new(ProjectileKind::Laser, Point::new(32.0, 32.0))],
    }
}

#[test]
fn remote_move_matches_a_local_move() {
    let (host, host_battle, joiner, joiner_battle) = connected_pair();

    joiner_battle.create_ship(Layer::Home, Point::new(2200.0, 2200.0), 0.0, &[]);
    joiner.send(connect_message([2200.0, 2200.0])).unwrap();
    assert!(wait_until(|| host_battle.ship_count(Layer::Away) == 1));

    let destination = Point::new(1500.0, 900.0);
    joiner_battle.issue_move_command(Layer::Home, 0, destination);
    joiner
        .send(PeerMessage::Move {
            ship: 0,
            destination: [destination.x, destination.y],
        })
        .unwrap();

    let local = joiner_battle
        .with_ship(Layer::Home, 0, |ship| (ship.destination(), ship.state()))
        .unwrap();
    assert!(wait_until(|| {
        host_battle.with_ship(Layer::Away, 0, |ship| (ship.destination(), ship.state()))
            == Some(local)
    }));
    // Remote commands never echo back.
    assert_eq!(joiner_battle.ship_count(Layer::Away), 0);
    drop(host);
}

#[test]
fn disconnect_ends_the_remote_session() {
    let (host, _host_battle, mut joiner, _joiner_battle) = connected_pair();
    assert!(host.is_connected());

    joiner.close_all_connections();
    joiner.wait();
    assert!(!joiner.is_connected());
    assert!(wait_until(|| !host.is_connected()));
    assert!(matches!(
        host.send(PeerMessage::Disconnect),
        Ok(()) | Err(NetError::NotConnected)
    ));
}

#[test]
fn joining_a_closed_port_fails() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let mut joiner = NetworkManager::new(&settings()).unwrap();
    let result = joiner.join_addr(closed);
    assert!(matches!(result, Err(NetError::Connect(_) | NetError::Timeout)));
    assert!(!joiner.is_connected());
}

#[test]
fn cancelled_accept_returns_promptly() {
    let mut host = NetworkManager::new(&settings()).unwrap();
    host.listen_on(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
    let cancel = host.cancel_handle();

    let started = Instant::now();
    let accepting = thread::spawn(move || host.accept());
    thread::sleep(Duration::from_millis(50));
    cancel.cancel();

    assert!(matches!(accepting.join().unwrap(), Err(NetError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
}
