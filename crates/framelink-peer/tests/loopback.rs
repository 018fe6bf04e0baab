//! End-to-end sessions over real loopback sockets.

use std::thread;
use std::time::Duration;

use framelink_peer::{
    Acceptor, ConnectionManager, ConnectionState, PeerConfig, PeerError, ResyncMode,
    ThreadSleeper,
};
use framelink_transport::{Endpoint, Protocol};

/// Bind an acceptor on an ephemeral port and return it with the address a
/// peer should dial.
fn bound_acceptor(protocol: Protocol) -> (Acceptor, Endpoint) {
    let acceptor = Acceptor::bind(Endpoint::new(protocol, "127.0.0.1:0").unwrap()).unwrap();
    let addr = acceptor.local_addr().unwrap();
    (acceptor, Endpoint::new(protocol, addr.to_string()).unwrap())
}

fn fast_retry(config: PeerConfig) -> PeerConfig {
    config
        .with_retry_delay(Duration::from_millis(20))
        .with_connect_timeout(Some(Duration::from_secs(2)))
}

#[test]
fn tcp_frames_survive_the_round_trip() {
    let (acceptor, dial) = bound_acceptor(Protocol::Tcp);
    let listen_cfg = fast_retry(PeerConfig::acceptor(dial.clone()));

    let server = thread::spawn(move || {
        let mut mgr = ConnectionManager::with_parts(listen_cfg, acceptor, ThreadSleeper);
        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(mgr.receive().unwrap().to_vec());
        }
        mgr.send(b"done").unwrap();
        got
    });

    let mut client = ConnectionManager::new(fast_retry(PeerConfig::initiator(dial)));
    client.send(b"This is my message! \n").unwrap();
    client.send(b"\x00\x00").unwrap();
    client.send(&[0x42; 600]).unwrap();
    assert_eq!(client.receive().unwrap().as_ref(), b"done");

    let got = server.join().unwrap();
    assert_eq!(got[0], b"This is my message! \n");
    assert_eq!(got[1], b"\x00\x00");
    assert_eq!(got[2], vec![0x42; 600]);
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[test]
fn tcp_acceptor_survives_client_restart() {
    let (acceptor, dial) = bound_acceptor(Protocol::Tcp);
    let listen_cfg = fast_retry(PeerConfig::acceptor(dial.clone()));

    let server = thread::spawn(move || {
        let mut mgr = ConnectionManager::with_parts(listen_cfg, acceptor, ThreadSleeper);
        let first = mgr.receive().unwrap();
        let second = mgr.receive().unwrap();
        (first, second, mgr.stats())
    });

    for msg in [&b"first life"[..], &b"second life"[..]] {
        let mut client = ConnectionManager::new(fast_retry(PeerConfig::initiator(dial.clone())));
        client.send(msg).unwrap();
        client.shutdown();
    }

    let (first, second, stats) = server.join().unwrap();
    assert_eq!(first.as_ref(), b"first life");
    assert_eq!(second.as_ref(), b"second life");
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.reconnects, 1);
}

#[test]
fn initiator_waits_for_late_acceptor() {
    // Reserve a port, then release it so the first attempts are refused.
    let (acceptor, dial) = bound_acceptor(Protocol::Tcp);
    drop(acceptor);

    let late = dial.clone();
    let server = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        let mut mgr = ConnectionManager::new(fast_retry(PeerConfig::acceptor(late)));
        mgr.receive().unwrap()
    });

    let mut client = ConnectionManager::new(fast_retry(PeerConfig::initiator(dial)));
    client.send(b"eventually").unwrap();
    assert!(client.stats().attempts > 1);

    assert_eq!(server.join().unwrap().as_ref(), b"eventually");
}

#[test]
fn lazy_acceptor_can_speak_first() {
    let (acceptor, dial) = bound_acceptor(Protocol::Tcp);
    let listen_cfg = fast_retry(PeerConfig::acceptor(dial.clone())).with_resync(ResyncMode::Lazy);

    // The initiator only ever reads, so the acceptor never sees a sync point
    // before its first send.
    let server = thread::spawn(move || {
        let mut mgr = ConnectionManager::with_parts(listen_cfg, acceptor, ThreadSleeper);
        mgr.send(b"hello from acceptor").unwrap();
        mgr.send(b"and again").unwrap();
        mgr.stats()
    });

    let mut client = ConnectionManager::new(fast_retry(PeerConfig::initiator(dial)));
    assert_eq!(client.receive().unwrap().as_ref(), b"hello from acceptor");
    assert_eq!(client.receive().unwrap().as_ref(), b"and again");

    let stats = server.join().unwrap();
    assert_eq!(stats.frames_sent, 2);
    assert_eq!(stats.sessions, 1);
}

#[test]
fn udp_datagrams_round_trip() {
    let (acceptor, dial) = bound_acceptor(Protocol::Udp);
    let listen_cfg = fast_retry(PeerConfig::acceptor(dial.clone()));

    let server = thread::spawn(move || {
        let mut mgr = ConnectionManager::with_parts(listen_cfg, acceptor, ThreadSleeper);
        let ping = mgr.receive().unwrap();
        mgr.send(&ping).unwrap();
    });

    let mut client = ConnectionManager::new(fast_retry(PeerConfig::initiator(dial)));
    client.send(b"ping\x00").unwrap();
    assert_eq!(client.receive().unwrap().as_ref(), b"ping\x00");
    server.join().unwrap();
}

#[test]
fn shutdown_from_another_thread_stops_receive() {
    let (acceptor, dial) = bound_acceptor(Protocol::Tcp);
    let listen_cfg = fast_retry(PeerConfig::acceptor(dial.clone()))
        .with_read_timeout(Some(Duration::from_millis(20)));

    let mut client = ConnectionManager::new(fast_retry(PeerConfig::initiator(dial)));
    client.send(b"hello").unwrap();

    let mut server = ConnectionManager::with_parts(listen_cfg, acceptor, ThreadSleeper);
    assert_eq!(server.receive().unwrap().as_ref(), b"hello");
    let signal = server.shutdown_signal();

    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        signal.trigger();
    });

    let err = loop {
        match server.receive() {
            Err(PeerError::Timeout) => continue,
            other => break other.unwrap_err(),
        }
    };
    assert!(matches!(err, PeerError::Shutdown));
    assert_eq!(server.state(), ConnectionState::ShuttingDown);
    stopper.join().unwrap();
}
