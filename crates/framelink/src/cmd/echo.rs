use framelink_peer::{ConnectionManager, Establish, PeerError, Sleeper};
use tracing::info;

use crate::cmd::EchoArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let mut manager = args.link.manager(true)?;
    match echo_loop(&mut manager, args.count) {
        Ok(echoed) => info!(echoed, "echo finished"),
        Err(err) => {
            manager.shutdown();
            return Err(err);
        }
    }
    manager.shutdown();
    Ok(SUCCESS)
}

/// Send each payload back until shutdown or `limit` echoes.
fn echo_loop<E: Establish, S: Sleeper>(
    manager: &mut ConnectionManager<E, S>,
    limit: Option<u64>,
) -> Result<u64, CliError> {
    let mut echoed = 0u64;
    while limit.map_or(true, |limit| echoed < limit) {
        let payload = match manager.receive() {
            Ok(payload) => payload,
            Err(PeerError::Timeout) => continue,
            Err(PeerError::Shutdown) => break,
            Err(err) => return Err(peer_error("receive failed", err)),
        };

        info!(size = payload.len(), "echoing frame");
        match manager.send(&payload) {
            Ok(()) => echoed += 1,
            Err(PeerError::Shutdown) => break,
            Err(err) => return Err(peer_error("echo send failed", err)),
        }
    }
    Ok(echoed)
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use framelink_peer::{Acceptor, PeerConfig, ThreadSleeper};
    use framelink_transport::Endpoint;

    use super::*;

    #[test]
    fn echoes_until_limit() {
        let acceptor = Acceptor::bind("tcp://127.0.0.1:0".parse().unwrap()).unwrap();
        let dial = Endpoint::tcp(acceptor.local_addr().unwrap().to_string()).unwrap();
        let cfg = PeerConfig::acceptor(dial.clone()).with_retry_delay(Duration::from_millis(10));

        let server = thread::spawn(move || {
            let mut manager = ConnectionManager::with_parts(cfg, acceptor, ThreadSleeper);
            echo_loop(&mut manager, Some(2)).unwrap()
        });

        let mut client = ConnectionManager::new(PeerConfig::initiator(dial));
        for msg in [&b"one"[..], &b"two"[..]] {
            client.send(msg).unwrap();
            assert_eq!(client.receive().unwrap().as_ref(), msg);
        }
        assert_eq!(server.join().unwrap(), 2);
    }
}
