use std::fs;

use framelink_peer::{PeerConfig, PeerError, ResyncMode};
use framelink_transport::Protocol;
use tracing::info;

use crate::cmd::{launch, parse_duration, SendArgs, DEFAULT_MESSAGE};
use crate::exit::{io_error, peer_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_stats, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let interval = parse_duration(&args.interval)?;
    let mut manager = launch(sender_config(&args)?)?;
    let signal = manager.shutdown_signal();

    let mut sent = 0u64;
    loop {
        match manager.send(&payload) {
            Ok(()) => {
                sent += 1;
                info!(size = payload.len(), sent, "frame sent");
            }
            Err(PeerError::Shutdown) => break,
            Err(err) => return Err(peer_error("send failed", err)),
        }

        if args.count.is_some_and(|count| sent >= count) {
            break;
        }
        if signal.wait_timeout(interval) {
            break;
        }
    }

    let stats = manager.stats();
    manager.shutdown();
    print_stats(stats, &args.link.endpoint.to_string(), format);
    Ok(SUCCESS)
}

/// Peer config for a sender. A listening sender may face a peer that only
/// receives, so it must not wait for the peer's sync point before writing.
fn sender_config(args: &SendArgs) -> CliResult<PeerConfig> {
    let config = args.link.peer_config(args.listen)?;
    if !args.listen {
        return Ok(config);
    }
    if args.link.endpoint.protocol() == Protocol::Udp {
        return Err(CliError::new(
            USAGE,
            "send --listen needs a stream endpoint: a UDP acceptor has no peer address until it receives",
        ));
    }
    Ok(config.with_resync(ResyncMode::Lazy))
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(DEFAULT_MESSAGE.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::LinkArgs;

    fn args(data: Option<&str>) -> SendArgs {
        args_for("tcp://127.0.0.1:7000", data)
    }

    fn args_for(endpoint: &str, data: Option<&str>) -> SendArgs {
        SendArgs {
            link: LinkArgs {
                endpoint: endpoint.parse().unwrap(),
                retry_delay: "3s".to_string(),
                connect_timeout: "10s".to_string(),
            },
            data: data.map(str::to_string),
            file: None,
            interval: "1s".to_string(),
            count: None,
            listen: false,
        }
    }

    #[test]
    fn default_payload_is_the_classic_message() {
        assert_eq!(resolve_payload(&args(None)).unwrap(), b"This is my message! \n");
    }

    #[test]
    fn data_overrides_default() {
        assert_eq!(resolve_payload(&args(Some("hi"))).unwrap(), b"hi");
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut a = args(None);
        a.file = Some("/nonexistent/framelink/payload.bin".into());
        assert!(resolve_payload(&a).is_err());
    }

    #[test]
    fn listening_sender_resyncs_lazily() {
        let mut a = args(None);
        assert_eq!(sender_config(&a).unwrap().resync, ResyncMode::Lazy);

        a.listen = true;
        let cfg = sender_config(&a).unwrap();
        assert_eq!(cfg.role, framelink_peer::Role::Acceptor);
        assert_eq!(cfg.resync, ResyncMode::Lazy);
    }

    #[test]
    fn listening_sender_rejects_udp() {
        let mut a = args_for("udp://127.0.0.1:7000", None);
        a.listen = true;
        assert_eq!(sender_config(&a).unwrap_err().code, USAGE);

        a.listen = false;
        assert!(sender_config(&a).is_ok());
    }
}
