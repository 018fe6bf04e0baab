use framelink_peer::PeerError;

use crate::cmd::ListenArgs;
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_payload, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut manager = args.link.manager(!args.connect)?;

    let mut printed = 0u64;
    loop {
        let payload = match manager.receive() {
            Ok(payload) => payload,
            Err(PeerError::Timeout) => continue,
            Err(PeerError::Shutdown) => break,
            Err(err) => return Err(peer_error("receive failed", err)),
        };

        let link = manager.link_label().unwrap_or_default().to_string();
        print_payload(&payload, &link, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    manager.shutdown();
    Ok(SUCCESS)
}
