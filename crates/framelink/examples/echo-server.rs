//! Minimal echo server: accepts peers on a TCP port and echoes every frame.
//!
//! Run with:
//!   cargo run --example echo-server -- tcp://127.0.0.1:7000
//!
//! In another terminal:
//!   cargo run --features cli -- send tcp://127.0.0.1:7000 --data hello --count 3

use framelink::peer::{ConnectionManager, PeerConfig, PeerError};
use framelink::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint: Endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp://127.0.0.1:7000".to_string())
        .parse()?;

    eprintln!("Echoing on {endpoint}");
    let mut manager = ConnectionManager::new(PeerConfig::acceptor(endpoint));

    // A dropped client is replaced by the next one to connect.
    loop {
        match manager.receive() {
            Ok(payload) => {
                eprintln!("Received {} bytes", payload.len());
                manager.send(&payload)?;
            }
            Err(PeerError::Shutdown) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
