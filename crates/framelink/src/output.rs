use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framelink_peer::LinkStats;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PayloadOutput<'a> {
    event: &'static str,
    link: &'a str,
    size: usize,
    payload: String,
    timestamp: String,
}

#[derive(Serialize)]
struct StatsOutput<'a> {
    event: &'static str,
    endpoint: &'a str,
    #[serde(flatten)]
    stats: StatsFields,
}

#[derive(Serialize)]
struct StatsFields {
    attempts: u64,
    sessions: u64,
    reconnects: u64,
    frames_sent: u64,
    frames_received: u64,
    decode_failures: u64,
}

impl From<LinkStats> for StatsFields {
    fn from(s: LinkStats) -> Self {
        Self {
            attempts: s.attempts,
            sessions: s.sessions,
            reconnects: s.reconnects,
            frames_sent: s.frames_sent,
            frames_received: s.frames_received,
            decode_failures: s.decode_failures,
        }
    }
}

/// Print one received payload.
pub fn print_payload(payload: &[u8], link: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PayloadOutput {
                event: "frame-received",
                link,
                size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIME", "LINK", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    now_unix_seconds(),
                    link.to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "[{}] {} size={} payload={:?}",
                now_unix_seconds(),
                link,
                payload.len(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

/// Print the counters of a finished session.
pub fn print_stats(stats: LinkStats, endpoint: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = StatsOutput {
                event: "link-stats",
                endpoint,
                stats: stats.into(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METRIC", "VALUE"]);
            for (name, value) in stats_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = stats_rows(stats)
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("{endpoint} {}", fields.join(" "));
        }
        OutputFormat::Raw => {}
    }
}

fn stats_rows(stats: LinkStats) -> [(&'static str, u64); 6] {
    [
        ("attempts", stats.attempts),
        ("sessions", stats.sessions),
        ("reconnects", stats.reconnects),
        ("frames_sent", stats.frames_sent),
        ("frames_received", stats.frames_received),
        ("decode_failures", stats.decode_failures),
    ]
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
