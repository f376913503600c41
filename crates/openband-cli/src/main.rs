//! OpenBand steering engine daemon and diagnostic command server (§6).
//!
//! Starts the dispatch worker from `openband-core` and a loopback TCP
//! command server in the style of `cmd_server.c`: one thread per
//! connection, line-oriented commands, plain-text replies.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use openband_common::log::init_logging;
use openband_core::config::{BtmPolicy, SteeringPolicy};
use openband_core::{Dispatcher, Engine};

const CMD_SERVER_PORT_BASE: u16 = 8989;

struct Args {
    config_path: Option<String>,
    port_offset: u16,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut port_offset = 0u16;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                config_path = Some(
                    args.get(i)
                        .ok_or_else(|| anyhow::anyhow!("--config requires a value"))?
                        .clone(),
                );
            }
            "--port-offset" | "-p" => {
                i += 1;
                let val = args
                    .get(i)
                    .ok_or_else(|| anyhow::anyhow!("--port-offset requires a value"))?;
                port_offset = val
                    .parse()
                    .map_err(|e| anyhow::anyhow!("invalid port offset '{val}': {e}"))?;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                anyhow::bail!("unknown argument: {other}\nRun with --help for usage.");
            }
        }
        i += 1;
    }

    Ok(Args {
        config_path,
        port_offset,
    })
}

fn print_help() {
    eprintln!(
        r#"openband-cli — OpenBand steering engine daemon

USAGE:
  openband-cli [OPTIONS]

OPTIONS:
  --config, -c <path>        Persisted TOML config (steering + BTM policy)
  --port-offset, -p <n>      Diagnostic command server listens on {}+n
  --help, -h                 Show this help

ENVIRONMENT VARIABLES:
  RUST_LOG       Log level filter (e.g. info, debug, openband_core=trace)
"#,
        CMD_SERVER_PORT_BASE
    );
}

#[derive(serde::Deserialize, Default)]
struct PersistedConfig {
    #[serde(default)]
    steering: Option<SteeringPolicy>,
    #[serde(default)]
    btm: Option<BtmPolicy>,
}

fn load_config(path: &Option<String>) -> anyhow::Result<(SteeringPolicy, BtmPolicy)> {
    let Some(path) = path else {
        return Ok((SteeringPolicy::default(), BtmPolicy::default()));
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
    let parsed: PersistedConfig =
        toml::from_str(&text).map_err(|e| anyhow::anyhow!("failed to parse config {path}: {e}"))?;
    Ok((
        parsed.steering.unwrap_or_default(),
        parsed.btm.unwrap_or_default(),
    ))
}

fn main() -> anyhow::Result<()> {
    init_logging("info");

    let args = parse_args()?;
    let (steering_policy, btm_policy) = load_config(&args.config_path)?;

    tracing::info!(
        config = ?args.config_path,
        port = CMD_SERVER_PORT_BASE + args.port_offset,
        "openband-cli starting"
    );

    let engine = Engine::new(steering_policy, openband_core::btm::BtmEngine::new(btm_policy));
    let dispatcher = Dispatcher::spawn(engine, openband_core::config::DISPATCH_QUEUE_CAPACITY);

    let log_level = Arc::new(AtomicU8::new(LogLevel::Info as u8));
    run_cmd_server(CMD_SERVER_PORT_BASE + args.port_offset, log_level)?;

    drop(dispatcher);
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn name(level: u8) -> &'static str {
        match level {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
    }
}

/// Loopback command server: `help`, `version`, `loglevel [LEVEL]`,
/// `base64 <payload>`. One thread per connection; each connection is
/// read line-by-line until EOF or a `quit`.
fn run_cmd_server(port: u16, log_level: Arc<AtomicU8>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .map_err(|e| anyhow::anyhow!("failed to bind diagnostic command server on {port}: {e}"))?;
    tracing::info!(port, "diagnostic command server listening");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(err) => {
                tracing::debug!(%err, "command server accept error");
                continue;
            }
        };
        let log_level = log_level.clone();
        std::thread::Builder::new()
            .name("openband-cmd".into())
            .spawn(move || handle_connection(stream, log_level))
            .ok();
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, log_level: Arc<AtomicU8>) {
    let peer = stream.peer_addr().ok();
    let mut writer = match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    };
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }
        let reply = dispatch_command(line, &log_level);
        if writer.write_all(reply.as_bytes()).is_err() {
            break;
        }
        if writer.write_all(b"\n").is_err() {
            break;
        }
    }
    tracing::debug!(?peer, "command connection closed");
}

fn dispatch_command(line: &str, log_level: &Arc<AtomicU8>) -> String {
    let mut parts = line.split_whitespace();
    let cmd = parts.next().unwrap_or("");
    match cmd {
        "help" => "commands: help, version, loglevel [LEVEL], base64 <payload>, quit".to_string(),
        "version" => format!("openband-cli {}", env!("CARGO_PKG_VERSION")),
        "loglevel" => match parts.next() {
            Some(level) => match LogLevel::parse(level) {
                Some(new_level) => {
                    log_level.store(new_level as u8, Ordering::Relaxed);
                    format!("loglevel set to {level}")
                }
                None => format!("error: unknown log level '{level}'"),
            },
            None => format!("loglevel is {}", LogLevel::name(log_level.load(Ordering::Relaxed))),
        },
        "base64" => match parts.next() {
            Some(payload) => base64_encode(payload.as_bytes()),
            None => "error: base64 requires a payload argument".to_string(),
        },
        other => format!("error: unknown command '{other}'"),
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(data)
}
