//! Nodesphere Daemon - headless host for the node-globe engine
//!
//! Runs one engine on a single cooperative thread, multiplexing:
//! - the frame loop at the target framerate
//! - the simulation timer at the configured period
//! - line-delimited JSON commands on stdin (responses and engine events go to stdout)
//! - Ctrl-C for an orderly teardown
//!
//! Logs go to stderr so stdout stays machine-readable.
//!
//! Config locations:
//! - Linux: ~/.local/share/nodesphere/config.json
//! - Windows: %APPDATA%\nodesphere\config.json
//! - MacOS: ~/Library/Application Support/nodesphere/config.json

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nodesphere::backend::BackendKind;
use nodesphere::entity::Timestamp;
use nodesphere::observer::{EngineSnapshot, EngineSummary};
use nodesphere::schedule::ScheduleHandle;
use nodesphere::{Engine, EngineConfig, EngineEvent, InputEvent, Key};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

mod error;
mod paths;

use error::HostError;
use paths::AppPaths;

const DEFAULT_FPS: u32 = 60;
const MAX_FPS: u32 = 240;
const STATUS_EVERY: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    PointerMove { x: f32, y: f32 },
    Click { x: f32, y: f32 },
    TouchMove { x: f32, y: f32 },
    TouchStart { x: f32, y: f32 },
    Drag { dx: f32, dy: f32 },
    Key { key: String },
    Resize { width: f32, height: f32 },
    Scroll { left: f32, top: f32 },
    Visibility { visible: bool },
    ResizeFleet { count: usize },
    Snapshot,
    Summary,
    SetFramerate { fps: u32 },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    Snapshot(EngineSnapshot),
    Summary(EngineSummary),
    Events { events: Vec<EngineEvent> },
    Success { message: String },
    Error { message: String },
}

/// What the main loop does after handling one branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Continue,
    Reframe(u32),
    Shutdown,
}

// ═══════════════════════════════════════════════════════════════════════════
// Command Line
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    nodes: Option<usize>,
    seed: Option<u64>,
    fps: Option<u32>,
    backend: Option<BackendKind>,
    help: bool,
}

impl Args {
    fn apply(&self, cfg: &mut EngineConfig) {
        if let Some(n) = self.nodes {
            cfg.initial_node_count = n;
        }
        if let Some(seed) = self.seed {
            cfg.seed = Some(seed);
        }
        if let Some(backend) = self.backend {
            cfg.backend = backend;
        }
    }
}

fn print_usage() {
    eprintln!("Usage: nodesphered [--config path] [--nodes N] [--seed S] [--fps F] [--backend headless|gpu]\n");
    eprintln!("Commands are read from stdin, one JSON object per line, e.g.");
    eprintln!("  {{\"type\":\"Key\",\"key\":\"ArrowRight\"}}");
    eprintln!("  {{\"type\":\"Click\",\"x\":110,\"y\":100}}");
    eprintln!("  {{\"type\":\"ResizeFleet\",\"count\":40}}");
    eprintln!("  {{\"type\":\"Snapshot\"}}");
    eprintln!("  {{\"type\":\"Shutdown\"}}");
}

fn parse_num<T: FromStr>(flag: &str, value: &str) -> Result<T, HostError> {
    value
        .parse()
        .map_err(|_| HostError::Args(format!("{flag}: not a number: {value}")))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, HostError> {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(flag) = it.next() {
        let mut value = || {
            it.next()
                .ok_or_else(|| HostError::Args(format!("{flag} needs a value")))
        };
        match flag.as_str() {
            "--config" => out.config = Some(PathBuf::from(value()?)),
            "--nodes" => out.nodes = Some(parse_num(&flag, &value()?)?),
            "--seed" => out.seed = Some(parse_num(&flag, &value()?)?),
            "--fps" => out.fps = Some(parse_num(&flag, &value()?)?),
            "--backend" => {
                out.backend = Some(match value()?.as_str() {
                    "headless" => BackendKind::Headless,
                    "gpu" => BackendKind::Gpu,
                    other => return Err(HostError::Args(format!("unknown backend: {other}"))),
                })
            }
            "-h" | "--help" => out.help = true,
            other => return Err(HostError::Args(format!("unknown flag: {other}"))),
        }
    }
    Ok(out)
}

// ═══════════════════════════════════════════════════════════════════════════
// Host State
// ═══════════════════════════════════════════════════════════════════════════

struct HostState {
    engine: Engine,
    target_fps: u32,
}

impl HostState {
    fn input(&mut self, event: InputEvent) -> Response {
        self.engine.handle_event(event);
        Response::Events {
            events: self.engine.drain_events(),
        }
    }

    /// Parse and run one stdin line. Blank lines are ignored.
    fn handle_line(&mut self, line: &str, now: Timestamp) -> Option<(Response, Control)> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle_request(request, now),
            Err(e) => (
                Response::Error {
                    message: format!("Invalid request: {e}"),
                },
                Control::Continue,
            ),
        })
    }

    fn handle_request(&mut self, request: Request, now: Timestamp) -> (Response, Control) {
        let response = match request {
            Request::PointerMove { x, y } => self.input(InputEvent::PointerMove { x, y }),
            Request::Click { x, y } => self.input(InputEvent::PointerDown { x, y }),
            Request::TouchMove { x, y } => self.input(InputEvent::TouchMove { x, y }),
            Request::TouchStart { x, y } => self.input(InputEvent::TouchStart { x, y }),
            Request::Drag { dx, dy } => self.input(InputEvent::PointerDrag { dx, dy }),
            Request::Key { key } => match Key::parse(&key) {
                Some(key) => self.input(InputEvent::Key(key)),
                None => Response::Error {
                    message: format!("Unbound key: {key}"),
                },
            },
            Request::Resize { width, height } => self.input(InputEvent::Resize { width, height }),
            Request::Scroll { left, top } => self.input(InputEvent::Scroll { left, top }),
            Request::Visibility { visible } => self.input(InputEvent::Visibility { visible }),
            Request::ResizeFleet { count } => {
                self.engine.resize_entities(count, now);
                info!("Fleet resized to {} nodes", self.engine.entity_count());
                Response::Events {
                    events: self.engine.drain_events(),
                }
            }
            Request::Snapshot => Response::Snapshot(self.engine.snapshot()),
            Request::Summary => Response::Summary(EngineSummary::of(&self.engine)),
            Request::SetFramerate { fps } => {
                let clamped = fps.clamp(1, MAX_FPS);
                self.target_fps = clamped;
                info!("Framerate set to {} FPS", clamped);
                return (
                    Response::Success {
                        message: format!("Framerate set to {} FPS", clamped),
                    },
                    Control::Reframe(clamped),
                );
            }
            Request::Shutdown => {
                info!("Shutdown requested");
                return (
                    Response::Success {
                        message: "Shutting down".to_string(),
                    },
                    Control::Shutdown,
                );
            }
        };
        (response, Control::Continue)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Main Loop
// ═══════════════════════════════════════════════════════════════════════════

fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

fn frame_interval(fps: u32) -> Interval {
    let mut interval = time::interval(Duration::from_micros(1_000_000 / fps.max(1) as u64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

fn is_active(handle: &Option<ScheduleHandle>) -> bool {
    handle.as_ref().is_some_and(ScheduleHandle::is_active)
}

async fn send(out: &mut Stdout, response: &Response) -> Result<(), HostError> {
    out.write_all(serde_json::to_string(response)?.as_bytes())
        .await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

async fn run(state: &mut HostState) -> Result<(), HostError> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let frame_schedule = state.engine.frame_schedule();
    let timer_schedule = state.engine.timer_schedule();

    let mut frames = frame_interval(state.target_fps);
    let period = Duration::from_millis(state.engine.config().simulation.period_ms);
    let mut sim = time::interval_at(time::Instant::now() + period, period);
    sim.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status = time::interval_at(time::Instant::now() + STATUS_EVERY, STATUS_EVERY);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let control = tokio::select! {
            _ = frames.tick(), if is_active(&frame_schedule) => {
                state.engine.on_frame();
                Control::Continue
            }
            _ = sim.tick(), if is_active(&timer_schedule) => {
                if let Some(alert) = state.engine.on_timer(now_ms()) {
                    debug!(kind = %alert.kind, "{}", alert.message);
                }
                Control::Continue
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match state.handle_line(&line, now_ms()) {
                    Some((response, control)) => {
                        send(&mut stdout, &response).await?;
                        control
                    }
                    None => Control::Continue,
                },
                Ok(None) => {
                    info!("stdin closed; running until Ctrl-C");
                    stdin_open = false;
                    Control::Continue
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    stdin_open = false;
                    Control::Continue
                }
            },
            _ = status.tick() => {
                let s = EngineSummary::of(&state.engine);
                info!(
                    nodes = s.entity_count,
                    online = s.online_count,
                    frames = s.frames,
                    ticks = s.simulation_ticks,
                    selected = ?s.selected,
                    "status"
                );
                Control::Continue
            }
            res = &mut ctrl_c => {
                if let Err(e) = res {
                    error!("Ctrl-C handler failed: {}", e);
                }
                info!("Ctrl-C received");
                Control::Shutdown
            }
        };

        let events = state.engine.drain_events();
        if !events.is_empty() {
            send(&mut stdout, &Response::Events { events }).await?;
        }

        match control {
            Control::Continue => {}
            Control::Reframe(fps) => frames = frame_interval(fps),
            Control::Shutdown => break,
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HostError> {
    // Initialize logging (stdout carries the protocol)
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        print_usage();
        return Ok(());
    }

    // Setup application paths
    let paths = match AppPaths::new() {
        Ok(paths) => {
            info!("Data directory: {:?}", paths.data_dir());
            Some(paths)
        }
        Err(e) => {
            warn!("{}; skipping config lookup", e);
            None
        }
    };

    let mut config = paths::load_config(paths.as_ref(), args.config.as_deref())?;
    args.apply(&mut config);
    let target_fps = args.fps.unwrap_or(DEFAULT_FPS).clamp(1, MAX_FPS);

    let mut engine = Engine::from_config(config, now_ms())?;
    engine.mount()?;
    info!(
        nodes = engine.entity_count(),
        backend = ?engine.renderer().backend().kind(),
        "Nodesphere daemon running at {} FPS",
        target_fps
    );

    let mut state = HostState { engine, target_fps };
    let result = run(&mut state).await;
    if let Err(e) = &result {
        error!("Main loop failed: {}", e);
    }

    // Schedules are cancelled before resources are released.
    state.engine.teardown();
    info!("Nodesphere daemon stopped");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, HostError> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    fn host(count: usize) -> HostState {
        let cfg = EngineConfig::default().with_node_count(count).with_seed(1);
        let mut engine = Engine::from_config(cfg, 0).unwrap();
        engine.mount().unwrap();
        engine.on_frame();
        HostState {
            engine,
            target_fps: DEFAULT_FPS,
        }
    }

    #[test]
    fn parses_flags() {
        let a = args(&["--nodes", "40", "--seed", "9", "--backend", "gpu", "--fps", "30"]).unwrap();
        assert_eq!(a.nodes, Some(40));
        assert_eq!(a.seed, Some(9));
        assert_eq!(a.backend, Some(BackendKind::Gpu));
        assert_eq!(a.fps, Some(30));

        let mut cfg = EngineConfig::default();
        a.apply(&mut cfg);
        assert_eq!(cfg.initial_node_count, 40);
        assert_eq!(cfg.seed, Some(9));
    }

    #[test]
    fn rejects_bad_flags() {
        assert!(matches!(args(&["--nodes"]), Err(HostError::Args(_))));
        assert!(matches!(args(&["--nodes", "many"]), Err(HostError::Args(_))));
        assert!(matches!(args(&["--backend", "vulkan"]), Err(HostError::Args(_))));
        assert!(matches!(args(&["--verbose"]), Err(HostError::Args(_))));
    }

    #[test]
    fn key_commands_drive_selection() {
        let mut h = host(5);
        let (resp, control) = h
            .handle_line(r#"{"type":"Key","key":"ArrowRight"}"#, 0)
            .unwrap();
        assert_eq!(control, Control::Continue);
        match resp {
            Response::Events { events } => assert!(events.contains(
                &EngineEvent::SelectionChanged {
                    index: Some(0),
                    id: Some(1)
                }
            )),
            other => panic!("unexpected response: {other:?}"),
        }

        let (resp, _) = h.handle_line(r#"{"type":"Key","key":"q"}"#, 0).unwrap();
        assert!(matches!(resp, Response::Error { .. }));
    }

    #[test]
    fn resize_fleet_clears_stale_selection() {
        let mut h = host(12);
        for _ in 0..11 {
            h.handle_line(r#"{"type":"Key","key":"ArrowDown"}"#, 0);
        }
        assert_eq!(h.engine.selected_index(), Some(10));
        h.handle_line(r#"{"type":"ResizeFleet","count":5}"#, 0);
        assert_eq!(h.engine.entity_count(), 5);
        assert_eq!(h.engine.selected_index(), None);
    }

    #[test]
    fn snapshot_and_control_requests() {
        let mut h = host(3);
        let (resp, _) = h.handle_line(r#"{"type":"Snapshot"}"#, 0).unwrap();
        match resp {
            Response::Snapshot(snap) => assert_eq!(snap.entity_count, 3),
            other => panic!("unexpected response: {other:?}"),
        }

        let (_, control) = h
            .handle_line(r#"{"type":"SetFramerate","fps":5000}"#, 0)
            .unwrap();
        assert_eq!(control, Control::Reframe(MAX_FPS));

        let (_, control) = h.handle_line(r#"{"type":"Shutdown"}"#, 0).unwrap();
        assert_eq!(control, Control::Shutdown);

        assert!(h.handle_line("   ", 0).is_none());
        let (resp, _) = h.handle_line("{not json", 0).unwrap();
        assert!(matches!(resp, Response::Error { .. }));
    }

    #[test]
    fn responses_are_tagged_json() {
        let json = serde_json::to_string(&Response::Success {
            message: "ok".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"Success","message":"ok"}"#);
    }
}
