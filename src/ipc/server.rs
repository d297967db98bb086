use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    collections::BTreeMap,
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::Path,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::run_pipeline;
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, Profile};
use crate::swipe::SwipeDirection;

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();

    spawn_signal_listener(tx_req.clone())?;
    // dropping the watcher stops it
    let _watcher = match watch_profiles(&state.cfg.profiles_dir, tx_req.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile hot reload unavailable: {e}");
            None
        }
    };

    // gesture thread
    let gesture_thread = GestureThread::start(state.cfg.profile.clone(), tx_evt);

    // accept loop
    listener.set_nonblocking(true)?;
    let result = loop {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            let st_snapshot = state.clone();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, st_snapshot, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        drain_events(&rx_evt, &mut state);

        let mut shutdown = false;
        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => match state.cfg.reload() {
                    Err(e) => error!("reload failed, keeping last good profile: {e}"),
                    Ok(()) => {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("profile reloaded");
                    }
                },
                IpcMsg::UseProfile(name) => match state.cfg.set_active(&name) {
                    Err(e) => error!("use profile failed: {e}"),
                    Ok(()) => {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                },
                IpcMsg::Shutdown => shutdown = true,
            }
        }
        if shutdown {
            break Ok(());
        }

        thread::sleep(Duration::from_millis(5));
    };

    let _ = std::fs::remove_file(&sock);
    info!("daemon: stopped");
    result
}

fn drain_events(rx_evt: &Receiver<DaemonEvent>, state: &mut DaemonState) {
    while let Ok(evt) = rx_evt.try_recv() {
        match evt {
            DaemonEvent::Log(s) => info!("[gesture] {s}"),
            DaemonEvent::Swipe {
                device,
                finger,
                direction,
            } => {
                info!("[gesture] {device}: finger {finger} swiped {direction}");
                *state.swipes.entry(direction.to_string()).or_default() += 1;
                state.last_swipe = Some(direction);
            }
            DaemonEvent::ActionsEnabled(en) => state.enabled = en,
        }
    }
}

fn spawn_signal_listener(tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("daemon: received signal {sig}, shutting down");
            let _ = tx_req.send(IpcMsg::Shutdown);
        }
    });
    Ok(())
}

fn watch_profiles(dir: &Path, tx_req: Sender<IpcMsg>) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev) => {
                let touches_profile = ev
                    .paths
                    .iter()
                    .any(|p| p.extension().is_some_and(|ext| ext == "toml"));
                if touches_profile && matches!(ev.kind, EventKind::Modify(_) | EventKind::Create(_))
                {
                    let _ = tx_req.send(IpcMsg::Reload);
                }
            }
            Err(e) => warn!("profile watch error: {e}"),
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!("daemon: watching {} for profile changes", dir.display());
    Ok(watcher)
}

fn handle_client(mut stream: UnixStream, st: DaemonState, tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let resp = respond(&req, &st, &tx_req);
    writeln!(stream, "{resp}")?;
    Ok(())
}

fn respond(req: &serde_json::Value, st: &DaemonState, tx_req: &Sender<IpcMsg>) -> serde_json::Value {
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");
    match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "enabled": st.enabled,
            "active_profile": st.cfg.active_name,
            "socket": socket_path().ok(),
            "devices": st.cfg.detected_devices,
            "swipes": st.swipes,
            "last_swipe": st.last_swipe,
        }}),
        "reload" => match st.cfg.load_named(&st.cfg.active_name) {
            Ok(_) => {
                let _ = tx_req.send(IpcMsg::Reload);
                serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
            }
            Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
        },
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            match st.cfg.load_named(name) {
                Ok(_) => {
                    let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
                    serde_json::json!({"ok": true, "data": {"active_profile": name}})
                }
                Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
            }
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => serde_json::json!({"ok": true, "data": st.cfg.doctor_report()}),
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    }
}

#[derive(Clone)]
struct DaemonState {
    enabled: bool,
    cfg: DaemonConfigState,
    swipes: BTreeMap<String, u64>,
    last_swipe: Option<SwipeDirection>,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        Ok(Self::with_config(cfg))
    }

    fn with_config(cfg: DaemonConfigState) -> Self {
        Self {
            enabled: true,
            cfg,
            swipes: BTreeMap::new(),
            last_swipe: None,
        }
    }
}

#[derive(Debug)]
enum IpcMsg {
    Reload,
    UseProfile(String),
    Shutdown,
}

#[derive(Debug)]
pub enum DaemonEvent {
    Log(String),
    Swipe {
        device: String,
        finger: usize,
        direction: SwipeDirection,
    },
    ActionsEnabled(bool),
}

struct GestureThread {
    profile: Arc<Mutex<Profile>>,
    _thread: thread::JoinHandle<()>,
}

impl GestureThread {
    fn start(profile: Profile, tx_evt: Sender<DaemonEvent>) -> Self {
        let profile_arc = Arc::new(Mutex::new(profile));
        let prof_clone = profile_arc.clone();
        let handle = thread::spawn(move || {
            if let Err(e) = run_pipeline(prof_clone, tx_evt) {
                error!("gesture pipeline failed: {e}");
            }
        });
        Self {
            profile: profile_arc,
            _thread: handle,
        }
    }

    fn update_profile(&self, new_profile: Profile) {
        if let Ok(mut p) = self.profile.lock() {
            *p = new_profile;
        }
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "swipectl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
