use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{
    env,
    fs::File,
    io::{self, BufReader},
    process::Command,
    thread,
    time::{Duration, Instant},
};

use crate::actions::{Action, UinputSink};
use crate::config::{DaemonConfigState, config_dir};
use crate::input::TouchSource;
use crate::{ipc, replay};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("swipectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op":"shutdown"})),
        Some("status") => request(serde_json::json!({"op":"status"})),
        Some("reload") => request(serde_json::json!({"op":"reload"})),
        Some("list") => request(serde_json::json!({"op":"list"})),
        Some("doctor") => request(serde_json::json!({"op":"doctor"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swipectl use <profile_name>"))?;
            request(serde_json::json!({"op":"use","profile":name}))
        }

        Some("emit") => {
            // usage:
            //   swipectl emit mouse:right
            //   swipectl emit scroll:vertical@3
            //   swipectl emit key:ALT+LEFT
            let raw: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swipectl emit <action>"))?;
            let action: Action = raw.parse()?;
            if action.is_command() {
                return Err(anyhow!("emit does not run cmd: actions"));
            }
            let mut sink = UinputSink::new()?;
            sink.perform(&action)?;
            println!("ok: {action}");
            Ok(())
        }

        Some("record") => {
            let seconds: Option<f64> = pargs.opt_value_from_str("--seconds")?;
            record(seconds)
        }

        Some("replay") => {
            let profile: Option<String> = pargs.opt_value_from_str("--profile")?;
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swipectl replay <trace.jsonl> [--profile <name>]"))?;
            run_replay(&path, profile.as_deref())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

/// Stream live touch events to stdout as JSON lines.
fn record(seconds: Option<f64>) -> Result<()> {
    let cfg = DaemonConfigState::load_from(config_dir()?)?;
    let surface = cfg.profile.surface;
    let mut source = TouchSource::open((surface.width, surface.height))?;
    eprintln!("recording from {}", source.device_names().join(", "));

    let started = Instant::now();
    let stdout = io::stdout();
    loop {
        if seconds.is_some_and(|s| started.elapsed().as_secs_f64() >= s) {
            return Ok(());
        }
        let events = source.poll();
        if events.is_empty() {
            thread::sleep(Duration::from_millis(4));
            continue;
        }
        let mut out = stdout.lock();
        for (device, ev) in &events {
            replay::write_event(&mut out, *device, ev)?;
        }
    }
}

fn run_replay(path: &str, profile: Option<&str>) -> Result<()> {
    let cfg = DaemonConfigState::load_from(config_dir()?)?;
    let profile = match profile {
        Some(name) => cfg.load_named(name)?,
        None => cfg.profile,
    };

    let file = File::open(path).map_err(|e| anyhow!("failed to open {path}: {e}"))?;
    let records = replay::read_trace(BufReader::new(file))?;
    let swipes = replay::replay(&records, &profile.swipe);

    print_response(&serde_json::json!({
        "profile": profile.display_name(),
        "events": records.len(),
        "swipes": swipes,
    }));
    Ok(())
}

fn print_help() {
    println!(
        r#"swipectl — swipe gestures for Linux touch devices

USAGE:
  swipectl help [command]                 Show general or command-specific help
  swipectl start                          Start the daemon
  swipectl stop                           Stop the daemon
  swipectl status                         Show daemon state and swipe counts
  swipectl reload                         Reload active profile
  swipectl use <name>                     Switch active profile
  swipectl list                           List profiles
  swipectl doctor                         Diagnose permissions/devices
  swipectl emit <action>                  Perform an action once (e.g. key:ALT+LEFT)
  swipectl record [--seconds N]           Print live touch events as JSON lines
  swipectl replay <file> [--profile P]    Run a recorded trace through the recognizer

TIPS:
  - Profiles: ~/.config/swipectl/profiles (edits are picked up automatically)
  - Active profile pointer: ~/.config/swipectl/active
  - Set RUST_LOG=debug to see every recognized swipe
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: swipectl start\nStarts the background daemon."),
        "stop" => println!("usage: swipectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: swipectl status\nShows enabled flag, active profile, devices, socket and swipe counts."
        ),
        "reload" => println!(
            "usage: swipectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: swipectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: swipectl list\nLists available profiles."),
        "doctor" => println!(
            "usage: swipectl doctor\nChecks permissions and lists detected multitouch devices."
        ),
        "emit" => println!(
            "usage:\n  swipectl emit mouse:<left|right|middle>\n  swipectl emit scroll:<vertical|horizontal>@<steps>\n  swipectl emit key:CTRL+EQUAL\n  swipectl emit toggle"
        ),
        "record" => println!(
            "usage: swipectl record [--seconds N]\nPrints touch events from all multitouch devices as JSON lines, tagged with the device index and scaled to the active profile's surface."
        ),
        "replay" => println!(
            "usage: swipectl replay <trace.jsonl> [--profile <name>]\nRuns a recorded trace through the recognizer and prints the detected swipes."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
