use std::fs::File;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use faderlink_core::config::Config;
use faderlink_core::session::Session;
use faderlink_core::surface::OscSurface;
use faderlink_types::{GainMode, RemoteControlId, RouteKind};

fn init_logging(verbose: bool) {
    use simplelog::{LevelFilter, WriteLogger};

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("faderlink")
        .join("faderlink.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path).or_else(|_| File::create("/tmp/faderlink.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("faderlink: cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, simplelog::Config::default(), log_file) {
        eprintln!("faderlink: logger already initialized: {}", e);
        return;
    }

    log::info!("faderlink starting (log level: {:?})", log_level);
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// `ADDR` or `ADDR=MODE`, e.g. `192.168.1.40:8000=db`.
fn parse_peer(s: &str) -> Option<(SocketAddr, GainMode)> {
    let (addr, mode) = match s.split_once('=') {
        Some((addr, mode)) => (addr, GainMode::parse(mode)?),
        None => (s, GainMode::Absolute),
    };
    addr.parse().ok().map(|addr| (addr, mode))
}

fn demo_session() -> Arc<Session> {
    let session = Arc::new(Session::new());
    session.add_route("Kick", RouteKind::AudioTrack);
    session.add_route("Snare", RouteKind::AudioTrack);
    session.add_route("Keys", RouteKind::MidiTrack);
    session.add_route("Drums", RouteKind::Bus);
    session.add_route("Master", RouteKind::Master);
    session
}

/// Sweep the first route's gain from a separate thread, the way automation
/// playback would.
fn spawn_automation(session: Arc<Session>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let started = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            if let Some(route) = session.routes().first() {
                let phase = started.elapsed().as_secs_f64() * 0.25;
                let gain = 1.0 + (phase * std::f64::consts::TAU).sin() * 0.5;
                route.gain_control().set_value(gain);
            }
            thread::sleep(Duration::from_millis(50));
        }
    })
}

fn print_usage() {
    println!("usage: faderlink [--port N] [--peer ADDR[=MODE]]... [--bind ID,ID,...] [--demo] [--seconds N] [-v]");
    println!();
    println!("  --port N        UDP port for surface commands (default from config, 3819)");
    println!("  --peer ADDR     preconfigure a surface; MODE is absolute|db|fader|fader1024");
    println!("  --bind IDS      bind these strips to every --peer at startup");
    println!("  --demo          animate the first route's gain");
    println!("  --seconds N     exit after N seconds");
    println!("  -v, --verbose   debug logging");
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let config = Config::load();
    let mut settings = config.surface_settings();
    if let Some(port) = flag_value(&args, "--port").and_then(|p| p.parse().ok()) {
        settings.listen_addr.set_port(port);
    }

    let mut cli_peers = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        if arg != "--peer" {
            continue;
        }
        match args.get(idx + 1).and_then(|s| parse_peer(s)) {
            Some(peer) => cli_peers.push(peer),
            None => {
                eprintln!("faderlink: bad --peer value (expected ADDR or ADDR=MODE)");
                std::process::exit(2);
            }
        }
    }
    settings.peers.extend(cli_peers.iter().copied());

    // Comma-separated remote ids to bind for every --peer
    let bind_ids: Vec<u32> = flag_value(&args, "--bind")
        .map(|s| s.split(',').filter_map(|n| n.trim().parse().ok()).collect())
        .unwrap_or_default();

    let run_for = flag_value(&args, "--seconds")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs);

    let session = demo_session();
    let surface = OscSurface::bind(Arc::clone(&session), settings)?;
    println!("faderlink listening on {}", surface.local_addr());

    for (peer, _) in &cli_peers {
        for id in &bind_ids {
            if let Err(e) = surface.bind_strip(*peer, RemoteControlId::new(*id)) {
                eprintln!("faderlink: cannot bind strip {} to {}: {}", id, peer, e);
            }
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    let automation = args
        .iter()
        .any(|a| a == "--demo")
        .then(|| spawn_automation(Arc::clone(&session), Arc::clone(&stop)));

    let started = Instant::now();
    loop {
        surface.wait_and_poll(Duration::from_millis(100));
        if run_for.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
    }

    stop.store(true, Ordering::Relaxed);
    if let Some(handle) = automation {
        let _ = handle.join();
    }
    log::info!(
        "faderlink exiting: {} sent, {} dropped",
        surface.dispatcher().sent_messages(),
        surface.dispatcher().dropped_updates()
    );
    Ok(())
}
