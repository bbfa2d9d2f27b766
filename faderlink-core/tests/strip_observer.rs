mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use faderlink_core::{Dispatcher, PeerRegistry, Route, Session, StripObserver};
use faderlink_types::{GainMode, PropertyChange, RemoteControlId, RouteKind, RouteProperty};
use rosc::OscType;

use common::{float, int, RecordingTransport};

const PEER: &str = "127.0.0.1:8000";

fn dispatcher_with(mode: Option<GainMode>) -> Dispatcher {
    let registry = PeerRegistry::new();
    if let Some(mode) = mode {
        registry.set_gain_mode(PEER.parse().unwrap(), mode);
    }
    Dispatcher::spawn(registry, 256).unwrap()
}

fn route(id: u32, name: &str, kind: RouteKind) -> Arc<Route> {
    Arc::new(Route::new(RemoteControlId::new(id), name, kind))
}

#[test]
fn test_track_sends_five_initial_messages() {
    let dispatcher = dispatcher_with(None);
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);

    let observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();

    let mut paths = rec.paths();
    paths.sort();
    assert_eq!(
        paths,
        vec!["/strip/gainabs", "/strip/mute", "/strip/name", "/strip/recenable", "/strip/solo"]
    );
    assert_eq!(observer.subscription_count(), 5);
    assert!(observer.watches_rec_enable());
}

#[test]
fn test_midi_track_is_a_track() {
    let dispatcher = dispatcher_with(None);
    let midi = route(2, "Keys", RouteKind::MidiTrack);
    let (transport, rec) = RecordingTransport::new(PEER);

    let _observer = StripObserver::new(&midi, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();

    assert_eq!(rec.len(), 5);
    assert_eq!(rec.on("/strip/recenable").len(), 1);
}

#[test]
fn test_bus_sends_four_initial_messages() {
    let dispatcher = dispatcher_with(None);
    let bus = route(4, "Drums", RouteKind::Bus);
    let (transport, rec) = RecordingTransport::new(PEER);

    let observer = StripObserver::new(&bus, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();

    assert_eq!(rec.len(), 4);
    assert!(rec.on("/strip/recenable").is_empty());
    assert_eq!(observer.subscription_count(), 4);
    assert!(!observer.watches_rec_enable());

    // rec-enable is not even there to toggle, and nothing else sneaks out
    assert!(bus.rec_enable_control().is_none());
}

#[test]
fn test_initial_state_survives_a_busy_queue() {
    let dispatcher = Dispatcher::spawn(PeerRegistry::new(), 1).unwrap();
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::slow(PEER, Duration::from_millis(30));

    let _observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();

    assert_eq!(rec.len(), 5);
    assert_eq!(dispatcher.dropped_updates(), 0);
}

#[test]
fn test_refresh_survives_a_busy_queue() {
    let dispatcher = Dispatcher::spawn(PeerRegistry::new(), 1).unwrap();
    let bus = route(2, "Drums", RouteKind::Bus);
    let (transport, rec) = RecordingTransport::slow(PEER, Duration::from_millis(10));
    let observer = StripObserver::new(&bus, transport, &dispatcher.handle()).unwrap();

    observer.refresh();
    observer.refresh_gain();
    dispatcher.flush().unwrap();

    assert_eq!(rec.len(), 4 + 4 + 1);
    assert_eq!(rec.on("/strip/gainabs").len(), 3);
    assert_eq!(dispatcher.dropped_updates(), 0);
}

#[test]
fn test_end_to_end_decibel_peer() {
    let dispatcher = dispatcher_with(Some(GainMode::Db));
    let kick = route(3, "Kick", RouteKind::Bus);
    let (transport, rec) = RecordingTransport::new(PEER);

    let _observer = StripObserver::new(&kick, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();

    let mut messages = rec.messages();
    messages.sort_by(|a, b| a.addr.cmp(&b.addr));
    let got: Vec<(String, Vec<OscType>)> = messages.into_iter().map(|m| (m.addr, m.args)).collect();
    assert_eq!(
        got,
        vec![
            ("/strip/gaindB".to_string(), vec![OscType::Int(3), OscType::Float(0.0)]),
            ("/strip/mute".to_string(), vec![OscType::Int(3), OscType::Float(0.0)]),
            ("/strip/name".to_string(), vec![OscType::Int(3), OscType::String("Kick".into())]),
            ("/strip/solo".to_string(), vec![OscType::Int(3), OscType::Float(0.0)]),
        ]
    );
}

#[test]
fn test_unknown_peer_gets_absolute_gain() {
    let dispatcher = dispatcher_with(None);
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);
    let _observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();

    track.gain_control().set_value(0.5);
    dispatcher.flush().unwrap();

    let gains = rec.on("/strip/gainabs");
    assert_eq!(gains.len(), 2);
    assert_eq!(float(&gains[1], 1), 0.5);
    assert!(rec.on("/strip/gaindB").is_empty());
}

#[test]
fn test_changes_are_forwarded_in_order() {
    let dispatcher = dispatcher_with(Some(GainMode::Fader));
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);
    let _observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();
    rec.clear();

    for step in 1..=10 {
        track.gain_control().set_value(step as f64 * 0.1);
    }
    track.mute_control().set_on(true);
    track.rec_enable_control().unwrap().set_on(true);
    dispatcher.flush().unwrap();

    let faders: Vec<f32> = rec.on("/strip/fader").iter().map(|m| float(m, 1)).collect();
    assert_eq!(faders.len(), 10);
    assert!(faders.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(float(&rec.on("/strip/mute")[0], 1), 1.0);
    assert_eq!(float(&rec.on("/strip/recenable")[0], 1), 1.0);
}

#[test]
fn test_listen_reports_solo() {
    let dispatcher = dispatcher_with(None);
    let bus = route(6, "FX", RouteKind::Bus);
    let (transport, rec) = RecordingTransport::new(PEER);
    let _observer = StripObserver::new(&bus, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();
    rec.clear();

    bus.set_listen(true);
    bus.solo_control().set_on(true);
    dispatcher.flush().unwrap();

    assert_eq!(rec.paths(), vec!["/strip/solo", "/strip/solo"]);
}

#[test]
fn test_unrelated_property_batch_is_ignored() {
    let dispatcher = dispatcher_with(None);
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);
    let _observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();
    rec.clear();

    let batch = PropertyChange::from(RouteProperty::Comment).with(RouteProperty::Active);
    track.property_changed.emit(&batch);
    dispatcher.flush().unwrap();
    assert_eq!(rec.len(), 0);

    track.set_name("Lead Vox");
    dispatcher.flush().unwrap();
    let names = rec.on("/strip/name");
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].args[1], OscType::String("Lead Vox".into()));
}

#[test]
fn test_id_is_read_at_send_time() {
    let dispatcher = dispatcher_with(None);
    let session = Session::new();
    session.add_route("Kick", RouteKind::AudioTrack);
    let snare = session.add_route("Snare", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);
    let _observer = StripObserver::new(&snare, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();
    assert!(rec.messages().iter().all(|m| int(m, 0) == 2));
    rec.clear();

    assert!(session.move_route(1, 0));
    snare.mute_control().set_on(true);
    dispatcher.flush().unwrap();

    let mutes = rec.on("/strip/mute");
    assert_eq!(mutes.len(), 1);
    assert_eq!(int(&mutes[0], 0), 1);
    // renumbering alone is not a name change
    assert!(rec.on("/strip/name").is_empty());
}

#[test]
fn test_nothing_sent_after_close() {
    let dispatcher = dispatcher_with(None);
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);
    let mut observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();

    track.gain_control().set_value(0.25);
    observer.close();
    // close waits for the transport to be released
    assert_eq!(rec.close_count(), 1);
    let before = rec.len();

    track.gain_control().set_value(0.75);
    track.mute_control().set_on(true);
    track.set_name("Other");
    track.rec_enable_control().unwrap().set_on(true);
    dispatcher.flush().unwrap();

    assert_eq!(rec.len(), before);
    assert_eq!(track.gain_control().changed.slot_count(), 0);
    assert_eq!(track.property_changed.slot_count(), 0);
    assert_eq!(track.listen_changed.slot_count(), 0);
}

#[test]
fn test_close_is_idempotent() {
    let dispatcher = dispatcher_with(None);
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);
    let mut observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();
    let sent = rec.len();

    observer.close();
    observer.close();
    assert!(observer.is_closed());
    observer.refresh();
    drop(observer);
    dispatcher.flush().unwrap();

    assert_eq!(rec.close_count(), 1);
    assert_eq!(rec.len(), sent);
}

#[test]
fn test_dead_route_is_a_no_op() {
    let dispatcher = dispatcher_with(None);
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let gain = Arc::clone(track.gain_control());
    let (transport, rec) = RecordingTransport::new(PEER);
    let observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();
    dispatcher.flush().unwrap();
    rec.clear();

    drop(track);
    assert!(observer.route().is_none());
    // the controllable outlives its route here; its handler must stay quiet
    gain.set_value(0.1);
    observer.refresh();
    dispatcher.flush().unwrap();
    assert_eq!(rec.len(), 0);

    drop(observer);
    assert_eq!(rec.close_count(), 1);
}

#[test]
fn test_teardown_races_with_audio_thread() {
    let dispatcher = dispatcher_with(Some(GainMode::Db));
    let track = route(1, "Vox", RouteKind::AudioTrack);
    let (transport, rec) = RecordingTransport::new(PEER);
    let mut observer = StripObserver::new(&track, transport, &dispatcher.handle()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let automation = {
        let track = Arc::clone(&track);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut step = 0u32;
            while !stop.load(Ordering::Relaxed) {
                track.gain_control().set_value((step % 200) as f64 / 100.0);
                step += 1;
            }
        })
    };

    thread::sleep(Duration::from_millis(20));
    observer.close();
    let after_close = rec.len();
    thread::sleep(Duration::from_millis(20));
    dispatcher.flush().unwrap();
    assert_eq!(rec.len(), after_close);

    stop.store(true, Ordering::Relaxed);
    automation.join().unwrap();
    assert!(rec.on("/strip/gaindB").len() >= 1);
}
