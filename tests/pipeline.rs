use neo_pulse::audio::BufferSource;
use neo_pulse::midi::{compose, decode_events, CompositionSettings, Playhead};
use neo_pulse::neo::{assign, fnv1a_hash, parse_feed, NeoRecord};
use neo_pulse::{TickInput, VisualizerConfig, VisualizerSession};
use serde_json::json;

fn feed() -> serde_json::Value {
    json!({
        "element_count": 3,
        "near_earth_objects": {
            "2024-01-02": [
                {
                    "name": "(2024 AB)",
                    "is_potentially_hazardous_asteroid": true,
                    "absolute_magnitude_h": 22.1,
                    "close_approach_data": [{
                        "close_approach_date": "2024-01-02",
                        "relative_velocity": { "kilometers_per_second": "12.5" },
                        "miss_distance": { "kilometers": "750000.25" }
                    }]
                }
            ],
            "2024-01-01": [
                {
                    "name": "433 Eros (A898 PA)",
                    "close_approach_data": [{
                        "close_approach_date": "2024-01-01",
                        "relative_velocity": { "kilometers_per_second": 5.9 },
                        "miss_distance": { "kilometers": 26000000.0 }
                    }]
                },
                { "name": "broken", "close_approach_data": "nope" }
            ]
        }
    })
}

fn new_session(config: VisualizerConfig) -> VisualizerSession {
    VisualizerSession::new(config).unwrap()
}

fn midi_only_tick(playhead: &Playhead) -> TickInput {
    TickInput {
        playhead_seconds: playhead.position(),
        offset_seconds: playhead.offset(),
        dt: 1.0 / 60.0,
    }
}

#[test]
fn test_feed_to_frames() {
    let records = parse_feed(&feed());
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].name, "433 Eros (A898 PA)");
    assert!(records[1].hazardous);
    assert_eq!(records[1].velocity, 12.5);
    // malformed approach data falls back to defaults and sorts last
    assert_eq!(records[2].name, "broken");
    assert_eq!(records[2].miss_distance, 500000.0);

    let mut session = new_session(VisualizerConfig::default());
    session.set_objects(records);
    let frame = session.tick(TickInput { playhead_seconds: 0.0, offset_seconds: 0.0, dt: 1.0 / 60.0 });

    assert_eq!(frame.visuals.len(), 3);
    assert_eq!(frame.spectrum.len(), 32);
    for visual in &frame.visuals {
        assert_eq!(visual.scale, 1.0);
        assert_eq!(visual.color_mix, 0.0);
        assert_eq!(visual.label_opacity, 0.35);
        assert!((visual.band as usize) < 32);
    }
}

#[test]
fn test_midi_only_playback() {
    let events = decode_events(
        br#"[
            { "time": 1.5, "duration": 0.2, "pitch": 64, "velocity": 0.9 },
            { "time": 0.5, "duration": 0.2, "pitch": 60, "velocity": 0.5 },
            { "time": 1.0, "duration": 0.2, "pitch": 62, "velocity": 0.7 }
        ]"#,
    );
    assert_eq!(events.len(), 3);

    let mut session = new_session(VisualizerConfig::default());
    session.set_objects(parse_feed(&feed()));
    session.load_midi(events);

    let mut playhead = Playhead::new(0.0);
    let mut fired = Vec::new();
    for _ in 0..4 {
        playhead.advance(0.3);
        fired.extend(session.tick(midi_only_tick(&playhead)).fired);
    }

    // playhead is now just past 1.2
    let times: Vec<f64> = fired.iter().map(|f| f.event.time).collect();
    assert_eq!(times, vec![0.5, 1.0]);
    let targets: Vec<Option<usize>> = fired.iter().map(|f| f.target).collect();
    assert_eq!(targets, vec![Some(0), Some(1)]);
    assert_eq!(session.scheduler().pending(), 1);
    assert_eq!(session.scheduler().next_event().map(|e| e.time), Some(1.5));

    assert!(session.pulses()[0] > 0.0);
    assert!(session.pulses()[1] > session.pulses()[0]);
    assert_eq!(session.pulses()[2], 0.0);
}

#[test]
fn test_negative_offset_holds_events_back() {
    let mut session = new_session(VisualizerConfig::default());
    session.set_objects(parse_feed(&feed()));
    session.load_midi(decode_events(br#"[{ "time": 1.0, "duration": 0.1, "pitch": 60, "velocity": 1.0 }]"#));

    let mut playhead = Playhead::new(-0.5);
    playhead.seek(1.2);
    assert!(session.tick(midi_only_tick(&playhead)).fired.is_empty());

    playhead.set_offset(0.0);
    assert_eq!(session.tick(midi_only_tick(&playhead)).fired.len(), 1);
}

#[test]
fn test_bad_midi_falls_back_to_loudness() {
    let events = decode_events(b"\x00\x01 not json");
    assert!(events.is_empty());

    let samples: Vec<f32> = (0..16000).map(|i| if (i / 2) % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let mut session = new_session(VisualizerConfig {
        num_bands: 8,
        fft_size: 512,
        loudness_threshold: 0.0,
        ..Default::default()
    });
    session.set_objects(parse_feed(&feed()));
    session.load_midi(events);
    assert!(session.attach_source(Box::new(BufferSource::new("square.wav", samples.clone(), 8000.0))));
    // same source again is a no-op
    assert!(!session.attach_source(Box::new(BufferSource::new("square.wav", samples, 8000.0))));

    let frame = session.tick(TickInput { playhead_seconds: 1.0, offset_seconds: 0.0, dt: 1.0 / 60.0 });
    assert!(frame.fired.is_empty());
    assert!(frame.surged);
    for &pulse in session.pulses() {
        assert!((pulse - 0.98).abs() < 1e-6);
    }
    assert!(frame.visuals.iter().all(|v| v.scale > 1.0));
}

#[test]
fn test_detached_source_reads_silence() {
    let samples = vec![0.5f32; 8000];
    let mut session = new_session(VisualizerConfig { fft_size: 256, ..Default::default() });
    session.attach_source(Box::new(BufferSource::new("dc", samples, 8000.0)));
    assert!(session.detach_source().is_some());

    let frame = session.tick(TickInput { playhead_seconds: 0.5, offset_seconds: 0.0, dt: 1.0 / 60.0 });
    assert_eq!(frame.loudness, 0.0);
    assert!(frame.spectrum.bands.iter().all(|&b| b == 0.0));
}

#[test]
fn test_band_assignment_is_stable() {
    let names = ["(2024 AB)", "Apophis", "433 Eros (A898 PA)", "Bennu", "Ryugu"];
    let records: Vec<NeoRecord> = names
        .iter()
        .map(|name| NeoRecord { name: name.to_string(), ..Default::default() })
        .collect();

    let first = assign(&records, 32);
    let second = assign(&records, 32);
    assert_eq!(first, second);

    let mut reversed = records.clone();
    reversed.reverse();
    let flipped = assign(&reversed, 32);
    for (index, record) in records.iter().enumerate() {
        let moved = names.len() - 1 - index;
        assert_eq!(first.slots()[index].band, flipped.slots()[moved].band, "{}", record.name);
    }

    assert_eq!(fnv1a_hash("2024 AB"), 1763011396);
    assert_eq!(fnv1a_hash("Apophis"), 2546384833);
    assert_eq!(fnv1a_hash(""), 2166136261);
}

#[test]
fn test_one_day_feed_composes_across_the_piece() {
    let approach = |name: &str, full: &str| {
        json!({
            "name": name,
            "close_approach_data": [{
                "close_approach_date": "2024-01-05",
                "close_approach_date_full": full,
                "miss_distance": { "kilometers": "1000000" }
            }]
        })
    };
    let feed = json!({
        "near_earth_objects": {
            "2024-01-05": [
                approach("late", "2024-Jan-05 23:10"),
                approach("early", "2024-Jan-05 01:05"),
                approach("mid", "2024-Jan-05 12:00")
            ]
        }
    });

    let records = parse_feed(&feed);
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["early", "mid", "late"]);

    let events = compose(&records, &CompositionSettings::default());
    let times: Vec<f64> = events.iter().map(|e| e.time).collect();
    assert_eq!(times.len(), 3);
    assert_eq!(times[0], 0.0);
    assert!(times[1] > 0.0 && times[1] < times[2]);
    assert!((times[2] - 180.0).abs() < 1e-9);
}
