use approx::assert_relative_eq;
use combitone::audio::{Parameter, RenderCommand, RenderNotification, Renderer, SynthGraph};
use combitone::timing::PlaybackState;
use combitone::tracker::combination_tone_pair;
use combitone::{PitchTracker, SynthConfig, midi, tuning};

const SAMPLE_RATE: f64 = 44_100.0;

/// Format 1, 120 ticks per quarter: a tempo track at 100 bpm and a note
/// track that uses running status for its second channel-0 note.
fn score_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&[0, 0, 0, 6, 0, 1, 0, 2, 0, 120]);

    let tempo_track: &[u8] = &[
        0x00, 0xFF, 0x51, 0x03, 0x09, 0x27, 0xC0, // 600_000 us per quarter
        0x00, 0xFF, 0x2F, 0x00,
    ];
    let note_track: &[u8] = &[
        0x00, 0x91, 69, 100, // A: channel 1
        0x00, 0x90, 57, 100, // B: channel 0
        0x78, 59, 100, // running status, one quarter later
        0x78, 0x80, 59, 0, //
        0x00, 0xFF, 0x2F, 0x00,
    ];
    for track in [tempo_track, note_track] {
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track);
    }
    bytes
}

#[test]
fn score_plays_through_renderer() {
    let score = midi::parse(&score_bytes()).unwrap();
    assert_eq!(score.header.tracks, 2);
    assert!(score.warnings.is_empty());
    assert_relative_eq!(score.duration_seconds(), 1.2, max_relative = 1e-12);

    let config = SynthConfig::default();
    let tuning = config.tuning.build().unwrap();
    let expected_a = tuning.frequency(69);
    let expected_b = tuning.frequency(59);
    let (f1, f2) = combination_tone_pair(expected_a, expected_b);

    let tracker = PitchTracker::new(
        config.channel_a,
        config.channel_b,
        tuning::shared(tuning),
    )
    .unwrap();
    let graph = SynthGraph::new(&config, SAMPLE_RATE);
    let (mut renderer, mut link) = Renderer::new(graph, tracker, SAMPLE_RATE);

    link.send(RenderCommand::SetParameter(Parameter::EnvelopeA, 0.5))
        .unwrap();
    link.send(RenderCommand::SetParameter(Parameter::EnvelopeB, 0.5))
        .unwrap();
    link.send(RenderCommand::Load(score.events.into())).unwrap();
    link.send(RenderCommand::Start).unwrap();

    let mut buffer = vec![0.0f32; 512 * 2];
    let mut peak = 0.0f32;
    let mut callbacks = 0;
    loop {
        renderer.render(&mut buffer, 2);
        peak = buffer.iter().fold(peak, |m, x| m.max(x.abs()));
        callbacks += 1;
        if renderer.scheduler().state() != PlaybackState::Playing || callbacks > 500 {
            break;
        }
    }

    assert_eq!(renderer.scheduler().state(), PlaybackState::Loaded);
    let elapsed = renderer.clock().frames() as f64 / SAMPLE_RATE;
    assert!(elapsed >= 1.2 && elapsed < 1.2 + 2.0 * 512.0 / SAMPLE_RATE);
    assert!(peak > 0.0 && peak <= 0.9);

    assert_relative_eq!(renderer.graph().control(Parameter::FrequencyA).get(), f1);
    assert_relative_eq!(renderer.graph().control(Parameter::FrequencyB).get(), f2);

    let mut finished = 0;
    let mut tones = Vec::new();
    while let Some(notification) = link.poll() {
        match notification {
            RenderNotification::PlaybackFinished => finished += 1,
            RenderNotification::Tones(t) => tones.push(t),
            other => panic!("unexpected notification {other:?}"),
        }
    }
    assert_eq!(finished, 1);
    assert_eq!(tones.len(), 2);
    assert_relative_eq!(tones[1].frequency_b, expected_b);
}

#[test]
fn malformed_score_is_rejected_whole() {
    let mut bytes = score_bytes();
    bytes.truncate(bytes.len() - 6);
    assert!(midi::parse(&bytes).is_err());
}
