//! Integration test: song arrangement → chained slot players on a manual clock.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bg_engine::clock::TickHandler;
use bg_engine::{
    Clock, EngineError, ManualTimeline, Mixer, PlayerContext, SampleBank, SharedMixer, SongEvent,
    SongHook, SongPlayer,
};
use bg_ir::{Pattern, Song};

fn write_click(path: &Path, frames: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames {
        w.write_sample(12000i16).unwrap();
    }
    w.finalize().unwrap();
}

fn context(timeline: &ManualTimeline) -> (PlayerContext, SharedMixer) {
    let mixer = SharedMixer::new(Mixer::new(8000));
    let ctx = PlayerContext {
        bus: Arc::new(mixer.clone()),
        bank: Arc::new(SampleBank::new(8000)),
        clocks: timeline.factory(),
    };
    (ctx, mixer)
}

fn pattern(name: &str, sample: &Path, beats: &[u8], slots: &[usize]) -> Pattern {
    let mut p = Pattern::new(name, 20).unwrap();
    p.set_number_of_beats(beats.len()).unwrap();
    p.add_instrument(sample.to_str().unwrap());
    for (beat, &on) in p.instrument(0).unwrap().beats().iter().zip(beats) {
        beat.set_enabled(on == 1);
    }
    for &s in slots {
        p.set_item_enabled(s, true).unwrap();
    }
    p
}

fn recorder() -> (SongHook, Arc<Mutex<Vec<SongEvent>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (Arc::new(move |e| sink.lock().unwrap().push(e)), log)
}

/// A plays in slots 0 and 2, B in slot 1.
fn two_pattern_song(dir: &Path) -> Song {
    let kick = dir.join("kick.wav");
    let snare = dir.join("snare.wav");
    write_click(&kick, 16);
    write_click(&snare, 16);

    let mut song = Song::new();
    song.push(pattern("A", &kick, &[1, 0, 1, 0], &[0, 2]));
    song.push(pattern("B", &snare, &[0, 1, 0, 1], &[1]));
    song
}

#[test]
fn slots_play_in_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let song = two_pattern_song(dir.path());
    let timeline = ManualTimeline::new();
    let (ctx, _mixer) = context(&timeline);

    let player = SongPlayer::new(&song, 120, &ctx).unwrap();
    assert_eq!(player.slot_count(), 3);
    let (hook, log) = recorder();

    player.play(Some(hook)).unwrap();
    assert_eq!(player.current_slot(), Some(0));

    for tick in 1..=12 {
        timeline.advance();
        assert!(timeline.running() <= 1, "two slot players live after tick {}", tick);
        match tick {
            4 => assert_eq!(player.current_slot(), Some(1)),
            8 => assert_eq!(player.current_slot(), Some(2)),
            _ => {}
        }
    }

    assert_eq!(
        *log.lock().unwrap(),
        [
            SongEvent::SlotStarted(0),
            SongEvent::SlotStarted(1),
            SongEvent::SlotStarted(2),
            SongEvent::Stopped,
        ]
    );
    assert!(!player.is_playing());
    assert_eq!(timeline.running(), 0);

    player.stop();
    assert_eq!(log.lock().unwrap().len(), 4, "no duplicate Stopped");
}

#[test]
fn slot_handoff_is_one_interval_after_last_beat() {
    let dir = tempfile::tempdir().unwrap();
    let song = two_pattern_song(dir.path());
    let timeline = ManualTimeline::new();
    let (ctx, _mixer) = context(&timeline);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();
    player.play(None).unwrap();

    timeline.advance_by(3);
    // Beat 3 of slot 0 is sounding; slot 1 has not started.
    assert_eq!(player.current_slot(), Some(0));
    let b = song.pattern(1).unwrap().instrument(0).unwrap();
    assert!(b.beats().iter().all(|beat| !beat.is_playing()));

    timeline.advance();
    assert_eq!(player.current_slot(), Some(1));
    assert!(b.beats()[0].is_playing());
}

#[test]
fn stop_mid_song_is_final() {
    let dir = tempfile::tempdir().unwrap();
    let song = two_pattern_song(dir.path());
    let timeline = ManualTimeline::new();
    let (ctx, mixer) = context(&timeline);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();
    let (hook, log) = recorder();

    player.play(Some(hook)).unwrap();
    timeline.advance_by(5);
    player.stop();
    player.stop();

    assert_eq!(timeline.advance_by(10), 0);
    assert_eq!(mixer.lock().active_voices(), 0);
    assert_eq!(
        *log.lock().unwrap(),
        [
            SongEvent::SlotStarted(0),
            SongEvent::SlotStarted(1),
            SongEvent::Stopped
        ]
    );
}

#[test]
fn replay_restarts_from_first_slot() {
    let dir = tempfile::tempdir().unwrap();
    let song = two_pattern_song(dir.path());
    let timeline = ManualTimeline::new();
    let (ctx, _mixer) = context(&timeline);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();

    player.play(None).unwrap();
    timeline.advance_by(6);
    player.play(None).unwrap();
    assert_eq!(player.current_slot(), Some(0));
    assert_eq!(timeline.running(), 1);
}

#[test]
fn empty_arrangement_does_not_play() {
    let dir = tempfile::tempdir().unwrap();
    let mut song = two_pattern_song(dir.path());
    for i in 0..song.len() {
        let p = song.pattern_mut(i).unwrap();
        for slot in 0..p.item_count() {
            p.set_item_enabled(slot, false).unwrap();
        }
    }
    let timeline = ManualTimeline::new();
    let (ctx, _mixer) = context(&timeline);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();
    let (hook, log) = recorder();

    player.play(Some(hook)).unwrap();
    assert!(!player.is_playing());
    assert_eq!(player.slot_count(), 0);
    player.stop();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn samples_are_decoded_once_per_song() {
    let dir = tempfile::tempdir().unwrap();
    let song = two_pattern_song(dir.path());
    let timeline = ManualTimeline::new();
    let (ctx, mixer) = context(&timeline);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();

    assert_eq!(ctx.bank.len(), 2);
    assert_eq!(mixer.lock().voice_count(), 0, "voices wait for their slot");
    player.play(None).unwrap();
    assert_eq!(mixer.lock().voice_count(), 1);
    player.dispose();
    assert_eq!(mixer.lock().voice_count(), 0);
}

#[test]
fn missing_sample_fails_before_playing() {
    let mut song = Song::new();
    song.push(pattern("A", Path::new("/nope/kick.wav"), &[1], &[0]));
    let timeline = ManualTimeline::new();
    let (ctx, mixer) = context(&timeline);
    assert!(SongPlayer::new(&song, 120, &ctx).is_err());
    assert_eq!(mixer.lock().voice_count(), 0);
}

#[test]
fn long_song_stays_within_the_voice_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = Pattern::new("Long", 80).unwrap();
    p.set_number_of_beats(1).unwrap();
    for name in ["kick", "snare", "hat", "clap"] {
        let path = dir.path().join(format!("{}.wav", name));
        write_click(&path, 4);
        p.add_instrument(path.to_str().unwrap());
    }
    for inst in p.instruments() {
        inst.beats()[0].set_enabled(true);
    }
    for slot in 0..70 {
        p.set_item_enabled(slot, true).unwrap();
    }
    let mut song = Song::new();
    song.push(p);

    // 70 slots x 4 instruments is more than the mixer's 256 voices
    let timeline = ManualTimeline::new();
    let (ctx, mixer) = context(&timeline);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();
    assert_eq!(player.slot_count(), 70);
    let (hook, log) = recorder();
    player.play(Some(hook)).unwrap();

    for _ in 0..70 {
        timeline.advance();
        assert!(mixer.lock().voice_count() <= 4);
    }
    assert!(!player.is_playing());
    let events = log.lock().unwrap().clone();
    assert_eq!(events.len(), 71);
    assert_eq!(events[69], SongEvent::SlotStarted(69));
    assert_eq!(events[70], SongEvent::Stopped);
    assert_eq!(mixer.lock().voice_count(), 0);
}

#[test]
fn replay_reports_stopped_to_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let song = two_pattern_song(dir.path());
    let timeline = ManualTimeline::new();
    let (ctx, _mixer) = context(&timeline);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();
    let (first, first_log) = recorder();
    let (second, second_log) = recorder();

    player.play(Some(first)).unwrap();
    timeline.advance_by(2);
    player.play(Some(second)).unwrap();

    assert_eq!(
        *first_log.lock().unwrap(),
        [SongEvent::SlotStarted(0), SongEvent::Stopped]
    );
    assert_eq!(*second_log.lock().unwrap(), [SongEvent::SlotStarted(0)]);
    assert_eq!(timeline.running(), 1);
}

struct DeadClock;

impl Clock for DeadClock {
    fn interval(&self) -> Duration {
        Duration::from_millis(500)
    }
    fn set_interval(&mut self, _: Duration) {}
    fn start(&mut self, _: TickHandler) -> Result<(), EngineError> {
        Err(EngineError::Resource("no clock thread".into()))
    }
    fn stop(&mut self) {}
    fn is_running(&self) -> bool {
        false
    }
}

#[test]
fn clock_failure_is_reported_at_play() {
    let dir = tempfile::tempdir().unwrap();
    let song = two_pattern_song(dir.path());
    let timeline = ManualTimeline::new();
    let (mut ctx, mixer) = context(&timeline);
    ctx.clocks = Arc::new(|_| Box::new(DeadClock) as Box<dyn Clock>);
    let player = SongPlayer::new(&song, 120, &ctx).unwrap();
    let (hook, log) = recorder();

    let result = player.play(Some(hook));
    assert!(matches!(result, Err(EngineError::Resource(_))));
    assert!(!player.is_playing());
    assert_eq!(player.current_slot(), None);
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(mixer.lock().voice_count(), 0);
}
