//! beatgrid CLI: headless playback and WAV export of project files.
//!
//! Usage:
//!   bg-cli project.json
//!   bg-cli project.json --pattern 2 --seconds 10
//!   bg-cli project.json --song --wav song.wav --rate 48000 --bits 24 --channels 2
//!   bg-cli project.json --loop --wav loop.wav

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use std::{env, process};

use bg_master::{Controller, ExportSettings};

const USAGE: &str = "Usage: bg-cli <project.json> [--pattern N | --song | --loop] \
[--wav out.wav] [--rate HZ] [--bits N] [--channels N] [--seconds S]";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Pattern(usize),
    Song,
    Loop,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let path = args.get(1).filter(|a| !a.starts_with("--")).unwrap_or_else(|| fail(USAGE));

    let value = |flag: &str| -> Option<&String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
    };
    let number = |flag: &str, default: u32| -> u32 {
        value(flag).map_or(default, |v| {
            v.parse()
                .unwrap_or_else(|_| fail(&format!("{} expects a number, got {}", flag, v)))
        })
    };
    let has = |flag: &str| args.iter().any(|a| a == flag);

    let target = if has("--song") {
        Target::Song
    } else if has("--loop") {
        Target::Loop
    } else {
        Target::Pattern(number("--pattern", 0) as usize)
    };

    let mut ctrl = Controller::new();
    ctrl.load_project(Path::new(path))
        .unwrap_or_else(|e| fail(&format!("Failed to load {}: {}", path, e)));
    if let Target::Pattern(index) = target {
        ctrl.select_pattern(Some(index))
            .unwrap_or_else(|e| fail(&format!("No pattern {}: {}", index, e)));
    }
    describe(&ctrl);

    match value("--wav") {
        Some(wav) => {
            let settings = ExportSettings::from_raw(
                number("--rate", 44100),
                number("--bits", 16) as u16,
                number("--channels", 1) as u16,
            )
            .unwrap_or_else(|e| fail(&e.to_string()));
            export(&ctrl, target, Path::new(wav), &settings);
        }
        None => {
            let seconds = value("--seconds").map(|_| number("--seconds", 0) as u64);
            play(&mut ctrl, target, seconds);
        }
    }
}

fn describe(ctrl: &Controller) {
    let project = ctrl.project();
    println!("Project:  {}", project.name());
    println!("Tempo:    {} BPM", project.bpm());
    println!("Patterns: {}", project.song().len());
    for (i, pattern) in project.song().patterns().iter().enumerate() {
        let slots: Vec<String> = pattern
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.enabled)
            .map(|(slot, _)| slot.to_string())
            .collect();
        println!(
            "  {:>2} {:<16} {} beats, {} instruments, slots [{}]",
            i,
            pattern.name(),
            pattern.number_of_beats(),
            pattern.instruments().len(),
            slots.join(" ")
        );
    }
    if !project.channels().is_empty() {
        println!(
            "Loop:     {} channels, {} x {} beats",
            project.channels().len(),
            project.number_of_measures(),
            project.beats_per_measure()
        );
    }
    println!();
}

fn play(ctrl: &mut Controller, target: Target, seconds: Option<u64>) {
    let started = match target {
        Target::Pattern(_) => ctrl.play_or_stop_pattern(),
        Target::Song => ctrl.play_or_stop_song(),
        Target::Loop => fail("The loop grid can only be exported; add --wav"),
    }
    .unwrap_or_else(|e| fail(&format!("Playback failed: {}", e)));
    if !started {
        fail("Song must have at least one pattern with beats checked.");
    }

    // A looping pattern never ends on its own
    let limit = seconds
        .or(matches!(target, Target::Pattern(_)).then_some(8))
        .map(Duration::from_secs);
    let start = Instant::now();
    println!("Playing...");

    while ctrl.is_playing() && limit.map_or(true, |l| start.elapsed() < l) {
        print!("\r{:>6.1}s", start.elapsed().as_secs_f32());
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(50));
    }

    ctrl.close_session();
    println!("\rDone.          ");
}

fn export(ctrl: &Controller, target: Target, path: &Path, settings: &ExportSettings) {
    println!(
        "Rendering to {} at {} Hz, {} bit, {} channel(s)...",
        path.display(),
        settings.sample_rate.hz(),
        settings.bit_depth.bits(),
        settings.channels.count()
    );

    let result = match target {
        Target::Pattern(_) => ctrl.export_pattern(path, settings),
        Target::Song => ctrl.export_song(path, settings),
        Target::Loop => ctrl.export_loop(path, settings),
    };
    let summary = result.unwrap_or_else(|e| fail(&format!("Export failed: {}", e)));

    println!(
        "Rendered {} frames ({:.2} s)",
        summary.frames,
        summary.duration_ms / 1000.0
    );
    println!("Done.");
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}
