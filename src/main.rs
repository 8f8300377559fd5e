// src/main.rs
//
// Offline sanity run: start the engine, play a chord, render a few blocks.
//
//   junobridge-demo [bank.106] [patch-index]

use junobridge::{JunoAudioEngine, NativeEngine, patch};
use log::{error, info};

const SAMPLE_RATE: i32 = 48_000;
const BLOCK_FRAMES: usize = 256;

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let engine = JunoAudioEngine::default();
    if !engine.native_start(SAMPLE_RATE, BLOCK_FRAMES as i32) {
        error!("engine refused to start");
        std::process::exit(1);
    }

    let mut args = std::env::args().skip(1);
    if let Some(path) = args.next() {
        let index: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        match patch::parse_file(&path) {
            Ok(bank) => match bank.get(index) {
                Some(p) => {
                    info!("{path}: {} patches, loading #{index}", bank.len());
                    if let Err(e) = engine.load_patch(p) {
                        error!("{e}");
                    }
                }
                None => error!("{path} has no patch #{index}"),
            },
            Err(e) => error!("{path}: {e}"),
        }
    }

    let renderer = engine.renderer();
    let mut left = vec![0.0; BLOCK_FRAMES];
    let mut right = vec![0.0; BLOCK_FRAMES];

    println!("Starting engine sanity test…");

    for note in [48, 55, 60, 64] {
        engine.native_note_on(note, 0.8);
    }

    for block in 0..8 {
        if block == 4 {
            for note in [48, 55, 60, 64] {
                engine.native_note_off(note);
            }
        }
        renderer.render(&mut left, &mut right);

        let rb = engine.readback();
        println!(
            "block {block}: {} frames, {} voices, peak L {:.3} R {:.3}",
            rb.frames_rendered, rb.active_voices, rb.output_peaks[0], rb.output_peaks[1]
        );
    }

    engine.native_stop();
    println!("Sanity test completed.");
}
