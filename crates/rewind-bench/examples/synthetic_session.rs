//! Run a synthetic trace stream through an ingest thread while a reader
//! scrubs the recording, then print the session summary.
//!
//! Log output is controlled with `RUST_LOG`, e.g.
//! `RUST_LOG=rewind_ingest=debug cargo run --example synthetic_session`.

use std::thread;
use std::time::Duration;

use rewind_bench::{expected_solver_frames, generate, StreamProfile};
use rewind_core::SolverId;
use rewind_ingest::{IngestConfig, IngestThread, TraceProvider};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let profile = StreamProfile::reference();
    let events = generate(&profile);
    println!(
        "=== Rewind synthetic session: {} events, {} solvers ===\n",
        events.len(),
        profile.solvers
    );

    let provider = TraceProvider::new(IngestConfig::default()).unwrap();
    let ingest = IngestThread::spawn(provider, "synthetic").unwrap();
    let reader = ingest.recording().clone();

    let scrubber = thread::spawn(move || {
        let solver = SolverId(0);
        let mut scrubs = 0u32;
        while reader.is_live() {
            let count = reader.solver_frame_count(solver);
            if count > 0 {
                let frame = reader.collapsed_frame_at(solver, count / 2).unwrap();
                let entities = frame.stages.first().map_or(0, |s| s.entity_count());
                if scrubs % 50 == 0 {
                    println!("  scrub: frame {}/{count} holds {entities} entities", count / 2);
                }
                scrubs += 1;
            }
            thread::sleep(Duration::from_millis(2));
        }
        scrubs
    });

    for raw in events {
        ingest.send(raw).unwrap();
    }
    ingest.flush().unwrap();
    let summary = ingest.shutdown().unwrap();
    let scrubs = scrubber.join().unwrap();

    println!("\n{summary}");
    println!(
        "\ncommitted {} of {} solver frames; {scrubs} scrubs while live",
        summary.solver_frames,
        expected_solver_frames(&profile)
    );
}
