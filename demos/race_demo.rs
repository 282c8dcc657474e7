//! Race two routes from the command line.
//!
//! Run with: RUST_LOG=debug cargo run --example race_demo

use gpx_racer::{build_track, Race, RaceCommand, RaceConfig, RaceState, TrackPoint};

fn main() {
    env_logger::init();

    // Two loops around the same park (London), the second one longer and
    // starting a little further along
    let route_1 = build_track(vec![
        TrackPoint::new(51.5074, -0.1278), // Start
        TrackPoint::new(51.5080, -0.1290),
        TrackPoint::new(51.5090, -0.1300),
        TrackPoint::new(51.5100, -0.1310),
        TrackPoint::new(51.5110, -0.1320), // End
    ])
    .expect("route 1 is valid");

    let route_2 = build_track(vec![
        TrackPoint::new(51.5081, -0.1291),
        TrackPoint::new(51.5090, -0.1301),
        TrackPoint::new(51.5100, -0.1311),
        TrackPoint::new(51.5120, -0.1330),
        TrackPoint::new(51.5140, -0.1350),
    ])
    .expect("route 2 is valid");

    let config = RaceConfig::default();
    let race = Race::new(&route_1, &route_2, config);

    let summary = race.summary();
    println!("GPX Race\n");
    println!("  Route 1: {:.2} km", summary.route_1_km);
    println!("  Route 2: {:.2} km", summary.route_2_km);
    println!("  Map center: {:.5}, {:.5}\n", summary.center.latitude, summary.center.longitude);

    let alignment = race.align_earliest();
    println!(
        "Earliest pairing: route 1 at {:.3}, route 2 at {:.3}, {:.1} m apart{}",
        alignment.progress_a,
        alignment.progress_b,
        alignment.distance_m,
        if alignment.within_threshold { "" } else { " (closest found, above threshold)" }
    );

    let mut state = race.apply(RaceState::default(), RaceCommand::AlignEarliest);
    state = race.apply(state, RaceCommand::Go);

    println!("\nRunning for {:.0}s:", config.duration_seconds);
    for elapsed in (0..=60).step_by(10) {
        state = race.apply(state, RaceCommand::Tick { elapsed_seconds: elapsed as f64 });
        let (dot_1, dot_2) = race.markers(&state);
        println!(
            "  t={:>2}s  route 1 {:.3} ({:>5.0} m)  route 2 {:.3} ({:>5.0} m)  {:?}",
            elapsed,
            dot_1.progress,
            dot_1.distance_along,
            dot_2.progress,
            dot_2.distance_along,
            state.animation(),
        );
    }
}
