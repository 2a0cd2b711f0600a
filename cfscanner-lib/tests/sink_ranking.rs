//! Result-sink invariants (§8 invariant 7, S4).

use cfscanner_lib::net::Speed;
use cfscanner_lib::sink::{Sink, VerifiedEntry};

fn sink() -> (tempfile::TempDir, Sink) {
    let dir = tempfile::tempdir().unwrap();
    let configs_dir = dir.path().join("output_configs");
    std::fs::create_dir_all(&configs_dir).unwrap();
    let sink = Sink::new(
        configs_dir,
        dir.path().join("vless_links.txt"),
        dir.path().join("clean_ips.csv"),
    );
    (dir, sink)
}

/// Invariant 7: for fixed speed, higher latency strictly lowers the score.
#[test]
fn higher_latency_strictly_lowers_score_for_fixed_speed() {
    let fast_reply = VerifiedEntry::new("1.1.1.1".into(), Speed::Mbps(20.0), 50, 0, None, None);
    let slow_reply = VerifiedEntry::new("1.1.1.2".into(), Speed::Mbps(20.0), 500, 0, None, None);
    assert!(fast_reply.score() > slow_reply.score());
}

/// Invariant 7: for fixed latency, higher speed strictly raises the score.
#[test]
fn higher_speed_strictly_raises_score_for_fixed_latency() {
    let slower = VerifiedEntry::new("1.1.1.1".into(), Speed::KiloBytesPerSecond(200.0), 0, 80, None, None);
    let faster = VerifiedEntry::new("1.1.1.2".into(), Speed::KiloBytesPerSecond(800.0), 0, 80, None, None);
    assert!(faster.score() > slower.score());
}

/// S4 (partial, at the sink layer): of 10 appended entries, the sink always
/// keeps all of them ranked descending by score — the orchestrator's
/// target-reached check (§4.7) decides how many of these ever get appended
/// in the first place; this asserts the sink holds up its end once a
/// target-sized subset arrives.
#[test]
fn ranked_entries_are_sorted_descending_and_stable_in_count() {
    let (_dir, sink) = sink();
    let speeds = [5.0, 80.0, 12.0, 60.0, 1.0, 45.0, 30.0, 90.0, 3.0, 15.0];
    for (i, s) in speeds.iter().enumerate() {
        sink.append(VerifiedEntry::new(format!("10.0.0.{i}"), Speed::Mbps(*s), 100, 0, None, None));
    }
    assert_eq!(sink.len(), 10);
    let ranked = sink.ranked();
    for pair in ranked.windows(2) {
        assert!(pair[0].score() >= pair[1].score());
    }
    // Taking the orchestrator's target=3 would keep exactly the top 3 by score.
    let top3: Vec<_> = ranked.iter().take(3).map(|e| e.ip.clone()).collect();
    assert_eq!(top3, vec!["10.0.0.7", "10.0.0.1", "10.0.0.3"]);
}
