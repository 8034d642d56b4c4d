//! End-of-run reports.

use std::fmt::Write;

use capture::{FleetReport, ScenarioReport};

/// Print a finished scenario
pub fn print_scenario_report(report: &ScenarioReport) {
    print!("{}", format_scenario_report(report));
}

/// Print a finished recording run
pub fn print_fleet_report(report: &FleetReport) {
    print!("{}", format_fleet_report(report));
}

fn format_scenario_report(report: &ScenarioReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n╔══════════════════════════════════════════════════════════════╗");
    let _ = writeln!(out, "║                      Capture Report                          ║");
    let _ = writeln!(out, "╚══════════════════════════════════════════════════════════════╝\n");

    let _ = writeln!(out, "📼 Log");
    let _ = writeln!(out, "   ├─ Name: {}", report.log_name);
    let _ = writeln!(out, "   ├─ Map: {}", report.map_name);
    let _ = writeln!(out, "   └─ Frames in log: {}", report.log_frames);

    let _ = writeln!(out, "\n🎬 Passes ({})", report.sessions.len());
    for (i, session) in report.sessions.iter().enumerate() {
        let prefix = if i + 1 == report.sessions.len() { "└─" } else { "├─" };
        let _ = writeln!(
            out,
            "   {} {}: {} frames, {} files, {:.2} ms mean flush",
            prefix,
            session.condition,
            session.frames_captured,
            session.files_written,
            session.flush_stats.mean()
        );
    }

    if let Some(ref alignment) = report.alignment {
        let _ = writeln!(out, "\n📐 Alignment");
        let _ = writeln!(out, "   ├─ Folders: {}", alignment.folders.len());
        let _ = writeln!(out, "   ├─ Frames kept: {}", alignment.frame_count);
        let _ = writeln!(out, "   └─ Files removed: {}", alignment.removed);
    }

    let _ = writeln!(out, "\n{}", report.summary);
    out
}

fn format_fleet_report(report: &FleetReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n🚗 Fleet recording on {}", report.map);
    let _ = writeln!(out, "   ├─ Recorder file: {}", report.recorder_path);
    let _ = writeln!(
        out,
        "   ├─ Vehicles: {} of {}",
        report.roster.vehicles.len(),
        report.vehicles_requested
    );
    let _ = writeln!(
        out,
        "   ├─ Pedestrians: {} of {} ({} controllers started)",
        report.roster.walkers.len(),
        report.walkers_requested,
        report.controllers_started
    );
    let status = if report.interrupted { " (interrupted)" } else { "" };
    let _ = writeln!(out, "   └─ Recorded: {:.1}s{}", report.recorded_secs, status);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::SessionReport;
    use observability::{CaptureMetricsAggregator, RunningStats};

    #[test]
    fn test_scenario_report_lists_every_pass() {
        let mut flush_stats = RunningStats::default();
        flush_stats.push(4.0);
        let sessions: Vec<SessionReport> = ["segmentation", "ClearNoon"]
            .iter()
            .map(|condition| SessionReport {
                condition: condition.to_string(),
                hero_id: 1000,
                frames_captured: 5,
                files_written: 10,
                stale_discarded: 0,
                output_dirs: Vec::new(),
                flush_stats: flush_stats.clone(),
            })
            .collect();

        let mut aggregator = CaptureMetricsAggregator::new();
        for s in &sessions {
            aggregator.record_session(&s.condition, s.frames_captured, s.files_written, &s.flush_stats);
        }
        let report = ScenarioReport {
            log_name: "run_01".into(),
            map_name: "Town03".into(),
            log_frames: 15,
            sessions,
            alignment: None,
            summary: aggregator.summary(),
        };

        let text = format_scenario_report(&report);
        assert!(text.contains("Name: run_01"));
        assert!(text.contains("├─ segmentation: 5 frames, 10 files"));
        assert!(text.contains("└─ ClearNoon: 5 frames, 10 files"));
        assert!(text.contains("Frames captured: 10"));
        assert!(!text.contains("Alignment"));
    }
}
