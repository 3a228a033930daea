//! Plain-text and JSON rendering of harness results

use cachescope::{
    BenchmarkRun, Classifier, Fetched, HistoryEntry, HistoryStats, PointLabel, RunSummary,
    SessionStats, Verdict,
};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

fn clock(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// One ad-hoc fetch: verdict, timings and the payload
pub fn fetch(fetched: &Fetched) -> String {
    let m = &fetched.result.measurement;
    let payload = serde_json::to_string_pretty(&m.item).unwrap_or_else(|_| format!("{:?}", m.item));

    let mut out = format!(
        "Item #{} [{}] at {}\n  server: {}ms  client: {}ms\n",
        fetched.entry.id,
        fetched.result.verdict(),
        clock(fetched.entry.at),
        m.server_ms,
        m.client_ms
    );
    for line in payload.lines() {
        out.push_str(&format!("  {}\n", line));
    }
    out
}

/// A single history entry on one line
pub fn entry(index: usize, entry: &HistoryEntry) -> String {
    format!(
        "{:>2}  {}  item #{:<8} server {:>6}ms  client {:>6}ms  {}",
        index,
        clock(entry.at),
        entry.id,
        entry.server_ms,
        entry.client_ms,
        Verdict::from(entry.hit)
    )
}

/// The whole history log, most-recent-first
pub fn history(entries: &[HistoryEntry], capacity: usize) -> String {
    if entries.is_empty() {
        return "No requests yet. Fetch an item to see it here.".to_string();
    }

    let mut out = String::new();
    for (index, e) in entries.iter().enumerate() {
        out.push_str(&entry(index, e));
        out.push('\n');
    }
    if entries.len() >= capacity {
        out.push_str(&format!(
            "Showing the last {} requests. Older entries are dropped automatically.\n",
            capacity
        ));
    }
    out
}

/// Benchmark table followed by a cold/warm summary line
pub fn run(run: &BenchmarkRun, classifier: &Classifier) -> String {
    let mut out = format!(
        "Benchmark of item #{}\n{:<10} {:>9} {:>9} {:>9}  {}\n",
        run.key(),
        "call",
        "server",
        "client",
        "diff",
        "verdict"
    );
    for point in run.points() {
        out.push_str(&format!(
            "{:<10} {:>7}ms {:>7}ms {:>7}ms  {}\n",
            point.label.to_string(),
            point.server_ms,
            point.client_ms,
            point.overhead_ms(),
            classifier.verdict(point.server_ms)
        ));
    }

    let summary = RunSummary::from_run(run, classifier);
    let speedup = match summary.speedup {
        Some(factor) => format!("{:.1}x", factor),
        None => "n/a".to_string(),
    };
    out.push_str(&format!(
        "cold {}ms, mean warm {:.1}ms, speedup {}, {}/{} warm hits\n",
        summary.cold_server_ms,
        summary.mean_warm_server_ms,
        speedup,
        summary.warm_hits,
        run.warm_count()
    ));
    out
}

#[derive(Serialize)]
struct PointReport {
    label: PointLabel,
    server_ms: u64,
    client_ms: u64,
    diff_ms: i64,
    hit: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    key: &'a str,
    started_at: DateTime<Utc>,
    threshold_ms: u64,
    points: Vec<PointReport>,
    summary: RunSummary,
}

/// Benchmark run as pretty JSON, verdicts included
pub fn run_json(run: &BenchmarkRun, classifier: &Classifier) -> serde_json::Result<String> {
    let report = RunReport {
        key: run.key().as_str(),
        started_at: run.started_at(),
        threshold_ms: classifier.threshold_ms(),
        points: run
            .points()
            .iter()
            .map(|p| PointReport {
                label: p.label,
                server_ms: p.server_ms,
                client_ms: p.client_ms,
                diff_ms: p.overhead_ms(),
                hit: p.is_hit(classifier),
            })
            .collect(),
        summary: RunSummary::from_run(run, classifier),
    };
    serde_json::to_string_pretty(&report)
}

/// History breakdown and session counters
pub fn stats(history: &HistoryStats, session: &SessionStats, classifier: &Classifier) -> String {
    format!(
        "# History (threshold {}ms)\n\
         hits:            {}\n\
         misses:          {}\n\
         hit_ratio:       {:.2}\n\
         mean_server_ms:  {:.1}\n\
         mean_client_ms:  {:.1}\n\
         # Session\n\
         lookups:         {}\n\
         failures:        {}\n\
         evictions:       {}\n\
         runs:            {}\n",
        classifier.threshold_ms(),
        history.hits,
        history.misses,
        history.hit_ratio(),
        history.mean_server_ms,
        history.mean_client_ms,
        session.lookups(),
        session.failures(),
        session.evictions(),
        session.runs()
    )
}
