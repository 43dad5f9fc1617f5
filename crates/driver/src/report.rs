use perf_core::{ApiPath, Comparison, MetricsSnapshot, Verdict};
use std::fmt::Write;

/// Below this throughput gap (percent) neither path wins on throughput.
const THROUGHPUT_TIE_PERCENT: f64 = 1.0;
/// Below this success-rate gap (points) neither path wins on reliability.
const SUCCESS_TIE_POINTS: f64 = 0.1;

pub fn throughput_winner(cmp: &Comparison) -> Verdict {
    winner_by(cmp.throughput_diff_percent, THROUGHPUT_TIE_PERCENT)
}

pub fn success_rate_winner(cmp: &Comparison) -> Verdict {
    winner_by(cmp.success_rate_diff_percent, SUCCESS_TIE_POINTS)
}

fn winner_by(diff: f64, tie_below: f64) -> Verdict {
    if diff.abs() < tie_below {
        Verdict::Tie
    } else if diff > 0.0 {
        Verdict::B
    } else {
        Verdict::A
    }
}

/// Majority of the speed, throughput and reliability verdicts.
pub fn overall_winner(cmp: &Comparison) -> Verdict {
    let verdicts = [cmp.faster_path, throughput_winner(cmp), success_rate_winner(cmp)];
    let a = verdicts.iter().filter(|v| **v == Verdict::A).count();
    let b = verdicts.iter().filter(|v| **v == Verdict::B).count();
    match a.cmp(&b) {
        std::cmp::Ordering::Greater => Verdict::A,
        std::cmp::Ordering::Less => Verdict::B,
        std::cmp::Ordering::Equal => Verdict::Tie,
    }
}

fn verdict_label(v: Verdict) -> &'static str {
    match v {
        Verdict::A => ApiPath::A.label(),
        Verdict::B => ApiPath::B.label(),
        Verdict::Tie => "TIE",
    }
}

fn wins(path: Verdict, cmp: &Comparison) -> usize {
    [cmp.faster_path, throughput_winner(cmp), success_rate_winner(cmp)]
        .iter()
        .filter(|v| **v == path)
        .count()
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn row(out: &mut String, label: &str, m: &MetricsSnapshot, trophies: usize) {
    let _ = writeln!(
        out,
        "| {:<12} | {:>10} | {:>10.2}ms | {:>11.1}% | {:>9.0}/s | {:<3} |",
        label,
        group_thousands(m.total_requests),
        m.average_execution_time_ms,
        m.success_rate,
        m.throughput_per_second,
        "*".repeat(trophies),
    );
}

pub fn format_table(cmp: &Comparison) -> String {
    let a = &cmp.path_a;
    let b = &cmp.path_b;
    let mut out = String::new();

    let rule = "+--------------+------------+--------------+--------------+-------------+-----+";
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "| {:<12} | {:>10} | {:>12} | {:>12} | {:>11} | {:<3} |",
        "Path", "Requests", "Avg", "Success", "Throughput", "Win"
    );
    let _ = writeln!(out, "{rule}");
    row(&mut out, ApiPath::A.label(), a, wins(Verdict::A, cmp));
    row(&mut out, ApiPath::B.label(), b, wins(Verdict::B, cmp));
    let _ = writeln!(out, "{rule}");

    let requests_diff =
        (b.total_requests as f64 - a.total_requests as f64) / (a.total_requests.max(1) as f64) * 100.0;
    // Lower latency is better, so flip the sign for display.
    let _ = writeln!(
        out,
        "| {:<12} | {:>+9.1}% | {:>+11.2}% | {:>+11.2}% | {:>+10.1}% | {:<3} |",
        "Difference",
        requests_diff,
        -cmp.avg_time_diff_percent,
        cmp.success_rate_diff_percent,
        cmp.throughput_diff_percent,
        "",
    );
    let _ = writeln!(out, "{rule}");

    let _ = writeln!(out);
    let _ = writeln!(out, "Overall winner: {}", verdict_label(overall_winner(cmp)));
    let _ = writeln!(
        out,
        "  Speed:       {} ({:.2}%)",
        verdict_label(cmp.faster_path),
        cmp.avg_time_diff_percent.abs()
    );
    let _ = writeln!(
        out,
        "  Throughput:  {} ({:.2}%)",
        verdict_label(throughput_winner(cmp)),
        cmp.throughput_diff_percent.abs()
    );
    let _ = writeln!(
        out,
        "  Reliability: {} ({:.2} points)",
        verdict_label(success_rate_winner(cmp)),
        cmp.success_rate_diff_percent.abs()
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "Insights:");
    let notes = insights(cmp);
    if notes.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for note in notes {
        let _ = writeln!(out, "  - {note}");
    }
    out
}

pub fn insights(cmp: &Comparison) -> Vec<String> {
    let a = &cmp.path_a;
    let b = &cmp.path_b;
    if a.total_requests == 0 || b.total_requests == 0 {
        return vec!["Run a load test to see detailed performance insights".to_string()];
    }

    let mut notes = Vec::new();
    if cmp.avg_time_diff_percent.abs() > 5.0 {
        let faster = if cmp.avg_time_diff_percent > 0.0 { ApiPath::B } else { ApiPath::A };
        notes.push(format!(
            "{} is significantly faster ({:.1}% difference)",
            faster.label(),
            cmp.avg_time_diff_percent.abs()
        ));
    }
    if cmp.throughput_diff_percent.abs() > 10.0 {
        let leader = if cmp.throughput_diff_percent > 0.0 { ApiPath::B } else { ApiPath::A };
        notes.push(format!(
            "{} handles {:.1}% more requests per second",
            leader.label(),
            cmp.throughput_diff_percent.abs()
        ));
    }
    if a.success_rate == 100.0 && b.success_rate == 100.0 {
        notes.push("Both paths achieved 100% success".to_string());
    }
    let total = a.total_requests + b.total_requests;
    if total > 1000 {
        notes.push(format!("High-volume test: {} total requests", group_thousands(total)));
    }
    notes
}

pub fn format_snapshot(path: ApiPath, m: &MetricsSnapshot) -> String {
    format!(
        "{} [{}]: requests={} ok={} failed={} avg={:.3}ms min={:.3}ms max={:.3}ms success={:.2}% throughput={:.2}/s",
        path.label(),
        path,
        m.total_requests,
        m.success_count,
        m.failure_count,
        m.average_execution_time_ms,
        m.min_execution_time_ms,
        m.max_execution_time_ms,
        m.success_rate,
        m.throughput_per_second
    )
}
