/// One `CASE <index> STATUS <code> TIME_MS <elapsed>` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseReport {
    pub status: i32,
    pub time_ms: u64,
}

/// Collects per-case reports from harness output.
///
/// The result has one slot per case; `None` means the case was never
/// reported. Indices outside `0..case_count` are ignored, and a case reported
/// more than once keeps its last report.
pub fn parse_case_reports(stdout: &str, case_count: usize) -> Vec<Option<CaseReport>> {
    let mut reports = vec![None; case_count];

    for line in stdout.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        for window in tokens.windows(6) {
            let Some((index, report)) = parse_window(window) else {
                continue;
            };
            if index < case_count {
                reports[index] = Some(report);
            }
        }
    }

    reports
}

fn parse_window(window: &[&str]) -> Option<(usize, CaseReport)> {
    if window[0] != "CASE" || window[2] != "STATUS" || window[4] != "TIME_MS" {
        return None;
    }
    let index = window[1].parse::<usize>().ok()?;
    let status = window[3].parse::<i32>().ok()?;
    let time_ms = parse_millis(window[5])?;
    Some((index, CaseReport { status, time_ms }))
}

fn parse_millis(token: &str) -> Option<u64> {
    if let Ok(ms) = token.parse::<u64>() {
        return Some(ms);
    }
    let ms = token.parse::<f64>().ok()?;
    (ms.is_finite() && ms >= 0.0).then(|| ms.round() as u64)
}
