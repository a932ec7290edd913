//! Append-only report log.
//!
//! The engine writes status lines, warnings and summary text here; callers
//! read the accumulated lines or dump them to a file. The log also tracks
//! the highest-severity warning raised during a run.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::PathBuf;

use crate::error::{warning_message, EngineError, Warning, ERR_FILE_SAVE};
use crate::types::{LinkStatus, StatusReport};

#[derive(Debug)]
pub struct Report {
    lines: Vec<String>,
    /// Status reporting level.
    pub statflag: StatusReport,
    /// Highest-severity warning raised so far.
    pub warn_flag: Warning,
    /// Optional file the log is dumped to by `report()`.
    pub path: Option<PathBuf>,
}

impl Default for Report {
    fn default() -> Self {
        Report {
            lines: Vec::new(),
            statflag: StatusReport::NoReport,
            warn_flag: Warning::None,
            path: None,
        }
    }
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    /// Appends one line to the log.
    pub fn writeline(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    /// Raises a warning: records the most severe one seen and logs a line.
    pub fn warn(&mut self, w: Warning, detail: &str) {
        if w > self.warn_flag {
            self.warn_flag = w;
        }
        let mut line = format!("WARNING: {}", warning_message(w));
        if !detail.is_empty() {
            let _ = write!(line, " ({})", detail);
        }
        tracing::warn!(warning = ?w, detail, "hydraulic warning");
        self.lines.push(line);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.warn_flag = Warning::None;
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Logs a link status transition when full status reporting is on.
    pub fn stat_change(&mut self, clock: i64, id: &str, s1: LinkStatus, s2: LinkStatus) {
        if self.statflag == StatusReport::FullReport {
            self.lines.push(format!(
                "{}: link {} changed from {:?} to {:?}",
                clocktime(clock),
                id,
                s1,
                s2
            ));
        }
    }

    /// Logs the convergence error of a trial under full status reporting.
    pub fn rel_err(&mut self, iter: i32, relerr: f64) {
        if self.statflag == StatusReport::FullReport {
            self.lines
                .push(format!("trial {:2}: relative flow change {:.6}", iter, relerr));
        }
    }

    /// Logs the elements with the largest flow change and head loss error
    /// of a balanced trial under full status reporting.
    pub fn hyd_balance(
        &mut self,
        flow_change: f64,
        flow_link: Option<&str>,
        flow_node: Option<&str>,
        head_error: f64,
        head_link: Option<&str>,
    ) {
        if self.statflag != StatusReport::FullReport {
            return;
        }
        if let Some(id) = flow_link {
            self.lines.push(format!(
                "maximum flow change of {:.4} for link {}",
                flow_change, id
            ));
        } else if let Some(id) = flow_node {
            self.lines.push(format!(
                "maximum flow change of {:.4} for node {}",
                flow_change, id
            ));
        }
        if let Some(id) = head_link {
            self.lines.push(format!(
                "maximum head loss error of {:.4} for link {}",
                head_error, id
            ));
        }
    }

    /// Writes the accumulated log to the report file, if one is set.
    pub fn flush_to_file(&self) -> crate::error::Result<()> {
        if let Some(path) = &self.path {
            let mut file =
                std::fs::File::create(path).map_err(|_| EngineError::new(ERR_FILE_SAVE))?;
            for line in &self.lines {
                writeln!(file, "{}", line).map_err(|_| EngineError::new(ERR_FILE_SAVE))?;
            }
        }
        Ok(())
    }
}

/// Seconds-from-midnight clock string.
pub(crate) fn clocktime(seconds: i64) -> String {
    let s = seconds.rem_euclid(86_400);
    format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_highest_warning() {
        let mut rpt = Report::new();
        rpt.warn(Warning::NegativePressure, "");
        rpt.warn(Warning::PumpOutsideCurve, "");
        assert_eq!(rpt.warn_flag, Warning::NegativePressure);
        assert_eq!(rpt.lines().len(), 2);
    }

    #[test]
    fn clocktime_formats_and_wraps() {
        assert_eq!(clocktime(0), "00:00:00");
        assert_eq!(clocktime(86_400 + 3_661), "01:01:01");
    }
}
