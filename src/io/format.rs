//! Report formatting on the `hfcrossref-output` log target.
//!
//! The binary routes this target to the console and the output file, apart from diagnostic
//! logging.

use std::fmt;

use log;

/// Width of the report, matching the heading printed by the binary.
const REPORT_WIDTH: usize = 103;

/// Logs an error to the `hfcrossref-output` logger and to the diagnostic log.
macro_rules! xref_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!($fmt, $($($arg)*)?);
        log::error!(target: "hfcrossref-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a warning to the `hfcrossref-output` logger.
macro_rules! xref_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "hfcrossref-output", $fmt, $($($arg)*)?); }
}

/// Logs a report line to the `hfcrossref-output` logger.
macro_rules! xref_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "hfcrossref-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {xref_error, xref_output, xref_warn};

/// Logs a centred title between two double rules.
pub(crate) fn log_title(title: &str) {
    let width = REPORT_WIDTH.max(title.chars().count() + 4);
    let rule = "=".repeat(width);
    xref_output!("{rule}");
    xref_output!("{title:^width$}");
    xref_output!("{rule}");
}

/// Logs a subtitle as a single rule carrying the subtitle text.
pub(crate) fn log_subtitle(subtitle: &str) {
    let lead = format!("-- {subtitle} ");
    let width = REPORT_WIDTH.max(lead.chars().count());
    xref_output!("{lead:-<width$}");
}

/// Logs the opening line of a report section, *e.g.* the checks of one test case.
pub(crate) fn log_section_begin(name: &str) {
    xref_output!(">>> {name}");
}

/// Logs the closing line of a report section together with the number of failed checks in it.
pub(crate) fn log_section_end(name: &str, n_failed: usize) {
    if n_failed == 0 {
        xref_output!("<<< {name}: all checks passed");
    } else {
        xref_output!("<<< {name}: {n_failed} check(s) failed");
    }
}

/// Renders a flag in a parameter listing.
pub(crate) fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Multi-line [`Display`](fmt::Display) output logged line by line to the report.
pub(crate) trait XrefOutput: fmt::Display {
    /// Logs every line of the display output as a separate report line.
    fn log_lines(&self) {
        self.to_string().lines().for_each(|line| {
            xref_output!("{line}");
        })
    }
}

impl<T> XrefOutput for T where T: fmt::Display {}
