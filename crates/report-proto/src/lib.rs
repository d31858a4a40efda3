//! Line protocol for artifact reporting from the container to the host.
//!
//! ## Wire Format
//!
//! ```text
//! ...arbitrary program output...
//! === Uploaded Files ===
//! https://bucket.s3.amazonaws.com/20250101120000_<uuid>.txt?X-Amz-...
//! https://bucket.s3.amazonaws.com/20250101120001_<uuid>.png?X-Amz-...
//! ```
//!
//! - **marker**: the literal line [`MARKER`], matched case-sensitively after
//!   trimming surrounding whitespace.
//! - **url lines**: one URL per line, each starting with `http`. Lines that do
//!   not start with `http` after trimming are skipped, not rejected.
//!
//! The supervisor inside the container prints the block as the very last
//! output of the run. When the marker shows up more than once (user code
//! printing it), only the block after the final marker counts.

use std::io::{self, Write};

/// Marker line that opens the artifact block.
pub const MARKER: &str = "=== Uploaded Files ===";

/// Prefix every reported URL must carry.
pub const URL_PREFIX: &str = "http";

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Write the marker followed by one line per URL.
///
/// URLs containing line breaks or not starting with [`URL_PREFIX`] are
/// dropped. Returns the number of URL lines written.
pub fn write_report<W: Write>(out: &mut W, urls: &[String]) -> io::Result<usize> {
    writeln!(out, "{MARKER}")?;
    let mut written = 0;
    for url in urls {
        if !is_reportable(url) {
            continue;
        }
        writeln!(out, "{url}")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

fn is_reportable(url: &str) -> bool {
    url.starts_with(URL_PREFIX) && !url.contains(['\n', '\r'])
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Extract artifact URLs from the captured stdout of a run.
///
/// Returns an empty list when the marker never appears; that is a valid
/// outcome (the code produced no files), not an error.
pub fn parse_report(stdout: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut collecting = false;

    for line in stdout.lines() {
        let line = line.trim();
        if line == MARKER {
            // A later marker supersedes anything collected so far.
            collecting = true;
            urls.clear();
            continue;
        }
        if collecting && line.starts_with(URL_PREFIX) {
            urls.push(line.to_string());
        }
    }

    urls
}
