//! CSV export.
//!
//! Files are rendered completely in memory, written to a temporary file next
//! to the destination, flushed, then renamed over the destination. A failed
//! export never leaves a partial file behind.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;

use crate::api::category::Category;
use crate::api::history::Sample;
use crate::api::stats::MemoryStats;
use crate::api::zones::Zone;

/// Header of the memory time-series export.
///
/// `peak_bytes` is the tracker-wide peak at the sample time, repeated on each
/// category row. Per-category peaks are in [`CategoryStats`](crate::CategoryStats).
pub const CSV_HEADER: &str = "timestamp,category,live_bytes,live_count,peak_bytes";

/// Header of the zone export.
pub const ZONES_CSV_HEADER: &str = "zone_id,name,color,start,end,thread,bytes,count";

/// Render history samples followed by the current snapshot.
///
/// Returns the CSV text and the number of data rows.
pub(crate) fn render_samples_csv<'a>(
    samples: impl Iterator<Item = &'a Sample>,
    current: &MemoryStats,
) -> (String, usize) {
    let mut out = String::with_capacity(4096);
    let mut rows = 0;
    out.push_str(CSV_HEADER);
    out.push('\n');

    for sample in samples {
        for category in Category::ALL {
            let totals = sample.category(category);
            push_row(
                &mut out,
                sample.timestamp_us,
                category,
                totals.live_bytes,
                totals.live_count,
                sample.peak_bytes,
            );
            rows += 1;
        }
    }

    for (category, totals) in current.iter_categories() {
        push_row(
            &mut out,
            current.timestamp_us,
            category,
            totals.live_bytes,
            totals.live_count,
            current.peak_bytes,
        );
        rows += 1;
    }

    (out, rows)
}

fn push_row(
    out: &mut String,
    timestamp_us: u64,
    category: Category,
    live_bytes: usize,
    live_count: usize,
    peak_bytes: usize,
) {
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "{},{},{},{},{}",
        timestamp_us, category, live_bytes, live_count, peak_bytes
    );
}

/// Render retained zones. Open zones have an empty `end` column.
pub(crate) fn render_zones_csv<'a>(zones: impl Iterator<Item = &'a Zone>) -> (String, usize) {
    let mut out = String::with_capacity(1024);
    let mut rows = 0;
    out.push_str(ZONES_CSV_HEADER);
    out.push('\n');

    for zone in zones {
        let end = zone.end_us.map(|end| end.to_string()).unwrap_or_default();
        let thread = format!("{:?}", zone.thread);
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            zone.id.get(),
            escape_field(zone.name),
            zone.color,
            zone.start_us,
            end,
            escape_field(&thread),
            zone.bytes_allocated,
            zone.allocation_count
        );
        rows += 1;
    }

    (out, rows)
}

/// Quote a field if it contains a separator, quote or newline.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Write `contents` to `path` atomically.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
