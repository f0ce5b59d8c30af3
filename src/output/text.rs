//! Human-readable text output
//!
//! Verbose runs print one row per path, fastest reader first:
//!
//! ```text
//! PATH         WRITE       READ
//! /mnt/drive2  1.2 GiB/s   1.5 GiB/s  ✓
//! /mnt/drive1  -           -          open failed on ...: Permission denied
//! ```
//!
//! The totals table is always printed and only counts paths without an error.

use crate::stats::aggregator::Totals;
use crate::stats::PathResult;
use crate::util::time::format_throughput;
use std::io::{self, Write};

const COLUMN_GAP: usize = 2;

/// Write the per-path table (verbose only) and the totals table
pub fn render_text(
    out: &mut impl Write,
    results: &[PathResult],
    totals: Totals,
    verbose: bool,
) -> io::Result<()> {
    if verbose {
        let mut rows = vec![vec![
            "PATH".to_string(),
            "WRITE".to_string(),
            "READ".to_string(),
            String::new(),
        ]];
        rows.extend(results.iter().map(result_row));
        write_table(out, &rows)?;
        writeln!(out)?;
    }

    let rows = vec![
        vec!["TotalWRITE".to_string(), "TotalREAD".to_string()],
        vec![format_throughput(totals.write), format_throughput(totals.read)],
    ];
    write_table(out, &rows)
}

fn result_row(result: &PathResult) -> Vec<String> {
    let show = |rate: Option<u64>| rate.map_or_else(|| "-".to_string(), format_throughput);
    let status = match result.error() {
        Some(e) => e.to_string(),
        None => "\u{2713}".to_string(),
    };
    vec![
        result.path().display().to_string(),
        show(result.write_throughput()),
        show(result.read_throughput()),
        status,
    ]
}

/// Left-aligned columns; the last column is never padded
fn write_table(out: &mut impl Write, rows: &[Vec<String>]) -> io::Result<()> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            line.push_str(cell);
            if i + 1 < row.len() {
                let pad = widths[i] - cell.chars().count() + COLUMN_GAP;
                line.extend(std::iter::repeat(' ').take(pad));
            }
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PerfError;
    use crate::stats::aggregator::ResultAggregator;

    fn render(results: Vec<PathResult>, verbose: bool) -> String {
        let (results, totals) = ResultAggregator::new(results).into_parts();
        let mut out = Vec::new();
        render_text(&mut out, &results, totals, verbose).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_totals_only_by_default() {
        let text = render(vec![PathResult::success("/mnt/d1", 1024, 2048)], false);
        assert_eq!(text, "TotalWRITE  TotalREAD\n1.0 KiB/s   2.0 KiB/s\n");
    }

    #[test]
    fn test_verbose_rows_sorted_with_status() {
        let text = render(
            vec![
                PathResult::success("/mnt/slow", 1024, 1024),
                PathResult::failed("/mnt/bad", PerfError::NotImplemented),
                PathResult::success("/mnt/fast", 1024, 4096),
            ],
            true,
        );
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("PATH"));
        assert!(lines[1].starts_with("/mnt/fast") && lines[1].ends_with('\u{2713}'));
        assert!(lines[2].starts_with("/mnt/slow"));
        assert!(lines[3].starts_with("/mnt/bad"));
        assert!(lines[3].contains(" -  "));
        assert!(lines[3].ends_with("not implemented"));
        assert_eq!(lines[4], "");
        // Failed path is left out of the totals
        assert_eq!(lines[6], "2.0 KiB/s   5.0 KiB/s");
    }

    #[test]
    fn test_columns_align() {
        let rows = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["long".to_string(), "c".to_string()],
        ];
        let mut out = Vec::new();
        write_table(&mut out, &rows).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a     b\nlong  c\n");
    }
}
