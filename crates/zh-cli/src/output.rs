// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Terminal rendering of records and progress.

use zh_zfs::{DatasetRecord, Property, PropertyError, Size, TransferProgress};

const COLUMNS: [&str; 5] = ["NAME", "USED", "AVAIL", "REFER", "MOUNTPOINT"];

fn size_cell(size: Result<Size, PropertyError>) -> String {
    size.map(|size| size.to_string())
        .unwrap_or_else(|_| "-".to_string())
}

/// Aligned table in the layout of `zfs list`.
pub fn render_table(records: &[DatasetRecord]) -> String {
    let rows: Vec<[String; 5]> = records
        .iter()
        .map(|record| {
            let mountpoint = record.mountpoint();
            [
                record.name.clone(),
                size_cell(record.used()),
                size_cell(record.available()),
                size_cell(record.referenced()),
                if mountpoint.is_empty() {
                    "-".to_string()
                } else {
                    mountpoint.value
                },
            ]
        })
        .collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let header = COLUMNS.map(str::to_string);
    for row in std::iter::once(&header).chain(rows.iter()) {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

/// `name property value source`, tab separated like `zfs get -H`.
pub fn render_property(dataset: &str, property: &Property) -> String {
    format!(
        "{dataset}\t{}\t{}\t{}",
        property.name,
        property.value,
        property.source.as_str()
    )
}

/// One progress line for stderr.
pub fn render_progress(event: &TransferProgress) -> String {
    if let Some(err) = &event.error {
        return format!("unrecognised progress output: {}", err.line);
    }
    let estimate = Size(event.estimated_send_size);
    match &event.report {
        None => match &event.base_name {
            Some(base) => format!(
                "{} send of {} from {}, estimated {estimate}",
                event.kind, event.source_name, base
            ),
            None => format!(
                "{} send of {}, estimated {estimate}",
                event.kind, event.source_name
            ),
        },
        Some(report) => format!(
            "{}  {} / {estimate}  {}",
            report.timestamp,
            Size(report.bytes_sent),
            report.current_unit
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zh_zfs::{aggregate, ProgressReport, PropertySource};

    #[test]
    fn test_render_table() {
        let records = aggregate(
            "tank\tused\t1536\t-\ntank\tavailable\t1073741824\t-\ntank\treferenced\t96\t-\ntank\tmountpoint\t/tank\tdefault\ntank/vol\tused\t4096\t-\n",
        )
        .unwrap();
        let table = render_table(&records);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "NAME      USED    AVAIL   REFER  MOUNTPOINT");
        assert_eq!(lines[1], "tank      1.5KiB  1.0GiB  96.0B  /tank");
        assert_eq!(lines[2], "tank/vol  4.0KiB  -       -      -");
    }

    #[test]
    fn test_render_property() {
        let property = Property::new("compression", "lz4", PropertySource::Local);
        assert_eq!(
            render_property("tank/a", &property),
            "tank/a\tcompression\tlz4\tlocal"
        );
    }

    #[test]
    fn test_render_progress() {
        let mut event = TransferProgress {
            kind: "full".to_string(),
            source_name: "tank/a@s1".to_string(),
            base_name: None,
            source_size: 1024,
            estimated_send_size: 2048,
            has_report: false,
            report: None,
            error: None,
        };
        assert_eq!(
            render_progress(&event),
            "full send of tank/a@s1, estimated 2.0KiB"
        );

        event.has_report = true;
        event.report = Some(ProgressReport {
            timestamp: "10:00:00".to_string(),
            bytes_sent: 1024,
            current_unit: "tank/a@s1".to_string(),
        });
        assert_eq!(
            render_progress(&event),
            "10:00:00  1.0KiB / 2.0KiB  tank/a@s1"
        );
    }
}
