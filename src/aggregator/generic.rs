//! Generic column-to-metric extraction.
//!
//! Each data row of a family dump becomes one sample: the first seven cells
//! are the label values, the descriptor's value column is the sample value.

use tracing::{debug, warn};

use super::MetricSample;
use crate::descriptors::MetricDescriptor;
use crate::error::PmError;
use crate::tabular::{Dataset, HEADER_ROWS};

/// Leading label cells of every PM data row.
pub const LABEL_COLUMNS: usize = 7;

/// Converts a family dump into samples for one descriptor.
///
/// A single malformed value cell fails the whole family: it means the dump
/// layout does not match the descriptor. An unknown metric type yields no
/// samples and a warning.
pub fn extract_generic(
    dataset: &Dataset,
    descriptor: &MetricDescriptor,
) -> Result<Vec<MetricSample>, PmError> {
    let Some(kind) = descriptor.metric_kind() else {
        warn!(
            metric = %descriptor.name,
            kind = %descriptor.kind,
            "Metric type support only counter|gauge, skip"
        );
        return Ok(Vec::new());
    };

    if !dataset.has_data() {
        debug!(metric = %descriptor.name, "Dump has no data rows");
        return Ok(Vec::new());
    }

    let mut samples = Vec::with_capacity(dataset.data_rows().len());
    for (offset, row) in dataset.data_rows().iter().enumerate() {
        let row_no = offset + HEADER_ROWS;
        let context = || format!("{} row {}", descriptor.description, row_no);

        if row.len() < LABEL_COLUMNS {
            return Err(PmError::parse(
                context(),
                format!("expected {} label cells, found {}", LABEL_COLUMNS, row.len()),
            ));
        }
        let labels = row[..LABEL_COLUMNS].to_vec();

        let raw = row.get(descriptor.value_column).ok_or_else(|| {
            PmError::parse(
                context(),
                format!("value column {} out of range", descriptor.value_column),
            )
        })?;
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|e| PmError::parse(context(), format!("'{raw}': {e}")))?;

        samples.push(MetricSample::new(descriptor, kind, labels, value));
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::MetricKind;

    fn descriptor(kind: &str) -> MetricDescriptor {
        MetricDescriptor {
            name: "du_power".into(),
            prefix: "p5g_exporter".into(),
            kind: kind.into(),
            description: "DU_Power_Consumption".into(),
            labels: (0..7).map(|i| format!("l{i}")).collect(),
            value_column: 7,
            url: None,
        }
    }

    fn dataset(values: &[&str]) -> Dataset {
        let mut rows = vec![vec!["DU Power Consumption".to_string()], vec![], vec![]];
        for (i, v) in values.iter().enumerate() {
            let mut row: Vec<String> = (0..7).map(|c| format!("r{i}c{c}")).collect();
            row.push(v.to_string());
            rows.push(row);
        }
        Dataset::from_rows(rows)
    }

    #[test]
    fn test_one_sample_per_row() {
        let samples = extract_generic(&dataset(&["1.5", "2", "3e2"]), &descriptor("gauge")).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].labels[6], "r0c6");
        assert_eq!(samples[2].value, 300.0);
        assert_eq!(samples[1].kind, MetricKind::Gauge);
        assert_eq!(samples[0].name, "p5g_exporter_du_power");
    }

    #[test]
    fn test_header_only_dump_yields_nothing() {
        let samples = extract_generic(&dataset(&[]), &descriptor("counter")).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_malformed_value_fails_family() {
        let err = extract_generic(&dataset(&["1", "n/a"]), &descriptor("gauge")).unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("row 4"));
    }

    #[test]
    fn test_unknown_kind_yields_nothing() {
        let samples = extract_generic(&dataset(&["1", "n/a"]), &descriptor("summary")).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_short_row_is_parse_error() {
        let ds = Dataset::from_rows(vec![
            vec![],
            vec![],
            vec![],
            vec!["only".into(), "three".into(), "cells".into()],
        ]);
        assert!(extract_generic(&ds, &descriptor("gauge")).is_err());
    }

    #[test]
    fn test_value_column_out_of_range() {
        let mut d = descriptor("gauge");
        d.value_column = 42;
        assert!(extract_generic(&dataset(&["1"]), &d).is_err());
    }
}
