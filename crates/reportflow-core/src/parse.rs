//! Conversion of raw report tables into plain key-value records.

use serde_json::{Map, Number, Value};

use crate::report::RawReportResult;

/// One flattened row: header name → string dimension or numeric metric.
pub type Record = Map<String, Value>;

/// Numeric value if the text parses to a finite float, the raw string otherwise.
pub fn coerce_metric(raw: &str) -> Value {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Lenient numeric read used by the unifier; unparsable text counts as zero.
pub fn metric_number(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse an aggregate (dimensionless) report into a single record.
///
/// Only the first row is read. Returns an empty record for a missing result
/// or a result without rows.
pub fn parse_single(result: Option<&RawReportResult>) -> Record {
    let mut record = Record::new();
    let Some(result) = result else {
        return record;
    };
    let Some(row) = result.rows.first() else {
        return record;
    };
    for (header, value) in result.metric_headers.iter().zip(&row.metric_values) {
        record.insert(header.clone(), coerce_metric(value));
    }
    record
}

/// Parse a dimensional report into one record per row, in source order.
pub fn parse_multi(result: Option<&RawReportResult>) -> Vec<Record> {
    let Some(result) = result else {
        return Vec::new();
    };
    result
        .rows
        .iter()
        .map(|row| {
            let mut record = Record::new();
            for (header, value) in result.dimension_headers.iter().zip(&row.dimension_values) {
                record.insert(header.clone(), Value::String(value.clone()));
            }
            for (header, value) in result.metric_headers.iter().zip(&row.metric_values) {
                record.insert(header.clone(), coerce_metric(value));
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::report::RawRow;

    fn table(dims: &[&str], metrics: &[&str], rows: &[(&[&str], &[&str])]) -> RawReportResult {
        RawReportResult {
            dimension_headers: dims.iter().map(|s| s.to_string()).collect(),
            metric_headers: metrics.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|(d, m)| RawRow {
                    dimension_values: d.iter().map(|s| s.to_string()).collect(),
                    metric_values: m.iter().map(|s| s.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn single_reads_first_row_with_fallback() {
        let result = table(
            &[],
            &["activeUsers", "bounceRate", "currencyCode"],
            &[(&[], &["120", "0.42", "KRW"])],
        );
        let record = parse_single(Some(&result));
        assert_eq!(record["activeUsers"], json!(120.0));
        assert_eq!(record["bounceRate"], json!(0.42));
        assert_eq!(record["currencyCode"], json!("KRW"));
    }

    #[test]
    fn single_is_empty_for_missing_or_rowless_results() {
        assert!(parse_single(None).is_empty());
        let empty = table(&[], &["activeUsers"], &[]);
        assert!(parse_single(Some(&empty)).is_empty());
    }

    #[test]
    fn multi_keeps_row_order_and_dimension_strings() {
        let result = table(
            &["hour"],
            &["sessions"],
            &[(&["09"], &["4"]), (&["02"], &["11"]), (&["17"], &["n/a"])],
        );
        let rows = parse_multi(Some(&result));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["hour"], json!("09"));
        assert_eq!(rows[1]["sessions"], json!(11.0));
        assert_eq!(rows[2]["sessions"], json!("n/a"));
        assert!(parse_multi(None).is_empty());
    }

    #[test]
    fn metric_number_treats_garbage_as_zero() {
        assert_eq!(metric_number(" 12.5 "), 12.5);
        assert_eq!(metric_number("NaN"), 0.0);
        assert_eq!(metric_number(""), 0.0);
    }
}
