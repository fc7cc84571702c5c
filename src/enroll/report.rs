//! CSV export of the reports returned by the backend.

use std::collections::BTreeSet;

use serde_json::Value;

/// Render report objects as CSV.
///
/// Columns are the union of every report's keys, sorted by name. Missing
/// fields and `null` become empty cells; nested values are written as JSON.
pub fn reports_to_csv(reports: &[Value]) -> String {
    let columns: BTreeSet<&str> = reports
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|object| object.keys().map(String::as_str))
        .collect();
    if columns.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    push_row(&mut out, columns.iter().map(|c| (*c).to_string()));
    for report in reports {
        push_row(
            &mut out,
            columns
                .iter()
                .map(|column| report.get(*column).map(cell).unwrap_or_default()),
        );
    }
    out
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    let row: Vec<String> = cells.map(|c| escape(&c)).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_columns_are_union_of_keys() {
        let reports = vec![
            json!({"student_name": "Ada", "sessions_count": 4}),
            json!({"student_name": "Grace", "avg_attention": 91.5}),
        ];
        assert_eq!(
            reports_to_csv(&reports),
            "avg_attention,sessions_count,student_name\r\n,4,Ada\r\n91.5,,Grace\r\n"
        );
    }

    #[test]
    fn test_fields_are_quoted_when_needed() {
        let reports = vec![json!({"note": "late, \"tired\"", "flags": null})];
        assert_eq!(
            reports_to_csv(&reports),
            "flags,note\r\n,\"late, \"\"tired\"\"\"\r\n"
        );
    }

    #[test]
    fn test_no_reports() {
        assert_eq!(reports_to_csv(&[]), "");
    }
}
