//!
//! HTML email body
//!
use super::{record_cells, Cell};
use crate::aggregate::Aggregate;
use chrono::NaiveDateTime;
use std::fmt::Write;

/// Table headers, the data columns with the success rate after the failed requests
pub const HEADERS: [&str; 12] = [
    "Organization Name",
    "Environment Name",
    "Application ID",
    "Request Volume",
    "Successful Requests",
    "Failed Requests",
    "Request Success Rate",
    "Response Time (ms)",
    "CPU Utilization (%)",
    "Memory Pressure (%)",
    "Memory Utilization (MB)",
    "Total Memory (MB)",
];

// Data cells before the success rate column
const SUCCESS_RATE_AT: usize = 6;

/// Report title shared by the heading and the email subject
#[must_use]
pub fn title(environment: &str) -> String {
    format!("Anypoint Application Report Metrics - {environment}")
}

/// Timestamp as shown in the report, e.g. `10/15/2026, 3:04:05 PM`
#[must_use]
pub fn format_timestamp(generated_at: &NaiveDateTime) -> String {
    generated_at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// Escape text for use in HTML element content
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the metrics table
#[must_use]
pub fn table(aggregate: &Aggregate) -> String {
    let mut html = String::from("<table border=\"1\" style=\"border-collapse: collapse; width: 100%;\">\n");

    html.push_str("<tr>");
    for header in HEADERS {
        let _ = write!(html, "<th>{header}</th>");
    }
    html.push_str("</tr>\n");

    for record in aggregate {
        let cells = record_cells(record);
        let (before, after) = cells.split_at(SUCCESS_RATE_AT);

        html.push_str("<tr>");
        before
            .iter()
            .chain(std::iter::once(&Cell::Text(record.success_rate())))
            .chain(after)
            .for_each(|cell| {
                let _ = write!(html, "<td>{}</td>", escape(&cell.to_string()));
            });
        html.push_str("</tr>\n");
    }

    html.push_str("</table>\n");
    html
}

/// Render the full email body
#[must_use]
pub fn render(
    aggregate: &Aggregate,
    environment: &str,
    time_window: &str,
    generated_at: &NaiveDateTime,
) -> String {
    let mut html = String::new();
    let _ = writeln!(
        html,
        "<h1>{} - {}</h1>",
        escape(&title(environment)),
        escape(time_window)
    );
    let _ = writeln!(
        html,
        "<p>Report generated on: {}</p>",
        format_timestamp(generated_at)
    );
    html.push_str(
        "<p>This report provides detailed metrics for the specified environment and time duration.</p>\n",
    );
    html.push_str(&table(aggregate));
    html
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::monitoring::ApplicationEntry;

    fn timestamp() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 10, 15)
            .unwrap()
            .and_hms_opt(15, 4, 5)
            .unwrap()
    }

    fn aggregate() -> Aggregate {
        Aggregate::seed(&[
            ApplicationEntry {
                app_id: "a1".into(),
                org_name: Some("Org".into()),
                env_name: Some("Prod".into()),
                request_volume: Some(200),
                successful_requests: Some(150),
                failed_requests: Some(50),
                ..Default::default()
            },
            ApplicationEntry {
                app_id: "<script>".into(),
                ..Default::default()
            },
        ])
        .0
    }

    #[test]
    fn header_and_timestamp() {
        let html = render(&aggregate(), "Production", "from/now-1d/to/now", &timestamp());
        assert!(html.starts_with(
            "<h1>Anypoint Application Report Metrics - Production - from/now-1d/to/now</h1>\n"
        ));
        assert!(html.contains("<p>Report generated on: 10/15/2026, 3:04:05 PM</p>"));
    }

    #[test]
    fn success_rate_column() {
        let html = table(&aggregate());
        assert!(html.contains(
            "<tr><td>Org</td><td>Prod</td><td>a1</td><td>200</td><td>150</td><td>50</td><td>75.00%</td><td></td>"
        ));
        assert_eq!(html.matches("<th>").count(), 12);
        assert_eq!(html.matches("<tr>").count(), 3);
    }

    #[test]
    fn cells_are_escaped() {
        let html = table(&aggregate());
        assert!(html.contains("<td>&lt;script&gt;</td>"));
        assert!(!html.contains("<td><script>"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let aggregate = aggregate();
        let first = render(&aggregate, "Production", "from/now-1d/to/now", &timestamp());
        let second = render(&aggregate, "Production", "from/now-1d/to/now", &timestamp());
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn empty_aggregate_still_has_headers() {
        let html = table(&Aggregate::new());
        assert_eq!(html.matches("<th>").count(), 12);
        assert_eq!(html.matches("<td>").count(), 0);
    }
}
