//! Tabular export of value series as CSV or HTML.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};

use fews_common::time::format_iso;
use fews_common::{FewsError, FewsResult, ValueSeries};

/// Header of the first column.
pub const TIMESTAMP_HEADER: &str = "timestamp";

/// Series laid out as rows of timestamps with one column per location.
///
/// Every value column is headed by the parameter's display name. When more
/// than one location is present a second header row names the locations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    pub headers: Vec<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl ValueTable {
    pub fn from_series(series: &[ValueSeries]) -> Self {
        let mut header = vec![TIMESTAMP_HEADER.to_string()];
        header.extend(series.iter().map(|s| s.parameter.name.clone()));

        let mut headers = vec![header];
        if series.len() > 1 {
            let mut names = vec![String::new()];
            names.extend(series.iter().map(|s| s.location.name.clone()));
            headers.push(names);
        }

        let mut by_time: BTreeMap<DateTime<FixedOffset>, Vec<Option<f64>>> = BTreeMap::new();
        for (column, s) in series.iter().enumerate() {
            for event in s.events() {
                by_time
                    .entry(event.timestamp)
                    .or_insert_with(|| vec![None; series.len()])[column] = event.value;
            }
        }

        let rows = by_time
            .into_iter()
            .map(|(timestamp, values)| {
                let mut row = Vec::with_capacity(values.len() + 1);
                row.push(format_iso(&timestamp));
                row.extend(values.into_iter().map(format_value));
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn to_csv(&self) -> FewsResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in self.headers.iter().chain(self.rows.iter()) {
            writer
                .write_record(record)
                .map_err(|e| FewsError::Render(format!("CSV write failed: {}", e)))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| FewsError::Render(format!("CSV flush failed: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| FewsError::Render(format!("CSV not UTF-8: {}", e)))
    }

    pub fn to_html(&self) -> String {
        let mut html = String::from("<table class=\"timeseries\">\n<thead>\n");
        for header in &self.headers {
            push_row(&mut html, "th", header);
        }
        html.push_str("</thead>\n<tbody>\n");
        for row in &self.rows {
            push_row(&mut html, "td", row);
        }
        html.push_str("</tbody>\n</table>\n");
        html
    }
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn push_row(html: &mut String, tag: &str, cells: &[String]) {
    html.push_str("<tr>");
    for cell in cells {
        html.push('<');
        html.push_str(tag);
        html.push('>');
        html.push_str(&escape_html(cell));
        html.push_str("</");
        html.push_str(tag);
        html.push('>');
    }
    html.push_str("</tr>\n");
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
