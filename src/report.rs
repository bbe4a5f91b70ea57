use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, SecondsFormat};
use html_escape::encode_safe;

use crate::models::{TrendDirection, TrendRow};
use crate::trends::summarize;
use crate::window::TimeRange;

pub const CSV_HEADER: [&str; 9] = [
    "Name",
    "Type",
    "Category",
    "Discount",
    "Recommendation Count",
    "Avg Confidence %",
    "Avg Position",
    "Trend",
    "Last Recommended",
];

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub range: TimeRange,
    /// Milliseconds since the epoch; printed in the report header.
    pub generated_at: i64,
    pub top_items: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub item_count: usize,
    pub recommendation_count: usize,
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn rounded(value: f64) -> i64 {
    value.round() as i64
}

pub fn summarize_by_category(rows: &[TrendRow]) -> Vec<CategorySummary> {
    let mut map: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for row in rows {
        let entry = map.entry(row.descriptor.category.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += row.trend.count;
    }

    let mut summaries: Vec<CategorySummary> = map
        .into_iter()
        .map(|(category, (item_count, recommendation_count))| CategorySummary {
            category: category.to_string(),
            item_count,
            recommendation_count,
        })
        .collect();

    summaries.sort_by(|a, b| b.recommendation_count.cmp(&a.recommendation_count));
    summaries
}

pub fn render_csv(rows: &[TrendRow]) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([
            row.descriptor.name.clone(),
            row.descriptor.kind.clone(),
            row.descriptor.category.clone(),
            format!("{}%", row.descriptor.discount_percent),
            row.trend.count.to_string(),
            rounded(row.trend.avg_confidence).to_string(),
            rounded(row.trend.avg_position).to_string(),
            row.trend.trend_direction.as_str().to_string(),
            format_timestamp(row.trend.last_recommended_at),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

const STYLE: &str = "body{font-family:Helvetica,Arial,sans-serif;color:#1f2933;margin:32px;}\
h1{margin-bottom:4px;}\
.meta{color:#52606d;margin-bottom:24px;}\
.tiles{display:flex;gap:16px;margin-bottom:24px;}\
.tile{flex:1;border:1px solid #d9e2ec;border-radius:8px;padding:12px 16px;}\
.tile .value{font-size:24px;font-weight:bold;}\
table{width:100%;border-collapse:collapse;margin-bottom:24px;}\
th,td{border-bottom:1px solid #d9e2ec;padding:6px 8px;text-align:left;}\
th{background:#f0f4f8;}\
tr.top td{background:#fff8e1;font-weight:bold;}\
.trend-up{color:#2f855a;}.trend-down{color:#c53030;}.trend-stable{color:#52606d;}\
@media print{body{margin:0;}}";

fn trend_arrow(direction: TrendDirection) -> &'static str {
    match direction {
        TrendDirection::Up => "&#9650;",
        TrendDirection::Down => "&#9660;",
        TrendDirection::Stable => "&#9644;",
    }
}

/// Self-contained HTML document suitable for print-to-PDF.
pub fn render_html(rows: &[TrendRow], options: &ReportOptions) -> String {
    let summary = summarize(rows);
    let categories = summarize_by_category(rows);
    let mut output = String::new();

    let generated = DateTime::from_timestamp_millis(options.generated_at)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| options.generated_at.to_string());

    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(output, "<html lang=\"en\">");
    let _ = writeln!(output, "<head>");
    let _ = writeln!(output, "<meta charset=\"utf-8\">");
    let _ = writeln!(output, "<title>Recommendation Trends Report</title>");
    let _ = writeln!(output, "<style>{STYLE}</style>");
    let _ = writeln!(output, "</head>");
    let _ = writeln!(output, "<body>");
    let _ = writeln!(output, "<h1>Recommendation Trends Report</h1>");
    let _ = writeln!(
        output,
        "<p class=\"meta\">Generated {} &middot; {} &middot; {} bundles</p>",
        generated,
        options.range.label(),
        summary.unique_items
    );

    let _ = writeln!(output, "<div class=\"tiles\">");
    for (label, value) in [
        ("Total recommendations", summary.total_recommendations.to_string()),
        ("Unique items", summary.unique_items.to_string()),
        ("Mean confidence", format!("{}%", rounded(summary.mean_confidence))),
    ] {
        let _ = writeln!(
            output,
            "<div class=\"tile\"><div class=\"label\">{label}</div><div class=\"value\">{value}</div></div>"
        );
    }
    let _ = writeln!(output, "</div>");

    let _ = writeln!(output, "<h2>Top Recommended Items</h2>");
    if rows.is_empty() {
        let _ = writeln!(output, "<p>No recommendations recorded for this window.</p>");
    } else {
        let _ = writeln!(
            output,
            "<table>\n<thead><tr><th>Rank</th><th>Name</th><th>Type</th><th>Category</th>\
             <th>Count</th><th>Avg Confidence</th><th>Trend</th></tr></thead>\n<tbody>"
        );
        for (index, row) in rows.iter().take(options.top_items).enumerate() {
            let rank = index + 1;
            let (class, marker) = if rank == 1 {
                (" class=\"top\"", "&#9733; ")
            } else {
                ("", "")
            };
            let direction = row.trend.trend_direction.as_str();
            let _ = writeln!(
                output,
                "<tr{class}><td>{marker}{rank}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                 <td>{}%</td><td class=\"trend-{direction}\">{} {direction}</td></tr>",
                encode_safe(&row.descriptor.name),
                encode_safe(&row.descriptor.kind),
                encode_safe(&row.descriptor.category),
                row.trend.count,
                rounded(row.trend.avg_confidence),
                trend_arrow(row.trend.trend_direction),
            );
        }
        let _ = writeln!(output, "</tbody>\n</table>");
    }

    let _ = writeln!(output, "<h2>Item Details</h2>");
    if rows.is_empty() {
        let _ = writeln!(output, "<p>No item metrics available.</p>");
    } else {
        let _ = writeln!(
            output,
            "<table>\n<thead><tr><th>Name</th><th>Discount</th><th>Count</th>\
             <th>Avg Position</th><th>Prior Window</th><th>Last Recommended</th></tr></thead>\n<tbody>"
        );
        for row in rows {
            let prior = match options.range {
                TimeRange::All => "-".to_string(),
                _ => row.trend.previous_count.to_string(),
            };
            let _ = writeln!(
                output,
                "<tr><td>{}</td><td>{}%</td><td>{}</td><td>{:.1}</td><td>{}</td><td>{}</td></tr>",
                encode_safe(&row.descriptor.name),
                row.descriptor.discount_percent,
                row.trend.count,
                row.trend.avg_position,
                prior,
                format_timestamp(row.trend.last_recommended_at),
            );
        }
        let _ = writeln!(output, "</tbody>\n</table>");
    }

    let _ = writeln!(output, "<h2>Category Mix</h2>");
    if categories.is_empty() {
        let _ = writeln!(output, "<p>No categories recorded for this window.</p>");
    } else {
        let _ = writeln!(output, "<ul>");
        for category in &categories {
            let _ = writeln!(
                output,
                "<li>{}: {} recommendations across {} items</li>",
                encode_safe(&category.category),
                category.recommendation_count,
                category.item_count
            );
        }
        let _ = writeln!(output, "</ul>");
    }

    if options.range == TimeRange::All {
        let _ = writeln!(
            output,
            "<p class=\"meta\">Trend is reported as stable for all-time reports: there is no preceding window to compare against.</p>"
        );
    }

    let _ = writeln!(output, "</body>");
    let _ = writeln!(output, "</html>");
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemDescriptor, ItemTrend};

    fn sample_row(
        name: &str,
        category: &str,
        count: usize,
        avg_confidence: f64,
        avg_position: f64,
    ) -> TrendRow {
        TrendRow {
            trend: ItemTrend {
                item_id: name.to_lowercase(),
                count,
                avg_confidence,
                avg_position,
                last_recommended_at: 1_700_000_000_000,
                trend_direction: TrendDirection::Up,
                previous_count: 1,
            },
            descriptor: ItemDescriptor {
                name: name.to_string(),
                category: category.to_string(),
                kind: "bundle".to_string(),
                discount_percent: 15,
            },
        }
    }

    fn sample_options() -> ReportOptions {
        ReportOptions {
            range: TimeRange::Last7Days,
            generated_at: 1_700_000_000_000,
            top_items: 10,
        }
    }

    #[test]
    fn csv_has_header_and_rounded_values() {
        let rows = vec![sample_row("Starter", "Finance", 3, 84.6, 1.4)];
        let csv = render_csv(&rows).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Name,Type,Category,Discount,Recommendation Count,Avg Confidence %,Avg Position,Trend,Last Recommended"
        );
        assert_eq!(
            lines[1],
            "Starter,bundle,Finance,15%,3,85,1,up,2023-11-14T22:13:20Z"
        );
    }

    #[test]
    fn csv_quotes_commas_and_quotes() {
        let rows = vec![sample_row("Pro, \"Plus\"", "Finance", 1, 50.0, 1.0)];
        let csv = render_csv(&rows).unwrap();
        let line = csv.lines().nth(1).unwrap();

        assert!(line.starts_with("\"Pro, \"\"Plus\"\"\",bundle,"));
    }

    #[test]
    fn csv_round_trips_counts_and_rounded_metrics() {
        let rows = vec![
            sample_row("Pro, \"Plus\"", "Finance", 4, 72.4, 2.6),
            sample_row("Line\nBreak", "Tools", 2, 60.0, 1.0),
        ];
        let rendered = render_csv(&rows).unwrap();

        let mut reader = csv::Reader::from_reader(rendered.as_bytes());
        let parsed: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(parsed.len(), 2);
        assert_eq!(&parsed[0][0], "Pro, \"Plus\"");
        assert_eq!(parsed[0][4].parse::<usize>().unwrap(), 4);
        assert_eq!(parsed[0][5].parse::<i64>().unwrap(), 72);
        assert_eq!(parsed[0][6].parse::<i64>().unwrap(), 3);
        assert_eq!(&parsed[1][0], "Line\nBreak");
        assert_eq!(parsed[1][4].parse::<usize>().unwrap(), 2);
    }

    #[test]
    fn empty_rows_render_header_only_csv() {
        let csv = render_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn rendering_is_deterministic() {
        let rows = vec![
            sample_row("Starter", "Finance", 3, 84.6, 1.4),
            sample_row("Creator", "Art", 2, 70.0, 2.0),
        ];
        assert_eq!(render_csv(&rows).unwrap(), render_csv(&rows).unwrap());
        assert_eq!(
            render_html(&rows, &sample_options()),
            render_html(&rows, &sample_options())
        );
    }

    #[test]
    fn html_escapes_descriptor_text() {
        let rows = vec![sample_row("<script>alert(1)</script>", "A & B", 1, 50.0, 1.0)];
        let html = render_html(&rows, &sample_options());

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("A &amp; B"));
    }

    #[test]
    fn html_contains_header_tiles_and_rank_marker() {
        let rows = vec![
            sample_row("Starter", "Finance", 3, 80.0, 1.0),
            sample_row("Creator", "Art", 1, 60.0, 2.0),
        ];
        let html = render_html(&rows, &sample_options());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Generated 2023-11-14 22:13 UTC"));
        assert!(html.contains("Last 7 days"));
        assert!(html.contains("2 bundles"));
        assert!(html.contains("<div class=\"value\">4</div>"));
        assert!(html.contains("<div class=\"value\">70%</div>"));
        assert_eq!(html.matches("class=\"top\"").count(), 1);
        assert!(!html.contains("<link"));
        assert!(!html.contains("<script"));
    }

    #[test]
    fn top_items_table_respects_limit() {
        let rows = vec![
            sample_row("One", "Finance", 3, 80.0, 1.0),
            sample_row("Two", "Finance", 2, 70.0, 1.0),
            sample_row("Three", "Finance", 1, 60.0, 1.0),
        ];
        let options = ReportOptions {
            top_items: 2,
            ..sample_options()
        };
        let html = render_html(&rows, &options);
        let top_section = html
            .split("<h2>Item Details</h2>")
            .next()
            .unwrap_or_default();

        assert!(top_section.contains("<td>Two</td>"));
        assert!(!top_section.contains("<td>Three</td>"));
    }

    #[test]
    fn prior_window_column_is_blank_for_all_time() {
        let rows = vec![sample_row("Starter", "Finance", 3, 80.0, 1.0)];
        let all_time = ReportOptions {
            range: TimeRange::All,
            ..sample_options()
        };

        let html = render_html(&rows, &all_time);
        assert!(html.contains("<td>1.0</td><td>-</td>"));

        let weekly = render_html(&rows, &sample_options());
        assert!(weekly.contains("<td>1.0</td><td>1</td>"));
    }

    #[test]
    fn empty_html_is_a_valid_minimal_document() {
        let html = render_html(&[], &sample_options());
        assert!(html.contains("No recommendations recorded for this window."));
        assert!(html.contains("0 bundles"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn categories_are_summarized_by_recommendation_volume() {
        let rows = vec![
            sample_row("One", "Finance", 1, 80.0, 1.0),
            sample_row("Two", "Art", 5, 70.0, 1.0),
            sample_row("Three", "Finance", 2, 60.0, 1.0),
        ];
        let categories = summarize_by_category(&rows);

        assert_eq!(categories[0].category, "Art");
        assert_eq!(categories[0].recommendation_count, 5);
        assert_eq!(categories[1].category, "Finance");
        assert_eq!(categories[1].item_count, 2);
        assert_eq!(categories[1].recommendation_count, 3);
    }
}
