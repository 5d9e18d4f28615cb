// =============================================================================
// Presenter — SVG line chart of a spread report
// =============================================================================
//
// Two lines over the aligned dates: the ratio, and its rolling average drawn
// only where it is defined. The y-range covers every plotted value with a
// small margin. Output is a standalone SVG document.
// =============================================================================

use std::fmt::Write as _;

use crate::spread::SpreadReport;

const MARGIN_LEFT: f64 = 64.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 48.0;
const MARGIN_BOTTOM: f64 = 40.0;

const RATIO_COLOR: &str = "#1f77b4";
const AVERAGE_COLOR: &str = "#ff7f0e";

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Vertical range for the plotted values, padded by 5 % (or ±1 % of the
/// level when the series is flat).
fn y_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;
    let span = max - min;
    let pad = if span > 0.0 {
        span * 0.05
    } else {
        (min.abs() * 0.01).max(1e-9)
    };
    Some((min - pad, max + pad))
}

fn polyline(points: &[(f64, f64)], color: &str) -> String {
    let mut coords = String::with_capacity(points.len() * 16);
    for (i, (x, y)) in points.iter().enumerate() {
        if i > 0 {
            coords.push(' ');
        }
        let _ = write!(coords, "{x:.1},{y:.1}");
    }
    format!(
        r#"<polyline fill="none" stroke="{color}" stroke-width="1.5" points="{coords}"/>"#
    )
}

/// Render `report` as an SVG chart of `width` × `height` pixels.
pub fn render_svg(report: &SpreadReport, width: u32, height: u32) -> String {
    let (w, h) = (width as f64, height as f64);
    let plot_w = (w - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
    let plot_h = (h - MARGIN_TOP - MARGIN_BOTTOM).max(1.0);
    let rows = &report.series.rows;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif" font-size="12">"#
    );
    let _ = write!(
        svg,
        r#"<text x="{MARGIN_LEFT}" y="20" font-size="15" font-weight="bold">{}</text>"#,
        escape(&report.title)
    );

    let plotted = report
        .series
        .ratios()
        .chain(rows.iter().filter_map(|r| r.rolling_average));
    let Some((y_min, y_max)) = y_range(plotted) else {
        svg.push_str("</svg>");
        return svg;
    };

    let n = rows.len();
    let x_at = |i: usize| {
        if n <= 1 {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + plot_w * i as f64 / (n - 1) as f64
        }
    };
    let y_at = |v: f64| MARGIN_TOP + plot_h * (1.0 - (v - y_min) / (y_max - y_min));

    // Frame and y-axis extremes.
    let _ = write!(
        svg,
        r##"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w:.1}" height="{plot_h:.1}" fill="none" stroke="#ccc"/>"##
    );
    let _ = write!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{y_max:.3}</text>"#,
        MARGIN_LEFT - 6.0,
        MARGIN_TOP + 4.0
    );
    let _ = write!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{y_min:.3}</text>"#,
        MARGIN_LEFT - 6.0,
        MARGIN_TOP + plot_h
    );

    // Date labels for the first and last aligned rows.
    let (first, last) = (report.series.dates().next(), report.series.dates().last());
    if let (Some(first), Some(last)) = (first, last) {
        let y = MARGIN_TOP + plot_h + 18.0;
        let _ = write!(
            svg,
            r#"<text x="{MARGIN_LEFT}" y="{y:.1}">{}</text>"#,
            first
        );
        let _ = write!(
            svg,
            r#"<text x="{:.1}" y="{y:.1}" text-anchor="end">{}</text>"#,
            MARGIN_LEFT + plot_w,
            last
        );
    }

    let ratio_pts: Vec<(f64, f64)> = report
        .series
        .ratios()
        .enumerate()
        .map(|(i, v)| (x_at(i), y_at(v)))
        .collect();
    svg.push_str(&polyline(&ratio_pts, RATIO_COLOR));

    let avg_pts: Vec<(f64, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.rolling_average.map(|v| (x_at(i), y_at(v))))
        .collect();
    if !avg_pts.is_empty() {
        svg.push_str(&polyline(&avg_pts, AVERAGE_COLOR));
    }

    // Legend.
    let legend_y = 36.0;
    let legend = [
        (RATIO_COLOR, report.ratio_label.as_str()),
        (AVERAGE_COLOR, report.average_label.as_str()),
    ];
    for (k, (color, label)) in legend.iter().enumerate() {
        let x = MARGIN_LEFT + k as f64 * 140.0;
        let _ = write!(
            svg,
            r#"<line x1="{x:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{color}" stroke-width="3"/><text x="{:.1}" y="{legend_y:.1}">{}</text>"#,
            legend_y - 4.0,
            x + 18.0,
            legend_y - 4.0,
            x + 24.0,
            escape(label)
        );
    }

    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spread::builder::{RatioRow, RatioSeries};
    use crate::types::{Instrument, Lookback};
    use chrono::NaiveDate;

    fn report(rows: Vec<RatioRow>, window: usize) -> SpreadReport {
        SpreadReport {
            request_id: uuid::Uuid::nil(),
            instrument_a: Instrument::new("7203.T", "トヨタ自動車"),
            instrument_b: Instrument::new("7267.T", "ホンダ & Co"),
            lookback: Lookback::OneYear,
            title: "トヨタ自動車 vs ホンダ & Co のさや比推移".into(),
            ratio_label: "さや比".into(),
            average_label: format!("{window}日移動平均"),
            series: RatioSeries { window, rows },
        }
    }

    fn row(day: u32, ratio: f64, avg: Option<f64>) -> RatioRow {
        RatioRow {
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            close_a: ratio,
            close_b: 1.0,
            ratio,
            rolling_average: avg,
        }
    }

    #[test]
    fn draws_both_lines_when_average_exists() {
        let svg = render_svg(
            &report(
                vec![row(1, 2.0, None), row(2, 2.2, Some(2.1)), row(5, 2.4, Some(2.3))],
                2,
            ),
            640,
            320,
        );
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("2024-02-01"));
        assert!(svg.contains("2024-02-05"));
        assert!(svg.contains("2日移動平均"));
        // Title is escaped.
        assert!(svg.contains("ホンダ &amp; Co"));
    }

    #[test]
    fn ratio_only_when_window_not_reached() {
        let svg = render_svg(&report(vec![row(1, 1.0, None), row(2, 1.5, None)], 75), 640, 320);
        assert_eq!(svg.matches("<polyline").count(), 1);
    }

    #[test]
    fn flat_single_row_does_not_divide_by_zero() {
        let svg = render_svg(&report(vec![row(1, 3.0, Some(3.0))], 1), 300, 200);
        assert!(!svg.contains("NaN"));
        assert!(!svg.contains("inf"));
    }

    #[test]
    fn y_range_pads_extremes() {
        let (lo, hi) = y_range([1.0, 3.0].into_iter()).unwrap();
        assert!(lo < 1.0 && hi > 3.0);
        assert!(y_range(std::iter::empty()).is_none());
    }
}
