//! Minimal SVG line charts for training curves and learner comparisons.

use std::path::Path;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 140.0;
const MARGIN_BOTTOM: f64 = 70.0;
const MARGIN_LEFT: f64 = 80.0;
const TICKS: usize = 5;

const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";

#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub color: String,
    pub points: Vec<(f64, f64)>,
}

impl DataSeries {
    pub fn new(name: &str, color: &str, points: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            points,
        }
    }
}

fn x_range(series: &[DataSeries]) -> (f64, f64) {
    let xs = series.iter().flat_map(|s| s.points.iter().map(|p| p.0));
    let (lo, hi) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
        (lo.min(x), hi.max(x))
    });
    if !lo.is_finite() {
        (0.0, 1.0)
    } else if hi - lo < f64::EPSILON {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

/// Renders `series` into an SVG document. The y axis is fixed to `y_range`
/// so charts of different runs line up.
pub fn render_line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[DataSeries],
    y_range: (f64, f64),
) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let (x_min, x_max) = x_range(series);
    let (y_min, y_max) = y_range;
    let sx = |x: f64| MARGIN_LEFT + (x - x_min) / (x_max - x_min) * plot_width;
    let sy = |y: f64| {
        let y = y.clamp(y_min, y_max);
        MARGIN_TOP + plot_height - (y - y_min) / (y_max - y_min) * plot_height
    };

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}"><rect width="{w}" height="{h}" fill="white"/>"#,
        w = CHART_WIDTH,
        h = CHART_HEIGHT
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{COLOR_AXIS}">{title}</text>"#,
        MARGIN_LEFT + plot_width / 2.0
    ));

    for i in 0..=TICKS {
        let fy = y_min + (y_max - y_min) * i as f64 / TICKS as f64;
        let fx = x_min + (x_max - x_min) * i as f64 / TICKS as f64;
        let (px, py) = (sx(fx), sy(fy));
        svg.push_str(&format!(
            r#"<line x1="{MARGIN_LEFT}" y1="{py}" x2="{}" y2="{py}" stroke="{COLOR_GRID}"/><text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{COLOR_AXIS}">{fy:.2}</text>"#,
            MARGIN_LEFT + plot_width,
            MARGIN_LEFT - 8.0,
            py + 4.0
        ));
        svg.push_str(&format!(
            r#"<text x="{px}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="12" fill="{COLOR_AXIS}">{fx:.0}</text>"#,
            MARGIN_TOP + plot_height + 20.0
        ));
    }

    // axes
    svg.push_str(&format!(
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{b}" stroke="{COLOR_AXIS}" stroke-width="2"/><line x1="{MARGIN_LEFT}" y1="{b}" x2="{r}" y2="{b}" stroke="{COLOR_AXIS}" stroke-width="2"/>"#,
        b = MARGIN_TOP + plot_height,
        r = MARGIN_LEFT + plot_width
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{COLOR_AXIS}">{x_label}</text><text x="20" y="{cy}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{COLOR_AXIS}" transform="rotate(-90 20 {cy})">{y_label}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        cy = MARGIN_TOP + plot_height / 2.0
    ));

    for (i, s) in series.iter().enumerate() {
        let points = s
            .points
            .iter()
            .map(|&(x, y)| format!("{:.2},{:.2}", sx(x), sy(y)))
            .collect::<Vec<_>>()
            .join(" ");
        svg.push_str(&format!(
            r#"<polyline points="{points}" fill="none" stroke="{}" stroke-width="2"/>"#,
            s.color
        ));
        let ly = MARGIN_TOP + 20.0 * i as f64;
        let lx = MARGIN_LEFT + plot_width + 15.0;
        svg.push_str(&format!(
            r#"<line x1="{lx}" y1="{ly}" x2="{}" y2="{ly}" stroke="{}" stroke-width="3"/><text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{COLOR_AXIS}">{}</text>"#,
            lx + 20.0,
            s.color,
            lx + 26.0,
            ly + 4.0,
            s.name
        ));
    }
    svg.push_str("</svg>");
    svg
}

pub fn write_line_chart(
    path: &Path,
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[DataSeries],
    y_range: (f64, f64),
) -> std::io::Result<()> {
    std::fs::write(path, render_line_chart(title, x_label, y_label, series, y_range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_polyline_per_series() {
        let series = [
            DataSeries::new("AUC", "red", vec![(0.0, 0.5), (1.0, 0.7)]),
            DataSeries::new("ACC", "magenta", vec![(0.0, 0.6), (1.0, 0.65)]),
        ];
        let svg = render_line_chart("hela", "epoch", "AUC", &series, (0.0, 2.0));
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains(">ACC</text>"));
    }

    #[test]
    fn empty_and_single_point_series_render() {
        let svg = render_line_chart("t", "x", "y", &[], (0.0, 1.0));
        assert!(!svg.contains("NaN"));
        let single = [DataSeries::new("s", "blue", vec![(3.0, 0.4)])];
        let svg = render_line_chart("t", "x", "y", &single, (0.0, 1.0));
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.svg");
        write_line_chart(&path, "t", "x", "y", &[], (0.0, 1.0)).unwrap();
        assert!(std::fs::read_to_string(path).unwrap().contains("<svg"));
    }
}
