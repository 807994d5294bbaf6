//! SVG Chart Generator
//!
//! Generates clean SVG charts for training curves and the sample-prediction
//! figures. These can be used directly in presentations or reports.

use std::fs;
use std::path::Path;

/// Chart styling constants
const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;

pub const COLOR_BLUE: &str = "#3498db";
pub const COLOR_RED: &str = "#e74c3c";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A data point for a line chart
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// A data series for line charts
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
    pub color: String,
}

/// Generate a line chart SVG
pub fn generate_line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[DataSeries],
    output_path: &Path,
) -> std::io::Result<()> {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let (x_min, x_max, _y_min, y_max) = find_ranges(series);
    let y_min = 0.0f64;
    let y_max = (y_max * 1.05).max(1e-6);
    let x_span = (x_max - x_min).max(1e-9);

    let mut svg = String::new();

    // SVG header
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    ));

    // Background
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    ));

    // Title
    svg.push_str(&format!(
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    ));

    // Grid lines and y-axis labels
    for i in 0..=5 {
        let y = MARGIN_TOP + plot_height - (i as f64 / 5.0) * plot_height;
        let value = y_min + (i as f64 / 5.0) * (y_max - y_min);

        svg.push_str(&format!(
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        ));

        svg.push_str(&format!(
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{:.2}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            value
        ));
    }

    // Axes
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));
    svg.push_str(&format!(
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    ));

    // Axis labels
    svg.push_str(&format!(
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    ));
    svg.push_str(&format!(
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        COLOR_TEXT,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    ));

    // Plot each series
    for series_data in series {
        if series_data.points.is_empty() {
            continue;
        }

        let mut path = String::new();
        for (i, point) in series_data.points.iter().enumerate() {
            let x = MARGIN_LEFT + ((point.x - x_min) / x_span) * plot_width;
            let y = MARGIN_TOP + plot_height - ((point.y - y_min) / (y_max - y_min)) * plot_height;

            if i == 0 {
                path.push_str(&format!("M {} {}", x, y));
            } else {
                path.push_str(&format!(" L {} {}", x, y));
            }
        }

        svg.push_str(&format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="3"/>"#,
            path, series_data.color
        ));

        for point in &series_data.points {
            let x = MARGIN_LEFT + ((point.x - x_min) / x_span) * plot_width;
            let y = MARGIN_TOP + plot_height - ((point.y - y_min) / (y_max - y_min)) * plot_height;

            svg.push_str(&format!(
                r#"<circle cx="{}" cy="{}" r="4" fill="{}" stroke="white" stroke-width="2"/>"#,
                x, y, series_data.color
            ));
        }
    }

    // X-axis tick labels from the first series, thinned for long runs
    if let Some(first) = series.first() {
        let step = (first.points.len() / 10).max(1);
        for point in first.points.iter().step_by(step) {
            let x = MARGIN_LEFT + ((point.x - x_min) / x_span) * plot_width;
            svg.push_str(&format!(
                r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.0}</text>"#,
                x,
                MARGIN_TOP + plot_height + 20.0,
                COLOR_TEXT,
                point.x
            ));
        }
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for series_data in series {
        svg.push_str(&format!(
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 100.0,
            legend_y,
            series_data.color
        ));
        svg.push_str(&format!(
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 80.0,
            legend_y + 12.0,
            COLOR_TEXT,
            escape_xml(&series_data.name)
        ));
        legend_y += 25.0;
    }

    svg.push_str("</svg>");

    fs::write(output_path, svg)
}

/// Generate a sample-prediction figure: the image with a caption on top
pub fn generate_prediction_figure(
    image_path: &Path,
    caption: &str,
    output_path: &Path,
) -> std::io::Result<()> {
    let width = 320.0;
    let height = 360.0;
    let image_side = 256.0;

    let href = image_path
        .canonicalize()
        .unwrap_or_else(|_| image_path.to_path_buf());

    let mut svg = String::new();

    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        width, height, width, height
    ));
    svg.push_str(&format!(
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        width, height
    ));
    svg.push_str(&format!(
        r#"<text x="{}" y="30" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" font-weight="bold" fill="{}">{}</text>"#,
        width / 2.0,
        COLOR_TEXT,
        escape_xml(caption)
    ));
    svg.push_str(&format!(
        r#"<image href="{}" x="{}" y="52" width="{}" height="{}"/>"#,
        escape_xml(&href.to_string_lossy()),
        (width - image_side) / 2.0,
        image_side,
        image_side
    ));
    svg.push_str("</svg>");

    fs::write(output_path, svg)
}

fn find_ranges(series: &[DataSeries]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for s in series {
        for p in &s.points {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
    }

    if !x_min.is_finite() {
        (0.0, 1.0, 0.0, 1.0)
    } else {
        (x_min, x_max, y_min, y_max)
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn series(values: &[f64]) -> Vec<DataSeries> {
        vec![DataSeries {
            name: "test".to_string(),
            points: values
                .iter()
                .enumerate()
                .map(|(i, &y)| DataPoint { x: i as f64, y })
                .collect(),
            color: COLOR_BLUE.to_string(),
        }]
    }

    #[test]
    fn test_line_chart_generation() {
        let path = PathBuf::from(std::env::temp_dir()).join("butterfly_test_chart.svg");
        generate_line_chart("Test Chart", "Epoch", "Loss", &series(&[2.0, 1.2, 0.7]), &path)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("Test Chart"));
        assert!(content.contains("</svg>"));
    }

    #[test]
    fn test_prediction_figure_escapes_caption() {
        let image = PathBuf::from(std::env::temp_dir()).join("butterfly_test_sample.png");
        image::RgbImage::from_pixel(8, 8, image::Rgb([10, 200, 30]))
            .save(&image)
            .unwrap();

        let out = PathBuf::from(std::env::temp_dir()).join("butterfly_test_figure.svg");
        generate_prediction_figure(&image, "The predicted species is A & B", &out).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.contains("A &amp; B"));
        assert!(content.contains("<image"));
    }

    #[test]
    fn test_empty_series_does_not_panic() {
        let path = PathBuf::from(std::env::temp_dir()).join("butterfly_test_empty.svg");
        generate_line_chart("Empty", "x", "y", &[], &path).unwrap();
        assert!(path.exists());
    }
}
