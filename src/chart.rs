use crate::aggregate::{Bucket, CategoryBucket};
use crate::error::ChartError;
use crate::forecast::Forecast;
use chrono::NaiveDate;
use log::warn;
use plotters::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;

/// Charts the dashboard can rasterize
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    /// Monthly Sales, one line per Category
    Monthly,
    /// Weekly Sales across all products
    Weekly,
    /// Actual monthly Sales followed by the dashed projection
    Forecast,
}

impl ChartKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim_end_matches(".png") {
            "monthly" => Some(ChartKind::Monthly),
            "weekly" => Some(ChartKind::Weekly),
            "forecast" => Some(ChartKind::Forecast),
            _ => None,
        }
    }

    pub fn options(self, width: u32, height: u32) -> ChartOptions {
        let (title, x_label) = match self {
            ChartKind::Monthly => ("Tren Penjualan Bulanan per Kategori", "Tanggal"),
            ChartKind::Weekly => ("Tren Penjualan Mingguan", "Order Date"),
            ChartKind::Forecast => ("Prediksi Penjualan (3 Bulan ke Depan)", "Bulan"),
        };
        ChartOptions {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: "Penjualan".to_string(),
            width,
            height,
            markers: self == ChartKind::Monthly || self == ChartKind::Weekly,
        }
    }
}

/// Styling of a rendered chart
#[derive(Clone, Debug)]
pub struct ChartOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Width of the image in pixels
    pub width: u32,
    /// Height of the image in pixels
    pub height: u32,
    /// Draw a dot on every data point
    pub markers: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: "Tanggal".to_string(),
            y_label: "Penjualan".to_string(),
            width: 900,
            height: 450,
            markers: true,
        }
    }
}

/// One named line of a chart
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
    pub dashed: bool,
}

/// One line per Category, categories in name order
pub fn monthly_series(buckets: &[CategoryBucket]) -> Vec<ChartSeries> {
    let mut by_category: BTreeMap<&str, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for bucket in buckets {
        by_category
            .entry(bucket.category.as_str())
            .or_default()
            .push((bucket.month_end, bucket.sales));
    }
    by_category
        .into_iter()
        .map(|(category, points)| ChartSeries {
            name: category.to_string(),
            points,
            dashed: false,
        })
        .collect()
}

pub fn weekly_series(buckets: &[Bucket]) -> Vec<ChartSeries> {
    if buckets.is_empty() {
        return Vec::new();
    }
    vec![ChartSeries {
        name: "Sales".to_string(),
        points: buckets.iter().map(|b| (b.period_end, b.sales)).collect(),
        dashed: false,
    }]
}

/// Actual totals plus the dashed predicted segment
pub fn forecast_series(forecast: &Forecast) -> Vec<ChartSeries> {
    vec![
        ChartSeries {
            name: "Aktual".to_string(),
            points: forecast.actual.iter().map(|b| (b.period_end, b.sales)).collect(),
            dashed: false,
        },
        ChartSeries {
            name: "Prediksi".to_string(),
            points: forecast
                .predictions
                .iter()
                .map(|p| (p.month_end, p.predicted_sales))
                .collect(),
            dashed: true,
        },
    ]
}

/// Axis bounds as (day offsets, value range); empty data gets a unit box
fn bounds(series: &[ChartSeries]) -> (NaiveDate, f64, f64, f64) {
    let points = series.iter().flat_map(|s| s.points.iter());
    let origin = points.clone().map(|(d, _)| *d).min();
    let Some(origin) = origin else {
        return (NaiveDate::default(), 1.0, 0.0, 1.0);
    };

    let max_x = points
        .clone()
        .map(|(d, _)| (*d - origin).num_days() as f64)
        .fold(0.0, f64::max)
        .max(1.0);
    let min_y = points.clone().map(|(_, v)| *v).fold(0.0, f64::min);
    let max_y = points.map(|(_, v)| *v).fold(f64::MIN, f64::max);
    let pad = ((max_y - min_y).abs() * 0.05).max(1.0);

    (origin, max_x, min_y, max_y + pad)
}

fn draw_err<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Draw(e.to_string())
}

/// Split a polyline into alternating drawn pieces
fn dash_segments(points: &[(f64, f64)], pieces_per_segment: usize) -> Vec<[(f64, f64); 2]> {
    let mut dashes = Vec::new();
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        for piece in (0..pieces_per_segment).step_by(2) {
            let t0 = piece as f64 / pieces_per_segment as f64;
            let t1 = (piece + 1) as f64 / pieces_per_segment as f64;
            dashes.push([
                (x0 + (x1 - x0) * t0, y0 + (y1 - y0) * t0),
                (x0 + (x1 - x0) * t1, y0 + (y1 - y0) * t1),
            ]);
        }
    }
    dashes
}

/// Rasterize line series to a PNG byte buffer
///
/// The x axis is laid out in days and labelled with dates. An empty series
/// list yields an empty frame with axes. When no font can be loaded for the
/// captions the lines are drawn without any text.
pub fn render_png(series: &[ChartSeries], options: &ChartOptions) -> Result<Vec<u8>, ChartError> {
    let (width, height) = (options.width, options.height);
    let mut buffer = vec![0u8; (width * height * 3) as usize];

    if let Err(e) = draw_frame(&mut buffer, series, options, true) {
        warn!("Chart \"{}\" drawn without text: {}", options.title, e);
        buffer.fill(0);
        draw_frame(&mut buffer, series, options, false)?;
    }

    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| ChartError::Draw("pixel buffer has the wrong size".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image).write_to(&mut png, image::ImageOutputFormat::Png)?;
    Ok(png.into_inner())
}

fn draw_frame(
    buffer: &mut [u8],
    series: &[ChartSeries],
    options: &ChartOptions,
    labelled: bool,
) -> Result<(), ChartError> {
    let (origin, max_x, min_y, max_y) = bounds(series);
    let root = BitMapBackend::with_buffer(buffer, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(15);
    if labelled {
        builder
            .caption(&options.title, ("sans-serif", 24).into_font())
            .x_label_area_size(40)
            .y_label_area_size(70);
    }
    let mut chart = builder
        .build_cartesian_2d(0.0..max_x, min_y..max_y)
        .map_err(draw_err)?;

    if labelled {
        let date_label = |x: &f64| {
            origin
                .checked_add_signed(chrono::Duration::days(x.round() as i64))
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .x_labels(8)
            .x_label_formatter(&date_label)
            .draw()
            .map_err(draw_err)?;
    }

    for (index, line) in series.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();
        let points: Vec<(f64, f64)> = line
            .points
            .iter()
            .map(|(d, v)| ((*d - origin).num_days() as f64, *v))
            .collect();

        if line.dashed {
            chart
                .draw_series(
                    dash_segments(&points, 8)
                        .into_iter()
                        .map(|dash| PathElement::new(dash.to_vec(), color.stroke_width(2))),
                )
                .map_err(draw_err)?
                .label(line.name.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        } else {
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(draw_err)?
                .label(line.name.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        if options.markers {
            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))
                .map_err(draw_err)?;
        }
    }

    if labelled && !series.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(draw_err)?;
    }

    root.present().map_err(draw_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{self, Bucket};
    use crate::forecast::forecast_months;
    use crate::record::fixtures::{date, sample};

    #[test]
    fn chart_kind_from_route_name() {
        assert_eq!(ChartKind::from_name("monthly.png"), Some(ChartKind::Monthly));
        assert_eq!(ChartKind::from_name("forecast"), Some(ChartKind::Forecast));
        assert_eq!(ChartKind::from_name("pie"), None);
    }

    #[test]
    fn monthly_series_has_one_line_per_category() {
        let dataset = sample();
        let rows: Vec<_> = dataset.records.iter().collect();
        let series = monthly_series(&aggregate::monthly_by_category(&rows));

        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Furniture", "Office Supplies", "Technology"]);
        assert_eq!(series[0].points.len(), 3);
        assert!(series.iter().all(|s| !s.dashed));
    }

    #[test]
    fn forecast_series_marks_prediction_dashed() {
        let actual = vec![
            Bucket { period_end: date(2024, 1, 31), sales: 100.0 },
            Bucket { period_end: date(2024, 2, 29), sales: 200.0 },
        ];
        let forecast = forecast_months(&actual, 3).unwrap();
        let series = forecast_series(&forecast);
        assert_eq!(series.len(), 2);
        assert!(!series[0].dashed);
        assert!(series[1].dashed);
        assert_eq!(series[1].points[0], (date(2024, 3, 31), 300.0));
    }

    #[test]
    fn dashes_cover_every_other_piece() {
        let dashes = dash_segments(&[(0.0, 0.0), (8.0, 8.0)], 8);
        assert_eq!(dashes.len(), 4);
        assert_eq!(dashes[0], [(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(dashes[3], [(6.0, 6.0), (7.0, 7.0)]);
    }

    #[test]
    fn bounds_of_empty_chart_are_a_unit_box() {
        let (_, max_x, min_y, max_y) = bounds(&[]);
        assert_eq!((max_x, min_y, max_y), (1.0, 0.0, 1.0));
    }

    #[test]
    fn renders_png_signature() {
        let series = weekly_series(&[
            Bucket { period_end: date(2024, 1, 1), sales: 10.0 },
            Bucket { period_end: date(2024, 1, 8), sales: 30.0 },
        ]);
        let png = render_png(&series, &ChartKind::Weekly.options(400, 300)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn empty_chart_still_renders() {
        let png = render_png(&[], &ChartKind::Monthly.options(320, 240)).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn unlabelled_frame_draws_lines_without_fonts() {
        let series = weekly_series(&[
            Bucket { period_end: date(2024, 1, 1), sales: 10.0 },
            Bucket { period_end: date(2024, 1, 8), sales: 30.0 },
        ]);
        let options = ChartKind::Weekly.options(200, 100);
        let mut buffer = vec![0u8; 200 * 100 * 3];
        draw_frame(&mut buffer, &series, &options, false).unwrap();
        // Something other than the white background was drawn
        assert!(buffer.chunks(3).any(|px| px != [255, 255, 255]));
    }
}
