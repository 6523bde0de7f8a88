//! Raster graph renderer built on `imageproc` and `rusttype`.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut,
};
use imageproc::rect::Rect;
use rusttype::Scale;

use fews_common::FewsResult;

use crate::font::{text_width, SharedFont};
use crate::graph::{
    format_value_tick, time_ticks, value_ticks, GraphLine, GraphRenderer, GraphSpec,
    SERIES_COLORS,
};
use crate::png::encode_rgba_image;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRID: Rgba<u8> = Rgba([220, 220, 220, 255]);
const NO_DATA: Rgba<u8> = Rgba([160, 160, 160, 255]);

const TITLE_SIZE: f32 = 16.0;
const LABEL_SIZE: f32 = 11.0;
const VALUE_TICKS: usize = 6;
const TIME_TICKS: usize = 5;

/// Pixel rectangle the data is drawn in.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PlotArea {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl PlotArea {
    fn new(width: u32, height: u32, with_labels: bool) -> Self {
        let (w, h) = (width as i32, height as i32);
        let (left, right, top, bottom) = if with_labels {
            ((w / 4).min(56), (w / 10).min(16), (h / 6).min(28), (h / 5).min(36))
        } else {
            ((w / 10).min(8), (w / 10).min(8), (h / 10).min(8), (h / 10).min(8))
        };
        Self {
            left,
            top,
            right: (w - 1 - right).max(left + 1),
            bottom: (h - 1 - bottom).max(top + 1),
        }
    }

    fn width(&self) -> f32 {
        (self.right - self.left) as f32
    }

    fn height(&self) -> f32 {
        (self.bottom - self.top) as f32
    }

    fn rect(&self) -> Rect {
        Rect::at(self.left, self.top).of_size(
            (self.right - self.left + 1) as u32,
            (self.bottom - self.top + 1) as u32,
        )
    }
}

/// Maps data coordinates into a [`PlotArea`].
struct Projection {
    area: PlotArea,
    time: (i64, i64),
    value: (f64, f64),
}

impl Projection {
    fn x(&self, ms: i64) -> f32 {
        let span = (self.time.1 - self.time.0).max(1) as f64;
        let fraction = (ms - self.time.0) as f64 / span;
        self.area.left as f32 + clamp_fraction(fraction) * self.area.width()
    }

    fn y(&self, value: f64) -> f32 {
        let span = self.value.1 - self.value.0;
        let span = if span > 0.0 && span.is_finite() { span } else { 1.0 };
        let fraction = (value - self.value.0) / span;
        self.area.bottom as f32 - clamp_fraction(fraction) * self.area.height()
    }
}

/// Points far outside the extent are pulled to within one plot size of the
/// frame, so line drawing stays bounded.
fn clamp_fraction(fraction: f64) -> f32 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(-1.0, 2.0) as f32
    }
}

/// Draws graphs on an RGBA canvas and encodes them as PNG.
///
/// Labels need a font. Without one the data is still drawn, and an empty
/// graph shows a crossed frame instead of a "No data" caption.
#[derive(Clone, Default)]
pub struct RasterGraphRenderer {
    font: Option<SharedFont>,
}

impl RasterGraphRenderer {
    pub fn new(font: Option<SharedFont>) -> Self {
        Self { font }
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// Draw `spec` without encoding it.
    pub fn draw(&self, spec: &GraphSpec) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(spec.width, spec.height, WHITE);
        let area = PlotArea::new(spec.width, spec.height, self.font.is_some());

        if spec.is_empty() {
            self.draw_no_data(&mut img, &area, spec);
            return img;
        }

        let projection = Projection {
            area,
            time: spec.time_extent,
            value: spec.value_extent,
        };

        self.draw_grid(&mut img, &projection);
        for (i, line) in spec.lines.iter().enumerate() {
            draw_series(&mut img, &projection, line, series_color(i));
        }
        draw_hollow_rect_mut(&mut img, area.rect(), BLACK);

        if let Some(font) = &self.font {
            draw_title(&mut img, font, &spec.title, spec.width);
            if let Some(unit) = &spec.value_label {
                let y = (area.top - LABEL_SIZE as i32 - 2).max(0);
                draw_text_mut(&mut img, BLACK, 2, y, Scale::uniform(LABEL_SIZE), font, unit);
            }
            draw_legend(&mut img, font, &area, &spec.lines);
        }

        img
    }

    fn draw_grid(&self, img: &mut RgbaImage, projection: &Projection) {
        let area = projection.area;
        let (v0, v1) = projection.value;
        let ticks = value_ticks(v0, v1, VALUE_TICKS);
        let step = match ticks.as_slice() {
            [a, b, ..] => b - a,
            _ => v1 - v0,
        };
        let scale = Scale::uniform(LABEL_SIZE);

        for tick in &ticks {
            let y = projection.y(*tick);
            draw_line_segment_mut(img, (area.left as f32, y), (area.right as f32, y), GRID);

            if let Some(font) = &self.font {
                let label = format_value_tick(*tick, step);
                let x = (area.left - text_width(font, scale, &label) - 4).max(0);
                let y = y as i32 - LABEL_SIZE as i32 / 2;
                draw_text_mut(img, BLACK, x, y, scale, font, &label);
            }
        }

        for (ms, label) in time_ticks(projection.time.0, projection.time.1, TIME_TICKS) {
            let x = projection.x(ms);
            draw_line_segment_mut(img, (x, area.top as f32), (x, area.bottom as f32), GRID);

            if let Some(font) = &self.font {
                let half = text_width(font, scale, &label) / 2;
                draw_text_mut(img, BLACK, x as i32 - half, area.bottom + 4, scale, font, &label);
            }
        }
    }

    fn draw_no_data(&self, img: &mut RgbaImage, area: &PlotArea, spec: &GraphSpec) {
        draw_hollow_rect_mut(img, area.rect(), NO_DATA);

        match &self.font {
            Some(font) => {
                draw_title(img, font, &spec.title, spec.width);
                let scale = Scale::uniform(TITLE_SIZE);
                let text = "No data";
                let x = (spec.width as i32 - text_width(font, scale, text)) / 2;
                let y = (spec.height as i32 - TITLE_SIZE as i32) / 2;
                draw_text_mut(img, NO_DATA, x, y, scale, font, text);
            }
            None => {
                let (l, t, r, b) = (
                    area.left as f32,
                    area.top as f32,
                    area.right as f32,
                    area.bottom as f32,
                );
                draw_line_segment_mut(img, (l, t), (r, b), NO_DATA);
                draw_line_segment_mut(img, (l, b), (r, t), NO_DATA);
            }
        }
    }
}

impl GraphRenderer for RasterGraphRenderer {
    fn render(&self, spec: &GraphSpec) -> FewsResult<Vec<u8>> {
        encode_rgba_image(&self.draw(spec))
    }
}

fn series_color(index: usize) -> Rgba<u8> {
    let [r, g, b] = SERIES_COLORS[index % SERIES_COLORS.len()];
    Rgba([r, g, b, 255])
}

/// Connect consecutive values; a missing value breaks the line and a lone
/// value is drawn as a dot.
fn draw_series(img: &mut RgbaImage, projection: &Projection, line: &GraphLine, color: Rgba<u8>) {
    let points: Vec<Option<(f32, f32)>> = line
        .points
        .iter()
        .map(|(ms, v)| v.map(|v| (projection.x(*ms), projection.y(v))))
        .collect();

    for (i, point) in points.iter().enumerate() {
        let Some(current) = point else { continue };
        let prev = i.checked_sub(1).and_then(|j| points[j]);
        let next = points.get(i + 1).copied().flatten();

        match prev {
            Some(prev) => {
                draw_line_segment_mut(img, prev, *current, color);
                draw_line_segment_mut(img, (prev.0, prev.1 + 1.0), (current.0, current.1 + 1.0), color);
            }
            None if next.is_none() => {
                draw_filled_circle_mut(img, (current.0 as i32, current.1 as i32), 2, color);
            }
            None => {}
        }
    }
}

fn draw_title(img: &mut RgbaImage, font: &SharedFont, title: &str, width: u32) {
    let scale = Scale::uniform(TITLE_SIZE);
    let x = (width as i32 - text_width(font, scale, title)) / 2;
    draw_text_mut(img, BLACK, x.max(0), 4, scale, font, title);
}

/// Location names with their line color, stacked in the top-right corner.
fn draw_legend(img: &mut RgbaImage, font: &SharedFont, area: &PlotArea, lines: &[GraphLine]) {
    let scale = Scale::uniform(LABEL_SIZE);
    let row = LABEL_SIZE as i32 + 3;
    let widest = lines
        .iter()
        .map(|l| text_width(font, scale, &l.label))
        .max()
        .unwrap_or(0);
    let x = (area.right - widest - 18).max(area.left + 2);

    for (i, line) in lines.iter().enumerate() {
        let y = area.top + 4 + row * i as i32;
        if y + row > area.bottom {
            break;
        }
        draw_filled_rect_mut(img, Rect::at(x, y + 2).of_size(10, 6), series_color(i));
        draw_text_mut(img, BLACK, x + 14, y, scale, font, &line.label);
    }
}
