//! Output rendering for FEWS value series.
//!
//! Turns fetched series into the payloads the service hands out:
//! - CSV and HTML tables headed by the parameter display name
//! - PNG graphs drawn by a [`GraphRenderer`]
//! - PNG map symbols for location points

pub mod font;
pub mod graph;
pub mod png;
pub mod raster;
pub mod symbol;
pub mod table;

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use fews_common::{time, DateRange, FewsError, FewsResult, ValueSeries};

pub use font::{load_font, load_optional_font, SharedFont};
pub use graph::{GraphLine, GraphRenderer, GraphSpec};
pub use raster::RasterGraphRenderer;
pub use table::ValueTable;

pub const DEFAULT_IMAGE_SIZE: u32 = 500;
pub const MIN_IMAGE_SIZE: u32 = 16;
pub const MAX_IMAGE_SIZE: u32 = 4096;

/// Export format of a values request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Html,
    Png,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Csv, OutputFormat::Html, OutputFormat::Png];

    /// Parse the `output` request parameter, ignoring case.
    pub fn from_query_param(value: &str) -> FewsResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "html" => Ok(OutputFormat::Html),
            "png" => Ok(OutputFormat::Png),
            other => Err(FewsError::invalid_parameter(
                "output",
                format!("'{}' is not one of csv, html, png", other),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Html => "html",
            OutputFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "text/csv; charset=utf-8",
            OutputFormat::Html => "text/html; charset=utf-8",
            OutputFormat::Png => "image/png",
        }
    }
}

/// Rendered bytes and how to label them.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPayload {
    pub format: OutputFormat,
    pub body: Vec<u8>,
}

impl OutputPayload {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Requested graph size, clamped to [`MIN_IMAGE_SIZE`]..=[`MAX_IMAGE_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: Option<u32>, height: Option<u32>) -> Self {
        let clamp = |v: Option<u32>| {
            v.unwrap_or(DEFAULT_IMAGE_SIZE)
                .clamp(MIN_IMAGE_SIZE, MAX_IMAGE_SIZE)
        };
        Self {
            width: clamp(width),
            height: clamp(height),
        }
    }
}

impl Default for ImageSize {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Renders series into every supported output.
#[derive(Clone)]
pub struct OutputRenderer {
    graph: Arc<dyn GraphRenderer>,
}

impl OutputRenderer {
    pub fn new(graph: Arc<dyn GraphRenderer>) -> Self {
        Self { graph }
    }

    /// Raster graphs with labels in `font`, or unlabeled without one.
    pub fn with_font(font: Option<SharedFont>) -> Self {
        Self::new(Arc::new(RasterGraphRenderer::new(font)))
    }

    pub fn to_csv(&self, series: &[ValueSeries]) -> FewsResult<String> {
        ValueTable::from_series(series).to_csv()
    }

    pub fn to_html(&self, series: &[ValueSeries]) -> String {
        ValueTable::from_series(series).to_html()
    }

    /// Graph of `series`. An all-empty set draws a "no data" placeholder.
    pub fn to_png(&self, series: &[ValueSeries], size: ImageSize) -> FewsResult<Vec<u8>> {
        let range = series.first().map(|s| s.range).unwrap_or_else(|| {
            let end = time::now();
            DateRange::new(end - Duration::days(1), end)
        });

        let spec = GraphSpec::from_series(series, &range, size.width, size.height);
        tracing::debug!(
            lines = spec.lines.len(),
            width = spec.width,
            height = spec.height,
            empty = spec.is_empty(),
            "Rendering graph"
        );
        self.graph.render(&spec)
    }

    pub fn render(
        &self,
        format: OutputFormat,
        series: &[ValueSeries],
        size: ImageSize,
    ) -> FewsResult<OutputPayload> {
        let body = match format {
            OutputFormat::Csv => self.to_csv(series)?.into_bytes(),
            OutputFormat::Html => self.to_html(series).into_bytes(),
            OutputFormat::Png => self.to_png(series, size)?,
        };
        Ok(OutputPayload { format, body })
    }

    /// Map symbol for location points.
    pub fn symbol(&self, size: u32, color: [u8; 3]) -> FewsResult<OutputPayload> {
        Ok(OutputPayload {
            format: OutputFormat::Png,
            body: symbol::render_symbol(size, color)?,
        })
    }
}

impl Default for OutputRenderer {
    fn default() -> Self {
        Self::with_font(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_query_param("CSV").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_query_param(" Png ").unwrap(), OutputFormat::Png);
        let err = OutputFormat::from_query_param("xls").unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_image_size_defaults_and_clamps() {
        assert_eq!(ImageSize::default(), ImageSize { width: 500, height: 500 });
        let size = ImageSize::new(Some(1), Some(100_000));
        assert_eq!((size.width, size.height), (MIN_IMAGE_SIZE, MAX_IMAGE_SIZE));
    }

    #[test]
    fn test_symbol_payload_is_png() {
        let payload = OutputRenderer::default().symbol(12, [0, 128, 0]).unwrap();
        assert_eq!(payload.content_type(), "image/png");
        assert_eq!(png::read_dimensions(&payload.body), Some((12, 12)));
    }
}
