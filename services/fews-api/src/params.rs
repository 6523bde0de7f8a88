//! Query parameter parsing.
//!
//! Adapter requests may repeat `location`, so parameters are read from the
//! raw key/value pairs instead of a fixed struct.

use std::str::FromStr;

use fews_common::{DateRangeInput, FewsError, FewsResult};
use jdbc_source::FilterSelection;
use renderer::{ImageSize, OutputFormat};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    pub source: Option<String>,
    pub filter: Option<String>,
    pub parameter: Option<String>,
    pub locations: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub period: Option<i64>,
    pub ignore_cache: bool,
    pub output: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub usecustomfilter: Option<bool>,
    pub filter_tree_root: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub radius: Option<f64>,
    pub size: Option<u32>,
    pub color: Option<String>,
}

impl RequestParams {
    /// Parse decoded query pairs. Unknown keys are ignored, empty values
    /// count as absent.
    pub fn from_pairs(pairs: &[(String, String)]) -> FewsResult<Self> {
        let mut params = Self::default();

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "source" => params.source = Some(value.to_string()),
                "filter" => params.filter = Some(value.to_string()),
                "parameter" => params.parameter = Some(value.to_string()),
                "location" => params.locations.push(value.to_string()),
                "start" => params.start = Some(value.to_string()),
                "end" => params.end = Some(value.to_string()),
                "period" => params.period = Some(parse(key, value)?),
                "ignore_cache" => params.ignore_cache = parse_bool(key, value)?,
                "output" => params.output = Some(value.to_string()),
                "width" => params.width = Some(parse(key, value)?),
                "height" => params.height = Some(parse(key, value)?),
                "usecustomfilter" => params.usecustomfilter = Some(parse_bool(key, value)?),
                "filter_tree_root" => params.filter_tree_root = Some(value.to_string()),
                "x" => params.x = Some(parse(key, value)?),
                "y" => params.y = Some(parse(key, value)?),
                "radius" => params.radius = Some(parse(key, value)?),
                "size" => params.size = Some(parse(key, value)?),
                "color" => params.color = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(params)
    }

    pub fn require_source(&self) -> FewsResult<&str> {
        require("source", &self.source)
    }

    pub fn require_filter(&self) -> FewsResult<&str> {
        require("filter", &self.filter)
    }

    pub fn require_parameter(&self) -> FewsResult<&str> {
        require("parameter", &self.parameter)
    }

    pub fn date_input(&self) -> DateRangeInput {
        DateRangeInput {
            start: self.start.clone(),
            end: self.end.clone(),
            period: self.period,
        }
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    /// Requested export format, `default` when absent.
    pub fn output_format(&self, default: OutputFormat) -> FewsResult<OutputFormat> {
        match &self.output {
            Some(output) => OutputFormat::from_query_param(output),
            None => Ok(default),
        }
    }

    pub fn filter_selection(&self) -> FilterSelection {
        FilterSelection {
            usecustomfilter: self.usecustomfilter,
            root_override: self.filter_tree_root.clone(),
        }
    }
}

fn require<'a>(name: &str, value: &'a Option<String>) -> FewsResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| FewsError::invalid_parameter(name, "required parameter is missing"))
}

fn parse<T: FromStr>(name: &str, value: &str) -> FewsResult<T> {
    value
        .parse()
        .map_err(|_| FewsError::invalid_parameter(name, format!("cannot parse '{}'", value)))
}

fn parse_bool(name: &str, value: &str) -> FewsResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(FewsError::invalid_parameter(
            name,
            format!("'{}' is not a boolean", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_repeated_locations_keep_order() {
        let params = RequestParams::from_pairs(&pairs(&[
            ("source", "fews"),
            ("location", "B"),
            ("location", "A"),
            ("ignore_cache", "true"),
            ("width", "640"),
        ]))
        .unwrap();

        assert_eq!(params.locations, vec!["B", "A"]);
        assert!(params.ignore_cache);
        assert_eq!(params.image_size().width, 640);
        assert_eq!(params.image_size().height, 500);
    }

    #[test]
    fn test_bad_numbers_are_invalid_parameters() {
        let err = RequestParams::from_pairs(&pairs(&[("period", "week")])).unwrap_err();
        assert!(matches!(err, FewsError::InvalidParameter { ref param, .. } if param == "period"));
        assert_eq!(err.http_status_code(), 400);
    }

    #[test]
    fn test_missing_required() {
        let params = RequestParams::from_pairs(&pairs(&[("filter", "")])).unwrap();
        assert!(params.require_filter().is_err());
        assert!(params.require_source().is_err());
    }

    #[test]
    fn test_output_format() {
        let params = RequestParams::from_pairs(&pairs(&[("output", "HTML")])).unwrap();
        assert_eq!(params.output_format(OutputFormat::Csv).unwrap(), OutputFormat::Html);
        assert_eq!(
            RequestParams::default().output_format(OutputFormat::Csv).unwrap(),
            OutputFormat::Csv
        );
    }
}
