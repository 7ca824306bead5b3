//! PyO3 entry points.
//!
//! Stateless: the Python side owns the database, these functions only
//! decode, filter and build query documents.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

use crate::config::PipelineConfig;
use crate::decoder::FramedCodec;
use crate::filter::{self, records_to_json, selection_to_json, FilterSpec};
use crate::init_logger;
use crate::pipeline::ingest;
use crate::storage::queries;

fn parse_time(raw: &str) -> PyResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PyValueError::new_err(format!("invalid timestamp {:?}: {}", raw, e)))
}

fn parse_spec(type_ids: Vec<String>, start: &str, end: &str) -> PyResult<FilterSpec> {
    FilterSpec::new(type_ids, parse_time(start)?, parse_time(end)?)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Decode a capture into canonical records.
///
/// # Returns
/// Dict with `file_name`, `digest`, `record_count`, `skipped_count` and
/// `records_json` (array of records, ascending `order`).
#[pyfunction]
fn ingest_capture(py: Python<'_>, file_name: String, raw: &[u8]) -> PyResult<Py<PyAny>> {
    init_logger();
    let config = PipelineConfig::from_env();

    let outcome = ingest(&FramedCodec::new(), &file_name, Bytes::copy_from_slice(raw))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let records_json = records_to_json(&outcome.capture.records, config.json_indent)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let result = PyDict::new(py);
    result.set_item("file_name", &outcome.capture.file_name)?;
    result.set_item("digest", &outcome.capture.digest)?;
    result.set_item("record_count", outcome.capture.len())?;
    result.set_item("skipped_count", outcome.skipped_count())?;
    result.set_item("records_json", records_json)?;
    Ok(result.into())
}

/// Filter a capture, returning `(records_json, binary_capture)`. A single
/// matching record is rendered as an object rather than an array.
#[pyfunction]
fn filter_capture(
    py: Python<'_>,
    raw: &[u8],
    type_ids: Vec<String>,
    start: String,
    end: String,
) -> PyResult<(String, Py<PyBytes>)> {
    init_logger();
    let spec = parse_spec(type_ids, &start, &end)?;
    let config = PipelineConfig::from_env();
    let codec = FramedCodec::new();

    let outcome = ingest(&codec, "<memory>", Bytes::copy_from_slice(raw))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let output = filter::filter(&codec, &outcome.capture, &spec)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    let json = selection_to_json(&output.records, config.json_indent)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    Ok((json, PyBytes::new(py, &output.binary).into()))
}

/// Query document for a filter, as a JSON string.
#[pyfunction]
fn build_filter_document(type_ids: Vec<String>, start: String, end: String) -> PyResult<String> {
    let spec = parse_spec(type_ids, &start, &end)?;
    Ok(queries::build_filter_document(&spec).to_string())
}

/// Python module definition
#[pymodule]
fn mi2log_core(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(ingest_capture, m)?)?;
    m.add_function(wrap_pyfunction!(filter_capture, m)?)?;
    m.add_function(wrap_pyfunction!(build_filter_document, m)?)?;
    Ok(())
}
