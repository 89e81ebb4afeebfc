use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Point id as found on the wire: events arrive with either string or numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPointId {
    Text(String),
    Number(i64),
}

impl std::fmt::Display for RawPointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawPointId::Text(s) => f.write_str(s),
            RawPointId::Number(n) => write!(f, "{n}"),
        }
    }
}

fn missing_coordinate() -> f64 {
    f64::NAN
}

/// One event record. Missing or null coordinates decode as NaN so the engine
/// can reject them uniformly with other non-finite input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: RawPointId,
    #[serde(
        default = "missing_coordinate",
        alias = "latitude",
        deserialize_with = "nullable_f64"
    )]
    pub lat: f64,
    #[serde(
        default = "missing_coordinate",
        alias = "lon",
        alias = "longitude",
        deserialize_with = "nullable_f64"
    )]
    pub lng: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
}

fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[derive(Debug)]
pub enum PointListError {
    Json(serde_json::Error),
}

impl std::fmt::Display for PointListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointListError::Json(e) => write!(f, "point list parse error: {e}"),
        }
    }
}

impl std::error::Error for PointListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PointListError::Json(e) => Some(e),
        }
    }
}

/// Decodes a JSON array of point records.
pub fn parse_point_list(payload: &str) -> Result<Vec<PointRecord>, PointListError> {
    serde_json::from_str(payload).map_err(PointListError::Json)
}
