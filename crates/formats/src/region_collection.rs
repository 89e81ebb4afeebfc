use foundation::LatLng;
use serde_json::{Map, Value};

/// Property keys probed (in order) for a region's display name.
pub const REGION_NAME_KEYS: [&str; 4] = ["name", "NAME", "neighborhood", "nhood"];

/// One polygon: outer ring first, holes after.
pub type PolygonRings = Vec<Vec<LatLng>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    pub name: String,
    /// A `Polygon` yields one entry; a `MultiPolygon` yields one per part.
    pub polygons: Vec<PolygonRings>,
    pub properties: Map<String, Value>,
}

/// Named polygon boundaries decoded from a GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCollection {
    pub features: Vec<RegionFeature>,
}

#[derive(Debug)]
pub enum RegionCollectionError {
    Json(serde_json::Error),
    NotAFeatureCollection,
    Empty,
    InvalidFeature { index: usize, reason: String },
}

impl std::fmt::Display for RegionCollectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionCollectionError::Json(e) => write!(f, "JSON parse error: {e}"),
            RegionCollectionError::NotAFeatureCollection => {
                write!(f, "expected GeoJSON FeatureCollection")
            }
            RegionCollectionError::Empty => write!(f, "region collection has no features"),
            RegionCollectionError::InvalidFeature { index, reason } => {
                write!(f, "invalid region feature at index {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for RegionCollectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegionCollectionError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl RegionCollection {
    pub fn from_geojson_str(payload: &str) -> Result<Self, RegionCollectionError> {
        let value: Value = serde_json::from_str(payload).map_err(RegionCollectionError::Json)?;
        Self::from_geojson_value(&value)
    }

    /// Accepts only `Polygon` and `MultiPolygon` features; anything else rejects
    /// the whole collection.
    pub fn from_geojson_value(value: &Value) -> Result<Self, RegionCollectionError> {
        let obj = value
            .as_object()
            .ok_or(RegionCollectionError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(RegionCollectionError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(RegionCollectionError::NotAFeatureCollection);
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(RegionCollectionError::NotAFeatureCollection)?;
        if features_val.is_empty() {
            return Err(RegionCollectionError::Empty);
        }

        let mut features = Vec::with_capacity(features_val.len());
        for (index, feat_val) in features_val.iter().enumerate() {
            let feature = parse_feature(feat_val)
                .map_err(|reason| RegionCollectionError::InvalidFeature { index, reason })?;
            features.push(feature);
        }

        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn parse_feature(value: &Value) -> Result<RegionFeature, String> {
    let feat_obj = value
        .as_object()
        .ok_or("feature must be an object".to_string())?;

    let feat_type = feat_obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("feature missing type".to_string())?;
    if feat_type != "Feature" {
        return Err(format!("unexpected feature type: {feat_type}"));
    }

    let properties = feat_obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let name = region_name(&properties, feat_obj.get("id"))
        .ok_or("feature has no name property or id".to_string())?;

    let geometry = feat_obj
        .get("geometry")
        .ok_or("feature missing geometry".to_string())?;
    let polygons = parse_geometry(geometry)?;

    Ok(RegionFeature {
        name,
        polygons,
        properties,
    })
}

fn region_name(properties: &Map<String, Value>, id: Option<&Value>) -> Option<String> {
    let from_props = REGION_NAME_KEYS
        .iter()
        .filter_map(|k| properties.get(*k))
        .find_map(|v| v.as_str().map(str::trim).filter(|s| !s.is_empty()));
    if let Some(name) = from_props {
        return Some(name.to_string());
    }
    match id {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_geometry(value: &Value) -> Result<Vec<PolygonRings>, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;
    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Polygon" => Ok(vec![parse_polygon(coords)?]),
        "MultiPolygon" => parse_multi_polygon(coords),
        other => Err(format!("unsupported region geometry type: {other}")),
    }
}

fn parse_position(coords: &Value) -> Result<LatLng, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [lon, lat]".to_string());
    }
    let lon = arr[0].as_f64().ok_or("lon must be a number".to_string())?;
    let lat = arr[1].as_f64().ok_or("lat must be a number".to_string())?;
    Ok(LatLng::from_lng_lat(lon, lat))
}

fn parse_ring(coords: &Value) -> Result<Vec<LatLng>, String> {
    let arr = coords
        .as_array()
        .ok_or("ring must be an array of positions".to_string())?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        out.push(parse_position(item)?);
    }
    if out.len() < 3 {
        return Err(format!("ring needs at least 3 positions, got {}", out.len()));
    }
    Ok(out)
}

fn parse_polygon(coords: &Value) -> Result<PolygonRings, String> {
    let rings = coords
        .as_array()
        .ok_or("Polygon coordinates must be an array of rings".to_string())?;
    if rings.is_empty() {
        return Err("Polygon has no outer ring".to_string());
    }
    let mut out = Vec::with_capacity(rings.len());
    for ring in rings {
        out.push(parse_ring(ring)?);
    }
    Ok(out)
}

fn parse_multi_polygon(coords: &Value) -> Result<Vec<PolygonRings>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    if polys.is_empty() {
        return Err("MultiPolygon has no polygons".to_string());
    }
    let mut out = Vec::with_capacity(polys.len());
    for poly in polys {
        out.push(parse_polygon(poly)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{RegionCollection, RegionCollectionError};
    use foundation::LatLng;

    const TWO_REGIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Mission" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
                        [[4, 4], [6, 4], [6, 6], [4, 6], [4, 4]]
                    ]
                }
            },
            {
                "type": "Feature",
                "id": 7,
                "properties": {},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[20, 0], [21, 0], [21, 1], [20, 0]]],
                        [[[30, 0], [31, 0], [31, 1], [30, 0]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn parses_polygons_and_multipolygons() {
        let c = RegionCollection::from_geojson_str(TWO_REGIONS).expect("parse regions");
        assert_eq!(c.len(), 2);
        assert_eq!(c.features[0].name, "Mission");
        assert_eq!(c.features[0].polygons.len(), 1);
        assert_eq!(c.features[0].polygons[0].len(), 2);
        // [lon, lat] order is swapped into LatLng.
        assert_eq!(c.features[0].polygons[0][0][1], LatLng::new(0.0, 10.0));
        assert_eq!(c.features[1].name, "7");
        assert_eq!(c.features[1].polygons.len(), 2);
    }

    #[test]
    fn rejects_non_polygon_geometry() {
        let payload = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"p"},
             "geometry":{"type":"Point","coordinates":[1,2]}}]}"#;
        let err = RegionCollection::from_geojson_str(payload).unwrap_err();
        assert!(matches!(
            err,
            RegionCollectionError::InvalidFeature { index: 0, .. }
        ));
    }

    #[test]
    fn rejects_wrong_root_and_empty() {
        assert!(matches!(
            RegionCollection::from_geojson_str(r#"{"type":"Feature"}"#),
            Err(RegionCollectionError::NotAFeatureCollection)
        ));
        assert!(matches!(
            RegionCollection::from_geojson_str(r#"{"type":"FeatureCollection","features":[]}"#),
            Err(RegionCollectionError::Empty)
        ));
        assert!(matches!(
            RegionCollection::from_geojson_str("not json"),
            Err(RegionCollectionError::Json(_))
        ));
    }

    #[test]
    fn rejects_unnamed_feature_and_short_ring() {
        let unnamed = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}]}"#;
        assert!(RegionCollection::from_geojson_str(unnamed).is_err());

        let short = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"x"},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0]]]}}]}"#;
        assert!(RegionCollection::from_geojson_str(short).is_err());
    }
}
