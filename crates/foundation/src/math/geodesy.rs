use crate::geo::LatLng;

/// Mean Earth radius used by the great-circle formula (kilometers).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Web-Mercator ground resolution at the equator for zoom 0 (meters per pixel, 256px tiles).
pub const MERCATOR_EQUATOR_M_PER_PX: f64 = 156_543.033_92;

/// Great-circle distance in kilometers (haversine).
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng * 0.5).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Meters covered by one screen pixel at `lat_deg` and a (fractional) zoom level.
pub fn ground_resolution_m_per_px(lat_deg: f64, zoom: f64) -> f64 {
    MERCATOR_EQUATOR_M_PER_PX * lat_deg.to_radians().cos() / 2f64.powf(zoom)
}
