//! Fixed pixel -> lat/lon transform shared by the broker and any worker.
//!
//! A template anchors its task grid at a top-left `(west, north)` geodetic
//! point and a zoom level; each task occupies one pixel of the standard
//! slippy-map Web Mercator projection at that zoom. This is a fixed,
//! well-known formula, not business logic, so it lives here once so the
//! broker and a future worker implementation never disagree on it.

use std::f64::consts::PI;

fn world_size_pixels(zoom: u8) -> f64 {
    256.0 * 2f64.powi(zoom as i32)
}

fn lon_to_pixel_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * world_size_pixels(zoom)
}

fn lat_to_pixel_y(lat: f64, zoom: u8) -> f64 {
    let lat_rad = lat.to_radians();
    let merc = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln();
    (1.0 - merc / PI) / 2.0 * world_size_pixels(zoom)
}

fn pixel_x_to_lon(x: f64, zoom: u8) -> f64 {
    x / world_size_pixels(zoom) * 360.0 - 180.0
}

fn pixel_y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = PI - 2.0 * PI * y / world_size_pixels(zoom);
    n.sinh().atan().to_degrees()
}

/// Geodetic center of grid cell `(grid_x, grid_y)` within a template
/// anchored at `(west, north)` at the given `zoom`.
pub fn grid_cell_center(west: f64, north: f64, zoom: u8, grid_x: u32, grid_y: u32) -> (f64, f64) {
    let origin_px_x = lon_to_pixel_x(west, zoom);
    let origin_px_y = lat_to_pixel_y(north, zoom);
    let px = origin_px_x + grid_x as f64 + 0.5;
    let py = origin_px_y + grid_y as f64 + 0.5;
    (pixel_x_to_lon(px, zoom), pixel_y_to_lat(py, zoom))
}
