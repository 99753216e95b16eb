use super::crs::CrsCode;
use crate::error::CoordinateError;

type Result<T> = std::result::Result<T, CoordinateError>;

// WGS84 ellipsoid parameters (GRS80 differs below a millimetre for UTM)
const WGS84_A: f64 = 6378137.0; // semi-major axis (meters)
const WGS84_F: f64 = 1.0 / 298.257223563; // flattening

const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Converts coordinate pairs between reference systems.
///
/// Geographic systems use longitude as `x` and latitude as `y`, in degrees.
/// Implementations must be cheap to share between worker threads.
pub trait CrsTransform: Send + Sync {
    fn transform(&self, from: CrsCode, to: CrsCode, x: f64, y: f64) -> Result<(f64, f64)>;
}

/// A Universal Transverse Mercator zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtmZone {
    pub number: u32,
    pub north: bool,
}

impl UtmZone {
    /// Zone for EPSG 326zz / 327zz (WGS84) and 258zz (ETRS89)
    pub fn from_crs(crs: CrsCode) -> Option<Self> {
        let code = crs.code();
        let (number, north) = match code {
            32601..=32660 => (code - 32600, true),
            32701..=32760 => (code - 32700, false),
            25828..=25838 => (code - 25800, true),
            _ => return None,
        };
        Some(Self { number, north })
    }

    fn central_meridian(&self) -> f64 {
        (self.number as f64 * 6.0 - 183.0).to_radians()
    }

    fn false_northing(&self) -> f64 {
        if self.north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH }
    }
}

/// Krüger-series transverse Mercator between geographic WGS84 and UTM zones.
///
/// ETRS89 and WGS84 are treated as the same datum; the sub-metre drift
/// between them is well below an oblique photo's ground sample distance.
#[derive(Debug, Clone)]
pub struct UtmTransform {
    a_hat: f64,
    e: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl Default for UtmTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl UtmTransform {
    pub fn new() -> Self {
        let n = WGS84_F / (2.0 - WGS84_F);
        let n2 = n * n;
        let n3 = n2 * n;

        Self {
            a_hat: WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            e: (WGS84_F * (2.0 - WGS84_F)).sqrt(),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }

    /// Geographic (lon, lat in degrees) to UTM (easting, northing)
    pub fn to_utm(&self, zone: UtmZone, lon: f64, lat: f64) -> Result<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::InvalidLatitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::InvalidLongitude(lon));
        }

        let phi = lat.to_radians();
        let dlambda = lon.to_radians() - zone.central_meridian();

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();
        let xi_p = t.atan2(dlambda.cos());
        let eta_p = (dlambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += alpha * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let easting = UTM_FALSE_EASTING + UTM_K0 * self.a_hat * eta;
        let northing = zone.false_northing() + UTM_K0 * self.a_hat * xi;
        Ok((easting, northing))
    }

    /// UTM (easting, northing) to geographic (lon, lat in degrees)
    pub fn to_geographic(&self, zone: UtmZone, easting: f64, northing: f64) -> Result<(f64, f64)> {
        let xi = (northing - zone.false_northing()) / (UTM_K0 * self.a_hat);
        let eta = (easting - UTM_FALSE_EASTING) / (UTM_K0 * self.a_hat);

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            phi += delta * (2.0 * (j + 1) as f64 * chi).sin();
        }
        let lambda = zone.central_meridian() + eta_p.sinh().atan2(xi_p.cos());

        let (lon, lat) = (lambda.to_degrees(), phi.to_degrees());
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::TransformFailed(format!(
                "non-finite result for ({easting}, {northing})"
            )));
        }
        Ok((lon, lat))
    }
}

impl CrsTransform for UtmTransform {
    fn transform(&self, from: CrsCode, to: CrsCode, x: f64, y: f64) -> Result<(f64, f64)> {
        if from == to {
            return Ok((x, y));
        }

        let unsupported = || CoordinateError::UnsupportedCrs { from, to };
        let (lon, lat) = if from.is_geographic() {
            (x, y)
        } else {
            let zone = UtmZone::from_crs(from).ok_or_else(unsupported)?;
            self.to_geographic(zone, x, y)?
        };

        if to.is_geographic() {
            return Ok((lon, lat));
        }
        let zone = UtmZone::from_crs(to).ok_or_else(unsupported)?;
        self.to_utm(zone, lon, lat)
    }
}
