use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// EPSG identifier of a coordinate reference system
///
/// Parses the spellings catalog and cadastral services hand out:
/// `25832`, `EPSG:25832`, `urn:ogc:def:crs:EPSG::25832`,
/// `http://www.opengis.net/def/crs/EPSG/0/25832` and the OGC `CRS84` URI,
/// which maps to EPSG:4326 with longitude-first axis order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CrsRepr", into = "String")]
pub struct CrsCode(u32);

impl CrsCode {
    pub const WGS84: CrsCode = CrsCode(4326);
    pub const ETRS89_UTM32N: CrsCode = CrsCode(25832);

    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    pub fn is_geographic(&self) -> bool {
        self.0 == 4326 || self.0 == 4258
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for CrsCode {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.ends_with("CRS84") {
            return Ok(CrsCode::WGS84);
        }

        // The code is always the last colon- or slash-separated token
        let digits = trimmed
            .rsplit(|c: char| c == ':' || c == '/')
            .next()
            .unwrap_or_default();

        let lower = trimmed.to_ascii_lowercase();
        let known_prefix = trimmed == digits
            || lower.starts_with("epsg:")
            || lower.starts_with("urn:ogc:def:crs:epsg:")
            || lower.starts_with("http://www.opengis.net/def/crs/epsg/");

        match digits.parse::<u32>() {
            Ok(code) if known_prefix && code > 0 => Ok(CrsCode(code)),
            _ => Err(CoordinateError::InvalidCrsCode(s.to_string())),
        }
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CrsRepr {
    Code(u32),
    Text(String),
}

impl TryFrom<CrsRepr> for CrsCode {
    type Error = CoordinateError;

    fn try_from(repr: CrsRepr) -> Result<Self, Self::Error> {
        match repr {
            CrsRepr::Code(0) => Err(CoordinateError::InvalidCrsCode("0".to_string())),
            CrsRepr::Code(code) => Ok(CrsCode(code)),
            CrsRepr::Text(text) => text.parse(),
        }
    }
}
