//! File-backed collaborators for offline runs and tests

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use nalgebra::Point2;
use ofp_core::coordinate::{BoundingBox, CrsCode};
use tracing::{debug, warn};

use crate::catalog::ImageDescriptor;
use crate::collaborators::{
    AssetFetcher, CollaboratorResult, FootprintSource, GeocodedAddress, Geocoder, ImageryCatalog,
    PlanarFootprint, TerrainModel,
};
use crate::error::{CollaboratorError, IoError, Result};

/// One vertex of a ring file, `x,y[,z]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingVertex {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

/// Parse a ring from comma separated `x,y[,z]` lines.
///
/// Blank lines and lines starting with `#` are skipped, as is a leading
/// header line that does not parse as numbers.
pub fn read_ring_csv<R: BufRead>(reader: R) -> Result<Vec<RingVertex>> {
    let mut vertices = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let parsed: std::result::Result<Vec<f64>, _> = fields.iter().map(|f| f.parse::<f64>()).collect();
        let values = match parsed {
            Ok(values) => values,
            Err(_) if vertices.is_empty() && number == 0 => continue,
            Err(_) => {
                return Err(IoError::InvalidInput(format!(
                    "line {}: expected numbers, got `{line}`",
                    number + 1
                )));
            }
        };

        let vertex = match values.as_slice() {
            [x, y] => RingVertex { x: *x, y: *y, z: None },
            [x, y, z] => RingVertex { x: *x, y: *y, z: Some(*z) },
            _ => {
                return Err(IoError::InvalidInput(format!(
                    "line {}: expected 2 or 3 columns, got {}",
                    number + 1,
                    values.len()
                )));
            }
        };
        vertices.push(vertex);
    }
    Ok(vertices)
}

pub fn load_ring_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RingVertex>> {
    read_ring_csv(BufReader::new(fs::File::open(path)?))
}

/// Geocoder answering from a fixed table, with an optional fallback location
#[derive(Debug, Clone, Default)]
pub struct FixedGeocoder {
    entries: HashMap<String, GeocodedAddress>,
    fallback: Option<GeocodedAddress>,
}

impl FixedGeocoder {
    /// Every address resolves to the same location
    pub fn single(lon: f64, lat: f64) -> Self {
        Self {
            entries: HashMap::new(),
            fallback: Some(GeocodedAddress {
                lon,
                lat,
                cadastral_ids: Vec::new(),
            }),
        }
    }

    pub fn with_address(mut self, address: &str, location: GeocodedAddress) -> Self {
        self.entries.insert(normalize(address), location);
        self
    }
}

fn normalize(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl Geocoder for FixedGeocoder {
    fn geocode(&self, address: &str) -> CollaboratorResult<GeocodedAddress> {
        self.entries
            .get(&normalize(address))
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| CollaboratorError::AddressNotFound(address.to_string()))
    }
}

/// Footprint read from a ring file, whatever region is asked for
#[derive(Debug, Clone)]
pub struct CsvFootprintSource {
    path: PathBuf,
    crs: CrsCode,
}

impl CsvFootprintSource {
    pub fn new<P: Into<PathBuf>>(path: P, crs: CrsCode) -> Self {
        Self {
            path: path.into(),
            crs,
        }
    }
}

impl FootprintSource for CsvFootprintSource {
    fn footprint(&self, _region: &BoundingBox, _target: &GeocodedAddress) -> CollaboratorResult<PlanarFootprint> {
        let vertices = load_ring_csv(&self.path).map_err(|err| match err {
            IoError::Io(e) if e.kind() == io::ErrorKind::NotFound => {
                CollaboratorError::FeatureNotFound(self.path.display().to_string())
            }
            other => CollaboratorError::FetchFailed(other.to_string()),
        })?;
        if vertices.is_empty() {
            return Err(CollaboratorError::FeatureNotFound(format!(
                "{} contains no vertices",
                self.path.display()
            )));
        }

        let heights: Option<Vec<f64>> = vertices.iter().map(|v| v.z).collect();
        Ok(PlanarFootprint {
            points: vertices.iter().map(|v| Point2::new(v.x, v.y)).collect(),
            heights,
            crs: self.crs,
        })
    }
}

/// Terrain at a constant elevation
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub height: f64,
}

impl TerrainModel for FlatTerrain {
    fn height(&self, _crs: CrsCode, _x: f64, _y: f64) -> CollaboratorResult<f64> {
        Ok(self.height)
    }
}

/// Catalog over a directory of item JSON files
#[derive(Debug, Clone)]
pub struct LocalCatalog {
    items: Vec<ImageDescriptor>,
}

impl LocalCatalog {
    /// Load every `*.json` item in `dir`. Files that are not valid items are
    /// skipped with a warning.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut items = Vec::with_capacity(paths.len());
        for path in paths {
            let parsed = fs::read_to_string(&path)
                .map_err(IoError::from)
                .and_then(|json| ImageDescriptor::from_json_str(&json));
            match parsed {
                Ok(item) => items.push(item),
                Err(err) => warn!(path = %path.display(), %err, "skipping catalog item"),
            }
        }
        debug!(count = items.len(), "loaded local catalog");

        Ok(Self { items })
    }

    pub fn from_items(items: Vec<ImageDescriptor>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ImageryCatalog for LocalCatalog {
    fn find(
        &self,
        region: &BoundingBox,
        collection: &str,
        direction: &str,
    ) -> CollaboratorResult<Option<ImageDescriptor>> {
        Ok(self
            .items
            .iter()
            .find(|item| {
                item.collection == collection
                    && item.direction.as_deref() == Some(direction)
                    && item.bbox.is_none_or(|bbox| bbox.intersects(region))
            })
            .cloned())
    }
}

/// Reads assets from the local filesystem, relative hrefs resolved against `root`
#[derive(Debug, Clone)]
pub struct FileAssetFetcher {
    root: PathBuf,
}

impl FileAssetFetcher {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, href: &str) -> CollaboratorResult<PathBuf> {
        if href.starts_with("http://") || href.starts_with("https://") {
            return Err(CollaboratorError::FetchFailed(format!(
                "remote asset {href} cannot be read from the filesystem"
            )));
        }
        let path = Path::new(href.strip_prefix("file://").unwrap_or(href));
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }
}

impl AssetFetcher for FileAssetFetcher {
    fn fetch(&self, descriptor: &ImageDescriptor) -> CollaboratorResult<Vec<u8>> {
        let path = self.resolve(&descriptor.asset_href)?;
        fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                CollaboratorError::Transient(format!("{}: {err}", path.display()))
            }
            _ => CollaboratorError::FetchFailed(format!("{}: {err}", path.display())),
        })
    }
}
