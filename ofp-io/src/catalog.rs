//! Mapping of imagery catalog items onto camera models

use nalgebra::{Matrix3, Point3, Vector2};
use ofp_core::camera::{CameraModel, ExteriorOrientation, InteriorOrientation};
use ofp_core::coordinate::{BoundingBox, CrsCode};
use serde_json::Value;

use crate::error::{IoError, Result};

/// One catalog image: where to fetch it and the camera that took it
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub id: String,
    pub collection: String,
    pub direction: Option<String>,
    pub camera: CameraModel,
    pub asset_href: String,
    /// Ground sample distance published by the catalog, if any
    pub gsd: Option<f64>,
    /// Geographic extent (CRS84) of the image, if published
    pub bbox: Option<BoundingBox>,
}

impl ImageDescriptor {
    /// Validate a catalog item and build its camera model.
    ///
    /// Every missing or malformed key is reported as a schema mismatch naming
    /// the offending field.
    pub fn from_item(item: &Value) -> Result<Self> {
        let properties = field(item, "properties")?;

        let id = string_field(item, "id")?;
        let collection = string_field(item, "collection")?;
        let direction = optional_string(properties, "direction", "properties.direction")?;
        let asset_href = field(item, "assets")
            .and_then(|assets| field(assets, "assets.data"))
            .and_then(|data| string_field(data, "assets.data.href"))?;

        let camera = camera_from_properties(properties)?;

        let gsd = match properties.get("gsd") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let gsd = value
                    .as_f64()
                    .filter(|g| g.is_finite() && *g > 0.0)
                    .ok_or_else(|| IoError::schema("properties.gsd", "expected a positive number"))?;
                Some(gsd)
            }
        };

        let bbox = match item.get("bbox") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let [min_x, min_y, max_x, max_y] = numbers::<4>(value, "bbox")?;
                Some(BoundingBox { min_x, min_y, max_x, max_y })
            }
        };

        Ok(Self {
            id,
            collection,
            direction,
            camera,
            asset_href,
            gsd,
            bbox,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let item: Value = serde_json::from_str(json)?;
        Self::from_item(&item)
    }

    /// First item of a catalog search response (a feature collection), if any
    pub fn first_feature(response: &Value) -> Result<Option<Self>> {
        let features = field(response, "features")?
            .as_array()
            .ok_or_else(|| IoError::schema("features", "expected an array"))?;
        features.first().map(Self::from_item).transpose()
    }
}

/// Build a camera from a `pers:` properties block
pub fn camera_from_properties(properties: &Value) -> Result<CameraModel> {
    const ROTATION: &str = "properties.pers:rotation_matrix";
    const CENTER: &str = "properties.pers:perspective_center";
    const INTERIOR: &str = "properties.pers:interior_orientation";
    const FOCAL_LENGTH: &str = "properties.pers:interior_orientation.focal_length";
    const PPO: &str = "properties.pers:interior_orientation.principal_point_offset";
    const PIXEL_SPACING: &str = "properties.pers:interior_orientation.pixel_spacing";
    const SENSOR: &str = "properties.pers:interior_orientation.sensor_array_dimensions";
    const CRS: &str = "properties.pers:crs";

    let rotation = numbers::<9>(field(properties, ROTATION)?, ROTATION)?;
    let [xc, yc, zc] = numbers::<3>(field(properties, CENTER)?, CENTER)?;

    let interior = field(properties, INTERIOR)?;
    let focal_length = number(field(interior, FOCAL_LENGTH)?, FOCAL_LENGTH)?;
    let [ppo_x, ppo_y] = numbers::<2>(field(interior, PPO)?, PPO)?;
    // Square pixels: only the first spacing component is used
    let pixel_spacing = first_number(field(interior, PIXEL_SPACING)?, PIXEL_SPACING)?;
    let [cols, rows] = numbers::<2>(field(interior, SENSOR)?, SENSOR)?;

    let crs: CrsCode = serde_json::from_value(field(properties, CRS)?.clone())
        .map_err(|e| IoError::schema(CRS, e.to_string()))?;

    let interior = InteriorOrientation::new(
        focal_length,
        pixel_spacing,
        Vector2::new(ppo_x, ppo_y),
        dimension(cols, SENSOR)?,
        dimension(rows, SENSOR)?,
    )?;
    let exterior = ExteriorOrientation::new(Matrix3::from_row_slice(&rotation), Point3::new(xc, yc, zc))?;

    Ok(CameraModel::new(interior, exterior, crs))
}

/// Look up the last segment of a dotted `path` in `value`, reporting the whole path
fn field<'a>(value: &'a Value, path: &str) -> Result<&'a Value> {
    let key = path.rsplit('.').next().unwrap_or(path);
    value
        .get(key)
        .filter(|v| !v.is_null())
        .ok_or_else(|| IoError::schema(path, "missing"))
}

fn string_field(value: &Value, path: &str) -> Result<String> {
    field(value, path)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| IoError::schema(path, "expected a string"))
}

fn optional_string(value: &Value, key: &str, path: &str) -> Result<Option<String>> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(IoError::schema(path, "expected a string")),
    }
}

fn number(value: &Value, path: &str) -> Result<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| IoError::schema(path, "expected a number"))
}

fn first_number(value: &Value, path: &str) -> Result<f64> {
    match value {
        Value::Array(items) => {
            let first = items
                .first()
                .ok_or_else(|| IoError::schema(path, "empty array"))?;
            number(first, path)
        }
        other => number(other, path),
    }
}

fn numbers<const N: usize>(value: &Value, path: &str) -> Result<[f64; N]> {
    let items = value
        .as_array()
        .ok_or_else(|| IoError::schema(path, format!("expected an array of {N} numbers")))?;
    if items.len() != N {
        return Err(IoError::schema(
            path,
            format!("expected {N} numbers, found {}", items.len()),
        ));
    }

    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = number(item, path)?;
    }
    Ok(out)
}

fn dimension(value: f64, path: &str) -> Result<usize> {
    if value >= 1.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(IoError::schema(path, format!("expected a positive integer, got {value}")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ofp_core::camera::Projector;
    use serde_json::json;

    /// Nadir camera 100 m above the origin, 50 px focal length, 100x100 sensor
    pub(crate) fn nadir_item(id: &str, collection: &str, direction: &str) -> Value {
        json!({
            "id": id,
            "collection": collection,
            "bbox": [9.99, 55.99, 10.01, 56.01],
            "properties": {
                "direction": direction,
                "gsd": 2.0,
                "pers:crs": 25832,
                "pers:rotation_matrix": [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
                "pers:perspective_center": [0.0, 0.0, 100.0],
                "pers:interior_orientation": {
                    "focal_length": 5.0,
                    "principal_point_offset": [0.0, 0.0],
                    "pixel_spacing": [0.1, 0.1],
                    "sensor_array_dimensions": [100, 100]
                }
            },
            "assets": { "data": { "href": format!("{id}.png") } }
        })
    }

    #[test]
    fn test_from_item() {
        let descriptor = ImageDescriptor::from_item(&nadir_item("img-1", "aerial2019", "north")).unwrap();

        assert_eq!(descriptor.id, "img-1");
        assert_eq!(descriptor.collection, "aerial2019");
        assert_eq!(descriptor.direction.as_deref(), Some("north"));
        assert_eq!(descriptor.asset_href, "img-1.png");
        assert_eq!(descriptor.gsd, Some(2.0));
        assert_eq!(descriptor.camera.crs(), CrsCode::ETRS89_UTM32N);
        assert_relative_eq!(descriptor.camera.interior().focal_length_px(), 50.0, epsilon = 1e-9);
        assert_eq!(descriptor.camera.image_size(), (100, 100));
        assert!(descriptor.bbox.is_some());
    }

    #[test]
    fn test_projects_like_the_properties_describe() {
        let descriptor = ImageDescriptor::from_item(&nadir_item("img-1", "c", "north")).unwrap();
        let pixel = descriptor.camera.project(&Point3::new(0.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(pixel.x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(pixel.y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_crs_as_string() {
        let mut item = nadir_item("img-1", "c", "north");
        item["properties"]["pers:crs"] = json!("EPSG:25832");
        let descriptor = ImageDescriptor::from_item(&item).unwrap();
        assert_eq!(descriptor.camera.crs(), CrsCode::ETRS89_UTM32N);
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let mut item = nadir_item("img-1", "c", "north");
        item["properties"]
            .as_object_mut()
            .unwrap()
            .remove("pers:perspective_center");

        match ImageDescriptor::from_item(&item) {
            Err(IoError::SchemaMismatch { field, .. }) => {
                assert_eq!(field, "properties.pers:perspective_center")
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }

        let mut item = nadir_item("img-1", "c", "north");
        item["properties"]["pers:interior_orientation"]
            .as_object_mut()
            .unwrap()
            .remove("focal_length");
        match ImageDescriptor::from_item(&item) {
            Err(IoError::SchemaMismatch { field, .. }) => {
                assert_eq!(field, "properties.pers:interior_orientation.focal_length")
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }

        // Missing and mistyped keys read the same way
        let mut item = nadir_item("img-1", "c", "north");
        item["properties"]["pers:interior_orientation"]["focal_length"] = json!("5mm");
        match ImageDescriptor::from_item(&item) {
            Err(IoError::SchemaMismatch { field, .. }) => {
                assert_eq!(field, "properties.pers:interior_orientation.focal_length")
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_shape_is_schema_mismatch() {
        let mut item = nadir_item("img-1", "c", "north");
        item["properties"]["pers:rotation_matrix"] = json!([1.0, 0.0, 0.0]);
        assert!(matches!(
            ImageDescriptor::from_item(&item),
            Err(IoError::SchemaMismatch { .. })
        ));

        let mut item = nadir_item("img-1", "c", "north");
        item["properties"]["pers:interior_orientation"]["sensor_array_dimensions"] = json!([100.5, 100]);
        assert!(matches!(
            ImageDescriptor::from_item(&item),
            Err(IoError::SchemaMismatch { .. })
        ));

        let mut item = nadir_item("img-1", "c", "north");
        item["assets"] = json!({ "data": {} });
        match ImageDescriptor::from_item(&item) {
            Err(IoError::SchemaMismatch { field, .. }) => assert_eq!(field, "assets.data.href"),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_camera_is_rejected() {
        let mut item = nadir_item("img-1", "c", "north");
        item["properties"]["pers:rotation_matrix"] = json!([2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            ImageDescriptor::from_item(&item),
            Err(IoError::Projection(_))
        ));
    }

    #[test]
    fn test_optional_fields() {
        let mut item = nadir_item("img-1", "c", "north");
        let properties = item["properties"].as_object_mut().unwrap();
        properties.remove("gsd");
        properties.remove("direction");
        item.as_object_mut().unwrap().remove("bbox");

        let descriptor = ImageDescriptor::from_item(&item).unwrap();
        assert_eq!(descriptor.gsd, None);
        assert_eq!(descriptor.direction, None);
        assert_eq!(descriptor.bbox, None);
    }

    #[test]
    fn test_first_feature() {
        let response = json!({ "features": [nadir_item("a", "c", "east"), nadir_item("b", "c", "east")] });
        let first = ImageDescriptor::first_feature(&response).unwrap().unwrap();
        assert_eq!(first.id, "a");

        let empty = json!({ "features": [] });
        assert!(ImageDescriptor::first_feature(&empty).unwrap().is_none());
    }
}
