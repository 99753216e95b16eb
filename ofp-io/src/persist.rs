//! Writing batch results to a directory

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::collaborators::{CollaboratorResult, OutputRecord, ResultSink};
use crate::error::{CollaboratorError, Result};
use crate::image::save_png;

const METADATA_COLUMNS: [&str; 6] = ["key", "collection", "direction", "x", "y", "pixel_size"];

/// Saves each rendering as `<stem>_<collection>_<direction>_<rendering>.png` and
/// appends the projected footprint of every pair to `<stem>.csv`, where the
/// stem is the target address with whitespace removed.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    /// (stem, pair index) already written to the metadata file
    written: Mutex<HashSet<(String, usize)>>,
}

impl DirectorySink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            written: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, record: &OutputRecord<'_>) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_{}_{}.png",
            file_stem(record.target),
            file_stem(&record.key.collection),
            file_stem(&record.key.direction),
            record.rendering
        ))
    }

    pub fn metadata_path(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", file_stem(target)))
    }

    fn append_metadata(&self, record: &OutputRecord<'_>) -> std::result::Result<(), csv::Error> {
        let entry = (file_stem(record.target), record.key.index);
        let mut written = self
            .written
            .lock()
            .map_err(|_| std::io::Error::other("metadata lock poisoned"))?;
        if written.contains(&entry) {
            return Ok(());
        }

        let path = self.metadata_path(record.target);
        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(METADATA_COLUMNS)?;
        }

        let index = record.key.index.to_string();
        let pixel_size = record.ground_sample_distance.to_string();
        for point in record.footprint.iter() {
            let (x, y) = (point.x.to_string(), point.y.to_string());
            writer.write_record([
                index.as_str(),
                record.key.collection.as_str(),
                record.key.direction.as_str(),
                x.as_str(),
                y.as_str(),
                pixel_size.as_str(),
            ])?;
        }
        writer.flush()?;

        // Only a completed write marks the pair as done
        written.insert(entry);
        Ok(())
    }
}

impl ResultSink for DirectorySink {
    fn persist(&self, record: &OutputRecord<'_>) -> CollaboratorResult<()> {
        let path = self.image_path(record);
        save_png(record.image, &path)
            .map_err(|err| CollaboratorError::PersistFailed(format!("{}: {err}", path.display())))?;
        self.append_metadata(record)
            .map_err(|err| CollaboratorError::PersistFailed(err.to_string()))?;
        debug!(path = %path.display(), "saved result");
        Ok(())
    }
}

/// Address or name reduced to something safe inside a file name
fn file_stem(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::PairKey;
    use crate::catalog::ImageDescriptor;
    use crate::catalog::tests::nadir_item;
    use crate::config::Rendering;
    use ofp_core::coordinate::ImagePoint;
    use ofp_core::footprint::FootprintRing;
    use ofp_core::raster::RasterImage;

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Nyborgvej 69, 5000 Odense"), "Nyborgvej69_5000Odense");
        assert_eq!(file_stem("a/b"), "a_b");
    }

    #[test]
    fn test_persist_writes_image_and_metadata_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("out")).unwrap();

        let descriptor = ImageDescriptor::from_item(&nadir_item("img-1", "aerial2019", "north")).unwrap();
        let key = PairKey {
            index: 0,
            collection: "aerial2019".into(),
            direction: "north".into(),
        };
        let footprint: FootprintRing<ImagePoint> =
            vec![ImagePoint::new(1.5, 2.0), ImagePoint::new(3.0, 4.25)].into_iter().collect();
        let image = RasterImage::new(4, 3, 3).unwrap();

        for rendering in [Rendering::Masked, Rendering::Outlined] {
            let record = OutputRecord {
                target: "Main Street 1",
                key: &key,
                rendering,
                image: &image,
                descriptor: &descriptor,
                footprint: &footprint,
                ground_sample_distance: 0.1,
            };
            sink.persist(&record).unwrap();
        }

        let out = dir.path().join("out");
        assert!(out.join("MainStreet1_aerial2019_north_masked.png").is_file());
        assert!(out.join("MainStreet1_aerial2019_north_outlined.png").is_file());

        let csv = fs::read_to_string(out.join("MainStreet1.csv")).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "key,collection,direction,x,y,pixel_size",
                "0,aerial2019,north,1.5,2,0.1",
                "0,aerial2019,north,3,4.25,0.1",
            ]
        );
    }

    #[test]
    fn test_failed_metadata_write_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path()).unwrap();

        let descriptor = ImageDescriptor::from_item(&nadir_item("img-1", "a", "north")).unwrap();
        let key = PairKey {
            index: 2,
            collection: "aerial, 2019".into(),
            direction: "north".into(),
        };
        let footprint: FootprintRing<ImagePoint> = vec![ImagePoint::new(1.0, 2.0)].into_iter().collect();
        let image = RasterImage::new(2, 2, 3).unwrap();
        let record = OutputRecord {
            target: "Main Street 1",
            key: &key,
            rendering: Rendering::Masked,
            image: &image,
            descriptor: &descriptor,
            footprint: &footprint,
            ground_sample_distance: 0.5,
        };

        // A directory where the metadata file should go makes the write fail
        let csv_path = sink.metadata_path("Main Street 1");
        fs::create_dir(&csv_path).unwrap();
        assert!(matches!(sink.persist(&record), Err(CollaboratorError::PersistFailed(_))));

        fs::remove_dir(&csv_path).unwrap();
        sink.persist(&record).unwrap();

        let csv = fs::read_to_string(&csv_path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        // Names containing the delimiter are quoted
        assert_eq!(
            lines,
            vec!["key,collection,direction,x,y,pixel_size", "2,\"aerial, 2019\",north,1,2,0.5"]
        );
    }
}
