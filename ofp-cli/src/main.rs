mod logger;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::Point3;
use ofp_core::camera::Projector;
use ofp_core::coordinate::{CrsCode, CrsTransform, GroundPoint, UtmTransform};
use ofp_core::footprint::{FootprintRing, VertexPolicy, project_ring};
use ofp_core::raster::{BufferOptions, FootprintRasterizer, JoinStyle};
use ofp_io::catalog::ImageDescriptor;
use ofp_io::image::{open_rgb, save_png};
use ofp_io::local::{
    CsvFootprintSource, FileAssetFetcher, FixedGeocoder, FlatTerrain, LocalCatalog, load_ring_csv,
};
use ofp_io::{BatchConfig, CancellationToken, Collaborators, DirectorySink, Orchestrator};
use tracing::{Level, debug, info};

#[derive(Parser)]
#[command(name = "ofp")]
#[command(about = "Project building footprints onto oblique aerial photos")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the pixel coordinates of a footprint ring as CSV
    Project {
        #[command(flatten)]
        footprint: FootprintArgs,
    },
    /// Mask and crop (or outline) a footprint in one image
    Crop {
        #[command(flatten)]
        footprint: FootprintArgs,

        /// Image file matching the catalog item
        #[arg(long)]
        image: PathBuf,

        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,

        /// Margin around the footprint in ground units
        #[arg(long, default_value = "1.0")]
        buffer: f64,

        /// Ground sample distance; defaults to the item's `gsd`, then to an
        /// estimate at the footprint centroid
        #[arg(long)]
        gsd: Option<f64>,

        #[arg(long, value_enum, default_value = "miter")]
        join: Join,

        #[arg(long, default_value = "2.0")]
        miter_limit: f64,

        /// Maximum chord deviation of round joins, in pixels
        #[arg(long, default_value = "0.25")]
        arc_tolerance: f64,

        #[arg(long, value_enum, default_value = "masked")]
        mode: Mode,
    },
    /// Run every configured (collection, direction) pair for one address
    Batch {
        /// YAML batch configuration
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long)]
        address: String,

        /// Geocoded longitude of the address
        #[arg(long)]
        lon: f64,

        /// Geocoded latitude of the address
        #[arg(long)]
        lat: f64,

        /// Directory of catalog item JSON files
        #[arg(long)]
        catalog: PathBuf,

        /// Root for relative asset references; defaults to the catalog directory
        #[arg(long)]
        assets: Option<PathBuf>,

        /// Footprint ring CSV (`x,y[,z]`)
        #[arg(long)]
        footprint: PathBuf,

        #[arg(long, default_value = "EPSG:25832")]
        footprint_crs: String,

        /// Elevation used for ring vertices without a z column
        #[arg(long, default_value = "0.0")]
        terrain_height: f64,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct FootprintArgs {
    /// Catalog item JSON describing the photo
    #[arg(long)]
    item: PathBuf,

    /// Footprint ring CSV (`x,y[,z]`)
    #[arg(long)]
    ring: PathBuf,

    /// CRS of the ring; defaults to the camera's CRS
    #[arg(long)]
    ring_crs: Option<String>,

    /// Elevation used for ring vertices without a z column
    #[arg(long, default_value = "0.0")]
    height: f64,

    /// Skip unprojectable vertices instead of failing
    #[arg(long)]
    drop_degenerate: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Join {
    Miter,
    Round,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Masked,
    Outlined,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(if cli.verbose { Level::DEBUG } else { Level::INFO });

    match cli.command {
        Command::Project { footprint } => {
            let (descriptor, ring) = load_footprint(&footprint)?;
            let projected = project_ring(&descriptor.camera, &ring, policy(&footprint))?;

            println!("index,x,y,in_frame");
            for (index, pixel) in projected.iter().enumerate() {
                println!(
                    "{index},{},{},{}",
                    pixel.x,
                    pixel.y,
                    descriptor.camera.contains(pixel)
                );
            }
        }
        Command::Crop {
            footprint,
            image,
            output,
            buffer,
            gsd,
            join,
            miter_limit,
            arc_tolerance,
            mode,
        } => {
            let (descriptor, ring) = load_footprint(&footprint)?;
            let camera = &descriptor.camera;
            let projected = project_ring(camera, &ring, policy(&footprint))?;

            let gsd = match gsd.or(descriptor.gsd) {
                Some(gsd) => gsd,
                None => {
                    let centroid = ring.centroid().context("footprint ring is empty")?;
                    camera.ground_sample_distance_at(&centroid)?
                }
            };

            let raster = open_rgb(&image).with_context(|| format!("reading {}", image.display()))?;
            let (width, height) = camera.image_size();
            if (raster.width(), raster.height()) != (width, height) {
                bail!(
                    "image is {}x{} but the camera sensor is {width}x{height}",
                    raster.width(),
                    raster.height()
                );
            }

            let join = match join {
                Join::Miter => JoinStyle::Miter { limit: miter_limit },
                Join::Round => JoinStyle::Round { arc_tolerance },
            };
            let rasterizer = FootprintRasterizer::new(BufferOptions { distance: buffer, join });
            let processed = match mode {
                Mode::Masked => rasterizer.process(raster, &projected, gsd)?,
                Mode::Outlined => rasterizer.outline(raster, &projected, gsd)?,
            };

            save_png(&processed.image, &output)?;
            info!(
                path = %output.display(),
                width = processed.image.width(),
                height = processed.image.height(),
                gsd,
                "saved crop"
            );
        }
        Command::Batch {
            config,
            address,
            lon,
            lat,
            catalog,
            assets,
            footprint,
            footprint_crs,
            terrain_height,
            output,
        } => {
            let config = BatchConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            let footprint_crs: CrsCode = footprint_crs.parse()?;
            let assets = assets.unwrap_or_else(|| catalog.clone());

            let collaborators = Collaborators {
                geocoder: Box::new(FixedGeocoder::single(lon, lat)),
                footprints: Box::new(CsvFootprintSource::new(footprint, footprint_crs)),
                terrain: Box::new(FlatTerrain {
                    height: terrain_height,
                }),
                catalog: Box::new(LocalCatalog::open(&catalog)?),
                assets: Box::new(FileAssetFetcher::new(assets)),
                sink: Box::new(DirectorySink::new(output)?),
                crs: Box::new(UtmTransform::new()),
            };

            let orchestrator = Orchestrator::new(config, collaborators)?;
            let report = orchestrator.run(&address, &CancellationToken::new())?;
            print!("{report}");
        }
    }

    Ok(())
}

fn policy(args: &FootprintArgs) -> VertexPolicy {
    if args.drop_degenerate {
        VertexPolicy::DropVertex
    } else {
        VertexPolicy::FailRing
    }
}

/// Catalog item plus the ring expressed in the camera's CRS
fn load_footprint(args: &FootprintArgs) -> Result<(ImageDescriptor, FootprintRing<GroundPoint>)> {
    let descriptor = load_item(&args.item)?;
    let (cols, rows) = descriptor.camera.image_size();
    debug!(
        id = %descriptor.id,
        size = %format!("{cols}x{rows}"),
        focal_length_px = descriptor.camera.interior().focal_length_px(),
        crs = %descriptor.camera.crs(),
        "loaded camera"
    );
    let camera_crs = descriptor.camera.crs();
    let ring_crs = match &args.ring_crs {
        Some(crs) => crs.parse::<CrsCode>()?,
        None => camera_crs,
    };

    let transform = UtmTransform::new();
    let mut ring = Vec::new();
    for vertex in load_ring_csv(&args.ring).with_context(|| format!("reading {}", args.ring.display()))? {
        let (x, y) = transform.transform(ring_crs, camera_crs, vertex.x, vertex.y)?;
        ring.push(Point3::new(x, y, vertex.z.unwrap_or(args.height)));
    }
    if ring.is_empty() {
        bail!("{} contains no vertices", args.ring.display());
    }

    Ok((descriptor, FootprintRing::new(ring)))
}

fn load_item(path: &Path) -> Result<ImageDescriptor> {
    let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let descriptor = ImageDescriptor::from_json_str(&json)
        .with_context(|| format!("mapping catalog item {}", path.display()))?;
    Ok(descriptor)
}
