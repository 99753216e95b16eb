use nalgebra::Point2;
use ndarray::Array2;

/// Per-pixel footprint membership over an image's full extent
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedMask {
    cells: Array2<bool>,
}

impl BufferedMask {
    /// Fill a ring with the nonzero winding rule, sampling pixel centers,
    /// then add every pixel the ring's edges pass through.
    pub fn rasterize(ring: &[Point2<f64>], width: usize, height: usize) -> Self {
        let mut cells = Array2::from_elem((height, width), false);
        if ring.is_empty() || width == 0 || height == 0 {
            return Self { cells };
        }

        let (y_lo, y_hi) = ring
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let first_row = y_lo.floor().max(0.0) as usize;
        let last_row = (y_hi.ceil().max(0.0) as usize).min(height);

        let mut crossings: Vec<(f64, i32)> = Vec::new();
        for row in first_row..last_row {
            let yc = row as f64 + 0.5;
            crossings.clear();

            for (i, p) in ring.iter().enumerate() {
                let q = &ring[(i + 1) % ring.len()];
                let direction = if p.y <= yc && q.y > yc {
                    1
                } else if q.y <= yc && p.y > yc {
                    -1
                } else {
                    continue;
                };
                let x = p.x + (yc - p.y) * (q.x - p.x) / (q.y - p.y);
                crossings.push((x, direction));
            }
            crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            for pair in crossings.windows(2) {
                winding += pair[0].1;
                if winding == 0 {
                    continue;
                }
                // Pixels whose center lies in [x_start, x_end)
                let start = (pair[0].0 - 0.5).ceil().max(0.0) as usize;
                let end = ((pair[1].0 - 0.5).ceil().max(0.0) as usize).min(width);
                for col in start..end {
                    cells[[row, col]] = true;
                }
            }
        }

        for (i, p) in ring.iter().enumerate() {
            let q = &ring[(i + 1) % ring.len()];
            stroke_segment(&mut cells, p, q);
        }

        Self { cells }
    }

    pub fn width(&self) -> usize {
        self.cells.ncols()
    }

    pub fn height(&self) -> usize {
        self.cells.nrows()
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.cells.get((y, x)).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&set| set).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&set| set)
    }

    /// Set pixels with at least one unset 4-neighbour inside the grid
    pub fn boundary(&self) -> Vec<(usize, usize)> {
        let (rows, cols) = self.cells.dim();
        let mut edge = Vec::new();
        for ((row, col), &set) in self.cells.indexed_iter() {
            if !set {
                continue;
            }
            let outside = (row > 0 && !self.cells[[row - 1, col]])
                || (row + 1 < rows && !self.cells[[row + 1, col]])
                || (col > 0 && !self.cells[[row, col - 1]])
                || (col + 1 < cols && !self.cells[[row, col + 1]]);
            if outside {
                edge.push((col, row));
            }
        }
        edge
    }
}

/// Mark every pixel touched by a segment, sampled at half-pixel steps
/// over the part that lies inside the grid
fn stroke_segment(cells: &mut Array2<bool>, p: &Point2<f64>, q: &Point2<f64>) {
    let (rows, cols) = cells.dim();
    let Some((p, q)) = clip_segment(p, q, cols as f64, rows as f64) else {
        return;
    };
    let span = (q.x - p.x).abs().max((q.y - p.y).abs());
    let steps = (span * 2.0).ceil().max(1.0) as usize;

    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let x = p.x + t * (q.x - p.x);
        let y = p.y + t * (q.y - p.y);
        if x < 0.0 || y < 0.0 {
            continue;
        }
        let (col, row) = (x.floor() as usize, y.floor() as usize);
        if col < cols && row < rows {
            cells[[row, col]] = true;
        }
    }
}

/// Liang-Barsky clip of `p`-`q` against `[0, width] x [0, height]`
fn clip_segment(
    p: &Point2<f64>,
    q: &Point2<f64>,
    width: f64,
    height: f64,
) -> Option<(Point2<f64>, Point2<f64>)> {
    let d = q - p;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (denom, num) in [(-d.x, p.x), (d.x, width - p.x), (-d.y, p.y), (d.y, height - p.y)] {
        if denom == 0.0 {
            if num < 0.0 {
                return None;
            }
            continue;
        }
        let t = num / denom;
        if denom < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }
    Some((p + d * t0, p + d * t1))
}
