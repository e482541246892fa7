//! Hull sprites and the destructible damage mask.
//!
//! A ship's mask is a coarse copy of its hull's alpha channel: one cell per
//! `KEY_SIZE_FACTOR`² block of pixels, intact if any pixel in the block was
//! visible. Projectiles are tested against the mask by walking every cell
//! their path crosses; hit cells are cleared and never come back.

use crate::error::HullError;
use rapier2d::prelude::Point;

/// Alpha channel of a hull texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HullSprite {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl HullSprite {
    /// Wraps a row-major alpha buffer of `width * height` bytes.
    pub fn new(width: u32, height: u32, alpha: Vec<u8>) -> Result<Self, HullError> {
        if width == 0 || height == 0 {
            return Err(HullError::Empty);
        }
        if alpha.len() != width as usize * height as usize {
            return Err(HullError::SizeMismatch {
                width,
                height,
                actual: alpha.len(),
            });
        }
        Ok(Self {
            width,
            height,
            alpha,
        })
    }

    /// A fully opaque rectangular hull.
    pub fn solid(width: u32, height: u32) -> Result<Self, HullError> {
        Self::new(width, height, vec![u8::MAX; width as usize * height as usize])
    }

    /// Builds a hull by evaluating `alpha_at(x, y)` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut alpha_at: impl FnMut(u32, u32) -> u8,
    ) -> Result<Self, HullError> {
        let mut alpha = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                alpha.push(alpha_at(x, y));
            }
        }
        Self::new(width, height, alpha)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    /// Alpha at a pixel; pixels outside the sprite are transparent.
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.alpha[y as usize * self.width as usize + x as usize]
    }

    pub fn is_opaque_at(&self, pixel: &Point<f32>) -> bool {
        if pixel.x < 0.0 || pixel.y < 0.0 {
            return false;
        }
        self.alpha(pixel.x as u32, pixel.y as u32) != 0
    }
}

/// Integer coordinates of a mask cell. May lie outside the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Downsampled, destructible copy of a hull's opacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DamageMask {
    width: u32,
    height: u32,
    factor: u32,
    cells: Vec<bool>,
}

impl DamageMask {
    pub fn from_hull(hull: &HullSprite, factor: u32) -> Self {
        let factor = factor.max(1);
        let width = hull.width().div_ceil(factor);
        let height = hull.height().div_ceil(factor);
        let mut cells = Vec::with_capacity(width as usize * height as usize);

        for cell_y in 0..height {
            for cell_x in 0..width {
                let (left, top) = (cell_x * factor, cell_y * factor);
                let opaque = (top..top + factor)
                    .any(|y| (left..left + factor).any(|x| hull.alpha(x, y) != 0));
                cells.push(opaque);
            }
        }

        Self {
            width,
            height,
            factor,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    pub fn intact_count(&self) -> usize {
        self.cells.iter().filter(|intact| **intact).count()
    }

    /// Cell containing a hull-space pixel position.
    pub fn cell_at(&self, pixel: &Point<f32>) -> CellCoord {
        let factor = self.factor as f32;
        CellCoord::new(
            (pixel.x / factor).floor() as i32,
            (pixel.y / factor).floor() as i32,
        )
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width as i32 || cell.y >= self.height as i32 {
            return None;
        }
        Some(cell.y as usize * self.width as usize + cell.x as usize)
    }

    /// Whether `cell` is inside the mask and still intact.
    pub fn is_intact(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some_and(|i| self.cells[i])
    }

    /// Clears `cell`. Returns whether it was intact beforehand.
    pub fn clear(&mut self, cell: CellCoord) -> bool {
        match self.index(cell) {
            Some(i) => std::mem::replace(&mut self.cells[i], false),
            None => false,
        }
    }

    /// First intact cell crossed by the segment `from -> to` (hull pixels).
    pub fn first_intact_on_segment(&self, from: &Point<f32>, to: &Point<f32>) -> Option<CellCoord> {
        SupercoverLine::new(self.cell_at(from), self.cell_at(to)).find(|cell| self.is_intact(*cell))
    }
}

/// Every grid cell touched by the line between two cells, in order from
/// `start` to `end` inclusive.
///
/// Unlike plain Bresenham, a diagonal step never skips the cells beside it:
/// when the line passes exactly through a cell corner both neighbours are
/// emitted before the diagonal cell.
#[derive(Debug, Clone)]
pub struct SupercoverLine {
    cursor: CellCoord,
    step_x: i32,
    step_y: i32,
    span_x: i64,
    span_y: i64,
    taken_x: i64,
    taken_y: i64,
    started: bool,
    pending: Vec<CellCoord>,
}

impl SupercoverLine {
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        Self {
            cursor: start,
            step_x: (end.x - start.x).signum(),
            step_y: (end.y - start.y).signum(),
            span_x: (i64::from(end.x) - i64::from(start.x)).abs(),
            span_y: (i64::from(end.y) - i64::from(start.y)).abs(),
            taken_x: 0,
            taken_y: 0,
            started: false,
            pending: Vec::new(),
        }
    }
}

impl Iterator for SupercoverLine {
    type Item = CellCoord;

    fn next(&mut self) -> Option<CellCoord> {
        if let Some(cell) = self.pending.pop() {
            return Some(cell);
        }
        if !self.started {
            self.started = true;
            return Some(self.cursor);
        }
        if self.taken_x >= self.span_x && self.taken_y >= self.span_y {
            return None;
        }

        // Compare where the line crosses the next vertical and horizontal
        // cell boundaries; both scaled by 2 * span_x * span_y.
        let decision = (1 + 2 * self.taken_x) * self.span_y - (1 + 2 * self.taken_y) * self.span_x;

        if decision == 0 {
            let beside_x = CellCoord::new(self.cursor.x + self.step_x, self.cursor.y);
            let beside_y = CellCoord::new(self.cursor.x, self.cursor.y + self.step_y);
            self.cursor = CellCoord::new(self.cursor.x + self.step_x, self.cursor.y + self.step_y);
            self.taken_x += 1;
            self.taken_y += 1;
            // Popped in reverse: beside_y, then the diagonal cell.
            self.pending.push(self.cursor);
            self.pending.push(beside_y);
            return Some(beside_x);
        }

        if decision < 0 {
            self.cursor.x += self.step_x;
            self.taken_x += 1;
        } else {
            self.cursor.y += self.step_y;
            self.taken_y += 1;
        }
        Some(self.cursor)
    }
}
