//! Coordinate mapping between flat grid indices and 2-D positions.
//!
//! The grid is tiled by chips. A flat index is laid out chip-major: all
//! `EACHCHIPX * EACHCHIPY` elements of tile 0 first, then tile 1, and so on,
//! where tile `t` sits at chip `(t / YCHIPS, t % YCHIPS)`. Within a tile the
//! element id is `ex * EACHCHIPY + ey`.

use crate::types::ChipAddress;
use crate::{Result, VisError};
use serde::{Deserialize, Serialize};

/// Validated grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateSpace {
    x_dim: usize,
    y_dim: usize,
    each_chip_x: usize,
    each_chip_y: usize,
}

/// Display orientation flags, applied in field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub y_flip: bool,
    pub x_flip: bool,
    pub vector_flip: bool,
    pub rotate: bool,
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        !(self.y_flip || self.x_flip || self.vector_flip || self.rotate)
    }
}

impl CoordinateSpace {
    /// Create a geometry, rejecting zero sizes and dimensions that do not
    /// tile exactly.
    pub fn new(x_dim: usize, y_dim: usize, each_chip_x: usize, each_chip_y: usize) -> Result<Self> {
        if x_dim == 0 || y_dim == 0 || each_chip_x == 0 || each_chip_y == 0 {
            return Err(VisError::config(format!(
                "grid {x_dim}x{y_dim} with {each_chip_x}x{each_chip_y} per chip has a zero size"
            )));
        }
        if x_dim % each_chip_x != 0 || y_dim % each_chip_y != 0 {
            return Err(VisError::config(format!(
                "grid {x_dim}x{y_dim} is not tiled exactly by {each_chip_x}x{each_chip_y} chips"
            )));
        }
        let space = Self { x_dim, y_dim, each_chip_x, each_chip_y };
        if space.chip_count() > (u8::MAX as usize + 1) * (u8::MAX as usize + 1) {
            return Err(VisError::config(format!(
                "{} chips cannot be addressed with 8-bit coordinates",
                space.chip_count()
            )));
        }
        Ok(space)
    }

    pub fn x_dim(&self) -> usize {
        self.x_dim
    }

    pub fn y_dim(&self) -> usize {
        self.y_dim
    }

    pub fn each_chip_x(&self) -> usize {
        self.each_chip_x
    }

    pub fn each_chip_y(&self) -> usize {
        self.each_chip_y
    }

    pub fn x_chips(&self) -> usize {
        self.x_dim / self.each_chip_x
    }

    pub fn y_chips(&self) -> usize {
        self.y_dim / self.each_chip_y
    }

    /// Number of grid cells.
    pub fn len(&self) -> usize {
        self.x_dim * self.y_dim
    }

    /// Always false: a validated space has at least one cell.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cells per chip tile.
    pub fn chip_len(&self) -> usize {
        self.each_chip_x * self.each_chip_y
    }

    pub fn chip_count(&self) -> usize {
        self.x_chips() * self.y_chips()
    }

    /// Position of a flat index.
    pub fn index_to_coord(&self, index: usize) -> (usize, usize) {
        let element = index % self.chip_len();
        let tile = index / self.chip_len();
        let x = (tile / self.y_chips()) * self.each_chip_x + element / self.each_chip_y;
        let y = (tile % self.y_chips()) * self.each_chip_y + element % self.each_chip_y;
        (x, y)
    }

    /// Flat index of a position.
    pub fn coord_to_index(&self, x: usize, y: usize) -> usize {
        let element = (x % self.each_chip_x) * self.each_chip_y + y % self.each_chip_y;
        let tile = (x / self.each_chip_x) * self.y_chips() + y / self.each_chip_y;
        tile * self.chip_len() + element
    }

    /// Tile number of the chip at `(x, y)`.
    pub fn tile_id(&self, x: usize, y: usize) -> usize {
        x * self.y_chips() + y
    }

    /// First flat index belonging to chip `(x, y)`.
    pub fn chip_base_index(&self, x: usize, y: usize) -> usize {
        self.tile_id(x, y) * self.chip_len()
    }

    /// Chip that owns a tile number, if the tile exists.
    pub fn chip_of(&self, tile_id: usize) -> Option<ChipAddress> {
        if tile_id >= self.chip_count() {
            return None;
        }
        let x = u8::try_from(tile_id / self.y_chips()).ok()?;
        let y = u8::try_from(tile_id % self.y_chips()).ok()?;
        Some(ChipAddress::new(x, y))
    }

    /// Reorient an index: Y-mirror, X-mirror, vector reverse, then 90°
    /// rotation `(x, y) -> (y, XDIM-1-x)`.
    ///
    /// Rotation of a non-square grid can leave the grid; that is reported as
    /// [`VisError::IndexOutOfRange`].
    pub fn apply_transform(&self, index: usize, transform: Transform) -> Result<usize> {
        let mut i = checked_index(index as i64, self.len())?;
        if transform.is_identity() {
            return Ok(i);
        }

        if transform.y_flip || transform.x_flip {
            let (mut x, mut y) = self.index_to_coord(i);
            if transform.y_flip {
                y = self.y_dim - 1 - y;
            }
            if transform.x_flip {
                x = self.x_dim - 1 - x;
            }
            i = self.coord_to_index(x, y);
        }
        if transform.vector_flip {
            i = self.len() - 1 - i;
        }
        if transform.rotate {
            let (x, y) = self.index_to_coord(i);
            let (rx, ry) = (y, self.x_dim - 1 - x);
            if rx >= self.x_dim || ry >= self.y_dim {
                return Err(VisError::index_out_of_range(
                    (ry * self.x_dim + rx) as i64,
                    self.len(),
                ));
            }
            i = self.coord_to_index(rx, ry);
        }
        Ok(i)
    }
}

/// The single bounds check for indices derived from wire data: `[0, len)`.
pub fn checked_index(index: i64, len: usize) -> Result<usize> {
    if index < 0 || index as u64 >= len as u64 {
        return Err(VisError::index_out_of_range(index, len));
    }
    Ok(index as usize)
}
