//! Uniform-height row layout and pointer hit testing, for hosts that don't have
//! their own.

use serde_derive::Deserialize;

use crate::model::display::DisplayModel;
use crate::model::display::RowRef;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }
}

/// Where, relative to a hovered row, a drop would land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before,
    After,
    Into,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit {
    Row { row: RowRef, position: Position },

    /// Inside the view but below the last visible row.
    Blank,

    Outside,
}

/// Fractions of a row's height. Above `before` is [Position::Before], below
/// `after` is [Position::After], anything between is [Position::Into].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DropZones {
    pub before: f64,
    pub after: f64,
}

impl Default for DropZones {
    fn default() -> Self {
        DropZones {
            before: 0.25,
            after: 0.75,
        }
    }
}

impl DropZones {
    pub fn position(&self, fraction: f64) -> Position {
        if fraction < self.before {
            Position::Before
        } else if fraction > self.after {
            Position::After
        } else {
            Position::Into
        }
    }

    /// A fraction that falls squarely inside the zone for `position`.
    fn center(&self, position: Position) -> f64 {
        match position {
            Position::Before => self.before / 2.0,
            Position::Into => (self.before + self.after) / 2.0,
            Position::After => (self.after + 1.0) / 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub row_height: f64,

    /// Vertical scroll offset, in the same units as `row_height`.
    pub scroll: f64,
    pub zones: DropZones,
}

impl Layout {
    pub fn new(row_height: f64, zones: DropZones) -> Layout {
        Layout {
            row_height,
            scroll: 0.0,
            zones,
        }
    }

    pub fn hit(&self, model: &DisplayModel, point: Point) -> Hit {
        if point.x < 0.0 || point.y < 0.0 || self.row_height <= 0.0 {
            return Hit::Outside;
        }

        let y = point.y + self.scroll;
        let index = (y / self.row_height).floor() as usize;

        match model.visible_rows().get(index) {
            Some(row) => {
                let fraction = (y - index as f64 * self.row_height) / self.row_height;
                Hit::Row { row: *row, position: self.zones.position(fraction) }
            },
            None => Hit::Blank,
        }
    }

    /// A pointer position that hits `row` at `position`, or `None` if the row
    /// isn't visible.
    pub fn point_in(&self, model: &DisplayModel, row: RowRef, position: Position) -> Option<Point> {
        let index = model.visible_rows().iter().position(|r| *r == row)?;
        let y = (index as f64 + self.zones.center(position)) * self.row_height - self.scroll;
        Some(Point::new(1.0, y))
    }

    /// A pointer position below every visible row.
    pub fn point_below(&self, model: &DisplayModel) -> Point {
        let rows = model.visible_rows().len() as f64;
        Point::new(1.0, (rows + 0.5) * self.row_height - self.scroll)
    }

    /// Adjusts the scroll offset so that `row` lies within a viewport of the given height.
    pub fn reveal(&mut self, model: &DisplayModel, row: RowRef, viewport: f64) {
        let Some(index) = model.visible_rows().iter().position(|r| *r == row) else {
            return;
        };

        let top = index as f64 * self.row_height;
        let bottom = top + self.row_height;

        if top < self.scroll {
            self.scroll = top;
        } else if bottom > self.scroll + viewport {
            self.scroll = (bottom - viewport).max(0.0);
        }
    }
}
