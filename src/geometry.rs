//! Placement of a single slice in patient space

use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::calibration::CalibrationInfo;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// First three values of a slice, if present.
    #[must_use]
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match *values {
            [x, y, z, ..] => Some(Self::new(x, y, z)),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y.mul_add(other.y, self.z * other.z))
    }

    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[inline]
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Orientation, position and extent of one 2D slice.
///
/// Orientation vectors are direction cosines; orthogonality is not checked.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceGeometry {
    pub row: Vec3,
    pub column: Vec3,
    /// Center of the top left pixel
    pub position: Vec3,
    /// Column spacing, row spacing, slice thickness
    pub spacing: Vec3,
    pub slice_thickness: f64,
    /// Columns, rows, 1
    pub dimensions: Vec3,
}

impl SliceGeometry {
    /// Builds the geometry from Image Orientation (Patient) and Image Position (Patient).
    ///
    /// The display geometry uses the isotropic pixel size and dimensions rescaled for square
    /// pixels; otherwise the actual spacing and the stored dimensions are kept. Returns `None`
    /// when the orientation or position is incomplete.
    #[must_use]
    pub fn new(
        orientation: &[f64],
        position: &[f64],
        slice_thickness: Option<f64>,
        rows: u16,
        cols: u16,
        calibration: &CalibrationInfo,
        display: bool,
    ) -> Option<Self> {
        if orientation.len() < 6 {
            return None;
        }
        let row = Vec3::from_slice(&orientation[..3])?;
        let column = Vec3::from_slice(&orientation[3..6])?;
        let position = Vec3::from_slice(position)?;

        let isotropic = calibration.pixel_size();
        let slice_thickness = slice_thickness
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(isotropic);

        let (spacing, dimensions) = if display {
            (
                Vec3::new(isotropic, isotropic, slice_thickness),
                Vec3::new(
                    (f64::from(cols) * calibration.rescale_x()).round(),
                    (f64::from(rows) * calibration.rescale_y()).round(),
                    1.0,
                ),
            )
        } else {
            (
                Vec3::new(
                    calibration.pixel_size_x(),
                    calibration.pixel_size_y(),
                    slice_thickness,
                ),
                Vec3::new(f64::from(cols), f64::from(rows), 1.0),
            )
        };

        Some(Self {
            row,
            column,
            position,
            spacing,
            slice_thickness,
            dimensions,
        })
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.row.is_zero() && !self.column.is_zero()
    }

    /// Slice normal, `row × column`.
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        self.row.cross(self.column)
    }

    /// Patient coordinates of the center of pixel `(col, row)`.
    #[must_use]
    pub fn pixel_to_patient(&self, col: f64, row: f64) -> Vec3 {
        self.position + self.row * (col * self.spacing.x) + self.column * (row * self.spacing.y)
    }

    /// Top left, top right, bottom right and bottom left pixel centers.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 4] {
        let last_col = self.dimensions.x - 1.0;
        let last_row = self.dimensions.y - 1.0;
        [
            self.position,
            self.pixel_to_patient(last_col, 0.0),
            self.pixel_to_patient(last_col, last_row),
            self.pixel_to_patient(0.0, last_row),
        ]
    }
}
