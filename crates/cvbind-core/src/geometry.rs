//! Fixed-size value types of the native API.

/// 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point_<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point_<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

pub type Point = Point_<i32>;
pub type Point2f = Point_<f32>;
pub type Point2d = Point_<f64>;

/// 3D point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3_<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Point3_<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

pub type Point3i = Point3_<i32>;
pub type Point3f = Point3_<f32>;

/// Width and height.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size_<T> {
    pub width: T,
    pub height: T,
}

impl<T> Size_<T> {
    pub const fn new(width: T, height: T) -> Self {
        Self { width, height }
    }
}

pub type Size = Size_<i32>;
pub type Size2f = Size_<f32>;

/// Upright rectangle: top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect_<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

impl<T> Rect_<T> {
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

pub type Rect = Rect_<i32>;
pub type Rect2d = Rect_<f64>;

/// Rectangle rotated by `angle` degrees around its center.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotatedRect {
    pub center: Point2f,
    pub size: Size2f,
    pub angle: f32,
}

impl RotatedRect {
    pub const fn new(center: Point2f, size: Size2f, angle: f32) -> Self {
        Self {
            center,
            size,
            angle,
        }
    }
}

/// Four-component color/value tuple. Unset components are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scalar(pub [f64; 4]);

impl Scalar {
    pub const fn new(v0: f64, v1: f64, v2: f64, v3: f64) -> Self {
        Self([v0, v1, v2, v3])
    }

    /// Scalar with every component set to `v`.
    pub const fn all(v: f64) -> Self {
        Self([v; 4])
    }
}

/// Half-open index range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Range {
    pub start: i32,
    pub end: i32,
}

impl Range {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// The full range sentinel used by the native library.
    pub const fn all() -> Self {
        Self {
            start: i32::MIN,
            end: i32::MAX,
        }
    }

    pub fn size(&self) -> i32 {
        self.end - self.start
    }
}

/// Termination criteria for iterative algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TermCriteria {
    /// Combination of [`TermCriteria::COUNT`] and [`TermCriteria::EPS`].
    pub kind: i32,
    pub max_count: i32,
    pub epsilon: f64,
}

impl TermCriteria {
    pub const COUNT: i32 = 1;
    pub const EPS: i32 = 2;

    pub const fn new(kind: i32, max_count: i32, epsilon: f64) -> Self {
        Self {
            kind,
            max_count,
            epsilon,
        }
    }
}
