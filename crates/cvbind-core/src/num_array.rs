//! Host-side numeric array objects.
//!
//! A [`NumArray`] is a reference to one array object owned by the scripting
//! host. Cloning it clones the reference; the object is dropped when the last
//! reference goes away, which stands in for the host's garbage collector.
//!
//! Views created by [`NumArray::transpose`], [`NumArray::flip`],
//! [`NumArray::step`] and [`NumArray::select`] are distinct objects sharing the
//! same storage. Only strided views carry a stride description; an
//! index-gathered view reports `None` from [`NumArray::strides`].

use std::fmt;
use std::sync::Arc;

use crate::buffer::AlignedBuf;
use crate::error::ConversionError;

/// Element type tag of a numeric array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Bool,
}

impl DType {
    /// Size of one element in bytes.
    pub fn item_size(self) -> usize {
        match self {
            DType::UInt8 | DType::Int8 | DType::Bool => 1,
            DType::UInt16 | DType::Int16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
        }
    }

    /// Host-side name of the element type.
    pub fn name(self) -> &'static str {
        match self {
            DType::UInt8 => "uint8",
            DType::Int8 => "int8",
            DType::UInt16 => "uint16",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::UInt32 => "uint32",
            DType::Int64 => "int64",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust types that can be read from and written to array storage.
pub trait Element: Copy + Send + Sync + 'static {
    /// The matching array element type.
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;
            }
        )*
    };
}

impl_element!(
    u8 => UInt8,
    i8 => Int8,
    u16 => UInt16,
    i16 => Int16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

/// Advance a C-order multi-index over `shape`. Returns false once exhausted.
pub(crate) fn advance_index(index: &mut [usize], shape: &[usize]) -> bool {
    for axis in (0..shape.len()).rev() {
        index[axis] += 1;
        if index[axis] < shape[axis] {
            return true;
        }
        index[axis] = 0;
    }
    false
}

#[derive(Debug, Clone)]
enum ViewLayout {
    Strided(Vec<isize>),
    /// `axis` is addressed through `indices` before applying `strides`.
    Gathered {
        strides: Vec<isize>,
        axis: usize,
        indices: Vec<usize>,
    },
}

impl ViewLayout {
    fn base_strides(&self) -> &[isize] {
        match self {
            ViewLayout::Strided(strides) => strides,
            ViewLayout::Gathered { strides, .. } => strides,
        }
    }
}

struct ArrayObject {
    storage: Arc<AlignedBuf>,
    dtype: DType,
    shape: Vec<usize>,
    /// Byte offset of element `[0, .., 0]` from the start of storage.
    offset: isize,
    layout: ViewLayout,
}

/// Reference to a host numeric array object.
#[derive(Clone)]
pub struct NumArray {
    inner: Arc<ArrayObject>,
}

impl NumArray {
    /// Allocate a new zero-filled, C-contiguous array.
    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        let count: usize = shape.iter().product();
        let storage = Arc::new(AlignedBuf::zeroed(count * dtype.item_size()));
        Self::from_parts(
            storage,
            dtype,
            shape.to_vec(),
            0,
            ViewLayout::Strided(contiguous_strides(dtype, shape)),
        )
    }

    /// Build a C-contiguous array from row-major element data.
    pub fn from_vec<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self, ConversionError> {
        let count: usize = shape.iter().product();
        if data.len() != count {
            return Err(ConversionError::WrongLength {
                target_type: "numeric array",
                expected: count,
                actual: data.len(),
            });
        }

        let array = Self::zeros(T::DTYPE, shape);
        // SAFETY: storage holds exactly `count` elements of `T` and does not
        // overlap the freshly allocated vector.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr().cast::<u8>(),
                array.inner.storage.as_ptr(),
                count * std::mem::size_of::<T>(),
            );
        }
        Ok(array)
    }

    fn from_parts(
        storage: Arc<AlignedBuf>,
        dtype: DType,
        shape: Vec<usize>,
        offset: isize,
        layout: ViewLayout,
    ) -> Self {
        Self {
            inner: Arc::new(ArrayObject {
                storage,
                dtype,
                shape,
                offset,
                layout,
            }),
        }
    }

    fn view(&self, shape: Vec<usize>, offset: isize, layout: ViewLayout) -> Self {
        Self::from_parts(
            Arc::clone(&self.inner.storage),
            self.inner.dtype,
            shape,
            offset,
            layout,
        )
    }

    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.inner.shape
    }

    pub fn ndim(&self) -> usize {
        self.inner.shape.len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.inner.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-axis byte strides, or `None` for an index-gathered view.
    pub fn strides(&self) -> Option<&[isize]> {
        match &self.inner.layout {
            ViewLayout::Strided(strides) => Some(strides),
            ViewLayout::Gathered { .. } => None,
        }
    }

    /// Address of element `[0, .., 0]`.
    pub fn data_ptr(&self) -> *mut u8 {
        self.inner.storage.as_ptr().wrapping_offset(self.inner.offset)
    }

    /// Whether both references name the same array object.
    pub fn ptr_eq(&self, other: &NumArray) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether both arrays are views over the same storage.
    pub fn shares_storage(&self, other: &NumArray) -> bool {
        Arc::ptr_eq(&self.inner.storage, &other.inner.storage)
    }

    /// Number of live references to this array object.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// View with the axis order reversed.
    pub fn transpose(&self) -> NumArray {
        let mut shape = self.inner.shape.clone();
        shape.reverse();
        let layout = match &self.inner.layout {
            ViewLayout::Strided(strides) => {
                ViewLayout::Strided(strides.iter().rev().copied().collect())
            }
            ViewLayout::Gathered {
                strides,
                axis,
                indices,
            } => ViewLayout::Gathered {
                strides: strides.iter().rev().copied().collect(),
                axis: shape.len() - 1 - axis,
                indices: indices.clone(),
            },
        };
        self.view(shape, self.inner.offset, layout)
    }

    /// View with `axis` traversed backwards (negative stride).
    pub fn flip(&self, axis: usize) -> Option<NumArray> {
        let ViewLayout::Strided(strides) = &self.inner.layout else {
            return None;
        };
        let extent = *self.inner.shape.get(axis)?;
        let mut strides = strides.clone();
        let offset = if extent > 0 {
            self.inner.offset + (extent as isize - 1) * strides[axis]
        } else {
            self.inner.offset
        };
        strides[axis] = -strides[axis];
        Some(self.view(
            self.inner.shape.clone(),
            offset,
            ViewLayout::Strided(strides),
        ))
    }

    /// View keeping every `n`-th element along `axis`.
    pub fn step(&self, axis: usize, n: usize) -> Option<NumArray> {
        let ViewLayout::Strided(strides) = &self.inner.layout else {
            return None;
        };
        let extent = *self.inner.shape.get(axis)?;
        if n == 0 {
            return None;
        }
        let mut shape = self.inner.shape.clone();
        let mut strides = strides.clone();
        shape[axis] = extent.div_ceil(n);
        strides[axis] *= n as isize;
        Some(self.view(shape, self.inner.offset, ViewLayout::Strided(strides)))
    }

    /// Index-gathered view of `indices` along `axis`.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Option<NumArray> {
        let ViewLayout::Strided(strides) = &self.inner.layout else {
            return None;
        };
        let extent = *self.inner.shape.get(axis)?;
        if indices.iter().any(|i| *i >= extent) {
            return None;
        }
        let mut shape = self.inner.shape.clone();
        shape[axis] = indices.len();
        Some(self.view(
            shape,
            self.inner.offset,
            ViewLayout::Gathered {
                strides: strides.clone(),
                axis,
                indices: indices.to_vec(),
            },
        ))
    }

    fn byte_offset(&self, index: &[usize]) -> Result<isize, ConversionError> {
        let shape = &self.inner.shape;
        if index.len() != shape.len() || index.iter().zip(shape).any(|(i, n)| i >= n) {
            return Err(ConversionError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: shape.clone(),
            });
        }

        let strides = self.inner.layout.base_strides();
        let mut offset = self.inner.offset;
        for (axis, (&i, &stride)) in index.iter().zip(strides).enumerate() {
            let i = match &self.inner.layout {
                ViewLayout::Gathered {
                    axis: gathered,
                    indices,
                    ..
                } if *gathered == axis => indices[i],
                _ => i,
            };
            offset += i as isize * stride;
        }
        Ok(offset)
    }

    fn check_dtype<T: Element>(&self) -> Result<(), ConversionError> {
        if T::DTYPE == self.inner.dtype {
            Ok(())
        } else {
            Err(ConversionError::DTypeMismatch {
                expected: T::DTYPE,
                actual: self.inner.dtype,
            })
        }
    }

    /// Read one element.
    pub fn get<T: Element>(&self, index: &[usize]) -> Result<T, ConversionError> {
        self.check_dtype::<T>()?;
        let offset = self.byte_offset(index)?;
        // SAFETY: `byte_offset` validated the index against the view, and every
        // view addresses elements inside its storage.
        Ok(unsafe {
            self.inner
                .storage
                .as_ptr()
                .offset(offset)
                .cast::<T>()
                .read_unaligned()
        })
    }

    /// Write one element.
    pub fn set<T: Element>(&self, index: &[usize], value: T) -> Result<(), ConversionError> {
        self.check_dtype::<T>()?;
        let offset = self.byte_offset(index)?;
        // SAFETY: as in `get`.
        unsafe {
            self.inner
                .storage
                .as_ptr()
                .offset(offset)
                .cast::<T>()
                .write_unaligned(value)
        };
        Ok(())
    }

    /// Copy all elements out in logical (C) order.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, ConversionError> {
        self.check_dtype::<T>()?;
        let mut out = Vec::with_capacity(self.len());
        if self.is_empty() {
            return Ok(out);
        }
        let mut index = vec![0; self.ndim()];
        loop {
            out.push(self.get::<T>(&index)?);
            if !advance_index(&mut index, self.shape()) {
                break;
            }
        }
        Ok(out)
    }
}

fn contiguous_strides(dtype: DType, shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc = dtype.item_size() as isize;
    for axis in (0..shape.len()).rev() {
        strides[axis] = acc;
        acc *= shape[axis].max(1) as isize;
    }
    strides
}

impl fmt::Debug for NumArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumArray")
            .field("dtype", &self.inner.dtype)
            .field("shape", &self.inner.shape)
            .field("layout", &self.inner.layout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_is_c_contiguous() {
        let a = NumArray::zeros(DType::UInt8, &[4, 5, 3]);
        assert_eq!(a.shape(), &[4, 5, 3]);
        assert_eq!(a.strides(), Some(&[15isize, 3, 1][..]));
        assert_eq!(a.len(), 60);
    }

    #[test]
    fn zero_extent_axis_keeps_dense_strides() {
        let a = NumArray::zeros(DType::UInt8, &[2, 0, 3]);
        assert_eq!(a.strides(), Some(&[3isize, 3, 1][..]));
        assert!(a.is_empty());
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(NumArray::from_vec(&[2, 2], vec![1i32, 2, 3]).is_err());
        let a = NumArray::from_vec(&[2, 2], vec![1i32, 2, 3, 4]).unwrap();
        assert_eq!(a.get::<i32>(&[1, 0]).unwrap(), 3);
    }

    #[test]
    fn typed_access_checks_dtype() {
        let a = NumArray::zeros(DType::Float32, &[2]);
        assert!(matches!(
            a.get::<f64>(&[0]),
            Err(ConversionError::DTypeMismatch { .. })
        ));
        a.set::<f32>(&[1], 2.5).unwrap();
        assert_eq!(a.to_vec::<f32>().unwrap(), vec![0.0, 2.5]);
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let a = NumArray::zeros(DType::Int16, &[2, 2]);
        assert!(a.get::<i16>(&[2, 0]).is_err());
        assert!(a.get::<i16>(&[0]).is_err());
    }

    #[test]
    fn transpose_shares_storage() {
        let a = NumArray::from_vec(&[2, 3], vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        let t = a.transpose();
        assert!(t.shares_storage(&a));
        assert!(!t.ptr_eq(&a));
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.to_vec::<u8>().unwrap(), vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn flip_uses_negative_stride() {
        let a = NumArray::from_vec(&[3], vec![1i32, 2, 3]).unwrap();
        let f = a.flip(0).unwrap();
        assert_eq!(f.strides(), Some(&[-4isize][..]));
        assert_eq!(f.to_vec::<i32>().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn step_skips_elements() {
        let a = NumArray::from_vec(&[5], vec![0u16, 1, 2, 3, 4]).unwrap();
        let s = a.step(0, 2).unwrap();
        assert_eq!(s.shape(), &[3]);
        assert_eq!(s.to_vec::<u16>().unwrap(), vec![0, 2, 4]);
    }

    #[test]
    fn select_has_no_strides() {
        let a = NumArray::from_vec(&[2, 3], vec![1u8, 2, 3, 4, 5, 6]).unwrap();
        let g = a.select(1, &[2, 0]).unwrap();
        assert!(g.strides().is_none());
        assert_eq!(g.to_vec::<u8>().unwrap(), vec![3, 1, 6, 4]);
        assert!(a.select(1, &[3]).is_none());
    }

    #[test]
    fn writes_through_views_are_visible() {
        let a = NumArray::zeros(DType::Float64, &[2, 2]);
        a.transpose().set::<f64>(&[1, 0], 7.0).unwrap();
        assert_eq!(a.get::<f64>(&[0, 1]).unwrap(), 7.0);
    }

    #[test]
    fn zero_dimensional_array_has_one_element() {
        let a = NumArray::zeros(DType::Int32, &[]);
        assert_eq!(a.len(), 1);
        a.set::<i32>(&[], 9).unwrap();
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![9]);
    }
}
