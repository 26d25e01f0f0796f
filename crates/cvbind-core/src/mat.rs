//! Native matrix model.
//!
//! Mirrors the vision library's reference-counted n-dimensional matrix:
//!
//! - [`Mat`] is a header (shape, byte steps, element type, data pointer)
//!   plus an optional reference to shared [`MatData`].
//! - [`MatData`] is the shared buffer descriptor. Its atomic `refcount` is
//!   bumped by every `Mat` that references it and is the only state shared
//!   with native worker threads.
//! - [`MatAllocator`] creates and releases `MatData`. The native default is
//!   [`StdMatAllocator`]; a `Mat` may carry an override used by
//!   [`Mat::create`] when it needs a fresh buffer.

use std::any::Any;
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::buffer::AlignedBuf;
use crate::error::{ConversionError, NativeError};
use crate::num_array::{Element, advance_index};

/// Maximum number of channels per element.
pub const CN_MAX: usize = 512;

/// Maximum matrix dimensionality.
pub const MAX_DIM: usize = 32;

const CN_SHIFT: i32 = 3;
const DEPTH_MASK: i32 = (1 << CN_SHIFT) - 1;

/// Per-channel element depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum Depth {
    U8 = 0,
    S8 = 1,
    U16 = 2,
    S16 = 3,
    S32 = 4,
    F32 = 5,
    F64 = 6,
}

impl Depth {
    /// Size of one channel value in bytes.
    pub fn size(self) -> usize {
        match self {
            Depth::U8 | Depth::S8 => 1,
            Depth::U16 | Depth::S16 => 2,
            Depth::S32 | Depth::F32 => 4,
            Depth::F64 => 8,
        }
    }
}

/// Element type: depth plus channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatType {
    depth: Depth,
    channels: usize,
}

impl MatType {
    /// Create an element type. Panics if `channels` is outside `1..=CN_MAX`.
    pub fn new(depth: Depth, channels: usize) -> Self {
        assert!(
            (1..=CN_MAX).contains(&channels),
            "channel count {channels} outside 1..={CN_MAX}"
        );
        Self { depth, channels }
    }

    /// Decode the packed integer type code used by the native API.
    pub fn from_code(code: i32) -> Result<Self, ConversionError> {
        let depth = Depth::try_from(code & DEPTH_MASK).map_err(|_| ConversionError::Failed {
            message: format!("invalid matrix type code {code}"),
        })?;
        let channels = ((code >> CN_SHIFT) as usize & (CN_MAX - 1)) + 1;
        Ok(Self { depth, channels })
    }

    /// Packed integer type code: `depth + ((channels - 1) << 3)`.
    pub fn code(self) -> i32 {
        i32::from(self.depth) + ((self.channels as i32 - 1) << CN_SHIFT)
    }

    pub fn depth(self) -> Depth {
        self.depth
    }

    pub fn channels(self) -> usize {
        self.channels
    }

    /// Size of one element (all channels) in bytes.
    pub fn elem_size(self) -> usize {
        self.depth.size() * self.channels
    }
}

/// Scalar types that can be read from matrix data.
pub trait MatElement: Element {
    const DEPTH: Depth;
}

macro_rules! impl_mat_element {
    ($($ty:ty => $depth:ident),* $(,)?) => {
        $(
            impl MatElement for $ty {
                const DEPTH: Depth = Depth::$depth;
            }
        )*
    };
}

impl_mat_element!(
    u8 => U8,
    i8 => S8,
    u16 => U16,
    i16 => S16,
    i32 => S32,
    f32 => F32,
    f64 => F64,
);

// =============================================================================
// Shared buffer descriptor
// =============================================================================

/// Shared buffer descriptor referenced by one or more `Mat` headers.
pub struct MatData {
    refcount: AtomicUsize,
    allocator: Arc<dyn MatAllocator>,
    data: *mut u8,
    size: usize,
    owner: Box<dyn Any + Send + Sync>,
}

// SAFETY: `data` is owned by `owner` (or by the host object it references) and
// stays valid for the descriptor's lifetime; the refcount is atomic.
unsafe impl Send for MatData {}
unsafe impl Sync for MatData {}

impl MatData {
    /// Create an unreferenced descriptor (refcount 0).
    ///
    /// `owner` keeps the memory behind `data` alive until the descriptor is
    /// freed by its allocator.
    pub fn new(
        allocator: Arc<dyn MatAllocator>,
        data: *mut u8,
        size: usize,
        owner: Box<dyn Any + Send + Sync>,
    ) -> NonNull<MatData> {
        let boxed = Box::new(MatData {
            refcount: AtomicUsize::new(0),
            allocator,
            data,
            size,
            owner,
        });
        NonNull::from(Box::leak(boxed))
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::Acquire)
    }

    pub fn data(&self) -> *mut u8 {
        self.data
    }

    /// Size of the referenced buffer in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn allocator(&self) -> &Arc<dyn MatAllocator> {
        &self.allocator
    }

    pub fn owner(&self) -> &(dyn Any + Send + Sync) {
        &*self.owner
    }

    fn add_ref(&self) {
        self.refcount.fetch_add(1, Ordering::AcqRel);
    }

    /// Free the descriptor if nothing references it any more.
    ///
    /// Returns true if it was freed. Allocators call this from
    /// [`MatAllocator::deallocate`].
    ///
    /// # Safety
    ///
    /// `u` must have been produced by [`MatData::new`] and must not be used
    /// again by the caller if this returns true.
    pub unsafe fn free_if_unreferenced(u: NonNull<MatData>) -> bool {
        // SAFETY: caller guarantees `u` is live.
        if unsafe { u.as_ref() }.refcount() != 0 {
            return false;
        }
        // SAFETY: created by `Box::leak` in `MatData::new` and unreferenced.
        drop(unsafe { Box::from_raw(u.as_ptr()) });
        true
    }
}

impl fmt::Debug for MatData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatData")
            .field("refcount", &self.refcount())
            .field("allocator", &self.allocator.name())
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Result of an allocation: an unreferenced descriptor and per-axis steps.
#[derive(Debug)]
pub struct Allocation {
    pub u: NonNull<MatData>,
    pub steps: Vec<usize>,
}

/// Allocator hook for matrices created without a caller-supplied buffer.
pub trait MatAllocator: Send + Sync {
    /// Allocate a buffer for `sizes` elements of `mat_type`.
    ///
    /// The returned descriptor has refcount 0; the caller takes the first
    /// reference.
    fn allocate(
        self: Arc<Self>,
        sizes: &[usize],
        mat_type: MatType,
    ) -> Result<Allocation, NativeError>;

    /// Called whenever a `Mat` drops its reference to `u`.
    ///
    /// Must only free the descriptor once its refcount has reached zero.
    fn deallocate(&self, u: NonNull<MatData>);

    /// Name used in diagnostics.
    fn name(&self) -> &'static str;
}

/// Whether two allocator references name the same allocator instance.
pub fn same_allocator(a: &Arc<dyn MatAllocator>, b: &Arc<dyn MatAllocator>) -> bool {
    ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Byte steps of a C-contiguous layout.
pub fn contiguous_steps(sizes: &[usize], elem_size: usize) -> Vec<usize> {
    let mut steps = vec![0; sizes.len()];
    let mut acc = elem_size;
    for axis in (0..sizes.len()).rev() {
        steps[axis] = acc;
        acc *= sizes[axis];
    }
    steps
}

/// The native library's default heap allocator.
#[derive(Debug, Default)]
pub struct StdMatAllocator;

impl MatAllocator for StdMatAllocator {
    fn allocate(
        self: Arc<Self>,
        sizes: &[usize],
        mat_type: MatType,
    ) -> Result<Allocation, NativeError> {
        let steps = contiguous_steps(sizes, mat_type.elem_size());
        let total = sizes.first().map_or(mat_type.elem_size(), |n| n * steps[0]);
        let block = AlignedBuf::zeroed(total);
        let data = block.as_ptr();
        let u = MatData::new(self, data, block.len(), Box::new(block));
        Ok(Allocation { u, steps })
    }

    fn deallocate(&self, u: NonNull<MatData>) {
        // SAFETY: `u` came from `MatData::new` and is only handed here by `Mat`.
        unsafe { MatData::free_if_unreferenced(u) };
    }

    fn name(&self) -> &'static str {
        "std"
    }
}

static STD_ALLOCATOR: LazyLock<Arc<dyn MatAllocator>> =
    LazyLock::new(|| Arc::new(StdMatAllocator));

/// The process-wide default allocator.
pub fn std_allocator() -> Arc<dyn MatAllocator> {
    Arc::clone(&STD_ALLOCATOR)
}

// =============================================================================
// Matrix header
// =============================================================================

/// Reference-counted n-dimensional matrix.
pub struct Mat {
    mat_type: MatType,
    size: Vec<usize>,
    step: Vec<usize>,
    data: *mut u8,
    u: Option<NonNull<MatData>>,
    allocator: Option<Arc<dyn MatAllocator>>,
}

// SAFETY: the header only shares `MatData`, whose refcount is atomic.
unsafe impl Send for Mat {}
unsafe impl Sync for Mat {}

impl Mat {
    /// Create an empty matrix with no data.
    pub fn new() -> Self {
        Self {
            mat_type: MatType::new(Depth::U8, 1),
            size: Vec::new(),
            step: Vec::new(),
            data: ptr::null_mut(),
            u: None,
            allocator: None,
        }
    }

    /// Create an empty matrix whose future allocations use `allocator`.
    pub fn with_allocator(allocator: Arc<dyn MatAllocator>) -> Self {
        let mut m = Self::new();
        m.allocator = Some(allocator);
        m
    }

    /// Allocate a zero-filled matrix through the default allocator.
    pub fn zeros(sizes: &[usize], mat_type: MatType) -> Result<Self, NativeError> {
        let mut m = Self::new();
        m.create(sizes, mat_type)?;
        Ok(m)
    }

    /// Create a header over external memory without taking ownership.
    ///
    /// # Safety
    ///
    /// `data` must point to memory addressable through `sizes`/`steps` for as
    /// long as the header (or any clone) is used.
    pub unsafe fn from_raw_parts(
        sizes: &[usize],
        mat_type: MatType,
        data: *mut u8,
        steps: &[usize],
    ) -> Self {
        debug_assert_eq!(sizes.len(), steps.len());
        Self {
            mat_type,
            size: sizes.to_vec(),
            step: steps.to_vec(),
            data,
            u: None,
            allocator: None,
        }
    }

    /// Attach a descriptor and take one reference on it.
    ///
    /// # Safety
    ///
    /// `u` must be a live descriptor whose buffer contains this header's data.
    pub unsafe fn attach(&mut self, u: NonNull<MatData>) {
        // SAFETY: caller guarantees `u` is live.
        unsafe { u.as_ref() }.add_ref();
        self.u = Some(u);
    }

    /// (Re)allocate the matrix. No-op if shape and type already match.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn create(&mut self, sizes: &[usize], mat_type: MatType) -> Result<(), NativeError> {
        if !self.data.is_null() && self.size == sizes && self.mat_type == mat_type {
            return Ok(());
        }
        self.release();
        if sizes.is_empty() {
            return Ok(());
        }

        let allocator = self.allocator.clone().unwrap_or_else(std_allocator);
        let Allocation { u, steps } = allocator.allocate(sizes, mat_type)?;
        self.mat_type = mat_type;
        self.size = sizes.to_vec();
        self.step = steps;
        // SAFETY: freshly allocated descriptor.
        unsafe {
            self.data = u.as_ref().data();
            self.attach(u);
        }
        Ok(())
    }

    /// Drop this header's data reference, leaving an empty matrix.
    pub fn release(&mut self) {
        if let Some(u) = self.u.take() {
            // SAFETY: the header holds one reference, so `u` is live.
            let data = unsafe { u.as_ref() };
            if data.refcount.fetch_sub(1, Ordering::AcqRel) == 1 {
                let allocator = Arc::clone(data.allocator());
                allocator.deallocate(u);
            }
        }
        self.data = ptr::null_mut();
        self.size.clear();
        self.step.clear();
    }

    pub fn allocator(&self) -> Option<&Arc<dyn MatAllocator>> {
        self.allocator.as_ref()
    }

    pub fn set_allocator(&mut self, allocator: Option<Arc<dyn MatAllocator>>) {
        self.allocator = allocator;
    }

    /// The shared descriptor, if the data is reference counted.
    pub fn mat_data(&self) -> Option<&MatData> {
        // SAFETY: the header holds a reference, so the descriptor is live.
        self.u.map(|u| unsafe { &*u.as_ptr() })
    }

    /// Whether the shared descriptor was produced by `allocator`.
    pub fn is_allocated_by(&self, allocator: &Arc<dyn MatAllocator>) -> bool {
        self.mat_data()
            .is_some_and(|u| same_allocator(u.allocator(), allocator))
    }

    /// Current refcount of the shared descriptor.
    pub fn refcount(&self) -> Option<usize> {
        self.mat_data().map(MatData::refcount)
    }

    pub fn dims(&self) -> usize {
        self.size.len()
    }

    pub fn size(&self) -> &[usize] {
        &self.size
    }

    pub fn step(&self) -> &[usize] {
        &self.step
    }

    pub fn mat_type(&self) -> MatType {
        self.mat_type
    }

    pub fn depth(&self) -> Depth {
        self.mat_type.depth()
    }

    pub fn channels(&self) -> usize {
        self.mat_type.channels()
    }

    pub fn elem_size(&self) -> usize {
        self.mat_type.elem_size()
    }

    /// Total number of elements.
    pub fn total(&self) -> usize {
        if self.size.is_empty() {
            0
        } else {
            self.size.iter().product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null() || self.total() == 0
    }

    pub fn data_ptr(&self) -> *const u8 {
        self.data
    }

    pub fn data_mut_ptr(&mut self) -> *mut u8 {
        self.data
    }

    /// Whether elements are laid out without gaps.
    pub fn is_continuous(&self) -> bool {
        self.step == contiguous_steps(&self.size, self.elem_size())
    }

    fn element_ptr(&self, index: &[usize]) -> Result<*mut u8, ConversionError> {
        if self.data.is_null()
            || index.len() != self.size.len()
            || index.iter().zip(&self.size).any(|(i, n)| i >= n)
        {
            return Err(ConversionError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.size.clone(),
            });
        }
        let offset: usize = index.iter().zip(&self.step).map(|(i, s)| i * s).sum();
        Ok(self.data.wrapping_add(offset))
    }

    fn channel_ptr<T: MatElement>(
        &self,
        index: &[usize],
        channel: usize,
    ) -> Result<*mut T, ConversionError> {
        if T::DEPTH != self.depth() {
            return Err(ConversionError::Failed {
                message: format!(
                    "matrix depth is {:?}, requested {:?}",
                    self.depth(),
                    T::DEPTH
                ),
            });
        }
        if channel >= self.channels() {
            return Err(ConversionError::IndexOutOfBounds {
                index: vec![channel],
                shape: vec![self.channels()],
            });
        }
        let elem = self.element_ptr(index)?;
        Ok(elem.wrapping_add(channel * self.depth().size()).cast::<T>())
    }

    /// Read one channel of one element.
    pub fn at<T: MatElement>(&self, index: &[usize], channel: usize) -> Result<T, ConversionError> {
        let p = self.channel_ptr::<T>(index, channel)?;
        // SAFETY: `channel_ptr` validated bounds against the header.
        Ok(unsafe { p.read_unaligned() })
    }

    /// Write one channel of one element.
    pub fn set_at<T: MatElement>(
        &mut self,
        index: &[usize],
        channel: usize,
        value: T,
    ) -> Result<(), ConversionError> {
        let p = self.channel_ptr::<T>(index, channel)?;
        // SAFETY: as in `at`.
        unsafe { p.write_unaligned(value) };
        Ok(())
    }

    /// Copy into `dst`, (re)allocating it through its own allocator.
    pub fn copy_to(&self, dst: &mut Mat) -> Result<(), NativeError> {
        if self.is_empty() {
            dst.release();
            return Ok(());
        }
        dst.create(&self.size, self.mat_type)?;
        self.copy_data_into(dst);
        Ok(())
    }

    /// Element-wise copy into a matrix of identical shape and type.
    pub(crate) fn copy_data_into(&self, dst: &mut Mat) {
        assert!(
            dst.size == self.size && dst.mat_type == self.mat_type,
            "copy between matrices of different shape or type"
        );
        if self.is_empty() {
            return;
        }

        let elem = self.elem_size();
        let last = self.dims() - 1;
        let rows_contiguous = self.step[last] == elem && dst.step[last] == elem;
        let row_len = if rows_contiguous { self.size[last] } else { 1 };
        let outer: Vec<usize> = if rows_contiguous {
            self.size[..last].to_vec()
        } else {
            self.size.clone()
        };

        let mut index = vec![0; outer.len()];
        loop {
            let src_off: usize = index.iter().zip(&self.step).map(|(i, s)| i * s).sum();
            let dst_off: usize = index.iter().zip(&dst.step).map(|(i, s)| i * s).sum();
            // SAFETY: offsets address elements inside both headers' bounds and
            // the buffers are distinct allocations.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.data.add(src_off),
                    dst.data.add(dst_off),
                    row_len * elem,
                );
            }
            if !advance_index(&mut index, &outer) {
                break;
            }
        }
    }
}

impl Default for Mat {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Mat {
    /// Shallow copy sharing the same data (bumps the refcount).
    fn clone(&self) -> Self {
        if let Some(u) = self.mat_data() {
            u.add_ref();
        }
        Self {
            mat_type: self.mat_type,
            size: self.size.clone(),
            step: self.step.clone(),
            data: self.data,
            u: self.u,
            allocator: self.allocator.clone(),
        }
    }
}

impl Drop for Mat {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Mat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mat")
            .field("type", &self.mat_type)
            .field("size", &self.size)
            .field("step", &self.step)
            .field("refcount", &self.refcount())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_code_round_trips() {
        let t = MatType::new(Depth::U8, 3);
        assert_eq!(t.code(), 16);
        assert_eq!(MatType::from_code(16).unwrap(), t);
        assert_eq!(MatType::new(Depth::F64, 1).code(), 6);
        assert!(MatType::from_code(7).is_err());
    }

    #[test]
    fn create_allocates_contiguous_buffer() {
        let m = Mat::zeros(&[4, 5], MatType::new(Depth::F32, 2)).unwrap();
        assert_eq!(m.size(), &[4, 5]);
        assert_eq!(m.step(), &[40, 8]);
        assert!(m.is_continuous());
        assert_eq!(m.refcount(), Some(1));
        assert_eq!(m.at::<f32>(&[3, 4], 1).unwrap(), 0.0);
    }

    #[test]
    fn clone_shares_data_and_counts_references() {
        let m = Mat::zeros(&[2, 2], MatType::new(Depth::S32, 1)).unwrap();
        let c = m.clone();
        assert_eq!(m.refcount(), Some(2));
        assert_eq!(c.data_ptr(), m.data_ptr());
        drop(c);
        assert_eq!(m.refcount(), Some(1));
    }

    #[test]
    fn create_is_noop_for_same_shape() {
        let mut m = Mat::zeros(&[3], MatType::new(Depth::U8, 1)).unwrap();
        let before = m.data_ptr();
        m.create(&[3], MatType::new(Depth::U8, 1)).unwrap();
        assert_eq!(m.data_ptr(), before);
        m.create(&[4], MatType::new(Depth::U8, 1)).unwrap();
        assert_eq!(m.size(), &[4]);
    }

    #[test]
    fn typed_access_checks_depth_and_bounds() {
        let mut m = Mat::zeros(&[2, 2], MatType::new(Depth::U8, 3)).unwrap();
        m.set_at::<u8>(&[1, 1], 2, 200).unwrap();
        assert_eq!(m.at::<u8>(&[1, 1], 2).unwrap(), 200);
        assert!(m.at::<f32>(&[0, 0], 0).is_err());
        assert!(m.at::<u8>(&[2, 0], 0).is_err());
        assert!(m.at::<u8>(&[0, 0], 3).is_err());
    }

    #[test]
    fn copy_to_copies_strided_source() {
        let src = Mat::zeros(&[2, 3], MatType::new(Depth::S16, 1)).unwrap();
        let mut src = src;
        for r in 0..2 {
            for c in 0..3 {
                src.set_at::<i16>(&[r, c], 0, (r * 10 + c) as i16).unwrap();
            }
        }
        // Column view: every other column, step 4 bytes.
        let view = unsafe {
            Mat::from_raw_parts(&[2, 2], src.mat_type(), src.data_mut_ptr(), &[6, 4])
        };
        let mut dst = Mat::new();
        view.copy_to(&mut dst).unwrap();
        assert!(dst.is_continuous());
        assert_eq!(dst.at::<i16>(&[0, 1], 0).unwrap(), 2);
        assert_eq!(dst.at::<i16>(&[1, 0], 0).unwrap(), 10);
        assert_eq!(dst.at::<i16>(&[1, 1], 0).unwrap(), 12);
    }

    #[test]
    fn empty_mat_has_no_data() {
        let m = Mat::new();
        assert!(m.is_empty());
        assert_eq!(m.total(), 0);
        assert_eq!(m.refcount(), None);
    }
}
