//! Zero-copy bridge between native matrices and host numeric arrays.
//!
//! # Overview
//!
//! A decoded [`Mat`] points straight at the host array's buffer. Its shared
//! [`MatData`] descriptor owns a clone of the [`NumArray`] reference, so the
//! host object stays alive for as long as any native matrix references it.
//! Once the native refcount reaches zero the descriptor is freed and the
//! host reference is dropped; the host object itself lives on if the host
//! still holds it.
//!
//! ```text
//!   NumArray ──storage──► [ bytes ] ◄──data── Mat ──u──► MatData
//!       ▲                                                  │
//!       └──────────────────── owner (HostBacking) ◄────────┘
//! ```
//!
//! # Layout rules
//!
//! An array is aliased only if:
//!
//! - its element type has a native depth (64-bit integers would need a cast,
//!   `uint32` and `bool` have no counterpart)
//! - it is strided (not an index-gathered view) with at most [`MAX_DIM`] axes
//! - the last axis is contiguous and strides never increase towards the last
//!   axis, which rules out transposed and flipped views
//!
//! Axes of extent 0 or 1 are ignored by the stride checks. A 3-axis array
//! whose last extent is at most [`CN_MAX`] becomes a 2D multi-channel matrix.
//!
//! Arrays that break these rules fail to decode. There is no copying
//! fallback: callers that need in-place mutation must pass compatible arrays.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use tracing::{debug, trace};

use crate::convert::{FromValue, IntoValue};
use crate::error::{ConversionError, NativeError};
use crate::mat::{Allocation, CN_MAX, Depth, MAX_DIM, Mat, MatAllocator, MatData, MatType};
use crate::num_array::{DType, NumArray};
use crate::value::Value;

/// Descriptor owner for bridge-backed buffers.
struct HostBacking {
    array: NumArray,
}

/// Lifecycle counters of a [`HostArrayAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    /// Descriptors currently referencing a host array.
    pub live_handles: usize,
    /// Descriptors created, by decoding or by allocation.
    pub total_wrapped: usize,
    /// Descriptors freed.
    pub total_released: usize,
}

/// Matrix allocator whose buffers are host numeric arrays.
#[derive(Debug, Default)]
pub struct HostArrayAllocator {
    wrapped: AtomicUsize,
    released: AtomicUsize,
}

static HOST_ALLOCATOR: LazyLock<Arc<HostArrayAllocator>> =
    LazyLock::new(|| Arc::new(HostArrayAllocator::new()));

/// The process-wide bridge allocator.
pub fn host_allocator() -> Arc<HostArrayAllocator> {
    Arc::clone(&HOST_ALLOCATOR)
}

impl HostArrayAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> BridgeStats {
        // Every release follows its wrap, so reading `released` first keeps
        // the snapshot consistent while other threads keep working.
        let total_released = self.released.load(Ordering::Acquire);
        let total_wrapped = self.wrapped.load(Ordering::Acquire);
        BridgeStats {
            live_handles: total_wrapped.saturating_sub(total_released),
            total_wrapped,
            total_released,
        }
    }

    fn as_dyn(self: &Arc<Self>) -> Arc<dyn MatAllocator> {
        Arc::clone(self) as Arc<dyn MatAllocator>
    }

    /// Create an unreferenced descriptor that keeps `array` alive.
    fn wrap(self: &Arc<Self>, array: NumArray, len: usize) -> NonNull<MatData> {
        let data = array.data_ptr();
        let u = MatData::new(self.as_dyn(), data, len, Box::new(HostBacking { array }));
        self.wrapped.fetch_add(1, Ordering::AcqRel);
        trace!(?data, len, "wrapped host array");
        u
    }

    /// Allocate a fresh host array for a matrix of `sizes` and `mat_type`.
    fn allocate_backing(self: &Arc<Self>, sizes: &[usize], mat_type: MatType) -> Allocation {
        let dtype = dtype_for(mat_type.depth());
        let mut shape = sizes.to_vec();
        if mat_type.channels() > 1 {
            shape.push(mat_type.channels());
        }
        let array = NumArray::zeros(dtype, &shape);

        let strides = array
            .strides()
            .unwrap_or_else(|| unreachable!("freshly allocated arrays are strided"));
        let mut steps: Vec<usize> = strides[..sizes.len()].iter().map(|&s| s as usize).collect();
        if let Some(last) = steps.last_mut() {
            *last = mat_type.elem_size();
        }

        let len = array.len() * dtype.item_size();
        trace!(?shape, %dtype, "allocated host array for native matrix");
        let u = self.wrap(array, len);
        Allocation { u, steps }
    }
}

impl MatAllocator for HostArrayAllocator {
    fn allocate(
        self: Arc<Self>,
        sizes: &[usize],
        mat_type: MatType,
    ) -> Result<Allocation, NativeError> {
        Ok(self.allocate_backing(sizes, mat_type))
    }

    fn deallocate(&self, u: NonNull<MatData>) {
        // SAFETY: `u` was created by `wrap` and is only handed here by `Mat`.
        if unsafe { MatData::free_if_unreferenced(u) } {
            self.released.fetch_add(1, Ordering::AcqRel);
            trace!("released host array reference");
        }
    }

    fn name(&self) -> &'static str {
        "host-array"
    }
}

fn dtype_for(depth: Depth) -> DType {
    match depth {
        Depth::U8 => DType::UInt8,
        Depth::S8 => DType::Int8,
        Depth::U16 => DType::UInt16,
        Depth::S16 => DType::Int16,
        Depth::S32 => DType::Int32,
        Depth::F32 => DType::Float32,
        Depth::F64 => DType::Float64,
    }
}

fn depth_for(dtype: DType) -> Result<Depth, ConversionError> {
    match dtype {
        DType::UInt8 => Ok(Depth::U8),
        DType::Int8 => Ok(Depth::S8),
        DType::UInt16 => Ok(Depth::U16),
        DType::Int16 => Ok(Depth::S16),
        DType::Int32 => Ok(Depth::S32),
        DType::Float32 => Ok(Depth::F32),
        DType::Float64 => Ok(Depth::F64),
        DType::Int64 | DType::UInt64 => Err(ConversionError::NeedsCast { dtype }),
        DType::UInt32 | DType::Bool => Err(ConversionError::UnsupportedDType { dtype }),
    }
}

// =============================================================================
// Decode: array -> matrix
// =============================================================================

/// Alias a host array as a matrix tagged with the process-wide allocator.
pub fn mat_from_array(array: &NumArray) -> Result<Mat, ConversionError> {
    mat_from_array_with(array, &host_allocator())
}

/// Alias a host array as a matrix tagged with `allocator`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn mat_from_array_with(
    array: &NumArray,
    allocator: &Arc<HostArrayAllocator>,
) -> Result<Mat, ConversionError> {
    let dtype = array.dtype();
    let depth = depth_for(dtype)?;
    let strides = array.strides().ok_or(ConversionError::NotStrided)?;
    if array.ndim() > MAX_DIM {
        return Err(ConversionError::TooManyDimensions {
            ndim: array.ndim(),
            max: MAX_DIM,
        });
    }

    let elem = dtype.item_size() as isize;
    let mut sizes = array.shape().to_vec();
    let mut steps = strides.to_vec();
    if sizes.is_empty() {
        sizes.push(1);
        steps.push(elem);
    }
    let ndim = sizes.len();

    // Axes of extent <= 1 never move the cursor; give them the stride a dense
    // layout would have so the ordering check only sees real axes. An array
    // with a zero extent addresses no element at all, so every axis is dense.
    let empty = sizes.contains(&0);
    for axis in (0..ndim).rev() {
        if empty || sizes[axis] <= 1 {
            steps[axis] = if axis == ndim - 1 {
                elem
            } else {
                steps[axis + 1] * sizes[axis + 1].max(1) as isize
            };
        }
    }

    if steps[ndim - 1] != elem || (0..ndim - 1).any(|axis| steps[axis] < steps[axis + 1]) {
        return Err(ConversionError::NonContiguous);
    }

    let multichannel = ndim == 3 && (1..=CN_MAX).contains(&sizes[2]);
    if multichannel && steps[1] != elem * sizes[2] as isize {
        return Err(ConversionError::NonContiguous);
    }

    let mat_type = if multichannel {
        let channels = sizes.pop().unwrap_or(1);
        steps.pop();
        MatType::new(depth, channels)
    } else {
        MatType::new(depth, 1)
    };

    let steps: Vec<usize> = steps
        .into_iter()
        .map(|step| {
            assert!(step > 0, "validated stride {step} is not positive");
            step as usize
        })
        .collect();

    let len = if sizes.contains(&0) {
        0
    } else {
        sizes
            .iter()
            .zip(&steps)
            .map(|(n, s)| (n - 1) * s)
            .sum::<usize>()
            + mat_type.elem_size()
    };

    let u = allocator.wrap(array.clone(), len);
    // SAFETY: the header addresses exactly the elements of `array`, whose
    // storage is kept alive by the descriptor's owner.
    let mut mat = unsafe { Mat::from_raw_parts(&sizes, mat_type, array.data_ptr(), &steps) };
    unsafe { mat.attach(u) };
    mat.set_allocator(Some(allocator.as_dyn()));
    Ok(mat)
}

// =============================================================================
// Encode: matrix -> array
// =============================================================================

fn host_backing(m: &Mat) -> Option<&NumArray> {
    m.mat_data()?
        .owner()
        .downcast_ref::<HostBacking>()
        .map(|backing| &backing.array)
}

/// Expose a matrix as a host value.
///
/// Empty matrices become nil. Matrices aliasing a host array return that
/// array object; anything else is copied into a new host array first.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn array_from_mat(m: &Mat) -> Value {
    if m.data_ptr().is_null() {
        return Value::Nil;
    }
    if let Some(array) = host_backing(m) {
        return Value::NumArray(array.clone());
    }

    debug!(
        size = ?m.size(),
        allocator = m.mat_data().map_or("external", |u| u.allocator().name()),
        "copying native matrix into a host array"
    );
    let allocator = host_allocator();
    let Allocation { u, steps } = allocator.allocate_backing(m.size(), m.mat_type());
    // SAFETY: `u` is fresh and its buffer matches `size`/`steps`.
    let mut temp = unsafe {
        let data = u.as_ref().data();
        Mat::from_raw_parts(m.size(), m.mat_type(), data, &steps)
    };
    unsafe { temp.attach(u) };
    m.copy_data_into(&mut temp);

    match host_backing(&temp) {
        Some(array) => Value::NumArray(array.clone()),
        None => unreachable!("bridge allocation without host backing"),
    }
}

impl FromValue for Mat {
    /// Nil decodes to an empty matrix that allocates through the bridge.
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Nil => Ok(Mat::with_allocator(host_allocator())),
            Value::NumArray(array) => mat_from_array(array),
            other => Err(ConversionError::TypeMismatch {
                expected: "numeric array",
                actual: other.type_name(),
            }),
        }
    }
}

impl IntoValue for Mat {
    fn into_value(self) -> Value {
        array_from_mat(&self)
    }
}

impl IntoValue for &Mat {
    fn into_value(self) -> Value {
        array_from_mat(self)
    }
}
