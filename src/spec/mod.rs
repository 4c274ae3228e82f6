//! Target configuration for generated kernels.
//!
//! A [`Spec`] fixes the floating-point width, vector lane count and memory
//! alignment that every code generator and buffer-allocation helper agrees
//! on. It is a pure value object, validated once at construction and
//! immutable afterwards.

use std::alloc::{self, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

use crate::error::{NeurogenError, Result};

/// Floating-point width of generated kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RealKind {
    F32,
    F64,
}

impl RealKind {
    /// C type name used in generated source.
    pub fn ctype(&self) -> &'static str {
        match self {
            RealKind::F32 => "float",
            RealKind::F64 => "double",
        }
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            RealKind::F32 => 4,
            RealKind::F64 => 8,
        }
    }

    /// Suffix appended to C math functions (`expf` vs `exp`).
    pub fn fn_suffix(&self) -> &'static str {
        match self {
            RealKind::F32 => "f",
            RealKind::F64 => "",
        }
    }

    /// Suffix appended to C floating literals (`1.0f` vs `1.0`).
    pub fn literal_suffix(&self) -> &'static str {
        match self {
            RealKind::F32 => "f",
            RealKind::F64 => "",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            RealKind::F32 => "f32",
            RealKind::F64 => "f64",
        }
    }
}

/// Host-side scalar matching a [`RealKind`].
///
/// Buffers and kernel bindings are generic over this trait so that the
/// Rust-side element type is checked against the spec the kernel was
/// generated for.
pub trait Real: Copy + Default + PartialOrd + Send + Sync + 'static {
    const KIND: RealKind;

    fn from_f64(value: f64) -> Self;
    fn into_f64(self) -> f64;
}

impl Real for f32 {
    const KIND: RealKind = RealKind::F32;

    fn from_f64(value: f64) -> Self {
        value as f32
    }
    fn into_f64(self) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    const KIND: RealKind = RealKind::F64;

    fn from_f64(value: f64) -> Self {
        value
    }
    fn into_f64(self) -> f64 {
        self
    }
}

/// Numeric target description consumed by every generator.
///
/// Invariant: `align` is a power of two and a multiple of
/// `real.size() * lanes`, so a full vector of lanes never straddles an
/// alignment boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spec {
    real: RealKind,
    lanes: usize,
    align: usize,
}

impl Spec {
    pub fn new(real: RealKind, lanes: usize, align: usize) -> Result<Self> {
        if lanes == 0 {
            return Err(NeurogenError::configuration(
                "vector width must be a positive lane count",
            ));
        }
        if !align.is_power_of_two() {
            return Err(NeurogenError::configuration(format!(
                "alignment {} is not a power of two",
                align
            )));
        }
        if align % (real.size() * lanes) != 0 {
            return Err(NeurogenError::configuration(format!(
                "alignment {} is not a multiple of {} ({} x {} lanes)",
                align,
                real.size() * lanes,
                real.ctype(),
                lanes
            )));
        }
        Ok(Spec { real, lanes, align })
    }

    pub fn real(&self) -> RealKind {
        self.real
    }

    /// Vector width, in lanes.
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Buffer alignment, in bytes.
    pub fn align(&self) -> usize {
        self.align
    }

    /// Bytes spanned by one full vector of lanes.
    pub fn stride_bytes(&self) -> usize {
        self.real.size() * self.lanes
    }

    /// Canonical key fragment distinguishing this spec in cache paths
    /// and artifact names.
    pub fn cache_tag(&self) -> String {
        format!("{}x{}a{}", self.real.tag(), self.lanes, self.align)
    }
}

impl Default for Spec {
    /// Single-precision, 8 lanes, cache-line alignment.
    fn default() -> Self {
        Spec {
            real: RealKind::F32,
            lanes: 8,
            align: 64,
        }
    }
}

/// Heap buffer with explicit alignment, zero-initialized.
///
/// This is the storage handed to generated kernels; the pointer is
/// aligned to the owning [`Spec`]'s alignment so vector loads in the
/// kernel start on an aligned address.
#[derive(Debug)]
pub struct AlignedVec<T> {
    ptr: NonNull<T>,
    len: usize,
    align: usize,
}

unsafe impl<T: Send> Send for AlignedVec<T> {}
unsafe impl<T: Sync> Sync for AlignedVec<T> {}

impl<T: Real> AlignedVec<T> {
    /// Allocate `len` zeroed elements aligned to `align` bytes.
    pub fn zeroed(len: usize, align: usize) -> Result<Self> {
        let align = align.max(std::mem::align_of::<T>());
        if !align.is_power_of_two() {
            return Err(NeurogenError::configuration(format!(
                "alignment {} is not a power of two",
                align
            )));
        }
        if len == 0 {
            return Ok(AlignedVec {
                ptr: NonNull::dangling(),
                len: 0,
                align,
            });
        }
        let layout = Layout::from_size_align(len * std::mem::size_of::<T>(), align)
            .map_err(|e| NeurogenError::configuration(format!("invalid buffer layout: {}", e)))?;
        // Zeroed bits are a valid f32/f64 value (0.0).
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw as *mut T)
            .ok_or_else(|| NeurogenError::configuration("buffer allocation failed"))?;
        Ok(AlignedVec { ptr, len, align })
    }

    /// Allocate and fill from a slice.
    pub fn from_slice(values: &[T], align: usize) -> Result<Self> {
        let mut buf = Self::zeroed(values.len(), align)?;
        buf.copy_from_slice(values);
        Ok(buf)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Reset every element to zero.
    pub fn clear(&mut self) {
        for v in self.iter_mut() {
            *v = T::default();
        }
    }
}

impl<T> Drop for AlignedVec<T> {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        let layout =
            Layout::from_size_align(self.len * std::mem::size_of::<T>(), self.align).unwrap();
        unsafe { alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout) };
    }
}

impl<T> Deref for AlignedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T> DerefMut for AlignedVec<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}
