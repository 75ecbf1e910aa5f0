//! Two-phase attribute queries.
//!
//! Every wrapped object answers two questions about an attribute: how many
//! bytes it needs ([`PropertyContainer::size_of`]) and "write it into this
//! buffer" ([`PropertyContainer::fill`]). [`PropertyReader`] layers typed
//! decoding on top, so getters never deal with native encodings.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr;

use bytemuck::Pod;
use clnet_sys::info::{self, AttributeKey, InfoTarget};
use clnet_sys::{CL_TRUE, ClApi, NativeHandle};
use tracing::trace;

use crate::error::{ClError, Result};

const POINTER_WIDTH: usize = size_of::<usize>();

/// Size query and buffer fill for the attributes of one native object.
pub trait PropertyContainer {
    /// Number of bytes attribute `key` occupies.
    fn size_of(&self, key: AttributeKey) -> Result<usize>;

    /// Write attribute `key` into `buf`, whose length is passed to the native
    /// layer as the available size.
    ///
    /// Attributes whose payload is an array of destination pointers (program
    /// binaries) are refused here; they go through
    /// [`PropertyContainer::fill_pointers`].
    fn fill(&self, key: AttributeKey, buf: &mut [u8]) -> Result<()>;

    /// Fill a pointer-array attribute: the native layer writes each element
    /// through the matching pointer of `slots`.
    ///
    /// # Safety
    ///
    /// Every non-null pointer in `slots` must be valid for writes of the
    /// length the native layer reports for that element.
    unsafe fn fill_pointers(&self, key: AttributeKey, slots: &mut [*mut u8]) -> Result<()>;
}

fn is_pointer_array(target: &InfoTarget, key: AttributeKey) -> bool {
    matches!(target, InfoTarget::Program(_)) && key == info::program::BINARIES
}

/// Container answering through one native `clGet*Info` entry point.
#[derive(Debug, Clone, Copy)]
pub struct InfoContainer<'a> {
    api: &'a dyn ClApi,
    target: InfoTarget,
}

impl<'a> InfoContainer<'a> {
    pub fn new(api: &'a dyn ClApi, target: InfoTarget) -> Self {
        Self { api, target }
    }

    pub fn target(&self) -> InfoTarget {
        self.target
    }

    /// # Safety
    ///
    /// `value` must be valid for writes of `size` bytes.
    unsafe fn query(&self, key: AttributeKey, size: usize, value: *mut c_void) -> Result<()> {
        // SAFETY: upheld by the caller.
        let status = unsafe { self.api.get_info(self.target, key, size, value, ptr::null_mut()) };
        status.ok().map_err(|status| ClError::attribute(self.target.entry_point(), key, status))
    }
}

impl PropertyContainer for InfoContainer<'_> {
    fn size_of(&self, key: AttributeKey) -> Result<usize> {
        let mut size = 0usize;
        // SAFETY: null value with zero size is a pure size query.
        let status =
            unsafe { self.api.get_info(self.target, key, 0, ptr::null_mut(), &mut size) };
        status
            .ok()
            .map(|()| size)
            .map_err(|status| ClError::attribute(self.target.entry_point(), key, status))
    }

    fn fill(&self, key: AttributeKey, buf: &mut [u8]) -> Result<()> {
        if is_pointer_array(&self.target, key) {
            return Err(ClError::InvalidArgument(format!(
                "attribute {key:#06x} is a pointer array; use fill_pointers"
            )));
        }
        // SAFETY: `buf` is valid for `buf.len()` bytes.
        unsafe { self.query(key, buf.len(), buf.as_mut_ptr().cast()) }
    }

    unsafe fn fill_pointers(&self, key: AttributeKey, slots: &mut [*mut u8]) -> Result<()> {
        // SAFETY: the slot array itself is valid for its byte length; the
        // pointees are covered by the caller's contract.
        unsafe { self.query(key, size_of_val(slots), slots.as_mut_ptr().cast()) }
    }
}

/// Tries `primary` first and answers from `secondary` when the primary
/// reports a native failure.
#[derive(Debug, Clone, Copy)]
pub struct FallbackContainer<P, S> {
    primary: P,
    secondary: S,
}

impl<P: PropertyContainer, S: PropertyContainer> FallbackContainer<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    fn attempt<T>(
        &self,
        key: AttributeKey,
        mut op: impl FnMut(&dyn PropertyContainer) -> Result<T>,
    ) -> Result<T> {
        match op(&self.primary) {
            Err(ClError::NativeCallFailed { status, .. }) => {
                trace!(key, %status, "primary info query failed, using fallback");
                op(&self.secondary)
            }
            other => other,
        }
    }
}

impl<P: PropertyContainer, S: PropertyContainer> PropertyContainer for FallbackContainer<P, S> {
    fn size_of(&self, key: AttributeKey) -> Result<usize> {
        self.attempt(key, |c| c.size_of(key))
    }

    fn fill(&self, key: AttributeKey, buf: &mut [u8]) -> Result<()> {
        self.attempt(key, |c| c.fill(key, buf))
    }

    unsafe fn fill_pointers(&self, key: AttributeKey, slots: &mut [*mut u8]) -> Result<()> {
        // SAFETY: forwarded from the caller's contract.
        self.attempt(key, |c| unsafe { c.fill_pointers(key, slots) })
    }
}

// ── Pinned buffer array ─────────────────────────────────────────────────────

/// Destination pointers of a set of caller buffers, held for the duration
/// of a single native fill.
///
/// The buffers stay mutably borrowed while the array exists, so they can
/// neither move nor be freed underneath the pointers. Dropping the array
/// ends the scope on every exit path, including a failed fill.
pub struct PinnedBufferArray<'a> {
    slots: Vec<*mut u8>,
    lens: Vec<usize>,
    _buffers: PhantomData<&'a mut [Vec<u8>]>,
}

impl<'a> PinnedBufferArray<'a> {
    pub fn new(buffers: &'a mut [Vec<u8>]) -> Self {
        let lens: Vec<usize> = buffers.iter().map(Vec::len).collect();
        let slots: Vec<*mut u8> = buffers
            .iter_mut()
            .map(|b| if b.is_empty() { ptr::null_mut() } else { b.as_mut_ptr() })
            .collect();
        trace!(buffers = slots.len(), total_bytes = lens.iter().sum::<usize>(), "pinned buffer array acquired");
        Self { slots, lens, _buffers: PhantomData }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Byte length of each pinned buffer, in slot order.
    pub fn lens(&self) -> &[usize] {
        &self.lens
    }

    pub fn slots_mut(&mut self) -> &mut [*mut u8] {
        &mut self.slots
    }
}

impl Drop for PinnedBufferArray<'_> {
    fn drop(&mut self) {
        trace!(buffers = self.slots.len(), "pinned buffer array released");
    }
}

// ── PropertyReader ──────────────────────────────────────────────────────────

/// Typed decoding over any [`PropertyContainer`].
pub trait PropertyReader: PropertyContainer {
    /// NUL-terminated text. A zero size decodes to an empty string; bytes
    /// after the first NUL are discarded; invalid UTF-8 is replaced.
    fn read_string(&self, key: AttributeKey) -> Result<String> {
        let size = self.size_of(key)?;
        if size == 0 {
            return Ok(String::new());
        }
        let mut buf = vec![0u8; size];
        self.fill(key, &mut buf)?;
        let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    /// Fixed-width scalar; the width is known statically so no size query is
    /// made.
    fn read_scalar<T: Pod>(&self, key: AttributeKey) -> Result<T> {
        let mut buf = vec![0u8; size_of::<T>()];
        self.fill(key, &mut buf)?;
        Ok(bytemuck::pod_read_unaligned(&buf))
    }

    /// Native boolean: a `u32` compared against `CL_TRUE`.
    fn read_bool(&self, key: AttributeKey) -> Result<bool> {
        Ok(self.read_scalar::<u32>(key)? == CL_TRUE)
    }

    /// Opaque blob of exactly the reported size.
    fn read_bytes(&self, key: AttributeKey) -> Result<Vec<u8>> {
        let size = self.size_of(key)?;
        let mut buf = vec![0u8; size];
        if size > 0 {
            self.fill(key, &mut buf)?;
        }
        Ok(buf)
    }

    /// Packed array of pointer-sized values. A payload that is not a whole
    /// number of words is rejected.
    fn read_usize_array(&self, key: AttributeKey) -> Result<Vec<usize>> {
        let bytes = self.read_bytes(key)?;
        if bytes.len() % POINTER_WIDTH != 0 {
            return Err(ClError::InvalidArgument(format!(
                "attribute {key:#06x} is {} bytes, not a multiple of {POINTER_WIDTH}",
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(POINTER_WIDTH)
            .map(|chunk| {
                let mut word = [0u8; POINTER_WIDTH];
                word.copy_from_slice(chunk);
                usize::from_ne_bytes(word)
            })
            .collect())
    }

    /// Packed array of native handles.
    fn read_handles(&self, key: AttributeKey) -> Result<Vec<NativeHandle>> {
        Ok(self.read_usize_array(key)?.into_iter().map(NativeHandle::from_usize).collect())
    }

    /// Fill caller-sized buffers through a single pointer-array query. The
    /// buffers are pinned for exactly the duration of the native call.
    fn read_into_buffers(&self, key: AttributeKey, buffers: &mut [Vec<u8>]) -> Result<()> {
        let mut pinned = PinnedBufferArray::new(buffers);
        // SAFETY: each slot points at a live buffer of `lens[i]` bytes,
        // sized by the caller from the matching size attribute.
        unsafe { self.fill_pointers(key, pinned.slots_mut()) }
    }
}

impl<C: PropertyContainer + ?Sized> PropertyReader for C {}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use proptest::prelude::*;

    use super::*;
    use clnet_sys::Status;

    /// Serves a single fixed payload for every key.
    struct Fixed {
        payload: Vec<u8>,
        size_queries: Cell<usize>,
    }

    impl Fixed {
        fn new(payload: impl Into<Vec<u8>>) -> Self {
            Self { payload: payload.into(), size_queries: Cell::new(0) }
        }
    }

    impl PropertyContainer for Fixed {
        fn size_of(&self, _key: AttributeKey) -> Result<usize> {
            self.size_queries.set(self.size_queries.get() + 1);
            Ok(self.payload.len())
        }

        fn fill(&self, _key: AttributeKey, buf: &mut [u8]) -> Result<()> {
            let n = buf.len().min(self.payload.len());
            buf[..n].copy_from_slice(&self.payload[..n]);
            Ok(())
        }

        unsafe fn fill_pointers(&self, _key: AttributeKey, slots: &mut [*mut u8]) -> Result<()> {
            for slot in slots.iter().copied().filter(|s| !s.is_null()) {
                // SAFETY: test buffers are sized to the payload.
                unsafe { ptr::copy_nonoverlapping(self.payload.as_ptr(), slot, self.payload.len()) };
            }
            Ok(())
        }
    }

    struct Failing(Status);

    impl PropertyContainer for Failing {
        fn size_of(&self, key: AttributeKey) -> Result<usize> {
            Err(ClError::attribute("clGetImageInfo", key, self.0))
        }

        fn fill(&self, key: AttributeKey, _buf: &mut [u8]) -> Result<()> {
            Err(ClError::attribute("clGetImageInfo", key, self.0))
        }

        unsafe fn fill_pointers(&self, key: AttributeKey, _slots: &mut [*mut u8]) -> Result<()> {
            Err(ClError::attribute("clGetImageInfo", key, self.0))
        }
    }

    #[test]
    fn empty_string_attribute_decodes_to_empty() {
        assert_eq!(Fixed::new(Vec::new()).read_string(1).unwrap(), "");
        assert_eq!(Fixed::new(vec![0]).read_string(1).unwrap(), "");
    }

    #[test]
    fn scalar_reads_skip_size_query() {
        let c = Fixed::new(42u32.to_ne_bytes());
        assert_eq!(c.read_scalar::<u32>(1).unwrap(), 42);
        assert_eq!(c.size_queries.get(), 0);
    }

    #[test]
    fn bool_compares_against_true_sentinel() {
        assert!(Fixed::new(1u32.to_ne_bytes()).read_bool(1).unwrap());
        assert!(!Fixed::new(0u32.to_ne_bytes()).read_bool(1).unwrap());
        assert!(!Fixed::new(2u32.to_ne_bytes()).read_bool(1).unwrap());
    }

    #[test]
    fn usize_array_uses_pointer_width() {
        let bytes: Vec<u8> = [7usize, 9, 11].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(Fixed::new(bytes).read_usize_array(1).unwrap(), vec![7, 9, 11]);
    }

    #[test]
    fn usize_array_rejects_partial_words() {
        let err = Fixed::new(vec![0u8; POINTER_WIDTH + 1]).read_usize_array(1).unwrap_err();
        assert!(matches!(err, ClError::InvalidArgument(_)), "{err:?}");
        assert!(Fixed::new(Vec::new()).read_usize_array(1).unwrap().is_empty());
    }

    #[test]
    fn fallback_answers_when_primary_fails() {
        let c = FallbackContainer::new(Failing(Status::INVALID_VALUE), Fixed::new(b"mem\0".to_vec()));
        assert_eq!(c.read_string(1).unwrap(), "mem");
    }

    #[test]
    fn fallback_surfaces_secondary_error() {
        let c = FallbackContainer::new(
            Failing(Status::INVALID_VALUE),
            Failing(Status::INVALID_MEM_OBJECT),
        );
        assert_eq!(c.read_string(1).unwrap_err().status(), Some(Status::INVALID_MEM_OBJECT));
    }

    #[test]
    fn buffers_are_filled_through_pointer_slots() {
        let c = Fixed::new(b"abc".to_vec());
        let mut buffers = vec![vec![0u8; 3], Vec::new(), vec![0u8; 3]];
        c.read_into_buffers(1, &mut buffers).unwrap();
        assert_eq!(buffers, vec![b"abc".to_vec(), Vec::new(), b"abc".to_vec()]);
    }

    #[test]
    fn failed_fill_hands_buffers_back() {
        let mut buffers = vec![vec![0u8; 3], vec![0u8; 5]];
        let err = Failing(Status::INVALID_PROGRAM).read_into_buffers(9, &mut buffers).unwrap_err();
        assert!(matches!(err, ClError::NativeCallFailed { key: Some(9), .. }));
        buffers[1].push(1);
        buffers.push(Vec::new());
        assert_eq!(buffers.iter().map(Vec::len).collect::<Vec<_>>(), [3, 6, 0]);
    }

    #[test]
    fn pinned_array_tracks_lengths() {
        let mut buffers = vec![vec![0u8; 4], vec![0u8; 8]];
        let pinned = PinnedBufferArray::new(&mut buffers);
        assert_eq!(pinned.len(), 2);
        assert_eq!(pinned.lens(), &[4, 8]);
    }

    proptest! {
        #[test]
        fn string_decode_truncates_at_first_nul(s in "[a-zA-Z0-9 ._-]{0,64}", tail in proptest::collection::vec(any::<u8>(), 0..16)) {
            let mut payload = s.clone().into_bytes();
            payload.push(0);
            payload.extend(tail);
            prop_assert_eq!(Fixed::new(payload).read_string(1).unwrap(), s);
        }
    }
}
