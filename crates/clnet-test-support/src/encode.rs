//! Native payload encodings, matching what a driver writes for each
//! attribute type.

use clnet_sys::{ImageFormat, NativeHandle};

/// NUL-terminated string payload.
pub fn string(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

pub fn u32(v: u32) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

pub fn i32(v: i32) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

pub fn u64(v: u64) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

pub fn usize(v: usize) -> Vec<u8> {
    v.to_ne_bytes().to_vec()
}

pub fn usizes(values: &[usize]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn handle(h: NativeHandle) -> Vec<u8> {
    usize(h.as_usize())
}

pub fn handles(hs: &[NativeHandle]) -> Vec<u8> {
    hs.iter().flat_map(|h| h.as_usize().to_ne_bytes()).collect()
}

/// `cl_image_format` as two native `u32`s.
pub fn image_format(format: &ImageFormat) -> Vec<u8> {
    let mut bytes = u32(format.channel_order);
    bytes.extend(u32(format.channel_type));
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_payload_is_nul_terminated() {
        assert_eq!(string("ab"), vec![b'a', b'b', 0]);
        assert_eq!(string(""), vec![0]);
    }

    #[test]
    fn handle_list_packs_pointer_width_entries() {
        let bytes = handles(&[NativeHandle::from_usize(1), NativeHandle::from_usize(2)]);
        assert_eq!(bytes.len(), 2 * std::mem::size_of::<usize>());
    }
}
