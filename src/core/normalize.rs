//! Repairs the decimal commas of the upstream feed.
//!
//! The feed writes numbers as `52,1034`, which the XML parser cannot read as a
//! decimal. Everything from [`DATA_START_OFFSET`] onwards is rate data; the XML
//! declaration and root attributes before it are left alone.

use crate::core::error::{Result, UpdateError};

/// First byte that can belong to a currency entry.
pub const DATA_START_OFFSET: usize = 100;

const COMMA: u8 = b',';
const DOT: u8 = b'.';

/// Replaces every comma at or after [`DATA_START_OFFSET`] with a dot, in place.
///
/// This is destructive: callers that need the raw feed must keep a copy. A
/// buffer shorter than the offset is left unchanged.
pub fn repair(data: &mut [u8]) -> Result<()> {
    if data.is_empty() {
        return Err(UpdateError::Data("feed is empty".to_string()));
    }

    if let Some(body) = data.get_mut(DATA_START_OFFSET..) {
        for byte in body.iter_mut().filter(|b| **b == COMMA) {
            *byte = DOT;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commas_replaced_only_after_offset() {
        let mut data = vec![b'x'; 120];
        data[50] = b',';
        data[110] = b',';
        let original = data.clone();

        repair(&mut data).unwrap();

        assert_eq!(data[50], b',');
        assert_eq!(data[110], b'.');
        assert_eq!(data[..DATA_START_OFFSET], original[..DATA_START_OFFSET]);
        for (i, (after, before)) in data.iter().zip(&original).enumerate() {
            if i != 110 {
                assert_eq!(after, before, "byte {i} changed");
            }
        }
    }

    #[test]
    fn test_comma_at_offset_is_replaced() {
        let mut data = vec![b','; DATA_START_OFFSET + 1];
        repair(&mut data).unwrap();
        assert_eq!(data[DATA_START_OFFSET - 1], b',');
        assert_eq!(data[DATA_START_OFFSET], b'.');
    }

    #[test]
    fn test_short_buffer_unchanged() {
        let mut data = b"<a>1,5</a>".to_vec();
        repair(&mut data).unwrap();
        assert_eq!(data, b"<a>1,5</a>");

        let mut exact = vec![b','; DATA_START_OFFSET];
        repair(&mut exact).unwrap();
        assert!(exact.iter().all(|b| *b == b','));
    }

    #[test]
    fn test_empty_buffer_is_data_error() {
        let mut data: Vec<u8> = Vec::new();
        assert!(matches!(repair(&mut data), Err(UpdateError::Data(_))));
    }

    #[test]
    fn test_non_ascii_bytes_untouched() {
        // windows-1251 bytes of the feed's currency names
        let mut data = vec![b' '; DATA_START_OFFSET];
        data.extend_from_slice(&[0xC0, 0xE2, b',', 0xF1, 0xF2]);
        repair(&mut data).unwrap();
        assert_eq!(data[DATA_START_OFFSET..], [0xC0, 0xE2, b'.', 0xF1, 0xF2]);
    }
}
