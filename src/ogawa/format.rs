//! Container constants and child-offset helpers.

/// Magic bytes at the start of every archive.
pub const OGAWA_MAGIC: &[u8; 5] = b"Ogawa";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

pub const FROZEN_OFFSET: usize = 5;
pub const VERSION_OFFSET: usize = 6;
pub const ROOT_POS_OFFSET: usize = 8;

/// Container version.
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag once the archive is sealed.
pub const FROZEN_FLAG: u8 = 0xFF;
/// Frozen flag while still being written.
pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// MSB set means data, clear means group.
pub const TYPE_FLAG_MASK: u64 = 1 << 63;
pub const OFFSET_MASK: u64 = !TYPE_FLAG_MASK;

/// Offset of an empty data block.
pub const EMPTY_DATA: u64 = TYPE_FLAG_MASK;

/// Archive-level format version stored in root child 0.
pub const ARCHIVE_FORMAT_VERSION: i32 = 1;
/// Library version stored in root child 1 (major * 10000 + minor * 100 + patch).
pub const LIBRARY_VERSION: i32 = 100;

/// Root group children, in order.
pub mod root {
    pub const FORMAT_VERSION: u64 = 0;
    pub const LIBRARY_VERSION: u64 = 1;
    pub const TOP_OBJECT: u64 = 2;
    pub const ARCHIVE_METADATA: u64 = 3;
    pub const TIME_SAMPLINGS: u64 = 4;
    pub const INDEXED_METADATA: u64 = 5;
    pub const FLAGS: u64 = 6;
    pub const COUNT: u64 = 7;
}

/// Archive flag: object and sample digests are recorded.
pub const FLAG_DIGESTS: u32 = 1 << 0;
/// Archive flag: sample payloads are zlib framed.
pub const FLAG_COMPRESSED: u32 = 1 << 1;

/// Metadata index meaning "inline follows".
pub const INLINE_METADATA: u8 = 0xFF;
/// Maximum entries in the indexed metadata table; index 0 is the empty string.
pub const MAX_INDEXED_METADATA: usize = 254;
/// Longest string eligible for the indexed table.
pub const MAX_INDEXED_METADATA_LEN: usize = 255;

/// Archive metadata keys carrying the archive info.
pub mod archive_info {
    pub const APP_NAME: &str = "_ai_Application";
    pub const LIBRARY_VERSION: &str = "_ai_LibraryVersion";
    pub const WHEN_WRITTEN: &str = "_ai_DateWritten";
    pub const USER_DESCRIPTION: &str = "_ai_Description";
}

/// Property header info word layout.
pub mod info {
    pub const KIND_MASK: u32 = 0x3;
    pub const POD_SHIFT: u32 = 4;
    pub const POD_MASK: u32 = 0xF;
    pub const EXTENT_SHIFT: u32 = 8;
    pub const EXTENT_MASK: u32 = 0xFF;
    pub const HOMOGENEOUS: u32 = 1 << 16;
    pub const EXPLICIT_TIME_SAMPLING: u32 = 1 << 17;
}

#[inline]
pub const fn is_group_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) == 0
}

#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) != 0
}

/// Position part of a child offset.
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | TYPE_FLAG_MASK
}

/// Offset 0 of either kind is empty.
#[inline]
pub const fn is_empty_offset(offset: u64) -> bool {
    extract_offset(offset) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let group = make_group_offset(0x1234);
        assert!(is_group_offset(group));
        assert!(!is_data_offset(group));
        assert_eq!(group, 0x1234);

        let data = make_data_offset(0x5678);
        assert!(is_data_offset(data));
        assert_eq!(extract_offset(data), 0x5678);
        assert_eq!(data, 0x8000_0000_0000_5678);
    }

    #[test]
    fn test_empty_offset() {
        assert!(is_empty_offset(0));
        assert!(is_empty_offset(EMPTY_DATA));
        assert!(!is_empty_offset(0x100));
    }
}
