//! crates/richacl/src/xattr.rs
//!
//! The `system.richacl` extended attribute encoding.
//!
//! All fields are little-endian:
//!
//! ```text
//! header (16 bytes)  version u8 | flags u8 | count u16 |
//!                    owner_mask u32 | group_mask u32 | other_mask u32
//! entry  (12 bytes)  type u16 | flags u16 | mask u32 | id u32
//! ```
//!
//! The id of an entry is a special identifier number when
//! [`AceFlags::SPECIAL_WHO`] is set, a group id when
//! [`AceFlags::IDENTIFIER_GROUP`] is set, and a user id otherwise. User and
//! group ids are raw numbers of the caller's namespace and pass through an
//! [`IdMapper`] on the way in and out.

use crate::ace::{AccessMask, AceFlags, AceType, RichAce, Who};
use crate::acl::{AclFlags, MAX_ENTRIES, RichAcl};
use crate::debug_acl;
use crate::error::{AclError, DecodeError};
use crate::identity::{INVALID_ID, IdMapper, translate_gid, translate_uid};

/// Extended attribute name the encoding is stored under.
pub const XATTR_NAME: &str = "system.richacl";

/// Encoding version understood by this crate.
pub const XATTR_VERSION: u8 = 0;

/// Size of the fixed header.
pub const HEADER_LEN: usize = 16;

/// Size of one encoded entry.
pub const ENTRY_LEN: usize = 12;

/// Largest extended attribute value the kernel accepts.
pub const XATTR_SIZE_MAX: usize = 65_536;

/// Number of bytes needed to encode an ACL with `count` entries.
#[must_use]
pub const fn encoded_len(count: usize) -> usize {
    HEADER_LEN + ENTRY_LEN * count
}

/// Decodes an xattr value.
///
/// Validation happens in a fixed order and stops at the first problem:
/// header length, version, ACL flags, entry count, total length, class masks,
/// then per entry its flags, identifier, type and mask. No ACL is returned
/// unless the whole buffer is valid.
///
/// # Errors
///
/// Returns [`AclError::InvalidEncoding`] describing the first problem found,
/// or [`AclError::OutOfMemory`] if the entries cannot be allocated.
pub fn decode(bytes: &[u8], mapper: &dyn IdMapper) -> Result<RichAcl, AclError> {
    decode_inner(bytes, mapper).inspect_err(|err| {
        if let Some(reason) = err.decode_error() {
            debug_acl::trace_decode_rejected(bytes.len(), reason);
        }
    })
}

fn decode_inner(bytes: &[u8], mapper: &dyn IdMapper) -> Result<RichAcl, AclError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            len: bytes.len(),
            header: HEADER_LEN,
        }
        .into());
    }
    let mut reader = Reader::new(bytes);

    let version = reader.u8();
    if version != XATTR_VERSION {
        return Err(DecodeError::BadVersion(version).into());
    }
    let raw_flags = reader.u8();
    let flags = AclFlags::from_bits(raw_flags).ok_or(DecodeError::InvalidAclFlags(raw_flags))?;

    let count = usize::from(reader.u16());
    if count > MAX_ENTRIES {
        return Err(DecodeError::TooManyEntries {
            count,
            max: MAX_ENTRIES,
        }
        .into());
    }
    if bytes.len() != encoded_len(count) {
        return Err(DecodeError::LengthMismatch {
            expected: encoded_len(count),
            actual: bytes.len(),
        }
        .into());
    }

    let mut acl = RichAcl::with_capacity(count)?.with_flags(flags);
    let owner_mask = class_mask(&mut reader, "owner")?;
    let group_mask = class_mask(&mut reader, "group")?;
    let other_mask = class_mask(&mut reader, "other")?;
    acl.set_masks(owner_mask, group_mask, other_mask);

    for index in 0..count {
        acl.push(decode_entry(&mut reader, index, mapper)?)?;
    }
    debug_acl::trace_decoded(&acl);
    Ok(acl)
}

fn class_mask(reader: &mut Reader<'_>, class: &'static str) -> Result<AccessMask, DecodeError> {
    let value = reader.u32();
    AccessMask::from_bits(value).ok_or(DecodeError::InvalidClassMask { class, value })
}

fn decode_entry(
    reader: &mut Reader<'_>,
    index: usize,
    mapper: &dyn IdMapper,
) -> Result<RichAce, DecodeError> {
    let raw_type = reader.u16();
    let raw_flags = reader.u16();
    let raw_mask = reader.u32();
    let raw_id = reader.u32();

    let flags = AceFlags::from_bits(raw_flags).ok_or(DecodeError::InvalidEntryFlags {
        index,
        value: raw_flags,
    })?;

    let who = if flags.contains(AceFlags::SPECIAL_WHO) {
        Who::from_special_id(raw_id).ok_or(DecodeError::InvalidSpecialId {
            index,
            value: raw_id,
        })?
    } else if flags.contains(AceFlags::IDENTIFIER_GROUP) {
        mapper
            .map_gid(raw_id)
            .map(Who::UnixGroup)
            .ok_or(DecodeError::UnmappedId {
                index,
                value: raw_id,
            })?
    } else {
        mapper
            .map_uid(raw_id)
            .map(Who::User)
            .ok_or(DecodeError::UnmappedId {
                index,
                value: raw_id,
            })?
    };

    let kind = AceType::from_raw(raw_type).ok_or(DecodeError::InvalidEntryType {
        index,
        value: raw_type,
    })?;
    let mask = AccessMask::from_bits(raw_mask).ok_or(DecodeError::InvalidEntryMask {
        index,
        value: raw_mask,
    })?;

    Ok(RichAce::new(kind, who, mask).with_flags(flags))
}

/// Encodes `acl` into a freshly allocated buffer.
///
/// User and group ids without a mapping in `mapper` are written as
/// [`INVALID_ID`], which [`decode`] rejects.
pub fn encode(acl: &RichAcl, mapper: &dyn IdMapper) -> Result<Vec<u8>, AclError> {
    let len = encoded_len(acl.len());
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|err| AclError::out_of_memory(acl.len(), err))?;
    buf.resize(len, 0);
    encode_into(acl, mapper, &mut buf)?;
    Ok(buf)
}

/// Encodes `acl` into `buf` and returns the number of bytes written.
///
/// # Errors
///
/// Returns [`AclError::BufferTooSmall`] when `buf` is shorter than
/// [`encoded_len`], and [`AclError::TooManyEntries`] for ACLs whose entry
/// count does not fit the header.
pub fn encode_into(acl: &RichAcl, mapper: &dyn IdMapper, buf: &mut [u8]) -> Result<usize, AclError> {
    let count = u16::try_from(acl.len())
        .ok()
        .filter(|&count| usize::from(count) <= MAX_ENTRIES)
        .ok_or(AclError::TooManyEntries {
            count: acl.len(),
            max: MAX_ENTRIES,
        })?;
    let len = encoded_len(acl.len());
    if buf.len() < len {
        return Err(AclError::BufferTooSmall {
            required: len,
            available: buf.len(),
        });
    }

    let mut writer = Writer::new(&mut buf[..len]);
    writer.u8(XATTR_VERSION);
    writer.u8(acl.flags().bits());
    writer.u16(count);
    writer.u32(acl.owner_mask().bits());
    writer.u32(acl.group_mask().bits());
    writer.u32(acl.other_mask().bits());

    for ace in acl {
        let id = match ace.who() {
            Who::User(uid) => mapper.unmap_uid(uid).unwrap_or(INVALID_ID),
            Who::UnixGroup(gid) => mapper.unmap_gid(gid).unwrap_or(INVALID_ID),
            special => special.special_id().unwrap_or_default(),
        };
        writer.u16(ace.kind().as_raw());
        writer.u16(ace.flags().bits());
        writer.u32(ace.mask().bits());
        writer.u32(id);
    }
    Ok(len)
}

/// Rewrites the user and group ids of a raw xattr value from namespace `from`
/// to namespace `to`, in place.
///
/// Only the version and the entry-size alignment are checked; buffers failing
/// either check are left untouched. Special entries keep their ids and ids
/// without a mapping become [`INVALID_ID`].
pub fn fix_xattr_ids(buf: &mut [u8], from: &dyn IdMapper, to: &dyn IdMapper) {
    if buf.len() < HEADER_LEN || buf[0] != XATTR_VERSION {
        return;
    }
    let body = &mut buf[HEADER_LEN..];
    if body.len() % ENTRY_LEN != 0 {
        return;
    }

    for entry in body.chunks_exact_mut(ENTRY_LEN) {
        let flags = AceFlags::from_bits_retain(u16::from_le_bytes([entry[2], entry[3]]));
        if flags.contains(AceFlags::SPECIAL_WHO) {
            continue;
        }
        let raw = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);
        let translated = if flags.contains(AceFlags::IDENTIFIER_GROUP) {
            translate_gid(from, to, raw)
        } else {
            translate_uid(from, to, raw)
        };
        entry[8..12].copy_from_slice(&translated.unwrap_or(INVALID_ID).to_le_bytes());
    }
}

/// Cursor over a buffer whose length has already been validated.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        if let Some(src) = self.bytes.get(self.pos..self.pos + N) {
            out.copy_from_slice(src);
        }
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    const fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    fn u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    fn u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Gid, InitNamespace, RangeMapper, Uid};

    fn sample() -> RichAcl {
        RichAcl::from_entries([
            RichAce::deny(Who::Owner, AccessMask::WRITE_DATA),
            RichAce::allow(Who::User(Uid::new(1000)), AccessMask::READ_DATA)
                .with_flags(AceFlags::FILE_INHERIT),
            RichAce::allow(Who::UnixGroup(Gid::new(100)), AccessMask::EXECUTE),
            RichAce::allow(Who::Everyone, AccessMask::READ_DATA),
        ])
        .expect("acl")
        .with_flags(AclFlags::MASKED | AclFlags::AUTO_INHERIT)
        .with_masks(
            AccessMask::POSIX_ALL,
            AccessMask::READ_DATA,
            AccessMask::empty(),
        )
    }

    fn header(version: u8, flags: u8, count: u16) -> Vec<u8> {
        let mut bytes = vec![version, flags];
        bytes.extend_from_slice(&count.to_le_bytes());
        bytes.extend_from_slice(&[0; 12]);
        bytes
    }

    fn entry(kind: u16, flags: u16, mask: u32, id: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&kind.to_le_bytes());
        bytes.extend_from_slice(&flags.to_le_bytes());
        bytes.extend_from_slice(&mask.to_le_bytes());
        bytes.extend_from_slice(&id.to_le_bytes());
        bytes
    }

    fn decode_err(bytes: &[u8]) -> DecodeError {
        *decode(bytes, &InitNamespace)
            .unwrap_err()
            .decode_error()
            .expect("decode error")
    }

    #[test]
    fn layout_is_little_endian() {
        let bytes = encode(&sample(), &InitNamespace).expect("encode");
        assert_eq!(bytes.len(), encoded_len(4));
        assert_eq!(&bytes[..4], &[0, 0x81, 4, 0]);
        assert_eq!(&bytes[4..8], &0x67u32.to_le_bytes()[..]);
        // Second entry: allow, FILE_INHERIT, READ_DATA, uid 1000.
        assert_eq!(&bytes[28..40], &entry(0, 0x0001, 1, 1000)[..]);
        // Third entry carries IDENTIFIER_GROUP.
        assert_eq!(&bytes[40..44], &[0, 0, 0x40, 0]);
        // everyone@ is special id 2.
        assert_eq!(&bytes[60..64], &2u32.to_le_bytes()[..]);
    }

    #[test]
    fn decode_inverts_encode() {
        let acl = sample();
        let bytes = encode(&acl, &InitNamespace).expect("encode");
        assert_eq!(decode(&bytes, &InitNamespace).expect("decode"), acl);
    }

    #[test]
    fn empty_acl_is_header_only() {
        let bytes = encode(&RichAcl::new(), &InitNamespace).expect("encode");
        assert_eq!(bytes, vec![0; HEADER_LEN]);
        assert_eq!(decode(&bytes, &InitNamespace).expect("decode"), RichAcl::new());
    }

    #[test]
    fn largest_acl_fills_the_xattr_size_limit() {
        let acl = RichAcl::from_entries((0..MAX_ENTRIES).map(|index| {
            let uid = Uid::new(u32::try_from(index).expect("index fits u32"));
            RichAce::allow(Who::User(uid), AccessMask::READ_DATA)
        }))
        .expect("acl");
        assert_eq!(encoded_len(acl.len()), XATTR_SIZE_MAX);

        let bytes = encode(&acl, &InitNamespace).expect("encode");
        assert_eq!(bytes.len(), 65_536);
        assert_eq!(&bytes[2..4], &u16::try_from(MAX_ENTRIES).expect("count").to_le_bytes()[..]);
        assert_eq!(decode(&bytes, &InitNamespace).expect("decode"), acl);
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(
            decode_err(&[0; 15]),
            DecodeError::Truncated { len: 15, header: 16 }
        );
    }

    #[test]
    fn rejects_bad_version_before_flags() {
        assert_eq!(decode_err(&header(1, 0xff, 0)), DecodeError::BadVersion(1));
        assert_eq!(decode_err(&header(0, 0x08, 0)), DecodeError::InvalidAclFlags(0x08));
    }

    #[test]
    fn rejects_count_above_maximum() {
        let bytes = header(0, 0, 5461);
        assert_eq!(
            decode_err(&bytes),
            DecodeError::TooManyEntries { count: 5461, max: 5460 }
        );
    }

    #[test]
    fn rejects_length_mismatch() {
        let mut bytes = header(0, 0, 1);
        bytes.extend(entry(0, 0x4000, 1, 2));
        bytes.push(0);
        assert_eq!(
            decode_err(&bytes),
            DecodeError::LengthMismatch { expected: 28, actual: 29 }
        );
    }

    #[test]
    fn rejects_invalid_class_mask() {
        let mut bytes = header(0, 0, 0);
        bytes[8..12].copy_from_slice(&0x0800u32.to_le_bytes());
        assert_eq!(
            decode_err(&bytes),
            DecodeError::InvalidClassMask { class: "group", value: 0x0800 }
        );
    }

    #[test]
    fn rejects_invalid_entries() {
        let cases = [
            (entry(0, 0x0100, 1, 0), DecodeError::InvalidEntryFlags { index: 0, value: 0x0100 }),
            (entry(0, 0x4000, 1, 3), DecodeError::InvalidSpecialId { index: 0, value: 3 }),
            (entry(2, 0x4000, 1, 0), DecodeError::InvalidEntryType { index: 0, value: 2 }),
            (entry(0, 0x4000, 0x0800, 0), DecodeError::InvalidEntryMask { index: 0, value: 0x0800 }),
            (entry(0, 0, 1, u32::MAX), DecodeError::UnmappedId { index: 0, value: u32::MAX }),
            (entry(0, 0x40, 1, u32::MAX), DecodeError::UnmappedId { index: 0, value: u32::MAX }),
        ];
        for (raw, expected) in cases {
            let mut bytes = header(0, 0, 1);
            bytes.extend(raw);
            assert_eq!(decode_err(&bytes), expected);
        }
    }

    #[test]
    fn identifier_check_precedes_type_check() {
        let mut bytes = header(0, 0, 1);
        bytes.extend(entry(7, 0x4000, 1, 9));
        assert_eq!(
            decode_err(&bytes),
            DecodeError::InvalidSpecialId { index: 0, value: 9 }
        );
    }

    #[test]
    fn decode_maps_ids_through_namespace() {
        let container = RangeMapper::new(0, 100_000, 1000);
        let mut bytes = header(0, 0, 1);
        bytes.extend(entry(0, 0, 1, 5));
        let acl = decode(&bytes, &container).expect("decode");
        assert_eq!(acl.entries()[0].who(), Who::User(Uid::new(100_005)));

        let mut bytes = header(0, 0, 1);
        bytes.extend(entry(0, 0, 1, 5000));
        assert!(decode(&bytes, &container).is_err());
    }

    #[test]
    fn encode_into_reports_small_buffer() {
        let acl = sample();
        let mut buf = [0u8; 20];
        assert_eq!(
            encode_into(&acl, &InitNamespace, &mut buf),
            Err(AclError::BufferTooSmall { required: 64, available: 20 })
        );
        let mut buf = [0xAAu8; 80];
        assert_eq!(encode_into(&acl, &InitNamespace, &mut buf), Ok(64));
        assert_eq!(buf[64], 0xAA);
    }

    #[test]
    fn encode_marks_unmapped_ids_invalid() {
        let container = RangeMapper::new(0, 100_000, 1000);
        let acl = RichAcl::from_entries([RichAce::allow(Who::User(Uid::new(7)), AccessMask::READ_DATA)])
            .expect("acl");
        let bytes = encode(&acl, &container).expect("encode");
        assert_eq!(&bytes[24..28], &INVALID_ID.to_le_bytes()[..]);
    }

    #[test]
    fn fix_xattr_ids_translates_named_entries_only() {
        let container = RangeMapper::new(0, 100_000, 1000);
        let mut bytes = header(0, 0, 3);
        bytes.extend(entry(0, 0, 1, 5));
        bytes.extend(entry(0, 0x40, 1, 6));
        bytes.extend(entry(0, 0x4000, 1, 2));
        fix_xattr_ids(&mut bytes, &container, &InitNamespace);

        let acl = decode(&bytes, &InitNamespace).expect("decode");
        assert_eq!(acl.entries()[0].who(), Who::User(Uid::new(100_005)));
        assert_eq!(acl.entries()[1].who(), Who::UnixGroup(Gid::new(100_006)));
        assert_eq!(acl.entries()[2].who(), Who::Everyone);
    }

    #[test]
    fn fix_xattr_ids_ignores_malformed_buffers() {
        let container = RangeMapper::new(0, 100_000, 1000);
        let mut bad_version = header(3, 0, 1);
        bad_version.extend(entry(0, 0, 1, 5));
        let before = bad_version.clone();
        fix_xattr_ids(&mut bad_version, &container, &InitNamespace);
        assert_eq!(bad_version, before);

        let mut ragged = header(0, 0, 1);
        ragged.extend(entry(0, 0, 1, 5));
        ragged.push(0);
        let before = ragged.clone();
        fix_xattr_ids(&mut ragged, &container, &InitNamespace);
        assert_eq!(ragged, before);

        let mut short = vec![0u8; 4];
        fix_xattr_ids(&mut short, &container, &InitNamespace);
        assert_eq!(short, vec![0u8; 4]);
    }

    #[test]
    fn fix_xattr_ids_marks_unmapped_ids_invalid() {
        let container = RangeMapper::new(0, 100_000, 1000);
        let mut bytes = header(0, 0, 1);
        bytes.extend(entry(0, 0, 1, 5));
        fix_xattr_ids(&mut bytes, &InitNamespace, &container);
        assert_eq!(&bytes[24..28], &INVALID_ID.to_le_bytes()[..]);
    }
}
