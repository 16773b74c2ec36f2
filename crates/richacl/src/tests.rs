use super::*;

fn acl(entries: impl IntoIterator<Item = RichAce>) -> RichAcl {
    RichAcl::from_entries(entries).expect("acl")
}

#[test]
fn owner_and_everyone_masks_for_regular_file() {
    let acl = acl([
        RichAce::allow(Who::Owner, AccessMask::READ_DATA | AccessMask::WRITE_DATA),
        RichAce::allow(Who::Everyone, AccessMask::READ_DATA),
    ]);
    let computed = compute_max_masks(&acl).expect("masks");
    assert_eq!(computed.owner_mask(), AccessMask::READ_DATA | AccessMask::WRITE_DATA);
    assert_eq!(computed.group_mask(), AccessMask::READ_DATA);
    assert_eq!(computed.other_mask(), AccessMask::READ_DATA);
}

#[test]
fn earlier_owner_deny_beats_later_allow() {
    let acl = acl([
        RichAce::deny(Who::Owner, AccessMask::WRITE_DATA),
        RichAce::allow(Who::Owner, AccessMask::READ_DATA | AccessMask::WRITE_DATA),
    ]);
    let creds = Credentials::new(Uid::new(500), Gid::new(500));
    let requester = creds.for_file(Uid::new(500), Gid::new(20));
    assert_eq!(
        check_permission(&acl, &requester, AccessIntent::WRITE),
        Decision::Denied
    );
}

#[test]
fn oversized_entry_count_is_rejected() {
    let mut bytes = vec![0u8; xattr::HEADER_LEN];
    let count = u16::try_from(MAX_ENTRIES + 1).expect("fits u16");
    bytes[2..4].copy_from_slice(&count.to_le_bytes());
    let err = decode(&bytes, &InitNamespace).unwrap_err();
    assert!(matches!(
        err,
        AclError::InvalidEncoding(DecodeError::TooManyEntries { .. })
    ));
}

#[test]
fn file_only_entry_is_inherit_only_on_subdirectory() {
    let parent = acl([RichAce::allow(Who::Everyone, AccessMask::READ_DATA)
        .with_flags(AceFlags::FILE_INHERIT)]);
    let child = inherit(&parent, true).expect("inherit").expect("inherited");
    assert!(child.entries()[0].is_inherit_only());
    assert!(child.entries()[0].flags().contains(AceFlags::FILE_INHERIT));
}

#[test]
fn created_file_acl_stays_within_creation_mode() {
    let parent = acl([
        RichAce::allow(Who::User(Uid::new(42)), AccessMask::POSIX_ALL)
            .with_flags(AceFlags::FILE_INHERIT),
        RichAce::allow(Who::Everyone, AccessMask::READ_DATA).with_flags(AceFlags::FILE_INHERIT),
    ]);
    let created = create(Mode::file(0o640), Some(&parent), 0o022).expect("create");
    let acl = created.acl.expect("rich acl kept");

    let named = Credentials::new(Uid::new(42), Gid::new(42));
    let requester = named.for_file(Uid::new(1), Gid::new(1));
    assert!(!check_permission(&acl, &requester, AccessIntent::WRITE).is_granted());
    assert!(check_permission(&acl, &requester, AccessIntent::READ).is_granted());

    let text = acl.to_string();
    assert_eq!(text.parse::<RichAcl>().expect("parse"), acl);
}

#[test]
fn chmod_then_equiv_mode_recovers_mode_for_simple_acl() {
    let acl = RichAcl::from_mode(Mode::dir(0o755)).expect("acl");
    let changed = chmod(&acl, Mode::dir(0o700)).expect("chmod");
    assert_eq!(equiv_mode(&changed, Mode::dir(0)), Some(Mode::dir(0o700)));
}
