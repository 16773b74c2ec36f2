//! crates/richacl/src/text.rs
//!
//! Human-readable ACL form, one entry per line:
//!
//! ```text
//! flags:wm
//! owner:rwpxD::mask
//! group:rx::mask
//! other:r::mask
//! owner@:rwpxD::allow
//! user:1000:rx:fd:allow
//! group:100:w::deny
//! everyone@:r::allow
//! ```
//!
//! Entries read `who:mask:flags:type`. The optional header lines carry the ACL
//! flags and the class masks. Empty lines and lines starting with `#` are
//! ignored, and `-` is accepted as padding inside mask and flag fields.

use std::fmt;
use std::str::FromStr;

use crate::ace::{AccessMask, AceFlags, AceType, RichAce, Who};
use crate::acl::{AclFlags, RichAcl};
use crate::error::{AclError, ParseError};
use crate::identity::{Gid, Uid};

const MASK_LETTERS: &[(char, AccessMask)] = &[
    ('r', AccessMask::READ_DATA),
    ('w', AccessMask::WRITE_DATA),
    ('p', AccessMask::APPEND_DATA),
    ('R', AccessMask::READ_NAMED_ATTRS),
    ('W', AccessMask::WRITE_NAMED_ATTRS),
    ('x', AccessMask::EXECUTE),
    ('D', AccessMask::DELETE_CHILD),
    ('a', AccessMask::READ_ATTRIBUTES),
    ('A', AccessMask::WRITE_ATTRIBUTES),
    ('e', AccessMask::WRITE_RETENTION),
    ('E', AccessMask::WRITE_RETENTION_HOLD),
    ('d', AccessMask::DELETE),
    ('c', AccessMask::READ_ACL),
    ('C', AccessMask::WRITE_ACL),
    ('o', AccessMask::WRITE_OWNER),
    ('S', AccessMask::SYNCHRONIZE),
];

const ACE_FLAG_LETTERS: &[(char, AceFlags)] = &[
    ('f', AceFlags::FILE_INHERIT),
    ('d', AceFlags::DIRECTORY_INHERIT),
    ('n', AceFlags::NO_PROPAGATE_INHERIT),
    ('i', AceFlags::INHERIT_ONLY),
    ('a', AceFlags::INHERITED),
];

const ACL_FLAG_LETTERS: &[(char, AclFlags)] = &[
    ('a', AclFlags::AUTO_INHERIT),
    ('p', AclFlags::PROTECTED),
    ('d', AclFlags::DEFAULTED),
    ('w', AclFlags::WRITE_THROUGH),
    ('m', AclFlags::MASKED),
];

fn write_letters<T>(
    f: &mut fmt::Formatter<'_>,
    table: &[(char, T)],
    present: impl Fn(T) -> bool,
) -> fmt::Result
where
    T: Copy,
{
    for &(letter, bits) in table {
        if present(bits) {
            write!(f, "{letter}")?;
        }
    }
    Ok(())
}

fn parse_letters<T>(field: &str, table: &[(char, T)], what: &str) -> Result<Vec<T>, String>
where
    T: Copy,
{
    field
        .chars()
        .filter(|&c| c != '-')
        .map(|c| {
            table
                .iter()
                .find(|(letter, _)| *letter == c)
                .map(|&(_, bits)| bits)
                .ok_or_else(|| format!("unknown {what} `{c}`"))
        })
        .collect()
}

fn parse_mask(field: &str) -> Result<AccessMask, String> {
    Ok(parse_letters(field, MASK_LETTERS, "permission")?
        .into_iter()
        .fold(AccessMask::empty(), |acc, bits| acc | bits))
}

/// Wrapper rendering an [`AccessMask`] as permission letters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaskLetters(pub AccessMask);

impl fmt::Display for MaskLetters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_letters(f, MASK_LETTERS, |bits| self.0.contains(bits))
    }
}

impl FromStr for MaskLetters {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_mask(s.trim()).map(Self).map_err(|reason| ParseError::new(1, reason))
    }
}

impl fmt::Display for Who {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => f.write_str("owner@"),
            Self::Group => f.write_str("group@"),
            Self::Everyone => f.write_str("everyone@"),
            Self::User(uid) => write!(f, "user:{uid}"),
            Self::UnixGroup(gid) => write!(f, "group:{gid}"),
        }
    }
}

impl fmt::Display for RichAce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:", self.who(), MaskLetters(self.mask()))?;
        write_letters(f, ACE_FLAG_LETTERS, |bits| self.flags().contains(bits))?;
        write!(f, ":{}", self.kind())
    }
}

fn parse_entry(line: &str) -> Result<RichAce, String> {
    let fields: Vec<&str> = line.split(':').collect();
    let (who, rest) = match fields.as_slice() {
        ["owner@", rest @ ..] => (Who::Owner, rest),
        ["group@", rest @ ..] => (Who::Group, rest),
        ["everyone@", rest @ ..] => (Who::Everyone, rest),
        ["user", id, rest @ ..] => (Who::User(Uid::new(parse_id(id)?)), rest),
        ["group", id, rest @ ..] => (Who::UnixGroup(Gid::new(parse_id(id)?)), rest),
        [who, ..] => return Err(format!("unknown identifier `{who}`")),
        [] => return Err("empty entry".to_owned()),
    };
    let [mask, flags, kind] = rest else {
        return Err(format!("expected `who:mask:flags:type`, found `{line}`"));
    };

    let kind = match *kind {
        "allow" => AceType::Allow,
        "deny" => AceType::Deny,
        other => return Err(format!("unknown type `{other}`")),
    };
    let flags = parse_letters(flags, ACE_FLAG_LETTERS, "flag")?
        .into_iter()
        .fold(AceFlags::empty(), |acc, bits| acc | bits);
    Ok(RichAce::new(kind, who, parse_mask(mask)?).with_flags(flags))
}

fn parse_id(field: &str) -> Result<u32, String> {
    field
        .parse()
        .map_err(|_| format!("invalid numeric id `{field}`"))
}

impl FromStr for RichAce {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_entry(s.trim()).map_err(|reason| ParseError::new(1, reason))
    }
}

impl fmt::Display for RichAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.flags().is_empty() {
            f.write_str("flags:")?;
            write_letters(f, ACL_FLAG_LETTERS, |bits| self.flags().contains(bits))?;
            writeln!(f)?;
        }
        let has_masks = self.is_masked()
            || !(self.owner_mask() | self.group_mask() | self.other_mask()).is_empty();
        if has_masks {
            writeln!(f, "owner:{}::mask", MaskLetters(self.owner_mask()))?;
            writeln!(f, "group:{}::mask", MaskLetters(self.group_mask()))?;
            writeln!(f, "other:{}::mask", MaskLetters(self.other_mask()))?;
        }
        for ace in self {
            writeln!(f, "{ace}")?;
        }
        Ok(())
    }
}

impl FromStr for RichAcl {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut acl = Self::new();
        let (mut owner, mut group, mut other) = (
            AccessMask::empty(),
            AccessMask::empty(),
            AccessMask::empty(),
        );

        for (index, raw) in s.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fail = |reason: String| AclError::from(ParseError::new(line_no, reason));

            if let Some(letters) = line.strip_prefix("flags:") {
                let flags = parse_letters(letters, ACL_FLAG_LETTERS, "ACL flag")
                    .map_err(fail)?
                    .into_iter()
                    .fold(AclFlags::empty(), |acc, bits| acc | bits);
                acl.set_flags(flags);
                continue;
            }

            let fields: Vec<&str> = line.split(':').collect();
            if let [class, mask, "", "mask"] = fields.as_slice() {
                let mask = parse_mask(mask).map_err(fail)?;
                match *class {
                    "owner" => owner = mask,
                    "group" => group = mask,
                    "other" => other = mask,
                    _ => return Err(fail(format!("unknown mask class `{class}`"))),
                }
                continue;
            }

            acl.push(parse_entry(line).map_err(fail)?)?;
        }

        acl.set_masks(owner, group, other);
        Ok(acl)
    }
}
