// SPDX-FileCopyrightText: 2025 Grove contributors
// SPDX-License-Identifier: MIT

//! Owner and group resolution for archive entries.
//!
//! A specification is one of:
//!
//! - `NAME:ID`: both given explicitly, nothing is looked up
//! - `ID`: the name is looked up, and left empty if unknown
//! - `NAME`: the id is looked up, and left at its default if unknown
//!
//! Ids must fit the 21 bits a ustar header field can hold.

use nix::unistd::{Gid, Group, Uid, User};
use tracing::debug;

use crate::error::{IdentityError, IdentityKind};

/// Largest id representable in a ustar numeric field.
pub const MAX_ID: u32 = 0o7777777;

/// A resolved owner or group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub id: u32,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "root".to_owned(),
            id: 0,
        }
    }
}

/// Name and id lookups for users and groups.
pub trait IdentityDb {
    fn user_name(&self, uid: u32) -> Option<String>;
    fn user_id(&self, name: &str) -> Option<u32>;
    fn group_name(&self, gid: u32) -> Option<String>;
    fn group_id(&self, name: &str) -> Option<u32>;
}

/// The host's user and group database.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentities;

impl IdentityDb for SystemIdentities {
    fn user_name(&self, uid: u32) -> Option<String> {
        User::from_uid(Uid::from_raw(uid))
            .inspect_err(|err| debug!(uid, "user lookup failed: {err}"))
            .ok()
            .flatten()
            .map(|user| user.name)
    }

    fn user_id(&self, name: &str) -> Option<u32> {
        User::from_name(name)
            .inspect_err(|err| debug!(name, "user lookup failed: {err}"))
            .ok()
            .flatten()
            .map(|user| user.uid.as_raw())
    }

    fn group_name(&self, gid: u32) -> Option<String> {
        Group::from_gid(Gid::from_raw(gid))
            .inspect_err(|err| debug!(gid, "group lookup failed: {err}"))
            .ok()
            .flatten()
            .map(|group| group.name)
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        Group::from_name(name)
            .inspect_err(|err| debug!(name, "group lookup failed: {err}"))
            .ok()
            .flatten()
            .map(|group| group.gid.as_raw())
    }
}

/// Resolve the owner of archive entries. `None` yields `root`/0.
pub fn resolve_owner(spec: Option<&str>, db: &dyn IdentityDb) -> Result<Identity, IdentityError> {
    resolve(IdentityKind::Owner, spec, db)
}

/// Resolve the group of archive entries. `None` yields `root`/0.
pub fn resolve_group(spec: Option<&str>, db: &dyn IdentityDb) -> Result<Identity, IdentityError> {
    resolve(IdentityKind::Group, spec, db)
}

fn resolve(
    kind: IdentityKind,
    spec: Option<&str>,
    db: &dyn IdentityDb,
) -> Result<Identity, IdentityError> {
    let mut identity = Identity::default();
    let Some(spec) = spec else {
        return Ok(identity);
    };
    let syntax = || IdentityError::Syntax {
        kind,
        spec: spec.to_owned(),
    };
    let parse_id = |digits: &str| {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(syntax());
        }
        digits.parse::<u32>().map_err(|_| IdentityError::IdTooLarge {
            kind,
            spec: spec.to_owned(),
        })
    };

    // an empty tail after the colon leaves the whole spec a name
    let explicit = spec.rsplit_once(':').filter(|(_, digits)| !digits.is_empty());
    if let Some((name, digits)) = explicit {
        identity.id = parse_id(digits)?;
        identity.name = name.to_owned();
    } else if !spec.is_empty() && spec.bytes().all(|b| b.is_ascii_digit()) {
        identity.id = parse_id(spec)?;
        identity.name = match kind {
            IdentityKind::Owner => db.user_name(identity.id),
            IdentityKind::Group => db.group_name(identity.id),
        }
        .unwrap_or_default();
    } else {
        let numeric_looking = spec
            .trim_start_matches(['+', '-'])
            .starts_with(|c: char| c.is_ascii_digit());
        if spec.is_empty() || numeric_looking {
            return Err(syntax());
        }
        let found = match kind {
            IdentityKind::Owner => db.user_id(spec),
            IdentityKind::Group => db.group_id(spec),
        };
        if let Some(id) = found {
            identity.id = id;
        }
        identity.name = spec.to_owned();
    }

    if identity.id > MAX_ID {
        return Err(IdentityError::OutOfRange {
            kind,
            spec: spec.to_owned(),
            id: identity.id,
        });
    }
    Ok(identity)
}
