use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use nix::sys::stat::stat;
use nix::unistd::{Gid, Group, Uid, User};
use strum_macros::{Display, EnumString};

use crate::error::{Result, ShareError};

/// Whether an entry grants or denies its permission set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum AceType {
    #[strum(serialize = "A")]
    Allow,
    #[strum(serialize = "D")]
    Deny,
}

/// An NFSv4 permission-letter set.
///
/// The letters keep the order they were given in (serialization is exact),
/// but two sets compare equal whenever they contain the same letters in any
/// order.
#[derive(Debug, Clone, Eq)]
pub struct Permissions(String);

impl Permissions {
    /// Validates the letters. The upper-case alias letters `R`, `W` and `X`
    /// expand to several distinct bits and are rejected outright; other
    /// upper-case letters (`T`, `N`, `C`, ...) are real NFSv4 bits.
    pub fn new(letters: &str) -> Result<Self> {
        if letters.chars().any(|c| matches!(c, 'R' | 'W' | 'X')) {
            return Err(ShareError::UpperCasePermissions(letters.to_string()));
        }
        Ok(Self(letters.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unordered comparison against a raw letter string.
    pub fn matches(&self, letters: &str) -> bool {
        letter_set(&self.0) == letter_set(letters)
    }
}

fn letter_set(letters: &str) -> BTreeSet<char> {
    letters.chars().collect()
}

impl PartialEq for Permissions {
    fn eq(&self, other: &Self) -> bool {
        letter_set(&self.0) == letter_set(&other.0)
    }
}

impl FromStr for Permissions {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context needed to translate the special principals OWNER@, GROUP@ and
/// EVERYONE@: the file whose ownership is consulted and the NFSv4 domain the
/// resolved names belong to.
#[derive(Debug, Clone, Copy)]
pub struct PrincipalContext<'a> {
    pub path: &'a Path,
    pub domain: &'a str,
}

const SPECIAL_PRINCIPALS: [&str; 3] = ["OWNER@", "GROUP@", "EVERYONE@"];

/// A single NFSv4 access control entry.
///
/// Serializes as `type:flags:identity@domain:permissions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessControlEntry {
    entry_type: AceType,
    flags: String,
    identity: String,
    domain: String,
    permissions: Permissions,
}

impl AccessControlEntry {
    pub fn new(
        entry_type: AceType,
        flags: &str,
        identity: &str,
        domain: &str,
        permissions: &str,
    ) -> Result<Self> {
        Ok(Self {
            entry_type,
            flags: flags.to_string(),
            identity: identity.to_string(),
            domain: domain.to_string(),
            permissions: Permissions::new(permissions)?,
        })
    }

    /// Parses one ACE line. A context is required whenever the principal is
    /// one of the special tokens, since those are resolved from the file's
    /// ownership.
    pub fn parse(line: &str, context: Option<&PrincipalContext>) -> Result<Self> {
        let malformed = |reason: &str| ShareError::MalformedAce {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let mut fields = line.splitn(4, ':');
        let entry_type = fields.next().ok_or_else(|| malformed("missing type"))?;
        let flags = fields.next().ok_or_else(|| malformed("missing flags"))?;
        let principal = fields.next().ok_or_else(|| malformed("missing principal"))?;
        let permissions = fields
            .next()
            .ok_or_else(|| malformed("missing permissions"))?;

        let entry_type = AceType::from_str(entry_type)
            .map_err(|_| malformed("unknown entry type"))?;

        let (identity, domain, flags) = if SPECIAL_PRINCIPALS.contains(&principal) {
            let context = context
                .ok_or_else(|| ShareError::SpecialPrincipalContext(principal.to_string()))?;
            translate_special_principal(principal, flags, context)?
        } else {
            let (identity, domain) = principal
                .split_once('@')
                .ok_or_else(|| malformed("principal is not identity@domain"))?;
            (identity.to_string(), domain.to_string(), flags.to_string())
        };

        Ok(Self {
            entry_type,
            flags,
            identity,
            domain,
            permissions: Permissions::new(permissions)?,
        })
    }

    pub fn entry_type(&self) -> AceType {
        self.entry_type
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    pub fn set_permissions(&mut self, permissions: Permissions) {
        self.permissions = permissions;
    }
}

impl fmt::Display for AccessControlEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}@{}:{}",
            self.entry_type, self.flags, self.identity, self.domain, self.permissions
        )
    }
}

/// Resolves a special principal to a concrete identity, domain and flag set
/// using the context file's ownership. GROUP@ additionally gains the `g`
/// flag so the resulting entry stays a group entry.
fn translate_special_principal(
    principal: &str,
    flags: &str,
    context: &PrincipalContext,
) -> Result<(String, String, String)> {
    match principal {
        "OWNER@" => {
            let uid = stat(context.path)?.st_uid;
            let user = User::from_uid(Uid::from_raw(uid))?.ok_or(ShareError::UnknownUid(uid))?;
            Ok((user.name, context.domain.to_string(), flags.to_string()))
        }
        "GROUP@" => {
            let gid = stat(context.path)?.st_gid;
            let group = Group::from_gid(Gid::from_raw(gid))?.ok_or(ShareError::UnknownGid(gid))?;
            Ok((
                group.name,
                context.domain.to_string(),
                format!("{flags}g"),
            ))
        }
        "EVERYONE@" => Ok(("EVERYONE".to_string(), String::new(), flags.to_string())),
        _ => Err(ShareError::SpecialPrincipalContext(principal.to_string())),
    }
}
