//! Error taxonomy for share management.
//!
//! Every failure is surfaced to the immediate caller; nothing is retried and
//! no partial-failure rollback is attempted. An operation that fails halfway
//! leaves the filesystem in whatever state it reached.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShareError>;

#[derive(Debug, Error)]
pub enum ShareError {
    /// The share path exists but is a regular file (or other non-directory).
    #[error("'{0}' exists and is not a directory")]
    NotADirectory(PathBuf),

    /// The share directory already exists and `exist_ok` was not given.
    #[error("share directory '{0}' already exists")]
    AlreadyExists(PathBuf),

    /// The share directory is expected to exist for this operation.
    #[error("share directory '{0}' does not exist")]
    MissingShare(PathBuf),

    /// A required external ACL binary is absent or not executable.
    #[error("required binary '{0}' is missing or not executable")]
    ToolMissing(PathBuf),

    /// An external ACL binary exited non-zero. `output` carries the combined
    /// stdout and stderr of the invocation.
    #[error("`{command}` failed: {output}")]
    ToolFailed { command: String, output: String },

    /// An ACE line did not match `type:flags:identity@domain:permissions`.
    #[error("malformed access control entry '{line}': {reason}")]
    MalformedAce { line: String, reason: String },

    /// Upper-case alias permission letters encode different bits than their
    /// lower-case forms; accepting them would silently grant the wrong
    /// permissions. [R->rtncy, W->waDtTNcCy, X->xtcy]
    #[error("upper-case alias permissions are not allowed in '{0}'")]
    UpperCasePermissions(String),

    /// Reading the ACL of a path produced zero entries.
    #[error("could not get any access control entries from '{0}'")]
    EmptyAcl(PathBuf),

    /// Un-sharing this file would delete the only copy of the data.
    #[error("file '{0}' has ONE hard link, un-sharing it would delete it (use force to do so)")]
    LastLink(PathBuf),

    /// A special principal (OWNER@/GROUP@/EVERYONE@) can only be translated
    /// against a concrete file.
    #[error("special principal '{0}' requires a file to resolve against")]
    SpecialPrincipalContext(String),

    #[error("no passwd entry for uid {0}")]
    UnknownUid(u32),

    #[error("no group entry for gid {0}")]
    UnknownGid(u32),

    #[error("user '{0}' does not exist")]
    UnknownUser(String),

    #[error("group '{0}' does not exist")]
    UnknownGroup(String),

    #[error("item '{0}' does not exist")]
    MissingItem(PathBuf),

    /// The share has no access directive file where one was expected.
    #[error("no access directive file at '{0}'")]
    MissingDirectiveFile(PathBuf),

    #[error("a share needs either a managing user or a managing group")]
    NoManager,

    #[error("a non-empty domain is required to grant access to users or groups")]
    MissingDomain,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sys(#[from] nix::errno::Errno),
}
