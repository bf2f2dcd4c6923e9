//! The share lifecycle engine.
//!
//! A share is a directory exposing hard-linked copies of designated items
//! under managed NFSv4 ACLs. The engine performs the filesystem tree
//! operations itself and delegates ACL persistence to the [`Nfs4Tools`]
//! gateway. It assumes exclusive ownership of the share's ACL state for the
//! duration of an operation; no protection against concurrent external
//! mutation is provided.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use nix::sys::stat::stat;
use once_cell::sync::Lazy;
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::acl::{AccessControlEntry, AccessControlList, AceType, AclAction, Nfs4Tools};
use crate::error::{Result, ShareError};

/// The deny entry appended to a share root and its immediate subdirectories
/// on lock, and sequence-subtracted again on unlock. It blocks writing,
/// appending, deleting and renaming for everyone; holders of the unlocked
/// management permission regain those rights through `unlock`.
pub fn lock_acl() -> &'static AccessControlList {
    static LOCK_ACL: Lazy<AccessControlList> = Lazy::new(|| {
        let entry = AccessControlEntry::new(AceType::Deny, "", "EVERYONE", "", "wadDNTo")
            .expect("lock entry letters are valid");
        AccessControlList::new(vec![entry])
    });
    &LOCK_ACL
}

/// Outcome of a single hard-link attempt. Duplicates and permission
/// failures are ordinary outcomes the add algorithm branches on, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyPresent,
    PermissionDenied,
}

/// A directory-backed share.
///
/// Only works on an NFSv4 filesystem; needs the external `nfs4_getfacl` and
/// `nfs4_setfacl` binaries reachable through the gateway.
#[derive(Debug)]
pub struct Share<'t> {
    directory: PathBuf,
    tools: &'t Nfs4Tools,
}

impl<'t> Share<'t> {
    /// Management permission set while a share is locked: no write bit.
    pub const MANAGE_LOCKED: &'static str = "rxaDdtTNcCo";
    /// Management permission set while a share is unlocked; differs from
    /// [`Self::MANAGE_LOCKED`] only by the write letter.
    pub const MANAGE_UNLOCKED: &'static str = "rwxaDdtTNcCo";

    /// Creates the share directory (or reuses it with `exist_ok`). A path
    /// that exists as anything other than a directory is a setup error.
    pub fn create(directory: &Path, tools: &'t Nfs4Tools, exist_ok: bool) -> Result<Self> {
        if directory.exists() {
            debug!("'{}' exists", directory.display());
            if !directory.is_dir() {
                return Err(ShareError::NotADirectory(directory.to_path_buf()));
            }
            if !exist_ok {
                return Err(ShareError::AlreadyExists(directory.to_path_buf()));
            }
        } else {
            fs::create_dir_all(directory)?;
        }
        Ok(Self {
            directory: fs::canonicalize(directory)?,
            tools,
        })
    }

    /// Opens an existing share; the directory must already be there.
    pub fn open(directory: &Path, tools: &'t Nfs4Tools) -> Result<Self> {
        if !directory.exists() {
            return Err(ShareError::MissingShare(directory.to_path_buf()));
        }
        Self::create(directory, tools, true)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn tools(&self) -> &'t Nfs4Tools {
        self.tools
    }

    /// The live ACL of the share root, re-read from disk on every call.
    pub fn permissions(&self) -> Result<AccessControlList> {
        self.tools.read_acl(&self.directory)
    }

    /// Replaces the complete ACL on the share root. Callers must pass the
    /// full desired list; this never appends.
    pub fn set_permissions(&self, acl: &AccessControlList) -> Result<()> {
        debug!("setting permissions on {}: {}", self.directory.display(), acl);
        self.tools
            .write_acl(&self.directory, acl, AclAction::Set, false, false)
    }

    /// Adds items to the share and returns the subset that was newly
    /// linked. Duplicates, permission failures and unhandled item kinds are
    /// excluded from the returned set (not from the input); callers that
    /// need an audit trail diff the two.
    pub fn add(&self, items: &[PathBuf]) -> Result<Vec<PathBuf>> {
        debug!("adding items to {}: {:?}", self.directory.display(), items);
        let mut shared = Vec::new();
        for item in items {
            let file_type = fs::metadata(item).map(|meta| meta.file_type()).ok();
            match file_type {
                Some(ft) if ft.is_file() => {
                    let target = self.directory.join(base_name(item)?);
                    // A directly passed symlink is resolved so the share
                    // never holds a dangling or relative artifact.
                    let source = fs::canonicalize(item)?;
                    match self.link_file(&source, &target)? {
                        LinkOutcome::Linked => shared.push(item.clone()),
                        LinkOutcome::AlreadyPresent | LinkOutcome::PermissionDenied => {}
                    }
                }
                Some(ft) if ft.is_dir() => {
                    let target = self.directory.join(base_name(item)?);
                    if target.exists() {
                        debug!(
                            "directory {} already exists, removing and re-adding it",
                            target.display()
                        );
                        // Stale entries whose source is gone sit at one hard
                        // link; the cleanup must not trip the link-safety
                        // check, the tree is rebuilt right after.
                        self.unshare_linked_tree(&target, true)?;
                        self.duplicate_linked_tree(item, &target)?;
                        // A re-add is not a newly shared item.
                    } else {
                        self.duplicate_linked_tree(item, &target)?;
                        shared.push(item.clone());
                    }
                }
                _ => error!("did not handle input item '{}'", item.display()),
            }
        }
        Ok(shared)
    }

    /// Removes items from the share. Files are protected by the hard-link
    /// count check unless `force` is given; directories are emptied bottom-up
    /// and removed.
    pub fn remove_items(&self, items: &[PathBuf], force: bool) -> Result<()> {
        for item in items {
            let target = if item.is_absolute() {
                item.clone()
            } else {
                self.directory.join(item)
            };
            if target.is_dir() {
                self.unshare_linked_tree(&target, force)?;
            } else {
                self.unshare_file(&target, force)?;
            }
        }
        Ok(())
    }

    /// Removes the whole share, directory and all, with the same per-file
    /// single-link protection as [`Self::remove_items`].
    pub fn self_destruct(self, force: bool) -> Result<()> {
        self.unshare_linked_tree(&self.directory, force)
    }

    /// Locks the share down against structural change: management entries on
    /// the root and every immediate subdirectory lose their write letter and
    /// the universal deny entry is appended to each.
    pub fn lock(&self) -> Result<()> {
        debug!("locking {} (and subdirectories)", self.directory.display());
        self.flip_manage_permissions(false)?;
        for target in self.root_and_subdirectories()? {
            self.tools
                .write_acl(&target, lock_acl(), AclAction::Append, false, false)?;
        }
        Ok(())
    }

    /// Reverses [`Self::lock`]: restores the write letter on management
    /// entries and sequence-subtracts the deny entry everywhere it was
    /// appended.
    pub fn unlock(&self) -> Result<()> {
        debug!("unlocking {} (and subdirectories)", self.directory.display());
        self.flip_manage_permissions(true)?;
        for target in self.root_and_subdirectories()? {
            self.tools
                .write_acl(&target, lock_acl(), AclAction::Remove, false, false)?;
        }
        Ok(())
    }

    /// Rewrites every ACE whose permission set equals one management level
    /// (unordered comparison) to the other level, on the share root and
    /// every immediate subdirectory.
    fn flip_manage_permissions(&self, add_write: bool) -> Result<()> {
        let (from, to) = if add_write {
            (Self::MANAGE_LOCKED, Self::MANAGE_UNLOCKED)
        } else {
            (Self::MANAGE_UNLOCKED, Self::MANAGE_LOCKED)
        };
        for target in self.root_and_subdirectories()? {
            let acl = self.tools.read_acl(&target)?;
            let flipped: AccessControlList = acl
                .iter()
                .cloned()
                .map(|mut entry| -> Result<AccessControlEntry> {
                    if entry.permissions().matches(from) {
                        entry.set_permissions(to.parse()?);
                    }
                    Ok(entry)
                })
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .collect();
            self.tools
                .write_acl(&target, &flipped, AclAction::Set, false, false)?;
        }
        Ok(())
    }

    fn root_and_subdirectories(&self) -> Result<Vec<PathBuf>> {
        let mut targets = vec![self.directory.clone()];
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_dir() {
                targets.push(path);
            }
        }
        Ok(targets)
    }

    /// Mirrors `source_root` at `target_root`: every directory is created
    /// anew (inheriting the share's current ACL), every contained file is
    /// hard-linked. Symlinked directories are walked into as if real; a
    /// symlinked file with an absolute target is linked via its resolved
    /// path, while relative symlinks are carried over untouched.
    fn duplicate_linked_tree(&self, source_root: &Path, target_root: &Path) -> Result<()> {
        debug!(
            "traversing {} for file linkage and directory duplication",
            source_root.display()
        );
        self.make_dir(target_root)?;
        for entry in WalkDir::new(source_root).follow_links(true).min_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            let rel = entry
                .path()
                .strip_prefix(source_root)
                .expect("walk entries live under the walk root");
            let target = target_root.join(rel);
            if entry.file_type().is_dir() {
                self.make_dir(&target)?;
            } else if entry.path_is_symlink() {
                let link_target = fs::read_link(entry.path())?;
                if link_target.is_absolute() {
                    self.link_file(&fs::canonicalize(entry.path())?, &target)?;
                } else {
                    debug!(
                        "carrying over relative symlink {} -> {}",
                        entry.path().display(),
                        link_target.display()
                    );
                    symlink(&link_target, &target)?;
                }
            } else {
                self.link_file(entry.path(), &target)?;
            }
        }
        Ok(())
    }

    /// Bottom-up removal of `directory` and everything under it.
    fn unshare_linked_tree(&self, directory: &Path, force: bool) -> Result<()> {
        debug!(
            "traversing {} bottom up for un-sharing",
            directory.display()
        );
        for entry in WalkDir::new(directory)
            .follow_links(true)
            .min_depth(1)
            .contents_first(true)
        {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_dir() {
                Self::unshare_dir(entry.path())?;
            } else {
                self.unshare_file(entry.path(), force)?;
            }
        }
        fs::remove_dir(directory)?;
        Ok(())
    }

    /// Removes one file from the share. The hard-link count is the sole
    /// oracle for "is this data referenced elsewhere"; a count of one means
    /// un-sharing would delete the only copy, which needs `force`. The
    /// check-then-unlink sequence is a known, accepted race.
    fn unshare_file(&self, target: &Path, force: bool) -> Result<()> {
        debug!("un-sharing file {}", target.display());
        if !force && stat(target)?.st_nlink == 1 {
            error!(
                "file {} has ONE hard link, un-sharing it would delete it",
                target.display()
            );
            return Err(ShareError::LastLink(target.to_path_buf()));
        }
        fs::remove_file(target)?;
        Ok(())
    }

    /// Removes an emptied directory; fails when entries remain.
    fn unshare_dir(target: &Path) -> Result<()> {
        debug!("un-sharing directory {}", target.display());
        fs::remove_dir(target)?;
        Ok(())
    }

    /// Creates a directory inside the share carrying the share's current
    /// root ACL.
    fn make_dir(&self, directory: &Path) -> Result<()> {
        debug!("creating {}", directory.display());
        fs::create_dir(directory)?;
        let acl = self.permissions()?;
        self.tools
            .write_acl(directory, &acl, AclAction::Set, false, false)
    }

    /// One hard-link attempt, with duplicate and permission failures folded
    /// into the returned outcome instead of raised.
    fn link_file(&self, source: &Path, target: &Path) -> Result<LinkOutcome> {
        debug!("linking {} and {}", source.display(), target.display());
        match fs::hard_link(source, target) {
            Ok(()) => Ok(LinkOutcome::Linked),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("file {} already exists", target.display());
                Ok(LinkOutcome::AlreadyPresent)
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                // Likely cause: the source must be writable/appendable when
                // fs.protect_hardlinks is enabled.
                error!(
                    "insufficient rights to link {} into the share",
                    source.display()
                );
                if let Ok(acl) = self.tools.read_acl(source) {
                    error!("permissions on {}: {}", source.display(), acl);
                }
                Ok(LinkOutcome::PermissionDenied)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn base_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| {
        std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("item '{}' has no base name", path.display()),
        )
        .into()
    })
}
