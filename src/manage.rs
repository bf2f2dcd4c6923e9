//! High-level share operations: the call protocol behind each CLI
//! subcommand. Every operation validates its principals and items up front,
//! before anything touches the filesystem.

use std::path::{Path, PathBuf};

use nix::unistd::{Group, User};
use tracing::info;

use crate::acl::{AccessControlEntry, AccessControlList, AceType, Nfs4Tools};
use crate::config::Config;
use crate::error::{Result, ShareError};
use crate::htaccess;
use crate::share::Share;

/// Read-only access for plain users and groups.
const ACCESS_PERMISSIONS: &str = "rxtncy";

/// The principals a share is granted to. Managing users and groups receive
/// the elevated management permission level; service application accounts
/// (e.g. the account a web server runs under) get plain access.
#[derive(Debug, Clone, Default)]
pub struct Grantees {
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub managing_users: Vec<String>,
    pub managing_groups: Vec<String>,
    pub service_accounts: Vec<String>,
}

impl Grantees {
    fn all_users(&self) -> impl Iterator<Item = &String> {
        self.users
            .iter()
            .chain(&self.managing_users)
            .chain(&self.service_accounts)
    }

    fn all_groups(&self) -> impl Iterator<Item = &String> {
        self.groups.iter().chain(&self.managing_groups)
    }
}

/// Creates a share. The directory representing the share must not exist
/// yet. The share is locked afterwards unless `lock` is false.
pub fn create<'t>(
    tools: &'t Nfs4Tools,
    config: &Config,
    directory: &Path,
    items: &[PathBuf],
    grantees: &Grantees,
    lock: bool,
) -> Result<Share<'t>> {
    if grantees.managing_users.is_empty() && grantees.managing_groups.is_empty() {
        return Err(ShareError::NoManager);
    }
    ensure_users_exist(grantees.all_users())?;
    ensure_groups_exist(grantees.all_groups())?;
    ensure_items_exist(items)?;

    let share = Share::create(directory, tools, false)?;
    share.set_permissions(&generate_permissions(grantees, tools.domain())?)?;
    share.add(items)?;
    htaccess::create_at(&share, &config.htaccess, grantees)?;
    info!("finished creating share at {}", share.directory().display());
    if lock {
        share.lock()?;
    }
    Ok(share)
}

/// Updates a share: adds items and/or grants access to more principals.
/// The share is unlocked first (harmless when it was not locked) and
/// re-locked only when `lock` is set.
pub fn add<'t>(
    tools: &'t Nfs4Tools,
    directory: &Path,
    items: &[PathBuf],
    grantees: &Grantees,
    lock: bool,
) -> Result<Share<'t>> {
    ensure_users_exist(grantees.all_users())?;
    ensure_groups_exist(grantees.all_groups())?;
    ensure_items_exist(items)?;

    let share = Share::create(directory, tools, true)?;
    share.unlock()?;
    if !items.is_empty() {
        share.add(items)?;
    }
    if !grantees.users.is_empty() || !grantees.groups.is_empty() {
        if tools.domain().is_empty() {
            return Err(ShareError::MissingDomain);
        }
        let updated =
            share.permissions()? + &generate_permissions(grantees, tools.domain())?;
        share.set_permissions(&updated)?;
    }
    if lock {
        share.lock()?;
    }
    Ok(share)
}

/// Deletes a share. The access-directive file goes first: it is the one
/// single-link file the share owns, so it must not reach the link-safety
/// check during tree removal.
pub fn delete(tools: &Nfs4Tools, config: &Config, directory: &Path, force: bool) -> Result<()> {
    let share = unlock(tools, directory)?;
    htaccess::remove_from(&share, &config.htaccess, true)?;
    let root = share.directory().to_path_buf();
    share.self_destruct(force)?;
    info!("removed share at {}", root.display());
    Ok(())
}

/// Unlocks an existing share.
pub fn unlock<'t>(tools: &'t Nfs4Tools, directory: &Path) -> Result<Share<'t>> {
    let share = Share::open(directory, tools)?;
    share.unlock()?;
    Ok(share)
}

/// Locks an existing share.
pub fn lock<'t>(tools: &'t Nfs4Tools, directory: &Path) -> Result<Share<'t>> {
    let share = Share::open(directory, tools)?;
    share.lock()?;
    Ok(share)
}

/// Builds the ACL granted to a new or updated share: plain access for users,
/// groups and service accounts, the unlocked management level for managing
/// principals.
pub fn generate_permissions(grantees: &Grantees, domain: &str) -> Result<AccessControlList> {
    let mut entries = Vec::new();
    for user in grantees.users.iter().chain(&grantees.service_accounts) {
        entries.push(AccessControlEntry::new(
            AceType::Allow,
            "",
            user,
            domain,
            ACCESS_PERMISSIONS,
        )?);
    }
    for group in &grantees.groups {
        entries.push(AccessControlEntry::new(
            AceType::Allow,
            "g",
            group,
            domain,
            ACCESS_PERMISSIONS,
        )?);
    }
    for user in &grantees.managing_users {
        entries.push(AccessControlEntry::new(
            AceType::Allow,
            "",
            user,
            domain,
            Share::MANAGE_UNLOCKED,
        )?);
    }
    for group in &grantees.managing_groups {
        entries.push(AccessControlEntry::new(
            AceType::Allow,
            "g",
            group,
            domain,
            Share::MANAGE_UNLOCKED,
        )?);
    }
    let acl = AccessControlList::new(entries);
    tracing::debug!("generated an access control list: {acl}");
    Ok(acl)
}

fn ensure_users_exist<'a>(users: impl Iterator<Item = &'a String>) -> Result<()> {
    for user in users {
        if User::from_name(user)?.is_none() {
            return Err(ShareError::UnknownUser(user.clone()));
        }
    }
    Ok(())
}

fn ensure_groups_exist<'a>(groups: impl Iterator<Item = &'a String>) -> Result<()> {
    for group in groups {
        if Group::from_name(group)?.is_none() {
            return Err(ShareError::UnknownGroup(group.clone()));
        }
    }
    Ok(())
}

fn ensure_items_exist(items: &[PathBuf]) -> Result<()> {
    for item in items {
        if !item.exists() {
            return Err(ShareError::MissingItem(item.clone()));
        }
    }
    Ok(())
}
