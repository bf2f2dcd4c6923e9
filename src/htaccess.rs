//! Generates the per-share web-access directive file.
//!
//! The file lists one directive per user and per group inside a
//! `<RequireAny>` block so a web server can gate HTTP access to the share.
//! It lives under a reserved filename in the share root and carries the
//! share's own ACL.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::acl::AclAction;
use crate::config::HtaccessConfig;
use crate::error::{Result, ShareError};
use crate::manage::Grantees;
use crate::share::Share;

/// Writes the directive file into the share root and applies the share's
/// current ACL to it. Managing principals are listed alongside plain ones;
/// anyone who may manage a share may also browse it.
pub fn create_at(share: &Share, config: &HtaccessConfig, grantees: &Grantees) -> Result<PathBuf> {
    let mut lines = vec!["<RequireAny>".to_string()];
    for user in grantees.users.iter().chain(&grantees.managing_users) {
        lines.push(config.user_directive.replace("{}", user));
    }
    for group in grantees.groups.iter().chain(&grantees.managing_groups) {
        lines.push(config.group_directive.replace("{}", group));
    }
    lines.push("</RequireAny>".to_string());

    let path = share.directory().join(&config.filename);
    fs::write(&path, lines.join("\n") + "\n")?;
    let acl = share.permissions()?;
    share
        .tools()
        .write_acl(&path, &acl, AclAction::Set, false, false)?;
    debug!(
        "generated and placed access directive file at {}: {:?}",
        path.display(),
        lines
    );
    Ok(path)
}

/// Removes the directive file from a share. A missing file is only
/// tolerated with `absent_ok`.
pub fn remove_from(share: &Share, config: &HtaccessConfig, absent_ok: bool) -> Result<()> {
    let path = share.directory().join(&config.filename);
    debug!("removing access directive file at {}", path.display());
    if path.exists() {
        fs::remove_file(&path)?;
    } else if !absent_ok {
        return Err(ShareError::MissingDirectiveFile(path));
    }
    Ok(())
}
