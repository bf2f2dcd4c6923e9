use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::{debug, error};

use crate::config::Config;
use crate::error::{Result, ShareError};

use super::{AccessControlEntry, AccessControlList, PrincipalContext};

/// The action verb passed to the external setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclAction {
    /// `-a`: append entries after the existing ACL.
    Append,
    /// `-s`: replace the complete ACL.
    Set,
    /// `-x`: remove matching entries.
    Remove,
}

impl AclAction {
    const fn flag(self) -> &'static str {
        match self {
            AclAction::Append => "-a",
            AclAction::Set => "-s",
            AclAction::Remove => "-x",
        }
    }
}

/// Gateway to the two external binaries that read and write NFSv4 ACLs.
///
/// The gateway owns the NFSv4 domain for the current invocation; it is
/// resolved once and used to translate special principals while parsing
/// getfacl output.
#[derive(Debug)]
pub struct Nfs4Tools {
    getfacl: PathBuf,
    setfacl: PathBuf,
    domain: String,
}

impl Nfs4Tools {
    pub fn new(
        getfacl: impl Into<PathBuf>,
        setfacl: impl Into<PathBuf>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            getfacl: getfacl.into(),
            setfacl: setfacl.into(),
            domain: domain.into(),
        }
    }

    /// Builds the gateway from the configuration, resolving the domain
    /// unless an explicit override is given.
    pub fn from_config(config: &Config, domain_override: Option<String>) -> Self {
        let domain = domain_override
            .or_else(|| config.domain.name.clone())
            .unwrap_or_else(|| resolve_domain(&config.domain.idmapd_config, &config.domain.dnsdomainname));
        Self::new(&config.tools.getfacl, &config.tools.setfacl, domain)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Reads the ACL of `path` via the external getter. Blank lines and
    /// `#` comments in the output are skipped; everything else must parse as
    /// an ACE. A path without any entry at all is a storage error, since a
    /// share root always carries at least one.
    pub fn read_acl(&self, path: &Path) -> Result<AccessControlList> {
        ensure_tool(&self.getfacl)?;
        let output = Command::new(&self.getfacl).arg(path).output()?;
        if !output.status.success() {
            return Err(self.tool_failure(&self.getfacl, &[path.as_os_str().to_string_lossy().into_owned()], &output));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let context = PrincipalContext {
            path,
            domain: &self.domain,
        };
        let mut entries = Vec::new();
        for line in stdout.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            entries.push(AccessControlEntry::parse(line, Some(&context))?);
        }
        if entries.is_empty() {
            return Err(ShareError::EmptyAcl(path.to_path_buf()));
        }
        Ok(AccessControlList::new(entries))
    }

    /// Applies `acl` to `path` via the external setter. `recursive` hands
    /// the whole-tree flag to the tool instead of iterating in-process;
    /// `dry_run` asks the tool to validate without applying.
    pub fn write_acl(
        &self,
        path: &Path,
        acl: &AccessControlList,
        action: AclAction,
        recursive: bool,
        dry_run: bool,
    ) -> Result<()> {
        debug!(
            "changing permissions ({}) on {} (recursive={})",
            action.flag(),
            path.display(),
            recursive
        );
        ensure_tool(&self.setfacl)?;
        let mut args: Vec<String> = Vec::new();
        if recursive {
            args.push("-R".to_string());
        }
        if dry_run {
            args.push("--test".to_string());
        }
        args.push(action.flag().to_string());
        args.push(acl.to_string());
        args.push(path.as_os_str().to_string_lossy().into_owned());

        let output = Command::new(&self.setfacl).args(&args).output()?;
        if !output.status.success() {
            return Err(self.tool_failure(&self.setfacl, &args, &output));
        }
        Ok(())
    }

    fn tool_failure(&self, binary: &Path, args: &[String], output: &Output) -> ShareError {
        let command = format!("{} {}", binary.display(), args.join(" "));
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();
        error!("subprocess: {command}");
        error!("subprocess: {combined}");
        ShareError::ToolFailed {
            command,
            output: combined,
        }
    }
}

/// Fails fast with a descriptive error instead of a confusing subprocess
/// failure when an ACL binary is absent or not executable.
fn ensure_tool(binary: &Path) -> Result<()> {
    let executable = fs::metadata(binary)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false);
    if !executable {
        return Err(ShareError::ToolMissing(binary.to_path_buf()));
    }
    Ok(())
}

/// Resolves the NFSv4 domain: the `Domain` line of the id-mapping
/// configuration wins, falling back to the DNS domain name command. Either
/// source may legitimately be absent; an empty string means no domain could
/// be determined.
pub fn resolve_domain(idmapd_config: &Path, dnsdomainname: &Path) -> String {
    if let Ok(contents) = fs::read_to_string(idmapd_config) {
        for line in contents.lines() {
            if !line.trim_start().starts_with("Domain") {
                continue;
            }
            let domain = trailing_hostname(line);
            if !domain.is_empty() {
                return domain.to_string();
            }
        }
    }
    let fallback = Command::new(dnsdomainname)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_default();
    fallback
}

/// The trailing run of hostname characters on a `Domain = ...` line.
fn trailing_hostname(line: &str) -> &str {
    let line = line.trim_end();
    let bytes = line.as_bytes();
    let mut start = bytes.len();
    while start > 0 && matches!(bytes[start - 1], b'a'..=b'z' | b'.' | b'-') {
        start -= 1;
    }
    &line[start..]
}
