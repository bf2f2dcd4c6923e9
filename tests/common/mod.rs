#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Group, Uid, User};
use tempfile::TempDir;

use nfs4_share::acl::Nfs4Tools;

pub fn calling_user() -> String {
    User::from_uid(Uid::effective()).unwrap().unwrap().name
}

pub fn calling_prim_group() -> String {
    Group::from_gid(Gid::effective()).unwrap().unwrap().name
}

/// An unlocked share ACL as the external getter would report it.
pub const UNLOCKED_ACL: &str = "A::alice@example.org:rxtncy\nA:g:lab@example.org:rwxaDdtTNcCo";

/// Stand-ins for the external NFSv4 ACL binaries: the getter prints a canned
/// ACL, the setter records every invocation. This keeps lifecycle tests
/// runnable on any local filesystem; the real binaries are only exercised on
/// an NFSv4 mount.
pub struct StubTools {
    pub tools: Nfs4Tools,
    log: PathBuf,
    _bin_dir: TempDir,
}

impl StubTools {
    /// The recorded setter invocations, one argument line per call.
    pub fn setfacl_calls(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

pub fn stub_tools(acl_lines: &str) -> StubTools {
    stub_tools_with_domain(acl_lines, "example.org")
}

pub fn stub_tools_with_domain(acl_lines: &str, domain: &str) -> StubTools {
    let bin_dir = tempfile::tempdir().unwrap();
    let log = bin_dir.path().join("setfacl.log");
    let getfacl = script(
        bin_dir.path(),
        "nfs4_getfacl",
        &format!("cat <<'EOF'\n{acl_lines}\nEOF\n"),
    );
    let setfacl = script(
        bin_dir.path(),
        "nfs4_setfacl",
        &format!("printf '%s\\n' \"$*\" >> {}\n", log.display()),
    );
    StubTools {
        tools: Nfs4Tools::new(getfacl, setfacl, domain),
        log,
        _bin_dir: bin_dir,
    }
}

pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Creates every listed relative path under `root` as a small file, making
/// parent directories as needed.
pub fn fabricate(root: &Path, paths: &[&str]) -> Vec<PathBuf> {
    let mut created = Vec::new();
    for rel in paths {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, rel.as_bytes()).unwrap();
        created.push(path);
    }
    created
}

pub fn inode(path: &Path) -> u64 {
    fs::metadata(path).unwrap().ino()
}

pub fn nlink(path: &Path) -> u64 {
    fs::metadata(path).unwrap().nlink()
}
