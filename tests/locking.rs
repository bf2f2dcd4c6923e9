mod common;

use std::fs;

use common::{stub_tools, UNLOCKED_ACL};
use nfs4_share::manage;
use nfs4_share::share::Share;
use nfs4_share::ShareError;

/// A locked share ACL as the external getter would report it.
const LOCKED_ACL: &str =
    "A::alice@example.org:rxtncy\nA:g:lab@example.org:rxaDdtTNcCo\nD::EVERYONE@:wadDNTo";

const DENY_ENTRY: &str = "D::EVERYONE@:wadDNTo";

#[test]
fn lock_drops_the_write_letter_and_appends_the_deny_entry() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();

    share.lock().unwrap();

    let calls = stub.setfacl_calls();
    let root = share.directory().display().to_string();
    assert!(calls.iter().any(|c| c.starts_with("-s ")
        && c.contains("A:g:lab@example.org:rxaDdtTNcCo")
        && c.ends_with(&root)));
    assert!(calls
        .iter()
        .any(|c| c == &format!("-a {DENY_ENTRY} {root}")));
}

#[test]
fn lock_covers_the_root_and_its_immediate_subdirectories() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();
    let sub = share.directory().join("sub");
    let nested = sub.join("nested");
    fs::create_dir_all(&nested).unwrap();

    share.lock().unwrap();

    let calls = stub.setfacl_calls();
    let root = share.directory().display().to_string();
    assert!(calls
        .iter()
        .any(|c| c == &format!("-a {DENY_ENTRY} {root}")));
    assert!(calls
        .iter()
        .any(|c| c == &format!("-a {DENY_ENTRY} {}", sub.display())));
    // One level deep only.
    assert!(!calls
        .iter()
        .any(|c| c.ends_with(&nested.display().to_string())));
}

#[test]
fn unlock_restores_the_write_letter_and_subtracts_the_deny_entry() {
    let stub = stub_tools(LOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();

    share.unlock().unwrap();

    let calls = stub.setfacl_calls();
    let root = share.directory().display().to_string();
    assert!(calls.iter().any(|c| c.starts_with("-s ")
        && c.contains("A:g:lab@example.org:rwxaDdtTNcCo")
        && c.ends_with(&root)));
    assert!(calls
        .iter()
        .any(|c| c == &format!("-x {DENY_ENTRY} {root}")));
}

#[test]
fn unlocking_an_unlocked_share_is_harmless() {
    // No entry matches the locked management level, so the flip rewrites
    // the ACL unchanged; the setter decides what subtracting an absent
    // deny entry means.
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();

    share.unlock().unwrap();

    let calls = stub.setfacl_calls();
    let root = share.directory().display().to_string();
    assert!(calls.iter().any(|c| c.starts_with("-s ")
        && c.contains(&UNLOCKED_ACL.replace('\n', ","))
        && c.ends_with(&root)));
}

#[test]
fn lock_and_unlock_operate_on_an_existing_share() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let share_path = dir.path().join("share");
    Share::create(&share_path, &stub.tools, false).unwrap();

    manage::lock(&stub.tools, &share_path).unwrap();
    manage::unlock(&stub.tools, &share_path).unwrap();

    let calls = stub.setfacl_calls();
    assert!(calls.iter().any(|c| c.starts_with("-a ")));
    assert!(calls.iter().any(|c| c.starts_with("-x ")));
}

#[test]
fn locking_a_missing_share_is_an_error() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        manage::lock(&stub.tools, &dir.path().join("nope")),
        Err(ShareError::MissingShare(_))
    ));
    assert!(matches!(
        manage::unlock(&stub.tools, &dir.path().join("nope")),
        Err(ShareError::MissingShare(_))
    ));
}
