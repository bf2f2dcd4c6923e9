mod common;

use std::fs;

use common::{calling_user, fabricate, inode, nlink, stub_tools, UNLOCKED_ACL};
use nfs4_share::manage::{self, Grantees};
use nfs4_share::share::Share;
use nfs4_share::ShareError;

#[test]
fn removing_the_last_hard_link_needs_force() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();
    // A file born inside the share has no other reference.
    let only_copy = share.directory().join("only_copy");
    fs::write(&only_copy, "data").unwrap();
    assert_eq!(nlink(&only_copy), 1);

    let result = share.remove_items(&[only_copy.clone()], false);
    assert!(matches!(result, Err(ShareError::LastLink(_))));
    assert!(only_copy.exists());

    share.remove_items(&[only_copy.clone()], true).unwrap();
    assert!(!only_copy.exists());
}

#[test]
fn removing_a_shared_file_leaves_the_source_alone() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let items = fabricate(&dir.path().join("source"), &["file"]);
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();
    share.add(&items).unwrap();
    assert_eq!(nlink(&items[0]), 2);

    share
        .remove_items(&[share.directory().join("file")], false)
        .unwrap();

    assert!(!share.directory().join("file").exists());
    assert!(items[0].exists());
    assert_eq!(nlink(&items[0]), 1);
}

#[test]
fn directories_are_removed_bottom_up() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source");
    fabricate(&source, &["dir/sub/file", "dir/other"]);
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();
    share.add(&[source.join("dir")]).unwrap();

    share
        .remove_items(&[share.directory().join("dir")], false)
        .unwrap();

    assert!(!share.directory().join("dir").exists());
    assert!(source.join("dir/sub/file").exists());
}

#[test]
fn self_destruct_removes_the_share_root() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let items = fabricate(&dir.path().join("source"), &["file", "dir/inner"]);
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();
    let root = share.directory().to_path_buf();
    share
        .add(&[items[0].clone(), dir.path().join("source/dir")])
        .unwrap();

    let share = Share::open(&root, &stub.tools).unwrap();
    share.self_destruct(false).unwrap();

    assert!(!root.exists());
    assert!(items[0].exists());
    assert!(items[1].exists());
}

#[test]
fn deleting_one_of_three_shares_releases_exactly_one_link() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let items = fabricate(&dir.path().join("source"), &["file"]);

    let roots: Vec<_> = (0..3)
        .map(|i| {
            let share =
                Share::create(&dir.path().join(format!("share{i}")), &stub.tools, false).unwrap();
            share.add(&items).unwrap();
            share.directory().to_path_buf()
        })
        .collect();
    assert_eq!(nlink(&items[0]), 4);

    let share = Share::open(&roots[0], &stub.tools).unwrap();
    share.self_destruct(false).unwrap();

    assert_eq!(nlink(&items[0]), 3);
    for surviving in &roots[1..] {
        assert_eq!(inode(&surviving.join("file")), inode(&items[0]));
    }
}

#[test]
fn delete_unlocks_and_removes_directive_file_first() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let items = fabricate(&dir.path().join("source"), &["file"]);
    let config = nfs4_share::config::Config::default();
    let grantees = Grantees {
        managing_users: vec![calling_user()],
        ..Grantees::default()
    };
    let share_path = dir.path().join("share");
    manage::create(&stub.tools, &config, &share_path, &items, &grantees, false).unwrap();
    assert!(share_path.join(&config.htaccess.filename).exists());

    // No force needed: the directive file goes before the tree walk and the
    // shared file still has its source link.
    manage::delete(&stub.tools, &config, &share_path, false).unwrap();

    assert!(!share_path.exists());
    assert!(items[0].exists());
    assert_eq!(nlink(&items[0]), 1);
}

#[test]
fn missing_directive_file_is_reported_when_expected() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let config = nfs4_share::config::Config::default();
    let share = Share::create(&dir.path().join("share"), &stub.tools, false).unwrap();

    assert!(matches!(
        nfs4_share::htaccess::remove_from(&share, &config.htaccess, false),
        Err(ShareError::MissingDirectiveFile(_))
    ));
    // Absence is tolerated on the cleanup path.
    nfs4_share::htaccess::remove_from(&share, &config.htaccess, true).unwrap();
}

#[test]
fn deleting_a_missing_share_is_an_error() {
    let stub = stub_tools(UNLOCKED_ACL);
    let dir = tempfile::tempdir().unwrap();
    let config = nfs4_share::config::Config::default();
    let result = manage::delete(&stub.tools, &config, &dir.path().join("nope"), false);
    assert!(matches!(result, Err(ShareError::MissingShare(_))));
}
