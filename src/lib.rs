//! Manage "shares": directories exposing a curated set of files and
//! directories to specific users and groups without duplicating data, using
//! filesystem hard links plus NFSv4 ACLs.
//!
//! The crate is organized leaf-first:
//!
//! - [`acl`] — the ACE/ACL model with its set-like algebra, and the gateway
//!   to the external `nfs4_getfacl`/`nfs4_setfacl` binaries that persist ACL
//!   state on disk.
//! - [`share`] — the lifecycle engine: adding items by hard-linking,
//!   removing them with a link-count safety check, and the structural
//!   lock/unlock toggle.
//! - [`manage`] — the orchestration layer each CLI subcommand maps onto.
//! - [`htaccess`] — the web-access directive file each share carries.
//!
//! Everything is single-threaded and synchronous; failures from the
//! external tools or the filesystem propagate immediately, without retries
//! or rollback.

pub mod acl;
pub mod config;
pub mod error;
pub mod htaccess;
pub mod manage;
pub mod share;

pub use error::{Result, ShareError};
