//! Configuration for the share tool.
//!
//! Loaded from an optional TOML file merged over built-in defaults. Shares
//! only work when the items and the share directory live on the same
//! filesystem and that filesystem supports NFSv4 ACLs; the defaults point at
//! the stock locations of the NFSv4 ACL utilities.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Paths of the external binaries that read and write NFSv4 ACLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_getfacl")]
    pub getfacl: PathBuf,
    #[serde(default = "default_setfacl")]
    pub setfacl: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            getfacl: default_getfacl(),
            setfacl: default_setfacl(),
        }
    }
}

fn default_getfacl() -> PathBuf {
    PathBuf::from("/usr/bin/nfs4_getfacl")
}

fn default_setfacl() -> PathBuf {
    PathBuf::from("/usr/bin/nfs4_setfacl")
}

/// How the NFSv4 domain suffix for principals is determined. An explicit
/// `name` wins; otherwise the id-mapping configuration is consulted, with
/// the DNS domain name command as last resort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_idmapd_config")]
    pub idmapd_config: PathBuf,
    #[serde(default = "default_dnsdomainname")]
    pub dnsdomainname: PathBuf,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: None,
            idmapd_config: default_idmapd_config(),
            dnsdomainname: default_dnsdomainname(),
        }
    }
}

fn default_idmapd_config() -> PathBuf {
    PathBuf::from("/etc/idmapd.conf")
}

fn default_dnsdomainname() -> PathBuf {
    PathBuf::from("dnsdomainname")
}

/// The web-access directive file placed inside every share. The filename is
/// reserved: it is never treated as a shared item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtaccessConfig {
    #[serde(default = "default_htaccess_filename")]
    pub filename: String,
    /// Directive granting one user access; `{}` is replaced by the name.
    #[serde(default = "default_user_directive")]
    pub user_directive: String,
    /// Directive granting one group's members access; `{}` is replaced by
    /// the name.
    #[serde(default = "default_group_directive")]
    pub group_directive: String,
}

impl Default for HtaccessConfig {
    fn default() -> Self {
        Self {
            filename: default_htaccess_filename(),
            user_directive: default_user_directive(),
            group_directive: default_group_directive(),
        }
    }
}

fn default_htaccess_filename() -> String {
    ".htaccess.share".to_string()
}

fn default_user_directive() -> String {
    "Require ldap-user {}".to_string()
}

fn default_group_directive() -> String {
    "Require ldap-group {}".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub domain: DomainConfig,
    #[serde(default)]
    pub htaccess: HtaccessConfig,
}
