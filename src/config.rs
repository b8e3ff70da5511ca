use std::path::Path;

use facet::Facet;

use crate::error::VmError;
use crate::provider::OsFamily;
use crate::provider::sakura::{Credentials, DEFAULT_API_ROOT};

pub const ENV_TOKEN: &str = "SAKURACLOUD_ACCESS_TOKEN";
pub const ENV_SECRET: &str = "SAKURACLOUD_ACCESS_TOKEN_SECRET";
pub const ENV_ZONE: &str = "SAKURACLOUD_ZONE";

const DEFAULT_NOTE: &str = "WordPress";
const MAX_HOSTNAME_LEN: usize = 63;
/// Plans are matched on MiB, which must fit in a `u32`.
pub const MAX_MEM_GB: u32 = u32::MAX / 1024;

/// The template as written in `config.toml`. Every key is optional.
#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct Template {
    #[facet(default)]
    pub token: String,
    #[facet(default)]
    pub secret: String,
    #[facet(default)]
    pub zone: String,
    #[facet(default)]
    pub name: String,
    #[facet(default)]
    pub description: String,
    #[facet(default)]
    pub tag: String,
    #[facet(default = 1)]
    pub cpu: u32,
    /// GiB.
    #[facet(default = 1)]
    pub mem: u32,
    #[facet(default)]
    #[facet(rename = "hostName")]
    pub host_name: String,
    #[facet(default)]
    pub password: String,
    #[facet(default)]
    #[facet(rename = "sshPublicKey")]
    pub ssh_public_key: String,
    #[facet(default)]
    pub os: String,
    #[facet(default)]
    pub note: String,
    #[facet(default)]
    #[facet(rename = "autoBoot")]
    pub auto_boot: bool,
    #[facet(default)]
    #[facet(rename = "apiRoot")]
    pub api_root: String,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            token: String::new(),
            secret: String::new(),
            zone: String::new(),
            name: String::new(),
            description: String::new(),
            tag: String::new(),
            cpu: 1,
            mem: 1,
            host_name: String::new(),
            password: String::new(),
            ssh_public_key: String::new(),
            os: String::new(),
            note: String::new(),
            auto_boot: false,
            api_root: String::new(),
        }
    }
}

/// Fully resolved, validated settings for one run. Never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningSpec {
    pub token: String,
    pub secret: String,
    pub zone: String,
    pub api_root: String,
    pub name: String,
    pub description: String,
    pub tag: String,
    pub cpu: u32,
    pub mem_gb: u32,
    pub hostname: String,
    pub password: String,
    /// Empty when no key is configured.
    pub ssh_public_key: String,
    pub os: OsFamily,
    pub note: String,
    pub auto_boot: bool,
}

impl ProvisioningSpec {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            token: self.token.clone(),
            secret: self.secret.clone(),
            zone: self.zone.clone(),
            api_root: self.api_root.clone(),
        }
    }

    /// Provisioning and shell access both need the guest password.
    pub fn require_password(&self) -> Result<&str, VmError> {
        if self.password.is_empty() {
            return Err(VmError::Validation {
                message: "password must be set to provision or log in".into(),
            });
        }
        Ok(&self.password)
    }
}

/// Final component of the working directory, used when `name`/`hostName`
/// are blank.
pub fn project_dir_name() -> Option<String> {
    let cwd = std::env::current_dir().ok()?;
    cwd.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}

fn validate_hostname(hostname: &str) -> Result<(), VmError> {
    let invalid = |why: &str| VmError::Validation {
        message: format!("hostName '{hostname}' {why}"),
    };

    if hostname.is_empty() {
        return Err(invalid("is empty and no project directory name is available"));
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(invalid("is longer than 63 characters"));
    }
    if !hostname.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid("must start with a letter or digit"));
    }
    if !hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(invalid("may contain only letters, digits and '-'"));
    }
    Ok(())
}

fn validate_ssh_key(key: &str) -> Result<(), VmError> {
    ssh_key::PublicKey::from_openssh(key)
        .map(|_| ())
        .map_err(|e| VmError::Validation {
            message: format!("sshPublicKey is not a valid OpenSSH public key: {e}"),
        })
}

fn or_env(value: String, var: &str, env: &impl Fn(&str) -> Option<String>) -> String {
    if value.is_empty() {
        env(var).unwrap_or_default()
    } else {
        value
    }
}

/// Apply env overrides and defaults to a parsed template, then validate.
pub fn resolve(
    template: Template,
    env: impl Fn(&str) -> Option<String>,
    project_dir: Option<String>,
) -> Result<ProvisioningSpec, VmError> {
    let token = or_env(template.token, ENV_TOKEN, &env);
    let secret = or_env(template.secret, ENV_SECRET, &env);
    let zone = or_env(template.zone, ENV_ZONE, &env);

    for (key, value) in [("token", &token), ("secret", &secret), ("zone", &zone)] {
        if value.trim().is_empty() {
            return Err(VmError::Validation {
                message: format!("{key} must be set in the config or the environment"),
            });
        }
    }

    if template.cpu < 1 {
        return Err(VmError::Validation {
            message: "cpu must be at least 1".into(),
        });
    }
    if template.mem < 1 {
        return Err(VmError::Validation {
            message: "mem must be at least 1 (GiB)".into(),
        });
    }
    if template.mem > MAX_MEM_GB {
        return Err(VmError::Validation {
            message: format!("mem must be at most {MAX_MEM_GB} (GiB)"),
        });
    }

    let project_dir = project_dir.unwrap_or_default();
    let name = if template.name.is_empty() {
        project_dir.clone()
    } else {
        template.name
    };
    let hostname = if template.host_name.is_empty() {
        project_dir
    } else {
        template.host_name
    };
    validate_hostname(&hostname)?;

    let ssh_public_key = template.ssh_public_key.trim().to_string();
    if !ssh_public_key.is_empty() {
        validate_ssh_key(&ssh_public_key)?;
    }

    let os = if template.os.is_empty() {
        OsFamily::default()
    } else {
        OsFamily::parse(&template.os).ok_or_else(|| VmError::Validation {
            message: format!(
                "unknown os '{}' (expected centos, ubuntu, debian, rocky or alma)",
                template.os
            ),
        })?
    };

    Ok(ProvisioningSpec {
        token,
        secret,
        zone,
        api_root: if template.api_root.is_empty() {
            DEFAULT_API_ROOT.to_string()
        } else {
            template.api_root
        },
        name,
        description: template.description,
        tag: template.tag,
        cpu: template.cpu,
        mem_gb: template.mem,
        hostname,
        password: template.password,
        ssh_public_key,
        os,
        note: if template.note.is_empty() {
            DEFAULT_NOTE.to_string()
        } else {
            template.note
        },
        auto_boot: template.auto_boot,
    })
}

pub fn load_config(path: &Path) -> Result<ProvisioningSpec, VmError> {
    let contents = std::fs::read_to_string(path).map_err(|source| VmError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    let template: Template = facet_toml::from_str(&contents).map_err(|e| VmError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    resolve(template, |var| std::env::var(var).ok(), project_dir_name())
}
