use crate::error::ConfigError;
use crate::value::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Permission class a layer declares when it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    None,
    Read,
    ReadWrite,
}

impl Permission {
    pub fn short_name(self) -> &'static str {
        match self {
            Permission::None => "",
            Permission::Read => "r",
            Permission::ReadWrite => "rw",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::None => write!(f, "none"),
            Permission::Read => write!(f, "read"),
            Permission::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// How a member participates in the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberAccess {
    Read {
        /// Sampled automatically once per capture tick.
        auto_log: bool,
        /// Name of the write member that accepts this channel's replayed
        /// values, if any.
        replay_link: Option<String>,
    },
    Write,
}

/// Immutable descriptor for one readable or writable member, attached at
/// the registration call site.
#[derive(Debug, Clone)]
pub struct MemberSpec {
    pub name: String,
    pub kind: ValueKind,
    pub access: MemberAccess,
}

impl MemberSpec {
    /// An auto-logged read member with no replay link.
    pub fn read(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: MemberAccess::Read {
                auto_log: true,
                replay_link: None,
            },
        }
    }

    /// An auto-logged read member whose recorded values replay through the
    /// named write member.
    pub fn read_linked(name: &str, kind: ValueKind, link: &str) -> Self {
        Self {
            name: name.into(),
            kind,
            access: MemberAccess::Read {
                auto_log: true,
                replay_link: Some(link.into()),
            },
        }
    }

    /// A read member excluded from auto-sampling.
    pub fn read_silent(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: MemberAccess::Read {
                auto_log: false,
                replay_link: None,
            },
        }
    }

    pub fn write(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            access: MemberAccess::Write,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self.access, MemberAccess::Read { .. })
    }

    pub fn is_write(&self) -> bool {
        matches!(self.access, MemberAccess::Write)
    }

    pub fn is_auto_logged(&self) -> bool {
        matches!(self.access, MemberAccess::Read { auto_log: true, .. })
    }

    pub fn replay_link(&self) -> Option<&str> {
        match &self.access {
            MemberAccess::Read { replay_link, .. } => replay_link.as_deref(),
            MemberAccess::Write => None,
        }
    }
}

/// A layer's declared identity: base name, permission class and members.
///
/// Construction runs the full wiring validation, so a misdeclared layer
/// fails at startup rather than mid-replay.
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    base_name: String,
    permission: Permission,
    members: Vec<MemberSpec>,
}

impl LayerDescriptor {
    pub fn new(
        base_name: &str,
        permission: Permission,
        members: Vec<MemberSpec>,
    ) -> Result<Self, ConfigError> {
        let descriptor = Self {
            base_name: base_name.into(),
            permission,
            members,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !valid_name(&self.base_name) {
            return Err(ConfigError::InvalidName(self.base_name.clone()));
        }

        for member in &self.members {
            if !valid_name(&member.name) {
                return Err(ConfigError::InvalidName(member.name.clone()));
            }
        }

        for (i, member) in self.members.iter().enumerate() {
            if self.members[..i].iter().any(|m| m.name == member.name) {
                return Err(ConfigError::DuplicateMember {
                    layer: self.base_name.clone(),
                    member: member.name.clone(),
                });
            }
        }

        let has_read = self.members.iter().any(MemberSpec::is_read);
        let has_write = self.members.iter().any(MemberSpec::is_write);

        let matches = match self.permission {
            Permission::ReadWrite => has_read && has_write,
            Permission::Read => has_read && !has_write,
            Permission::None => !has_read && !has_write,
        };

        if !matches {
            return Err(ConfigError::PermissionMismatch {
                layer: self.base_name.clone(),
                declared: self.permission.short_name().into(),
            });
        }

        // Every link must resolve to a write member, and no write member may
        // be claimed twice.
        let mut claimed: Vec<&str> = Vec::new();

        for member in &self.members {
            let Some(target) = member.replay_link() else {
                continue;
            };

            let resolves = self
                .members
                .iter()
                .any(|m| m.is_write() && m.name == target);

            if !resolves {
                return Err(ConfigError::UnresolvedReplayLink {
                    layer: self.base_name.clone(),
                    member: member.name.clone(),
                    target: target.into(),
                });
            }

            if claimed.contains(&target) {
                return Err(ConfigError::DuplicateLinkTarget {
                    layer: self.base_name.clone(),
                    target: target.into(),
                });
            }

            claimed.push(target);
        }

        Ok(())
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn members(&self) -> &[MemberSpec] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&MemberSpec> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Globally unique channel key for one member.
    pub fn channel_key(&self, member: &str) -> String {
        format!("{}/{}", self.base_name, member)
    }

    /// Declared `(read member, write member)` pairings.
    pub fn replay_links(&self) -> Vec<(&str, &str)> {
        self.members
            .iter()
            .filter_map(|m| m.replay_link().map(|target| (m.name.as_str(), target)))
            .collect()
    }

    /// Write members never claimed as a link target.
    pub fn unlinked_writes(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| m.is_write())
            .filter(|m| {
                !self
                    .members
                    .iter()
                    .any(|r| r.replay_link() == Some(m.name.as_str()))
            })
            .map(|m| m.name.as_str())
            .collect()
    }
}

// Names become channel keys and sit between NUL separators on the wire.
fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\0') && !name.contains('\n')
}

/// A registered data source/sink. Capabilities are declared through the
/// descriptor and enumerated by the bus; all calls flow bus -> layer.
pub trait Layer: Send {
    fn descriptor(&self) -> &LayerDescriptor;

    /// Reads one member's current value. Errors are caught by the bus and
    /// the channel is skipped for the tick.
    fn read(&self, member: &str) -> Result<Value, String>;

    /// Accepts a replayed or externally routed value for one write member.
    fn write(&mut self, member: &str, value: Value) -> Result<(), String>;

    /// Whether the layer is currently backed by live hardware.
    fn is_real(&self) -> bool;

    fn set_real(&mut self, real: bool);

    /// Called when a replay session starts, after the real flag is cleared.
    fn replay_init(&mut self) {}

    /// Called when a replay session ends, after the real flag is restored.
    fn exit_replay(&mut self) {}

    /// Called when the layer is removed from the bus.
    fn close(&mut self) {}
}

pub type LayerHandle = Arc<Mutex<dyn Layer>>;
