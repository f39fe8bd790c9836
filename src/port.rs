use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{CharzError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    Read,
    Write,
    ReadWrite,
}

impl PortKind {
    #[inline]
    pub fn is_readable(&self) -> bool {
        matches!(self, PortKind::Read | PortKind::ReadWrite)
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        matches!(self, PortKind::Write | PortKind::ReadWrite)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PortKind::Read => "r",
            PortKind::Write => "w",
            PortKind::ReadWrite => "rw",
        }
    }
}

impl Display for PortKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Port {
    id: usize,
    kind: PortKind,
}

impl Port {
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    #[inline]
    pub fn is_readable(&self) -> bool {
        self.kind.is_readable()
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.kind.is_writable()
    }

    #[inline]
    pub fn is_readwrite(&self) -> bool {
        self.kind == PortKind::ReadWrite
    }
}

/// The ordered, fixed set of ports of a memory.
///
/// Port ids are assigned densely from zero in construction order.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PortSet {
    ports: Vec<Port>,
}

impl PortSet {
    /// Numbers read-write ports first, then write-only ports, then read-only ports.
    pub fn new(num_rw: usize, num_w: usize, num_r: usize) -> Self {
        Self::from_kinds(
            std::iter::repeat(PortKind::ReadWrite)
                .take(num_rw)
                .chain(std::iter::repeat(PortKind::Write).take(num_w))
                .chain(std::iter::repeat(PortKind::Read).take(num_r)),
        )
    }

    pub fn from_kinds(kinds: impl IntoIterator<Item = PortKind>) -> Self {
        let ports = kinds
            .into_iter()
            .enumerate()
            .map(|(id, kind)| Port { id, kind })
            .collect();
        Self { ports }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> + '_ {
        self.ports.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.ports.iter().map(|p| p.id)
    }

    pub fn read_ports(&self) -> impl Iterator<Item = &Port> + '_ {
        self.ports.iter().filter(|p| p.is_readable())
    }

    pub fn write_ports(&self) -> impl Iterator<Item = &Port> + '_ {
        self.ports.iter().filter(|p| p.is_writable())
    }

    pub fn readwrite_ports(&self) -> impl Iterator<Item = &Port> + '_ {
        self.ports.iter().filter(|p| p.is_readwrite())
    }

    pub fn get(&self, id: usize) -> Result<Port> {
        self.ports
            .get(id)
            .copied()
            .ok_or(CharzError::UnknownPort(id))
    }

    pub fn is_readable(&self, id: usize) -> bool {
        self.get(id).map(|p| p.is_readable()).unwrap_or(false)
    }

    pub fn is_writable(&self, id: usize) -> bool {
        self.get(id).map(|p| p.is_writable()).unwrap_or(false)
    }

    pub fn require_readable(&self, id: usize) -> Result<Port> {
        let port = self.get(id)?;
        if !port.is_readable() {
            return Err(CharzError::InvalidPortRole {
                port: id,
                kind: port.kind,
                op: "read",
            });
        }
        Ok(port)
    }

    pub fn require_writable(&self, id: usize) -> Result<Port> {
        let port = self.get(id)?;
        if !port.is_writable() {
            return Err(CharzError::InvalidPortRole {
                port: id,
                kind: port.kind,
                op: "write",
            });
        }
        Ok(port)
    }
}
