//! Purpose: Channel mode and the legacy bit-flag translation layer.
//! Exports: `Mode`, `ModeFlags`, `unknown_mode_error`.
//! Role: Callers pick a `Mode`; flag-based callers (C ABI) go through `ModeFlags`.
//! Invariants: Only the singular flag values `READ` and `WRITE` translate to a mode.
//! Invariants: Zero and combined flags are rejected with `ErrorKind::UnknownMode`.
use std::fmt;
use std::path::Path;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    Read,
    Write,
}

impl Mode {
    pub fn flags(self) -> ModeFlags {
        match self {
            Mode::Read => ModeFlags::READ,
            Mode::Write => ModeFlags::WRITE,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Read => f.write_str("read"),
            Mode::Write => f.write_str("write"),
        }
    }
}

/// Raw mode bits as legacy callers pass them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ModeFlags(pub u32);

impl ModeFlags {
    pub const READ: ModeFlags = ModeFlags(1);
    pub const WRITE: ModeFlags = ModeFlags(2);

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Resolves the flags for an open of `path`.
    pub fn to_mode(self, path: &Path) -> Result<Mode, Error> {
        match self {
            ModeFlags::READ => Ok(Mode::Read),
            ModeFlags::WRITE => Ok(Mode::Write),
            _ => Err(unknown_mode_error(self, path)),
        }
    }
}

impl std::ops::BitOr for ModeFlags {
    type Output = ModeFlags;

    fn bitor(self, rhs: ModeFlags) -> ModeFlags {
        ModeFlags(self.0 | rhs.0)
    }
}

impl From<Mode> for ModeFlags {
    fn from(mode: Mode) -> Self {
        mode.flags()
    }
}

pub fn unknown_mode_error(flags: ModeFlags, path: &Path) -> Error {
    Error::new(ErrorKind::UnknownMode)
        .with_message(format!("Unknown file mode for {}", path.display()))
        .with_path(path)
        .with_hint(format!(
            "mode flags were {:#x}; pass exactly READ ({:#x}) or WRITE ({:#x})",
            flags.bits(),
            ModeFlags::READ.bits(),
            ModeFlags::WRITE.bits()
        ))
}
