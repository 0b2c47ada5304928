//! Pin state flags.
//!
//! Flags are stored as a bitmask and exchanged as text: flag names joined by
//! `" | "` in declaration order, e.g. `"LOCKED | ARCHIVED"`. The empty set is
//! the empty string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::CorkboardError;

/// Separator used by the textual form.
pub const FLAG_SEPARATOR: &str = " | ";

/// A single pin flag. Declaration order is the canonical text order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinFlag {
    /// No further edits expected.
    Locked,
    /// Hidden from the default board view.
    Archived,
    /// Shown ahead of other pins.
    Pinned,
}

impl PinFlag {
    /// Every flag, in canonical order.
    pub const ALL: [PinFlag; 3] = [PinFlag::Locked, PinFlag::Archived, PinFlag::Pinned];

    pub const fn bit(self) -> u64 {
        match self {
            PinFlag::Locked => 1 << 0,
            PinFlag::Archived => 1 << 1,
            PinFlag::Pinned => 1 << 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            PinFlag::Locked => "LOCKED",
            PinFlag::Archived => "ARCHIVED",
            PinFlag::Pinned => "PINNED",
        }
    }

    /// Look up a flag by its exact (upper-case) name.
    pub fn from_name(name: &str) -> Option<PinFlag> {
        Self::ALL.into_iter().find(|flag| flag.name() == name)
    }
}

impl fmt::Display for PinFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flag codec errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    #[error("invalid flag name: '{0}'")]
    InvalidFlagName(String),

    #[error("duplicate flag: {0}")]
    DuplicateFlag(PinFlag),

    #[error("unknown flag bits: {0:#x}")]
    UnknownBits(u64),
}

impl From<FlagError> for CorkboardError {
    fn from(e: FlagError) -> Self {
        CorkboardError::InvalidInput(e.to_string())
    }
}

/// A set of [`PinFlag`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PinFlags(u64);

impl PinFlags {
    const KNOWN_BITS: u64 = PinFlag::Locked.bit() | PinFlag::Archived.bit() | PinFlag::Pinned.bit();

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a raw bitmask, rejecting bits no flag uses.
    pub fn from_bits(bits: u64) -> Result<Self, FlagError> {
        let unknown = bits & !Self::KNOWN_BITS;
        if unknown != 0 {
            return Err(FlagError::UnknownBits(unknown));
        }
        Ok(Self(bits))
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, flag: PinFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn insert(&mut self, flag: PinFlag) {
        self.0 |= flag.bit();
    }

    pub fn remove(&mut self, flag: PinFlag) {
        self.0 &= !flag.bit();
    }

    /// Flags in the set, in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = PinFlag> + '_ {
        PinFlag::ALL.into_iter().filter(|flag| self.contains(*flag))
    }
}

impl FromIterator<PinFlag> for PinFlags {
    fn from_iter<I: IntoIterator<Item = PinFlag>>(iter: I) -> Self {
        let mut flags = PinFlags::empty();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

/// Encode a flag set as text.
///
/// ```
/// use corkboard::board::{encode, PinFlag, PinFlags};
///
/// let flags: PinFlags = [PinFlag::Archived, PinFlag::Locked].into_iter().collect();
/// assert_eq!(encode(flags), "LOCKED | ARCHIVED");
/// assert_eq!(encode(PinFlags::empty()), "");
/// ```
pub fn encode(flags: PinFlags) -> String {
    flags
        .iter()
        .map(PinFlag::name)
        .collect::<Vec<_>>()
        .join(FLAG_SEPARATOR)
}

/// Decode the textual form.
///
/// Tokens are split on `|` and trimmed. Blank input is the empty set; any
/// unknown, empty or repeated token is an error. Names are case-sensitive.
pub fn decode(text: &str) -> Result<PinFlags, FlagError> {
    if text.trim().is_empty() {
        return Ok(PinFlags::empty());
    }

    let mut flags = PinFlags::empty();
    for token in text.split('|').map(str::trim) {
        let flag =
            PinFlag::from_name(token).ok_or_else(|| FlagError::InvalidFlagName(token.to_string()))?;
        if flags.contains(flag) {
            return Err(FlagError::DuplicateFlag(flag));
        }
        flags.insert(flag);
    }
    Ok(flags)
}

impl fmt::Display for PinFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(*self))
    }
}

impl FromStr for PinFlags {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

impl Serialize for PinFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(*self))
    }
}

impl<'de> Deserialize<'de> for PinFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        FlagsInput::deserialize(deserializer)?
            .decode()
            .map_err(serde::de::Error::custom)
    }
}

/// Flags as submitted by a client: either the raw bitmask or the text form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FlagsInput {
    Bits(u64),
    Text(String),
}

impl FlagsInput {
    pub fn decode(&self) -> Result<PinFlags, FlagError> {
        match self {
            FlagsInput::Bits(bits) => PinFlags::from_bits(*bits),
            FlagsInput::Text(text) => decode(text),
        }
    }
}

impl Default for FlagsInput {
    fn default() -> Self {
        FlagsInput::Bits(0)
    }
}

impl From<u64> for FlagsInput {
    fn from(bits: u64) -> Self {
        FlagsInput::Bits(bits)
    }
}

impl From<&str> for FlagsInput {
    fn from(text: &str) -> Self {
        FlagsInput::Text(text.to_string())
    }
}

impl From<PinFlags> for FlagsInput {
    fn from(flags: PinFlags) -> Self {
        FlagsInput::Bits(flags.bits())
    }
}
