/// Format generation: v0 is full-entries-only with one archive-wide codec;
/// v1 adds delta entries and a per-entry encoding byte (spec §1, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    V0,
    V1,
}

impl Generation {
    pub fn version(self) -> u16 {
        match self {
            Generation::V0 => crate::VERSION_V0,
            Generation::V1 => crate::VERSION_V1,
        }
    }

    pub fn from_version(version: u16) -> Option<Self> {
        match version {
            crate::VERSION_V0 => Some(Generation::V0),
            crate::VERSION_V1 => Some(Generation::V1),
            _ => None,
        }
    }

    pub fn data_ext(self) -> &'static str {
        match self {
            Generation::V0 => crate::DATA_EXT_V0,
            Generation::V1 => crate::DATA_EXT_V1,
        }
    }

    pub fn index_ext(self) -> &'static str {
        match self {
            Generation::V0 => crate::INDEX_EXT_V0,
            Generation::V1 => crate::INDEX_EXT_V1,
        }
    }

    pub fn cache_name(self) -> &'static str {
        match self {
            Generation::V0 => crate::CACHE_NAME_V0,
            Generation::V1 => crate::CACHE_NAME_V1,
        }
    }
}

/// A v1 entry's kind: full payload, or a delta against a same-archive full
/// entry (spec §6 "Entry type byte").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Full,
    Delta,
}

impl EntryType {
    pub const FULL_BYTE: u8 = 0x00;
    pub const DELTA_BYTE: u8 = 0x01;

    pub fn to_byte(self) -> u8 {
        match self {
            EntryType::Full => Self::FULL_BYTE,
            EntryType::Delta => Self::DELTA_BYTE,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::FULL_BYTE => Some(EntryType::Full),
            Self::DELTA_BYTE => Some(EntryType::Delta),
            _ => None,
        }
    }
}
