//! Module type registry: the closed set of 4-byte type codes found in
//! UPDATE.APP block headers.
//!
//! # Identity rules
//! A block's type is the raw 4-byte `module_id` field, compared byte for
//! byte.  The code is never reinterpreted as an integer, so
//! [`ModuleType::code`] spells codes in on-disk byte order.
//!
//! The table is immutable and closed: a code outside it is a lookup failure,
//! never a fallback to some generic module name.

use std::fmt;

use crate::error::ParseError;

// ── ModuleId ─────────────────────────────────────────────────────────────────

/// Raw 4-byte module type code as stored in a block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(pub [u8; 4]);

impl ModuleId {
    /// Resolve this code through the module type table.
    pub fn module_type(self) -> Option<ModuleType> {
        ModuleType::from_code(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 4]> for ModuleId {
    fn from(code: [u8; 4]) -> Self {
        ModuleId(code)
    }
}

impl From<ModuleType> for ModuleId {
    fn from(module: ModuleType) -> Self {
        ModuleId(module.code())
    }
}

// ── ModuleType ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleType {
    System,
    Recovery,
    ERecovery,
    Cust,
    Dsp,
    CmnLib,
    KeyMaster,
    Mdtp,
    Apdp,
    Msadp,
    CmnLib64,
    DevCfg,
    LkSecApp,
    Modem,
    Rpm,
    Tz,
    Sbl1,
    Gpt,
    Aboot,
    OemSblVerList,
    OemSblVer,
    AmssVerList,
    AmssVer,
    Boot,
    Sha256Rsa,
    Crc,
    Vendor,
    Version,
    Product,
    PackageType,
}

/// Every known module type, in code order.
pub const MODULE_TYPES: [ModuleType; 30] = [
    ModuleType::System,
    ModuleType::Recovery,
    ModuleType::ERecovery,
    ModuleType::Cust,
    ModuleType::Dsp,
    ModuleType::CmnLib,
    ModuleType::KeyMaster,
    ModuleType::Mdtp,
    ModuleType::Apdp,
    ModuleType::Msadp,
    ModuleType::CmnLib64,
    ModuleType::DevCfg,
    ModuleType::LkSecApp,
    ModuleType::Modem,
    ModuleType::Rpm,
    ModuleType::Tz,
    ModuleType::Sbl1,
    ModuleType::Gpt,
    ModuleType::Aboot,
    ModuleType::OemSblVerList,
    ModuleType::OemSblVer,
    ModuleType::AmssVerList,
    ModuleType::AmssVer,
    ModuleType::Boot,
    ModuleType::Sha256Rsa,
    ModuleType::Crc,
    ModuleType::Vendor,
    ModuleType::Version,
    ModuleType::Product,
    ModuleType::PackageType,
];

impl ModuleType {
    /// The on-disk 4-byte code for this module type.
    pub fn code(self) -> [u8; 4] {
        let low = |b: u8| [0x00, 0x00, 0x00, b];
        match self {
            ModuleType::System        => low(0x00),
            ModuleType::Recovery      => low(0x40),
            ModuleType::ERecovery     => low(0x44),
            ModuleType::Cust          => low(0x70),
            ModuleType::Dsp           => low(0xA1),
            ModuleType::CmnLib        => low(0xA2),
            ModuleType::KeyMaster     => low(0xA3),
            ModuleType::Mdtp          => low(0xA4),
            ModuleType::Apdp          => low(0xA5),
            ModuleType::Msadp         => low(0xA6),
            ModuleType::CmnLib64      => low(0xAA),
            ModuleType::DevCfg        => low(0xAB),
            ModuleType::LkSecApp      => low(0xAC),
            ModuleType::Modem         => low(0xC1),
            ModuleType::Rpm           => low(0xC2),
            ModuleType::Tz            => low(0xC3),
            ModuleType::Sbl1          => low(0xC6),
            ModuleType::Gpt           => low(0xD2),
            ModuleType::Aboot         => low(0xE3),
            ModuleType::OemSblVerList => low(0xE8),
            ModuleType::OemSblVer     => low(0xE9),
            ModuleType::AmssVerList   => low(0xEA),
            ModuleType::AmssVer       => low(0xEC),
            ModuleType::Boot          => low(0xFC),
            ModuleType::Sha256Rsa     => low(0xFE),
            ModuleType::Crc           => low(0xFF),
            ModuleType::Vendor        => [0x13, 0x00, 0x00, 0x00],
            ModuleType::Version       => [0x14, 0x00, 0x00, 0x00],
            ModuleType::Product       => [0x15, 0x00, 0x00, 0x00],
            ModuleType::PackageType   => [0xF2, 0xFF, 0xFF, 0xFF],
        }
    }

    /// Resolve a raw code.  Returns `None` if the code is not in the table.
    pub fn from_code(code: &[u8; 4]) -> Option<Self> {
        MODULE_TYPES.into_iter().find(|m| &m.code() == code)
    }

    /// Like [`ModuleType::from_code`], but unknown codes are a
    /// [`ParseError::UnknownModuleType`].
    pub fn lookup(id: ModuleId) -> Result<Self, ParseError> {
        Self::from_code(&id.0).ok_or(ParseError::UnknownModuleType { module_id: id })
    }

    /// Canonical upper-case name, as it appears in header display names.
    pub fn name(self) -> &'static str {
        match self {
            ModuleType::System        => "SYSTEM",
            ModuleType::Recovery      => "RECOVERY",
            ModuleType::ERecovery     => "ERECOVERY",
            ModuleType::Cust          => "CUST",
            ModuleType::Dsp           => "DSP",
            ModuleType::CmnLib        => "CMNLIB",
            ModuleType::KeyMaster     => "KEYMASTER",
            ModuleType::Mdtp          => "MDTP",
            ModuleType::Apdp          => "APDP",
            ModuleType::Msadp         => "MSADP",
            ModuleType::CmnLib64      => "CMNLIB64",
            ModuleType::DevCfg        => "DEVCFG",
            ModuleType::LkSecApp      => "LKSECAPP",
            ModuleType::Modem         => "MODEM",
            ModuleType::Rpm           => "RPM",
            ModuleType::Tz            => "TZ",
            ModuleType::Sbl1          => "SBL1",
            ModuleType::Gpt           => "GPT",
            ModuleType::Aboot         => "ABOOT",
            ModuleType::OemSblVerList => "OEMSBL_VERLIST",
            ModuleType::OemSblVer     => "OEMSBL_VER",
            ModuleType::AmssVerList   => "AMSS_VERLIST",
            ModuleType::AmssVer       => "AMSS_VER",
            ModuleType::Boot          => "BOOT",
            ModuleType::Sha256Rsa     => "SHA256RSA",
            ModuleType::Crc           => "CRC",
            ModuleType::Vendor        => "VENDOR",
            ModuleType::Version       => "VERSION",
            ModuleType::Product       => "PRODUCT",
            ModuleType::PackageType   => "PACKAGE_TYPE",
        }
    }

    /// Parse a name, ignoring ASCII case.
    pub fn from_name(s: &str) -> Option<Self> {
        MODULE_TYPES.into_iter().find(|m| m.name().eq_ignore_ascii_case(s))
    }

    /// Lower-case name used for dumped module files.
    pub fn file_name(self) -> String {
        self.name().to_ascii_lowercase()
    }

    /// Whether a header's display name agrees with this type (ASCII case
    /// is ignored).
    pub fn matches_display_name(self, display_name: &str) -> bool {
        self.name().eq_ignore_ascii_case(display_name)
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
