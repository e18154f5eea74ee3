//! Consensus configuration: verification flags, versioned flag sets and limits.

use core::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Error, VERIFY_BUG_VALUE_ZERO, VERIFY_DISALLOW_UPGRADABLE_NOPS, VERIFY_MINIMALDATA,
    VERIFY_NULLFAIL, VERIFY_REVERSEBYTES,
};

const SUPPORTED_FLAGS: u32 = VERIFY_DISALLOW_UPGRADABLE_NOPS
    | VERIFY_REVERSEBYTES
    | VERIFY_BUG_VALUE_ZERO
    | VERIFY_MINIMALDATA
    | VERIFY_NULLFAIL;

/// Wrapper for script verification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScriptFlags(u32);

impl ScriptFlags {
    pub fn from_bits(bits: u32) -> Result<Self, Error> {
        if bits & !SUPPORTED_FLAGS != 0 {
            return Err(Error::InvalidFlags);
        }
        Ok(Self(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn disallows_upgradable_nops(self) -> bool {
        self.0 & VERIFY_DISALLOW_UPGRADABLE_NOPS != 0
    }

    pub fn enables_reverse_bytes(self) -> bool {
        self.0 & VERIFY_REVERSEBYTES != 0
    }

    pub fn requires_bug_value_zero(self) -> bool {
        self.0 & VERIFY_BUG_VALUE_ZERO != 0
    }

    pub fn requires_minimal_encoding(self) -> bool {
        self.0 & VERIFY_MINIMALDATA != 0
    }

    pub fn requires_null_signature_failures(self) -> bool {
        self.0 & VERIFY_NULLFAIL != 0
    }
}

/// A named Bitcoin Cash rule set. Strict variants add the standardness rules
/// relay nodes enforce on top of consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionSetVersion {
    #[serde(rename = "BCH_2019_05")]
    Bch2019May,
    #[serde(rename = "BCH_2019_05_STRICT")]
    Bch2019MayStrict,
    #[serde(rename = "BCH_2019_11")]
    Bch2019Nov,
    #[serde(rename = "BCH_2019_11_STRICT")]
    Bch2019NovStrict,
    #[serde(rename = "BCH_2020_05")]
    Bch2020May,
    #[serde(rename = "BCH_2020_05_STRICT")]
    Bch2020MayStrict,
}

/// Median-time-past at which each upgrade activated.
pub const UPGRADE_2019_05_ACTIVATION_TIME: u32 = 1_557_921_600;
pub const UPGRADE_2019_11_ACTIVATION_TIME: u32 = 1_573_819_200;
pub const UPGRADE_2020_05_ACTIVATION_TIME: u32 = 1_589_544_000;

impl InstructionSetVersion {
    pub const ALL: [InstructionSetVersion; 6] = [
        InstructionSetVersion::Bch2019May,
        InstructionSetVersion::Bch2019MayStrict,
        InstructionSetVersion::Bch2019Nov,
        InstructionSetVersion::Bch2019NovStrict,
        InstructionSetVersion::Bch2020May,
        InstructionSetVersion::Bch2020MayStrict,
    ];

    pub fn identifier(self) -> &'static str {
        match self {
            InstructionSetVersion::Bch2019May => "BCH_2019_05",
            InstructionSetVersion::Bch2019MayStrict => "BCH_2019_05_STRICT",
            InstructionSetVersion::Bch2019Nov => "BCH_2019_11",
            InstructionSetVersion::Bch2019NovStrict => "BCH_2019_11_STRICT",
            InstructionSetVersion::Bch2020May => "BCH_2020_05",
            InstructionSetVersion::Bch2020MayStrict => "BCH_2020_05_STRICT",
        }
    }

    /// The verification flags of this rule set.
    pub fn flags(self) -> ScriptFlags {
        let bits = match self {
            InstructionSetVersion::Bch2019May => VERIFY_NULLFAIL,
            InstructionSetVersion::Bch2019MayStrict => {
                VERIFY_DISALLOW_UPGRADABLE_NOPS | VERIFY_MINIMALDATA | VERIFY_NULLFAIL
            }
            InstructionSetVersion::Bch2019Nov => {
                VERIFY_BUG_VALUE_ZERO | VERIFY_MINIMALDATA | VERIFY_NULLFAIL
            }
            InstructionSetVersion::Bch2019NovStrict => {
                VERIFY_DISALLOW_UPGRADABLE_NOPS
                    | VERIFY_BUG_VALUE_ZERO
                    | VERIFY_MINIMALDATA
                    | VERIFY_NULLFAIL
            }
            InstructionSetVersion::Bch2020May => VERIFY_REVERSEBYTES | VERIFY_NULLFAIL,
            InstructionSetVersion::Bch2020MayStrict => SUPPORTED_FLAGS,
        };
        ScriptFlags(bits)
    }

    pub fn is_strict(self) -> bool {
        matches!(
            self,
            InstructionSetVersion::Bch2019MayStrict
                | InstructionSetVersion::Bch2019NovStrict
                | InstructionSetVersion::Bch2020MayStrict
        )
    }
}

impl Default for InstructionSetVersion {
    fn default() -> Self {
        InstructionSetVersion::Bch2020May
    }
}

impl fmt::Display for InstructionSetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for InstructionSetVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstructionSetVersion::ALL
            .into_iter()
            .find(|version| version.identifier() == s)
            .ok_or(Error::UnknownInstructionSet)
    }
}

/// Returns the consensus (non-strict) rule set active at `median_time_past`,
/// or `None` before the 2019-05 upgrade.
pub fn activation_time_to_version(median_time_past: u32) -> Option<InstructionSetVersion> {
    if median_time_past >= UPGRADE_2020_05_ACTIVATION_TIME {
        Some(InstructionSetVersion::Bch2020May)
    } else if median_time_past >= UPGRADE_2019_11_ACTIVATION_TIME {
        Some(InstructionSetVersion::Bch2019Nov)
    } else if median_time_past >= UPGRADE_2019_05_ACTIVATION_TIME {
        Some(InstructionSetVersion::Bch2019May)
    } else {
        None
    }
}

fn default_maximum_bytecode_length() -> usize {
    10_000
}

fn default_maximum_stack_item_length() -> usize {
    520
}

fn default_maximum_operation_count() -> usize {
    201
}

fn default_maximum_stack_depth() -> usize {
    1_000
}

fn default_maximum_multisig_public_keys() -> usize {
    20
}

fn default_maximum_script_number_length() -> usize {
    4
}

/// Numeric consensus limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusLimits {
    #[serde(default = "default_maximum_bytecode_length")]
    pub maximum_bytecode_length: usize,
    #[serde(default = "default_maximum_stack_item_length")]
    pub maximum_stack_item_length: usize,
    #[serde(default = "default_maximum_operation_count")]
    pub maximum_operation_count: usize,
    /// Applies to the main and alternate stacks combined.
    #[serde(default = "default_maximum_stack_depth")]
    pub maximum_stack_depth: usize,
    #[serde(default = "default_maximum_multisig_public_keys")]
    pub maximum_multisig_public_keys: usize,
    #[serde(default = "default_maximum_script_number_length")]
    pub maximum_script_number_length: usize,
}

impl Default for ConsensusLimits {
    fn default() -> Self {
        ConsensusLimits {
            maximum_bytecode_length: default_maximum_bytecode_length(),
            maximum_stack_item_length: default_maximum_stack_item_length(),
            maximum_operation_count: default_maximum_operation_count(),
            maximum_stack_depth: default_maximum_stack_depth(),
            maximum_multisig_public_keys: default_maximum_multisig_public_keys(),
            maximum_script_number_length: default_maximum_script_number_length(),
        }
    }
}

/// Complete configuration of an instruction set: its rule version and limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VmConfig {
    #[serde(default)]
    pub version: InstructionSetVersion,
    #[serde(default)]
    pub limits: ConsensusLimits,
}
