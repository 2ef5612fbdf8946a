//! 8-byte tags identifying account and instruction kinds.
//!
//! Every account kind and every instruction of the program starts its data
//! with a discriminator: the first eight bytes of SHA-256 of `account:<Name>`
//! or `global:<name>` respectively.  The values are fixed when the program’s
//! interface is defined, so they are spelled out as constants here rather than
//! hashed at run time.

use crate::codec::{self, Codec, Reader};
use crate::{Error, Result};


/// Tag at the start of account or instruction data.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Discriminator(pub [u8; 8]);

impl Discriminator {
    /// Reads discriminator from the front of `data`.
    pub fn of(data: &[u8]) -> Result<Self> {
        Reader::new(data).array().map(Self)
    }

    /// Looks up the name of the account or instruction kind with this
    /// discriminator.
    pub fn kind(&self) -> Option<&'static str> {
        KNOWN
            .iter()
            .find(|(_, disc)| disc == self)
            .map(|(name, _)| *name)
    }
}

impl core::fmt::Display for Discriminator {
    fn fmt(&self, fmtr: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(fmtr, "{:?}", self.0)?;
        if let Some(name) = self.kind() {
            write!(fmtr, " ({name})")?;
        }
        Ok(())
    }
}

impl core::fmt::Debug for Discriminator {
    fn fmt(&self, fmtr: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(self, fmtr)
    }
}


pub const CANDY_GUARD: Discriminator =
    Discriminator([44, 207, 199, 184, 112, 103, 34, 181]);
pub const ALLOW_LIST_PROOF: Discriminator =
    Discriminator([19, 122, 207, 114, 207, 43, 233, 148]);
pub const MINT_COUNTER: Discriminator =
    Discriminator([29, 59, 15, 69, 46, 22, 227, 173]);
pub const INITIALIZE: Discriminator =
    Discriminator([175, 175, 109, 31, 13, 152, 155, 237]);
pub const UPDATE: Discriminator =
    Discriminator([219, 200, 88, 176, 158, 63, 253, 127]);
pub const WRAP: Discriminator =
    Discriminator([178, 40, 10, 189, 228, 129, 186, 140]);
pub const UNWRAP: Discriminator =
    Discriminator([126, 175, 198, 14, 212, 69, 50, 44]);
pub const MINT: Discriminator =
    Discriminator([51, 57, 225, 47, 182, 146, 137, 166]);
pub const ROUTE: Discriminator =
    Discriminator([229, 23, 203, 151, 122, 227, 173, 42]);
pub const WITHDRAW: Discriminator =
    Discriminator([183, 18, 70, 156, 148, 109, 161, 34]);

/// Discriminators of all known kinds, keyed by name.
pub static KNOWN: [(&str, Discriminator); 10] = [
    ("account:CandyGuard", CANDY_GUARD),
    ("account:AllowListProof", ALLOW_LIST_PROOF),
    ("account:MintCounter", MINT_COUNTER),
    ("global:initialize", INITIALIZE),
    ("global:update", UPDATE),
    ("global:wrap", WRAP),
    ("global:unwrap", UNWRAP),
    ("global:mint", MINT),
    ("global:route", ROUTE),
    ("global:withdraw", WITHDRAW),
];


/// Kind of a program-owned account.
///
/// Account data is the discriminator followed by the account’s body.  Reading
/// fails closed: if the discriminator doesn’t match [`Self::DISCRIMINATOR`] the
/// body is never looked at.
pub trait AccountKind: Sized {
    const DISCRIMINATOR: Discriminator;

    /// Returns size of the body, excluding the discriminator.
    fn body_size(&self) -> usize;

    fn encode_body(&self, out: &mut Vec<u8>);

    fn decode_body(rd: &mut Reader<'_>) -> Result<Self>;

    /// Returns size of the account data.
    fn account_size(&self) -> usize {
        8 + self.body_size()
    }

    /// Serialises the account data, discriminator included.
    fn to_account_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.account_size());
        out.extend_from_slice(&Self::DISCRIMINATOR.0);
        self.encode_body(&mut out);
        out
    }

    /// Deserialises account data.
    ///
    /// Returns the account and the number of bytes it took.  Accounts are
    /// often allocated larger than their contents so trailing bytes are
    /// permitted.
    fn from_account_data(data: &[u8]) -> Result<(Self, usize)> {
        let mut rd = Reader::new(data);
        let actual = rd.array().map(Discriminator)?;
        if actual != Self::DISCRIMINATOR {
            return Err(Error::WrongAccountKind {
                expected: Self::DISCRIMINATOR,
                actual,
            });
        }
        let account = Self::decode_body(&mut rd)?;
        Ok((account, rd.offset()))
    }
}


/// Arguments of a program instruction.
///
/// Instruction data is the discriminator followed by the arguments.
pub trait InstructionArgs: Codec {
    const DISCRIMINATOR: Discriminator;

    /// Serialises instruction data, discriminator included.
    fn to_instruction_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.byte_size());
        out.extend_from_slice(&Self::DISCRIMINATOR.0);
        self.encode(&mut out);
        out
    }

    /// Deserialises instruction data.  The data must be consumed in full.
    fn from_instruction_data(data: &[u8]) -> Result<Self> {
        let actual = Discriminator::of(data)?;
        if actual != Self::DISCRIMINATOR {
            return Err(Error::WrongInstructionKind {
                expected: Self::DISCRIMINATOR,
                actual,
            });
        }
        codec::from_slice_exact(&data[8..])
    }
}
