use solana_program::pubkey::Pubkey;

use crate::discriminator::Discriminator;
use crate::transaction::Stage;

pub type Result<T = (), E = Error> = core::result::Result<T, E>;


/// Errors reported by the library.
///
/// Codec errors (`BufferUnderrun`, `MalformedOptionTag` and friends) abort the
/// decoding immediately; no partially decoded value is ever returned.
/// `TransactionRejected` is an expected outcome rather than a local bug and
/// carries whatever the program reported.
#[derive(Debug, derive_more::Display, derive_more::From)]
pub enum Error {
    #[display(
        "buffer underrun at offset {offset}: {needed} bytes needed, \
         {available} available"
    )]
    BufferUnderrun { offset: usize, needed: usize, available: usize },

    #[display("malformed option tag {tag} at offset {offset}")]
    MalformedOptionTag { offset: usize, tag: u8 },

    #[display("invalid boolean {value} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[display("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[display("{consumed} bytes decoded but buffer holds {len}")]
    TrailingBytes { consumed: usize, len: usize },

    #[display("wrong account kind: expected {expected}, got {actual}")]
    WrongAccountKind { expected: Discriminator, actual: Discriminator },

    #[display("wrong instruction kind: expected {expected}, got {actual}")]
    WrongInstructionKind { expected: Discriminator, actual: Discriminator },

    #[display("invalid guard type {_0}")]
    InvalidGuardType(u8),

    #[display("group label is {len} bytes long, at most {max} allowed")]
    LabelExceededLength { len: usize, max: usize },

    #[display("group label must be non-empty and must not contain NUL bytes")]
    InvalidLabel,

    #[display("duplicate group label {_0:?}")]
    DuplicateGroupLabel(String),

    #[display("group not found")]
    GroupNotFound,

    #[display("missing required group label")]
    RequiredGroupLabelNotFound,

    #[display("no valid program address for given seeds")]
    AddressDerivationFailed,

    #[display("account {_0} not found")]
    NotFound(Pubkey),

    #[display("cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: Stage, to: Stage },

    #[display("{_0}")]
    #[from]
    TransactionRejected(Rejection),

    #[display("{_0}")]
    #[from]
    Signer(solana_sdk::signer::SignerError),

    #[display("{_0}")]
    #[from]
    Program(solana_program::program_error::ProgramError),

    /// Failure of the transport used to reach the ledger.
    #[display("{_0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Signer(err) => Some(err),
            Self::Program(err) => Some(err),
            Self::Transport(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}


/// Broad reason for which the program rejected a transaction.
///
/// Lets callers branch on what went wrong (e.g. show ‘minting has not started
/// yet’ rather than a raw log dump).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum RejectionCategory {
    #[display("mint is not live")]
    MintNotLive,
    #[display("bot tax charged")]
    BotTax,
    #[display("mint ended")]
    AfterEndDate,
    #[display("not enough SOL")]
    NotEnoughSol,
    #[display("not enough tokens")]
    NotEnoughTokens,
    #[display("missing required signature")]
    MissingRequiredSignature,
    #[display("address not in allow list")]
    AddressNotFoundInAllowedList,
    #[display("mint limit reached")]
    AllowedMintLimitReached,
    #[display("maximum redeemed amount reached")]
    MaximumRedeemedAmount,
    #[display("address not authorised")]
    AddressNotAuthorized,
    #[display("group selection failed")]
    GroupSelection,
    #[display("other")]
    Other,
}

/// Offset of the program’s custom error codes.
const CUSTOM_ERROR_OFFSET: u32 = 6000;

impl RejectionCategory {
    /// Classifies a custom program error code.
    ///
    /// Codes are assigned in declaration order of the program’s error enum
    /// starting at 6000.
    pub fn from_code(code: u32) -> Self {
        match code.checked_sub(CUSTOM_ERROR_OFFSET) {
            Some(8) | Some(9) | Some(10) => Self::GroupSelection,
            Some(16) => Self::BotTax,
            Some(17) => Self::MintNotLive,
            Some(18) => Self::NotEnoughSol,
            Some(20) => Self::NotEnoughTokens,
            Some(22) => Self::MissingRequiredSignature,
            Some(24) => Self::AfterEndDate,
            Some(26) => Self::AddressNotFoundInAllowedList,
            Some(29) => Self::AllowedMintLimitReached,
            Some(32) => Self::MaximumRedeemedAmount,
            Some(33) => Self::AddressNotAuthorized,
            _ => Self::Other,
        }
    }

    /// Classifies a single program log line; returns `None` if the line
    /// carries no recognisable guard message.
    pub fn from_log(line: &str) -> Option<Self> {
        const PATTERNS: [(&str, RejectionCategory); 10] = [
            ("mint is not live", RejectionCategory::MintNotLive),
            ("botting", RejectionCategory::BotTax),
            ("after the set end date", RejectionCategory::AfterEndDate),
            ("not enough sol", RejectionCategory::NotEnoughSol),
            ("not enough tokens", RejectionCategory::NotEnoughTokens),
            (
                "signature was required",
                RejectionCategory::MissingRequiredSignature,
            ),
            (
                "not found on the allowed list",
                RejectionCategory::AddressNotFoundInAllowedList,
            ),
            (
                "maximum number of allowed mints",
                RejectionCategory::AllowedMintLimitReached,
            ),
            (
                "redemeed items is at the set maximum",
                RejectionCategory::MaximumRedeemedAmount,
            ),
            ("address not authorized", RejectionCategory::AddressNotAuthorized),
        ];
        let line = line.to_ascii_lowercase();
        PATTERNS
            .iter()
            .find(|(pattern, _)| line.contains(pattern))
            .map(|(_, category)| *category)
    }
}


/// Details of a transaction rejected by the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rejection {
    /// Index of the failing instruction within the group, if known.
    pub instruction: Option<u8>,
    /// Custom program error code, if the failure carried one.
    pub code: Option<u32>,
    /// Program log messages, verbatim.
    pub logs: Vec<String>,
}

impl Rejection {
    /// Constructs a rejection from program logs alone.
    pub fn from_logs(logs: Vec<String>) -> Self {
        Self { instruction: None, code: None, logs }
    }

    /// Returns the primary reason of the rejection.
    ///
    /// The custom error code takes precedence; otherwise the first recognised
    /// log message decides.
    pub fn category(&self) -> RejectionCategory {
        if let Some(code) = self.code {
            let category = RejectionCategory::from_code(code);
            if category != RejectionCategory::Other {
                return category;
            }
        }
        self.categories()
            .first()
            .copied()
            .unwrap_or(RejectionCategory::Other)
    }

    /// Returns every distinct category mentioned by the program, in the order
    /// they appear.
    ///
    /// Guards are checked independently so a single rejection may cite more
    /// than one condition (e.g. both ‘not live’ and ‘bot tax’).
    pub fn categories(&self) -> Vec<RejectionCategory> {
        let mut categories = Vec::new();
        let from_code = self.code.map(RejectionCategory::from_code);
        let from_logs = self
            .logs
            .iter()
            .filter_map(|line| RejectionCategory::from_log(line));
        for category in from_code.into_iter().chain(from_logs) {
            if category != RejectionCategory::Other &&
                !categories.contains(&category)
            {
                categories.push(category);
            }
        }
        categories
    }

    /// Returns whether the program reported given category.
    pub fn has(&self, category: RejectionCategory) -> bool {
        self.categories().contains(&category)
    }
}

impl core::fmt::Display for Rejection {
    fn fmt(&self, fmtr: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(fmtr, "transaction rejected: {}", self.category())?;
        if let Some(index) = self.instruction {
            write!(fmtr, " (instruction #{index})")?;
        }
        if let Some(code) = self.code {
            write!(fmtr, " [code {code}]")?;
        }
        Ok(())
    }
}
