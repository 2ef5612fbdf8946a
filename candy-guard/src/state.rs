//! Guard configuration and the accounts owned by the program.

use solana_program::pubkey::Pubkey;

use crate::codec::{self, composite, Codec, Reader};
use crate::discriminator::{self, AccountKind, Discriminator};
use crate::guards::GuardSet;
use crate::{Error, Result};

/// Maximum length of a group label in bytes.
pub const MAX_LABEL_SIZE: usize = 6;

/// Offset of the guard configuration within candy guard account data:
/// discriminator, base, bump and authority.
pub const DATA_OFFSET: usize = 8 + 32 + 1 + 32;


/// Label identifying a group of guards.
///
/// A label is 1 to [`MAX_LABEL_SIZE`] bytes of UTF-8 without NUL bytes.  In
/// the account it’s stored in a fixed-width field padded with NULs.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display,
)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if label.len() > MAX_LABEL_SIZE {
            Err(Error::LabelExceededLength {
                len: label.len(),
                max: MAX_LABEL_SIZE,
            })
        } else if label.is_empty() || label.contains('\0') {
            Err(Error::InvalidLabel)
        } else {
            Ok(Self(label))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn encode_fixed(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.0.as_bytes());
        out.resize(out.len() + MAX_LABEL_SIZE - self.0.len(), 0);
    }

    fn decode_fixed(rd: &mut Reader<'_>) -> Result<Self> {
        let offset = rd.offset();
        let bytes = rd.take(MAX_LABEL_SIZE)?;
        let len = bytes.iter().rposition(|&b| b != 0).map_or(0, |pos| pos + 1);
        let label = core::str::from_utf8(&bytes[..len])
            .map_err(|_| Error::InvalidUtf8 { offset })?;
        Self::new(label)
    }
}

impl TryFrom<&str> for Label {
    type Error = Error;
    fn try_from(label: &str) -> Result<Self> {
        Self::new(label)
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Codec for Label {
    fn byte_size(&self) -> usize {
        self.0.byte_size()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        self.0.encode(out)
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        String::decode(rd).and_then(Self::new)
    }
}


/// A named set of guards selected by its label at mint time instead of the
/// default set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub label: Label,
    pub guards: GuardSet,
}

composite!(Group { label, guards });


/// Guard configuration: the default guard set and any number of groups.
///
/// Group labels are unique within a configuration; groups are looked up by
/// label only.
///
/// The configuration has two encodings.  In instruction arguments it uses
/// Borsh layout (see the [`Codec`] implementation) while in the candy guard
/// account it’s stored with fixed-width labels (see [`Self::save`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CandyGuardData {
    pub default: GuardSet,
    groups: Vec<Group>,
}

impl CandyGuardData {
    /// Constructs configuration with no groups.
    pub fn new(default: GuardSet) -> Self {
        Self { default, groups: Vec::new() }
    }

    /// Constructs configuration from the default set and a list of groups.
    pub fn with_groups(
        default: GuardSet,
        groups: impl IntoIterator<Item = Group>,
    ) -> Result<Self> {
        let mut data = Self::new(default);
        for group in groups {
            data.add_group(group.label, group.guards)?;
        }
        Ok(data)
    }

    /// Adds a group; fails if a group with the same label exists.
    pub fn add_group(&mut self, label: Label, guards: GuardSet) -> Result {
        if self.group(label.as_str()).is_some() {
            return Err(Error::DuplicateGroupLabel(label.0));
        }
        self.groups.push(Group { label, guards });
        Ok(())
    }

    /// Removes group with given label and returns its guards.
    pub fn remove_group(&mut self, label: &str) -> Option<GuardSet> {
        let index =
            self.groups.iter().position(|group| group.label.as_str() == label)?;
        Some(self.groups.remove(index).guards)
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Returns guards of group with given label.
    pub fn group(&self, label: &str) -> Option<&GuardSet> {
        self.groups
            .iter()
            .find(|group| group.label.as_str() == label)
            .map(|group| &group.guards)
    }

    /// Returns the guards which apply to a mint made with given group label.
    ///
    /// With no groups the default set applies and no label may be given.
    /// With groups a label is required and the selected group’s guards are
    /// layered over the default set.
    pub fn active_set(&self, label: Option<&str>) -> Result<GuardSet> {
        match (label, self.groups.is_empty()) {
            (None, true) => Ok(self.default.clone()),
            (None, false) => Err(Error::RequiredGroupLabelNotFound),
            (Some(_), true) => Err(Error::GroupNotFound),
            (Some(label), false) => {
                let group = self.group(label).ok_or(Error::GroupNotFound)?;
                let mut set = self.default.clone();
                set.merge(group);
                Ok(set)
            }
        }
    }

    /// Returns size of the configuration as stored in the account.
    pub fn saved_size(&self) -> usize {
        self.default.byte_size() +
            4 +
            self.groups
                .iter()
                .map(|group| MAX_LABEL_SIZE + group.guards.byte_size())
                .sum::<usize>()
    }

    /// Serialises configuration the way it’s stored in the account: the
    /// default set, 4-byte group count and then each group as a fixed-width
    /// label followed by its guard set.
    pub fn save(&self, out: &mut Vec<u8>) {
        self.default.encode(out);
        (self.groups.len() as u32).encode(out);
        for group in self.groups.iter() {
            group.label.encode_fixed(out);
            group.guards.encode(out);
        }
    }

    /// Deserialises configuration stored in the account.
    pub fn load(rd: &mut Reader<'_>) -> Result<Self> {
        let mut data = Self::new(GuardSet::decode(rd)?);
        let count = codec::decode_len(rd)?;
        for _ in 0..count {
            let label = Label::decode_fixed(rd)?;
            let guards = GuardSet::decode(rd)?;
            data.add_group(label, guards)?;
        }
        Ok(data)
    }
}

/// Instruction argument encoding: default set followed by an optional vector
/// of groups.  An empty group list is written as absent.
impl Codec for CandyGuardData {
    fn byte_size(&self) -> usize {
        self.default.byte_size() +
            if self.groups.is_empty() { 1 } else { 1 + self.groups.byte_size() }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        self.default.encode(out);
        let groups = Some(&self.groups).filter(|groups| !groups.is_empty());
        codec::encode_option(groups, out, |groups, out| groups.encode(out));
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        let default = GuardSet::decode(rd)?;
        let groups = Option::<Vec<Group>>::decode(rd)?.unwrap_or_default();
        Self::with_groups(default, groups)
    }
}


/// The candy guard account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandyGuard {
    /// Base key used to derive the account’s address.
    pub base: Pubkey,
    pub bump: u8,
    pub authority: Pubkey,
    pub data: CandyGuardData,
}

impl AccountKind for CandyGuard {
    const DISCRIMINATOR: Discriminator = discriminator::CANDY_GUARD;

    fn body_size(&self) -> usize {
        DATA_OFFSET - 8 + self.data.saved_size()
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        self.base.encode(out);
        self.bump.encode(out);
        self.authority.encode(out);
        self.data.save(out);
    }

    fn decode_body(rd: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            base: Pubkey::decode(rd)?,
            bump: u8::decode(rd)?,
            authority: Pubkey::decode(rd)?,
            data: CandyGuardData::load(rd)?,
        })
    }
}


/// Account recording that a wallet proved it’s on the allow list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllowListProof {
    /// When the proof was validated.
    pub timestamp: i64,
}

/// Per-wallet counter of the mint limit guard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MintCounter {
    pub count: u16,
}

composite!(AllowListProof { timestamp });
composite!(MintCounter { count });

macro_rules! plain_account {
    ($($ty:ident = $disc:ident;)*) => {$(
        impl AccountKind for $ty {
            const DISCRIMINATOR: Discriminator = discriminator::$disc;

            fn body_size(&self) -> usize {
                self.byte_size()
            }

            fn encode_body(&self, out: &mut Vec<u8>) {
                self.encode(out)
            }

            fn decode_body(rd: &mut Reader<'_>) -> Result<Self> {
                Self::decode(rd)
            }
        }
    )*}
}

plain_account! {
    AllowListProof = ALLOW_LIST_PROOF;
    MintCounter = MINT_COUNTER;
}


#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codec::{from_slice, to_vec};
    use crate::guards::test::{full_set, sample_guards};
    use crate::guards::{BotTax, EndDate, StartDate};

    fn label(label: &str) -> Label {
        Label::new(label).unwrap()
    }

    fn sample_data() -> CandyGuardData {
        let default = GuardSet::new()
            .with(BotTax { lamports: 100, last_instruction: true })
            .with(StartDate { date: 10 });
        CandyGuardData::with_groups(default, [
            Group {
                label: label("OG"),
                guards: GuardSet::new().with(StartDate { date: 5 }),
            },
            Group { label: label("public"), guards: full_set() },
            Group { label: label("7"), guards: GuardSet::new() },
        ])
        .unwrap()
    }

    #[test]
    fn test_label() {
        assert_eq!("abcdef", label("abcdef").as_str());
        assert!(matches!(
            Label::new("abcdefg"),
            Err(Error::LabelExceededLength { len: 7, max: 6 })
        ));
        assert!(matches!(Label::new(""), Err(Error::InvalidLabel)));
        assert!(matches!(Label::new("a\0b"), Err(Error::InvalidLabel)));

        let mut out = Vec::new();
        label("OG").encode_fixed(&mut out);
        assert_eq!(vec![b'O', b'G', 0, 0, 0, 0], out);
        let decoded = Label::decode_fixed(&mut Reader::new(&out)).unwrap();
        assert_eq!(label("OG"), decoded);
    }

    #[test]
    fn test_duplicate_group() {
        let mut data = sample_data();
        assert!(matches!(
            data.add_group(label("OG"), GuardSet::new()),
            Err(Error::DuplicateGroupLabel(label)) if label == "OG"
        ));
        assert_eq!(3, data.groups().len());
        assert!(data.remove_group("OG").is_some());
        data.add_group(label("OG"), GuardSet::new()).unwrap();
    }

    #[test]
    fn test_active_set() {
        let data = sample_data();
        assert!(matches!(
            data.active_set(None),
            Err(Error::RequiredGroupLabelNotFound)
        ));
        assert!(matches!(
            data.active_set(Some("nope")),
            Err(Error::GroupNotFound)
        ));

        let set = data.active_set(Some("OG")).unwrap();
        assert_eq!(Some(&StartDate { date: 5 }), set.start_date());
        assert_eq!(
            Some(&BotTax { lamports: 100, last_instruction: true }),
            set.bot_tax()
        );

        let set = data.active_set(Some("7")).unwrap();
        assert_eq!(data.default, set);

        let plain =
            CandyGuardData::new(GuardSet::new().with(EndDate { date: 1 }));
        assert_eq!(plain.default, plain.active_set(None).unwrap());
        assert!(matches!(
            plain.active_set(Some("OG")),
            Err(Error::GroupNotFound)
        ));
    }

    #[test]
    fn test_instruction_encoding() {
        let data = sample_data();
        let bytes = to_vec(&data);
        assert_eq!(data.byte_size(), bytes.len());
        assert_eq!((data, bytes.len()), from_slice(&bytes).unwrap());

        // No groups: default set followed by an absent option.
        let data = CandyGuardData::default();
        assert_eq!([&[0u8; 16][..], &[0]].concat(), to_vec(&data));

        // Present but empty group list decodes the same as absent one.
        let bytes = [&[0u8; 16][..], &[1, 0, 0, 0, 0]].concat();
        assert_eq!((data, bytes.len()), from_slice(&bytes).unwrap());
    }

    #[test]
    fn test_instruction_encoding_layout() {
        let data = CandyGuardData::with_groups(GuardSet::new(), [Group {
            label: label("ab"),
            guards: GuardSet::new(),
        }])
        .unwrap();
        let expected = [
            &[0u8; 16][..],
            &[1, 1, 0, 0, 0],
            &[2, 0, 0, 0, b'a', b'b'],
            &[0; 16],
        ]
        .concat();
        assert_eq!(expected, to_vec(&data));
    }

    #[test]
    fn test_duplicate_labels_rejected_on_decode() {
        let group = Group { label: label("a"), guards: GuardSet::new() };
        let mut bytes = to_vec(&GuardSet::new());
        Some(vec![group.clone(), group]).encode(&mut bytes);
        assert!(matches!(
            from_slice::<CandyGuardData>(&bytes),
            Err(Error::DuplicateGroupLabel(_))
        ));
    }

    #[test]
    fn test_candy_guard_account() {
        let account = CandyGuard {
            base: Pubkey::new_unique(),
            bump: 254,
            authority: Pubkey::new_unique(),
            data: sample_data(),
        };
        let bytes = account.to_account_data();
        assert_eq!(account.account_size(), bytes.len());
        assert_eq!(&CandyGuard::DISCRIMINATOR.0[..], &bytes[..8]);
        assert_eq!(account.base.as_ref(), &bytes[8..40]);
        assert_eq!(254, bytes[40]);
        assert_eq!(
            to_vec(&account.data.default),
            bytes[DATA_OFFSET..DATA_OFFSET + account.data.default.byte_size()]
        );

        let (decoded, consumed) =
            CandyGuard::from_account_data(&bytes).unwrap();
        assert_eq!(bytes.len(), consumed);
        assert_eq!(account, decoded);

        // Accounts may be allocated larger than the data they hold.
        let mut padded = bytes.clone();
        padded.resize(bytes.len() + 100, 0);
        let (decoded, consumed) =
            CandyGuard::from_account_data(&padded).unwrap();
        assert_eq!((account, bytes.len()), (decoded, consumed));
    }

    #[test]
    fn test_account_group_layout() {
        let data = CandyGuardData::with_groups(GuardSet::new(), [Group {
            label: label("ab"),
            guards: GuardSet::new(),
        }])
        .unwrap();
        let mut out = Vec::new();
        data.save(&mut out);
        let expected = [
            &[0u8; 16][..],
            &[1, 0, 0, 0],
            &[b'a', b'b', 0, 0, 0, 0],
            &[0; 16],
        ]
        .concat();
        assert_eq!(expected, out);
        assert_eq!(data.saved_size(), out.len());
        assert_eq!(data, CandyGuardData::load(&mut Reader::new(&out)).unwrap());
    }

    #[test]
    fn test_empty_configuration_account() {
        let account = CandyGuard {
            base: Pubkey::new_unique(),
            bump: 1,
            authority: Pubkey::new_unique(),
            data: CandyGuardData::default(),
        };
        let bytes = account.to_account_data();
        assert_eq!(DATA_OFFSET + 16 + 4, bytes.len());
        assert_eq!(account, CandyGuard::from_account_data(&bytes).unwrap().0);
    }

    #[test]
    fn test_wrong_account_kind() {
        let proof = AllowListProof { timestamp: 1_700_000_000 };
        let bytes = proof.to_account_data();
        assert_eq!(16, bytes.len());
        assert_eq!(
            (proof, 16),
            AllowListProof::from_account_data(&bytes).unwrap()
        );

        // Well-formed guard data behind the wrong tag is still rejected.
        let account = CandyGuard {
            base: Pubkey::new_unique(),
            bump: 1,
            authority: Pubkey::new_unique(),
            data: CandyGuardData::default(),
        };
        let mut bytes = account.to_account_data();
        bytes[..8].copy_from_slice(&AllowListProof::DISCRIMINATOR.0);
        match CandyGuard::from_account_data(&bytes) {
            Err(Error::WrongAccountKind { expected, actual }) => {
                assert_eq!(CandyGuard::DISCRIMINATOR, expected);
                assert_eq!(AllowListProof::DISCRIMINATOR, actual);
            }
            res => panic!("unexpected result: {res:?}"),
        }
        assert!(matches!(
            MintCounter::from_account_data(&bytes),
            Err(Error::WrongAccountKind { .. })
        ));
    }

    #[test]
    fn test_truncated_account() {
        let account = CandyGuard {
            base: Pubkey::new_unique(),
            bump: 1,
            authority: Pubkey::new_unique(),
            data: CandyGuardData::new(full_set()),
        };
        let bytes = account.to_account_data();
        for len in [0, 7, 8, DATA_OFFSET, bytes.len() - 1] {
            assert!(
                matches!(
                    CandyGuard::from_account_data(&bytes[..len]),
                    Err(Error::BufferUnderrun { .. })
                ),
                "len {len}"
            );
        }
    }

    #[test]
    fn test_every_guard_alone_in_group() {
        for guard in sample_guards() {
            let name = guard.guard_type().name();
            let data = CandyGuardData::with_groups(GuardSet::new(), [Group {
                label: label(&name[..name.len().min(MAX_LABEL_SIZE)]),
                guards: GuardSet::new().with(guard),
            }])
            .unwrap();
            let mut out = Vec::new();
            data.save(&mut out);
            let loaded = CandyGuardData::load(&mut Reader::new(&out));
            assert_eq!(data, loaded.unwrap());
            let bytes = to_vec(&data);
            assert_eq!((data, bytes.len()), from_slice(&bytes).unwrap());
        }
    }
}
