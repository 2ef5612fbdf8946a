//! Guard records and the guard set.
//!
//! A [`GuardSet`] is a fixed table of [`GUARD_COUNT`] optional slots, one per
//! [`GuardType`].  On the wire each slot is a presence byte optionally
//! followed by the guard’s record; slots are always written in
//! [`GuardType::ALL`] order.  That order is part of the wire format: new guards
//! may only ever be appended.
//!
//! The table is declared once with the `guard_table!` macro below which
//! generates the [`GuardType`] and [`Guard`] enums, the typed accessors on
//! [`GuardSet`] and the dispatch between a slot and its record’s codec.

use solana_program::instruction::AccountMeta;
use solana_program::pubkey::Pubkey;

use crate::codec::{self, composite, Codec, Reader};
use crate::{pda, token, Error, Result};


/// Number of guard slots in a guard set.
pub const GUARD_COUNT: usize = 16;


/// Last instruction check and bot tax (penalty for invalid transactions).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BotTax {
    pub lamports: u64,
    /// Whether the mint must be the last instruction of the transaction.
    pub last_instruction: bool,
}

/// Sets the price of the mint in lamports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolPayment {
    pub lamports: u64,
    pub destination: Pubkey,
}

/// Sets the price of the mint in an SPL token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenPayment {
    pub amount: u64,
    pub mint: Pubkey,
    pub destination_ata: Pubkey,
}

/// Controls when minting is allowed to start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StartDate {
    /// Unix timestamp.
    pub date: i64,
}

/// Requires an extra signer on the transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThirdPartySigner {
    pub signer_key: Pubkey,
}

/// Restricts minting to holders of a given token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenGate {
    pub amount: u64,
    pub mint: Pubkey,
}

/// Requires a valid gateway token (captcha challenge).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Gatekeeper {
    pub gatekeeper_network: Pubkey,
    pub expire_on_use: bool,
}

/// Stops minting after given date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EndDate {
    /// Unix timestamp.
    pub date: i64,
}

/// Restricts minting to addresses in a Merkle tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllowList {
    pub merkle_root: [u8; 32],
}

/// Limits number of mints per wallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MintLimit {
    /// Identifier of the counter; part of the counter account’s address.
    pub id: u8,
    pub limit: u16,
}

/// Charges an NFT from a given collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NftPayment {
    pub required_collection: Pubkey,
    pub destination: Pubkey,
}

/// Limits overall number of items minted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RedeemedAmount {
    pub maximum: u64,
}

/// Restricts minting to a single address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressGate {
    pub address: Pubkey,
}

/// Restricts minting to holders of an NFT from a given collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NftGate {
    pub required_collection: Pubkey,
}

/// Burns an NFT from a given collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NftBurn {
    pub required_collection: Pubkey,
}

/// Burns given amount of an SPL token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenBurn {
    pub amount: u64,
    pub mint: Pubkey,
}

composite!(BotTax { lamports, last_instruction });
composite!(SolPayment { lamports, destination });
composite!(TokenPayment { amount, mint, destination_ata });
composite!(StartDate { date });
composite!(ThirdPartySigner { signer_key });
composite!(TokenGate { amount, mint });
composite!(Gatekeeper { gatekeeper_network, expire_on_use });
composite!(EndDate { date });
composite!(AllowList { merkle_root });
composite!(MintLimit { id, limit });
composite!(NftPayment { required_collection, destination });
composite!(RedeemedAmount { maximum });
composite!(AddressGate { address });
composite!(NftGate { required_collection });
composite!(NftBurn { required_collection });
composite!(TokenBurn { amount, mint });


impl AllowList {
    /// Builds the guard from the list of allowed addresses.
    pub fn from_addresses(addresses: &[Pubkey]) -> Self {
        let leaves: Vec<_> = addresses.iter().map(Self::leaf).collect();
        Self { merkle_root: merkle::root(leaves) }
    }

    /// Returns the Merkle leaf for given address.
    ///
    /// The leaf is the Keccak hash of the base58 representation of the
    /// address.
    pub fn leaf(address: &Pubkey) -> [u8; 32] {
        solana_program::keccak::hashv(&[address.to_string().as_bytes()]).0
    }

    /// Returns proof that `address` is part of the list.  `addresses` must be
    /// the list the guard was built from.  Returns `None` if the address is
    /// not in the list.
    pub fn proof(
        addresses: &[Pubkey],
        address: &Pubkey,
    ) -> Option<Vec<[u8; 32]>> {
        let index = addresses.iter().position(|addr| addr == address)?;
        let leaves = addresses.iter().map(Self::leaf).collect();
        Some(merkle::proof(leaves, index))
    }

    /// Checks that `proof` proves membership of `address`.
    ///
    /// The same check is done by the program when the proof is routed to it;
    /// checking locally first avoids paying for a transaction bound to fail.
    pub fn verify(&self, proof: &[[u8; 32]], address: &Pubkey) -> bool {
        let leaf = Self::leaf(address);
        let root =
            proof.iter().fold(leaf, |hash, node| merkle::pair(&hash, node));
        root == self.merkle_root
    }
}

mod merkle {
    /// Hashes a pair of nodes; pairs are sorted before hashing.
    pub(super) fn pair(lhs: &[u8; 32], rhs: &[u8; 32]) -> [u8; 32] {
        let (lo, hi) = if lhs <= rhs { (lhs, rhs) } else { (rhs, lhs) };
        solana_program::keccak::hashv(&[lo.as_slice(), hi.as_slice()]).0
    }

    fn next_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
        level
            .chunks(2)
            .map(|chunk| match chunk {
                [lhs, rhs] => pair(lhs, rhs),
                _ => chunk[0],
            })
            .collect()
    }

    pub(super) fn root(mut level: Vec<[u8; 32]>) -> [u8; 32] {
        if level.is_empty() {
            return [0; 32];
        }
        while level.len() > 1 {
            level = next_level(&level);
        }
        level[0]
    }

    pub(super) fn proof(
        mut level: Vec<[u8; 32]>,
        mut index: usize,
    ) -> Vec<[u8; 32]> {
        let mut proof = Vec::new();
        while level.len() > 1 {
            if let Some(sibling) = level.get(index ^ 1) {
                proof.push(*sibling);
            }
            level = next_level(&level);
            index /= 2;
        }
        proof
    }
}


macro_rules! guard_table {
    ($(
        $(#[$meta:meta])*
        $variant:ident($record:ident) as $name:ident;
    )*) => {
        /// Kind of a guard; its discriminant is the slot’s index in a guard
        /// set.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum GuardType {
            $($variant,)*
        }

        impl GuardType {
            /// All guard types in wire order.
            pub const ALL: [GuardType; GUARD_COUNT] = [$(Self::$variant,)*];

            /// Returns snake-case name of the guard.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($name),)*
                }
            }

            /// Returns the slot index of the guard.
            pub const fn index(self) -> usize {
                self as usize
            }
        }

        /// A single configured guard.
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub enum Guard {
            $($(#[$meta])* $variant($record),)*
        }

        impl Guard {
            pub const fn guard_type(&self) -> GuardType {
                match self {
                    $(Self::$variant(_) => GuardType::$variant,)*
                }
            }

            fn payload_size(&self) -> usize {
                match self {
                    $(Self::$variant(record) => record.byte_size(),)*
                }
            }

            fn encode_payload(&self, out: &mut Vec<u8>) {
                match self {
                    $(Self::$variant(record) => record.encode(out),)*
                }
            }

            fn decode_payload(
                kind: GuardType,
                rd: &mut Reader<'_>,
            ) -> Result<Self> {
                Ok(match kind {
                    $(
                        GuardType::$variant => {
                            Self::$variant($record::decode(rd)?)
                        }
                    )*
                })
            }
        }

        $(
            impl From<$record> for Guard {
                fn from(record: $record) -> Self {
                    Self::$variant(record)
                }
            }
        )*

        impl GuardSet {
            $(
                $(#[$meta])*
                pub fn $name(&self) -> Option<&$record> {
                    match self.get(GuardType::$variant) {
                        Some(Guard::$variant(record)) => Some(record),
                        _ => None,
                    }
                }
            )*
        }
    };
}

guard_table! {
    /// Bot tax guard.
    BotTax(BotTax) as bot_tax;
    /// SOL payment guard.
    SolPayment(SolPayment) as sol_payment;
    /// Token payment guard.
    TokenPayment(TokenPayment) as token_payment;
    /// Start date guard.
    StartDate(StartDate) as start_date;
    /// Third party signer guard.
    ThirdPartySigner(ThirdPartySigner) as third_party_signer;
    /// Token gate guard.
    TokenGate(TokenGate) as token_gate;
    /// Gatekeeper guard.
    Gatekeeper(Gatekeeper) as gatekeeper;
    /// End date guard.
    EndDate(EndDate) as end_date;
    /// Allow list guard.
    AllowList(AllowList) as allow_list;
    /// Mint limit guard.
    MintLimit(MintLimit) as mint_limit;
    /// NFT payment guard.
    NftPayment(NftPayment) as nft_payment;
    /// Redeemed amount guard.
    RedeemedAmount(RedeemedAmount) as redeemed_amount;
    /// Address gate guard.
    AddressGate(AddressGate) as address_gate;
    /// NFT gate guard.
    NftGate(NftGate) as nft_gate;
    /// NFT burn guard.
    NftBurn(NftBurn) as nft_burn;
    /// Token burn guard.
    TokenBurn(TokenBurn) as token_burn;
}

impl GuardType {
    /// Looks up guard type by its snake-case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl TryFrom<u8> for GuardType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(Error::InvalidGuardType(value))
    }
}

impl Codec for GuardType {
    fn byte_size(&self) -> usize {
        1
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(*self as u8)
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        Self::try_from(rd.byte()?)
    }
}


/// Set of guards, each of which may be present or absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardSet {
    slots: [Option<Guard>; GUARD_COUNT],
}

impl GuardSet {
    /// Returns an empty guard set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds guard to the set, replacing one of the same type if present.
    pub fn with(mut self, guard: impl Into<Guard>) -> Self {
        self.insert(guard);
        self
    }

    /// Adds guard to the set; returns previous guard of the same type.
    pub fn insert(&mut self, guard: impl Into<Guard>) -> Option<Guard> {
        let guard = guard.into();
        self.slots[guard.guard_type().index()].replace(guard)
    }

    pub fn remove(&mut self, kind: GuardType) -> Option<Guard> {
        self.slots[kind.index()].take()
    }

    pub fn get(&self, kind: GuardType) -> Option<&Guard> {
        self.slots[kind.index()].as_ref()
    }

    pub fn contains(&self, kind: GuardType) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Returns whether no guard is enabled.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Iterates over enabled guards in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &Guard> + '_ {
        self.slots.iter().flatten()
    }

    /// Overlays `other` on top of this set: every guard enabled in `other`
    /// replaces the one in `self`; guards absent in `other` are kept.
    pub fn merge(&mut self, other: &GuardSet) {
        for guard in other.iter() {
            self.insert(guard.clone());
        }
    }

    /// Returns accounts the enabled guards expect to follow the mint
    /// instruction’s fixed accounts, in the order the program reads them.
    ///
    /// Only accounts which can be worked out from the guard configuration are
    /// included.  Gatekeeper and the NFT guards need accounts chosen by the
    /// minter (the gateway token or the NFT to use) which the caller must
    /// append itself.
    pub fn mint_accounts(&self, ctx: &MintContext) -> Result<Vec<AccountMeta>> {
        let mut accounts = Vec::new();
        for guard in self.iter() {
            match guard {
                Guard::SolPayment(guard) => {
                    accounts.push(AccountMeta::new(guard.destination, false));
                }
                Guard::TokenPayment(guard) => {
                    let source = token::associated_token_address(
                        &ctx.payer,
                        &guard.mint,
                    );
                    let destination = guard.destination_ata;
                    accounts.push(AccountMeta::new(source, false));
                    accounts.push(AccountMeta::new(destination, false));
                }
                Guard::ThirdPartySigner(guard) => {
                    let signer = guard.signer_key;
                    accounts.push(AccountMeta::new_readonly(signer, true));
                }
                Guard::TokenGate(guard) => {
                    let ata = token::associated_token_address(
                        &ctx.payer,
                        &guard.mint,
                    );
                    accounts.push(AccountMeta::new_readonly(ata, false));
                }
                Guard::AllowList(guard) => {
                    let (proof, _) = pda::find_allow_list_proof(
                        &guard.merkle_root,
                        &ctx.payer,
                        &ctx.candy_guard,
                        &ctx.candy_machine,
                        &ctx.program_id,
                    )?;
                    accounts.push(AccountMeta::new_readonly(proof, false));
                }
                Guard::MintLimit(guard) => {
                    let (counter, _) = pda::find_mint_counter(
                        guard.id,
                        &ctx.payer,
                        &ctx.candy_guard,
                        &ctx.candy_machine,
                        &ctx.program_id,
                    )?;
                    accounts.push(AccountMeta::new(counter, false));
                }
                Guard::TokenBurn(guard) => {
                    let ata = token::associated_token_address(
                        &ctx.payer,
                        &guard.mint,
                    );
                    accounts.push(AccountMeta::new(ata, false));
                    accounts.push(AccountMeta::new(guard.mint, false));
                }
                _ => (),
            }
        }
        Ok(accounts)
    }
}

/// Addresses a mint attempt is made with; used to work out accounts required
/// by the guards.
#[derive(Clone, Copy, Debug)]
pub struct MintContext {
    pub program_id: Pubkey,
    pub payer: Pubkey,
    pub candy_guard: Pubkey,
    pub candy_machine: Pubkey,
}

impl Codec for GuardSet {
    fn byte_size(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| 1 + slot.as_ref().map_or(0, Guard::payload_size))
            .sum()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        for slot in self.slots.iter() {
            codec::encode_option(slot.as_ref(), out, Guard::encode_payload);
        }
    }

    fn decode(rd: &mut Reader<'_>) -> Result<Self> {
        let mut set = Self::default();
        for kind in GuardType::ALL {
            set.slots[kind.index()] =
                codec::decode_option(rd, |rd| Guard::decode_payload(kind, rd))?;
        }
        Ok(set)
    }
}


#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::codec::{from_slice, to_vec};

    /// Returns one sample guard of every type, in wire order.
    pub(crate) fn sample_guards() -> Vec<Guard> {
        let key = |n: u8| Pubkey::new_from_array([n; 32]);
        vec![
            BotTax { lamports: 1_000_000_000, last_instruction: true }.into(),
            SolPayment { lamports: 5, destination: key(1) }.into(),
            TokenPayment { amount: 6, mint: key(2), destination_ata: key(3) }
                .into(),
            StartDate { date: 1_662_479_807 }.into(),
            ThirdPartySigner { signer_key: key(4) }.into(),
            TokenGate { amount: 7, mint: key(5) }.into(),
            Gatekeeper { gatekeeper_network: key(6), expire_on_use: true }
                .into(),
            EndDate { date: -1 }.into(),
            AllowList { merkle_root: [9; 32] }.into(),
            MintLimit { id: 3, limit: 500 }.into(),
            NftPayment { required_collection: key(7), destination: key(8) }
                .into(),
            RedeemedAmount { maximum: 10 }.into(),
            AddressGate { address: key(9) }.into(),
            NftGate { required_collection: key(10) }.into(),
            NftBurn { required_collection: key(11) }.into(),
            TokenBurn { amount: 12, mint: key(12) }.into(),
        ]
    }

    pub(crate) fn full_set() -> GuardSet {
        sample_guards().into_iter().fold(GuardSet::new(), GuardSet::with)
    }

    #[test]
    fn test_table_order() {
        for (index, kind) in GuardType::ALL.into_iter().enumerate() {
            assert_eq!(index, kind.index());
            let decoded = GuardType::try_from(index as u8).map_err(|_| ());
            assert_eq!(Ok(kind), decoded);
            assert_eq!(Some(kind), GuardType::from_name(kind.name()));
        }
        for (guard, kind) in sample_guards().iter().zip(GuardType::ALL) {
            assert_eq!(kind, guard.guard_type());
        }
        assert_eq!("bot_tax", GuardType::BotTax.name());
        assert_eq!("token_burn", GuardType::TokenBurn.name());
        assert!(matches!(
            GuardType::try_from(16),
            Err(Error::InvalidGuardType(16))
        ));
    }

    #[test]
    fn test_empty_set() {
        let set = GuardSet::new();
        assert!(set.is_empty());
        assert_eq!(GUARD_COUNT, set.byte_size());
        let bytes = to_vec(&set);
        assert_eq!(vec![0u8; GUARD_COUNT], bytes);
        assert_eq!((set, GUARD_COUNT), from_slice(&bytes).unwrap());
    }

    #[test]
    fn test_full_set_round_trip() {
        let set = full_set();
        assert_eq!(GUARD_COUNT, set.iter().count());
        let bytes = to_vec(&set);
        assert_eq!(set.byte_size(), bytes.len());
        let (decoded, consumed) = from_slice::<GuardSet>(&bytes).unwrap();
        assert_eq!(bytes.len(), consumed);
        assert_eq!(set, decoded);
    }

    #[test]
    fn test_every_subset_round_trips() {
        let guards = sample_guards();
        // Walk a spread of subsets rather than all 65536 of them.
        for mask in (0u32..1 << GUARD_COUNT).step_by(97).chain([0xffff]) {
            let set = guards
                .iter()
                .enumerate()
                .filter(|(index, _)| mask & (1 << index) != 0)
                .fold(GuardSet::new(), |set, (_, guard)| {
                    set.with(guard.clone())
                });
            let bytes = to_vec(&set);
            assert_eq!(set.byte_size(), bytes.len(), "mask {mask:#06x}");
            assert_eq!(
                (set, bytes.len()),
                from_slice(&bytes).unwrap(),
                "mask {mask:#06x}"
            );
        }
    }

    #[test]
    fn test_size_monotonicity() {
        let full = full_set();
        for guard in sample_guards() {
            let mut without = full.clone();
            without.remove(guard.guard_type());
            assert_eq!(
                full.byte_size(),
                without.byte_size() + guard.payload_size(),
            );
            let alone = GuardSet::new().with(guard.clone());
            assert_eq!(
                GUARD_COUNT + guard.payload_size(),
                alone.byte_size(),
                "{}",
                guard.guard_type().name()
            );
        }
    }

    #[test]
    fn test_wire_layout() {
        let set = GuardSet::new()
            .with(StartDate { date: 0x0102 })
            .with(MintLimit { id: 7, limit: 0x0304 });
        let mut expected = vec![0u8; 3];
        expected.extend([1, 2, 1, 0, 0, 0, 0, 0, 0]); // start_date
        expected.extend([0; 5]);
        expected.extend([1, 7, 4, 3]); // mint_limit
        expected.extend([0; 6]);
        assert_eq!(expected, to_vec(&set));
        assert_eq!(Some(&StartDate { date: 0x0102 }), set.start_date());
        assert_eq!(None, set.end_date());
    }

    #[test]
    fn test_malformed_slot() {
        let mut bytes = to_vec(&GuardSet::new().with(StartDate { date: 1 }));
        bytes[0] = 2;
        assert!(matches!(
            from_slice::<GuardSet>(&bytes),
            Err(Error::MalformedOptionTag { offset: 0, tag: 2 })
        ));

        let bytes = to_vec(&GuardSet::new().with(StartDate { date: 1 }));
        assert!(matches!(
            from_slice::<GuardSet>(&bytes[..10]),
            Err(Error::BufferUnderrun { offset: 4, .. })
        ));
    }

    #[test]
    fn test_merge() {
        let mut base = GuardSet::new()
            .with(StartDate { date: 1 })
            .with(BotTax { lamports: 1, last_instruction: false });
        let group = GuardSet::new()
            .with(StartDate { date: 2 })
            .with(EndDate { date: 3 });
        base.merge(&group);
        assert_eq!(Some(&StartDate { date: 2 }), base.start_date());
        assert_eq!(Some(&EndDate { date: 3 }), base.end_date());
        assert!(base.contains(GuardType::BotTax));
    }

    #[test]
    fn test_allow_list() {
        let addresses: Vec<_> = (0..5).map(|_| Pubkey::new_unique()).collect();
        let guard = AllowList::from_addresses(&addresses);
        for address in &addresses {
            let proof = AllowList::proof(&addresses, address).unwrap();
            assert!(guard.verify(&proof, address));
        }
        let stranger = Pubkey::new_unique();
        assert_eq!(None, AllowList::proof(&addresses, &stranger));
        let proof = AllowList::proof(&addresses, &addresses[0]).unwrap();
        assert!(!guard.verify(&proof, &stranger));
    }

    #[test]
    fn test_mint_accounts() {
        let ctx = MintContext {
            program_id: crate::PROGRAM_ID,
            payer: Pubkey::new_unique(),
            candy_guard: Pubkey::new_unique(),
            candy_machine: Pubkey::new_unique(),
        };
        let destination = Pubkey::new_unique();
        let signer = Pubkey::new_unique();
        let set = GuardSet::new()
            .with(StartDate { date: 0 })
            .with(ThirdPartySigner { signer_key: signer })
            .with(SolPayment { lamports: 1, destination })
            .with(MintLimit { id: 1, limit: 1 });
        let accounts = set.mint_accounts(&ctx).unwrap();
        let (counter, _) = pda::find_mint_counter(
            1,
            &ctx.payer,
            &ctx.candy_guard,
            &ctx.candy_machine,
            &ctx.program_id,
        )
        .unwrap();
        assert_eq!(
            vec![
                AccountMeta::new(destination, false),
                AccountMeta::new_readonly(signer, true),
                AccountMeta::new(counter, false),
            ],
            accounts
        );
    }
}
