//! Builders of the Candy Guard program instructions.
//!
//! Each instruction’s data is its discriminator followed by its arguments (see
//! [`InstructionArgs`]).  The account list is matched by the program
//! positionally so the order of accounts in the generated [`Instruction`]s is
//! significant.

use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;
use solana_program::sysvar;

use crate::codec::composite;
use crate::discriminator::{self, Discriminator, InstructionArgs};
use crate::guards::GuardType;
use crate::state::{CandyGuardData, Label};
use crate::{pda, Result};

type Accounts = Vec<AccountMeta>;


/// Arguments of the `initialize` instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitializeArgs {
    pub data: CandyGuardData,
}

/// Arguments of the `update` instruction.  The new configuration replaces the
/// old one in full.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateArgs {
    pub data: CandyGuardData,
}

/// Arguments of the `mint` instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MintArgs {
    /// Guard-specific arguments, passed to the program as is.
    pub mint_args: Vec<u8>,
    /// Group to mint with; required if the configuration has groups.
    pub label: Option<Label>,
}

/// Arguments of the `route` instruction which forwards data to a single
/// guard (e.g. an allow-list proof).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteArgs {
    pub guard: GuardType,
    pub data: Vec<u8>,
    pub label: Option<Label>,
}

/// Arguments of instructions which take none.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoArgs<const TAG: u8>;

/// Arguments of the `wrap` instruction.
pub type WrapArgs = NoArgs<0>;
/// Arguments of the `unwrap` instruction.
pub type UnwrapArgs = NoArgs<1>;
/// Arguments of the `withdraw` instruction.
pub type WithdrawArgs = NoArgs<2>;

composite!(InitializeArgs { data });
composite!(UpdateArgs { data });
composite!(MintArgs { mint_args, label });
composite!(RouteArgs { guard, data, label });

impl<const TAG: u8> crate::codec::Codec for NoArgs<TAG> {
    fn byte_size(&self) -> usize {
        0
    }

    fn encode(&self, _out: &mut Vec<u8>) {}

    fn decode(_rd: &mut crate::codec::Reader<'_>) -> Result<Self> {
        Ok(Self)
    }
}

macro_rules! args_discriminator {
    ($($ty:ty = $disc:ident;)*) => {$(
        impl InstructionArgs for $ty {
            const DISCRIMINATOR: Discriminator = discriminator::$disc;
        }
    )*}
}

args_discriminator! {
    InitializeArgs = INITIALIZE;
    UpdateArgs = UPDATE;
    MintArgs = MINT;
    RouteArgs = ROUTE;
    WrapArgs = WRAP;
    UnwrapArgs = UNWRAP;
    WithdrawArgs = WITHDRAW;
}


fn build(
    program_id: &Pubkey,
    accounts: Accounts,
    args: &impl InstructionArgs,
) -> Instruction {
    Instruction {
        program_id: *program_id,
        accounts,
        data: args.to_instruction_data(),
    }
}


/// Accounts of the `initialize` instruction.
#[derive(Clone, Copy, Debug)]
pub struct InitializeAccounts {
    /// The candy guard account, derived from `base`.
    pub candy_guard: Pubkey,
    /// Base key; must sign.
    pub base: Pubkey,
    pub authority: Pubkey,
    pub payer: Pubkey,
}

impl InitializeAccounts {
    /// Constructs the accounts deriving the candy guard address from `base`.
    /// Returns the accounts and the bump of the candy guard account.
    pub fn new(
        program_id: &Pubkey,
        base: Pubkey,
        authority: Pubkey,
        payer: Pubkey,
    ) -> Result<(Self, u8)> {
        let (candy_guard, bump) = pda::find_candy_guard(&base, program_id)?;
        Ok((Self { candy_guard, base, authority, payer }, bump))
    }
}

/// Generates the `initialize` instruction which creates the candy guard
/// account with given configuration.
pub fn initialize(
    program_id: &Pubkey,
    accounts: &InitializeAccounts,
    data: CandyGuardData,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(accounts.candy_guard, false),
        AccountMeta::new(accounts.base, true),
        AccountMeta::new_readonly(accounts.authority, false),
        AccountMeta::new(accounts.payer, true),
        AccountMeta::new_readonly(solana_program::system_program::ID, false),
    ];
    build(program_id, accounts, &InitializeArgs { data })
}

/// Generates the `update` instruction which replaces the guard configuration.
pub fn update(
    program_id: &Pubkey,
    candy_guard: Pubkey,
    authority: Pubkey,
    payer: Pubkey,
    data: CandyGuardData,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(candy_guard, false),
        AccountMeta::new_readonly(authority, true),
        AccountMeta::new(payer, true),
        AccountMeta::new_readonly(solana_program::system_program::ID, false),
    ];
    build(program_id, accounts, &UpdateArgs { data })
}


/// Accounts of the `wrap` and `unwrap` instructions.
#[derive(Clone, Copy, Debug)]
pub struct WrapAccounts {
    pub candy_guard: Pubkey,
    /// Authority of the candy guard.
    pub authority: Pubkey,
    pub candy_machine: Pubkey,
    /// Authority of the candy machine.
    pub candy_machine_authority: Pubkey,
    pub candy_machine_program: Pubkey,
}

/// Generates the `wrap` instruction which makes the candy guard the mint
/// authority of the candy machine.
pub fn wrap(program_id: &Pubkey, accounts: &WrapAccounts) -> Instruction {
    let metas = vec![
        AccountMeta::new_readonly(accounts.candy_guard, false),
        AccountMeta::new_readonly(accounts.authority, true),
        AccountMeta::new(accounts.candy_machine, false),
        AccountMeta::new_readonly(accounts.candy_machine_program, false),
        AccountMeta::new_readonly(accounts.candy_machine_authority, true),
    ];
    build(program_id, metas, &WrapArgs::default())
}

/// Generates the `unwrap` instruction which gives the mint authority back to
/// the candy machine authority.
pub fn unwrap(program_id: &Pubkey, accounts: &WrapAccounts) -> Instruction {
    let metas = vec![
        AccountMeta::new_readonly(accounts.candy_guard, false),
        AccountMeta::new_readonly(accounts.authority, true),
        AccountMeta::new(accounts.candy_machine, false),
        AccountMeta::new_readonly(accounts.candy_machine_authority, true),
        AccountMeta::new_readonly(accounts.candy_machine_program, false),
    ];
    build(program_id, metas, &UnwrapArgs::default())
}

/// Generates the `withdraw` instruction which closes the candy guard account
/// sending its lamports to the authority.
pub fn withdraw(
    program_id: &Pubkey,
    candy_guard: Pubkey,
    authority: Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(candy_guard, false),
        AccountMeta::new(authority, true),
    ];
    build(program_id, accounts, &WithdrawArgs::default())
}


/// Collection the candy machine mints into.
#[derive(Clone, Copy, Debug)]
pub struct Collection {
    pub mint: Pubkey,
    pub update_authority: Pubkey,
}

/// Accounts of the `mint` instruction.
#[derive(Clone, Copy, Debug)]
pub struct MintAccounts {
    pub candy_guard: Pubkey,
    pub candy_machine_program: Pubkey,
    pub candy_machine: Pubkey,
    pub candy_machine_authority_pda: Pubkey,
    pub payer: Pubkey,
    pub nft_metadata: Pubkey,
    pub nft_mint: Pubkey,
    pub nft_mint_authority: Pubkey,
    pub nft_master_edition: Pubkey,
    pub collection_authority_record: Pubkey,
    pub collection_mint: Pubkey,
    pub collection_metadata: Pubkey,
    pub collection_master_edition: Pubkey,
    pub collection_update_authority: Pubkey,
    pub token_metadata_program: Pubkey,
    pub token_program: Pubkey,
}

impl MintAccounts {
    /// Works out all the accounts from the handful which identify the mint.
    ///
    /// `payer` pays for the mint and is the authority of the freshly created
    /// `nft_mint`.
    pub fn new(
        candy_guard: Pubkey,
        candy_machine: Pubkey,
        payer: Pubkey,
        nft_mint: Pubkey,
        collection: &Collection,
    ) -> Result<Self> {
        let authority_pda = pda::find_candy_machine_authority(&candy_machine)?;
        Ok(Self {
            candy_guard,
            candy_machine_program: crate::CANDY_MACHINE_PROGRAM_ID,
            candy_machine,
            candy_machine_authority_pda: authority_pda,
            payer,
            nft_metadata: pda::find_metadata(&nft_mint)?,
            nft_mint,
            nft_mint_authority: payer,
            nft_master_edition: pda::find_master_edition(&nft_mint)?,
            collection_authority_record: pda::find_collection_authority_record(
                &collection.mint,
                &authority_pda,
            )?,
            collection_mint: collection.mint,
            collection_metadata: pda::find_metadata(&collection.mint)?,
            collection_master_edition: pda::find_master_edition(
                &collection.mint,
            )?,
            collection_update_authority: collection.update_authority,
            token_metadata_program: crate::TOKEN_METADATA_PROGRAM_ID,
            token_program: crate::token::TOKEN_PROGRAM_ID,
        })
    }
}

/// Generates the `mint` instruction.
///
/// `remaining` are the accounts required by the enabled guards (see
/// [`crate::guards::GuardSet::mint_accounts`]); they follow the fixed accounts
/// in given order.
pub fn mint(
    program_id: &Pubkey,
    accounts: &MintAccounts,
    args: MintArgs,
    remaining: impl IntoIterator<Item = AccountMeta>,
) -> Instruction {
    let mut metas = vec![
        AccountMeta::new_readonly(accounts.candy_guard, false),
        AccountMeta::new_readonly(accounts.candy_machine_program, false),
        AccountMeta::new(accounts.candy_machine, false),
        AccountMeta::new(accounts.candy_machine_authority_pda, false),
        AccountMeta::new(accounts.payer, true),
        AccountMeta::new(accounts.nft_metadata, false),
        AccountMeta::new(accounts.nft_mint, false),
        AccountMeta::new_readonly(accounts.nft_mint_authority, true),
        AccountMeta::new(accounts.nft_master_edition, false),
        AccountMeta::new_readonly(accounts.collection_authority_record, false),
        AccountMeta::new_readonly(accounts.collection_mint, false),
        AccountMeta::new(accounts.collection_metadata, false),
        AccountMeta::new_readonly(accounts.collection_master_edition, false),
        AccountMeta::new_readonly(accounts.collection_update_authority, false),
        AccountMeta::new_readonly(accounts.token_metadata_program, false),
        AccountMeta::new_readonly(accounts.token_program, false),
        AccountMeta::new_readonly(solana_program::system_program::ID, false),
        AccountMeta::new_readonly(sysvar::slot_hashes::ID, false),
        AccountMeta::new_readonly(sysvar::instructions::ID, false),
    ];
    metas.extend(remaining);
    build(program_id, metas, &args)
}

/// Generates the `route` instruction.
///
/// `extra` are the accounts required by the targeted guard, e.g. the proof
/// account and the system program for the allow list.
pub fn route(
    program_id: &Pubkey,
    candy_guard: Pubkey,
    candy_machine: Pubkey,
    payer: Pubkey,
    args: RouteArgs,
    extra: impl IntoIterator<Item = AccountMeta>,
) -> Instruction {
    let mut accounts = vec![
        AccountMeta::new_readonly(candy_guard, false),
        AccountMeta::new(candy_machine, false),
        AccountMeta::new(payer, true),
    ];
    accounts.extend(extra);
    build(program_id, accounts, &args)
}

/// Generates the `route` instruction validating an allow-list proof for
/// `payer`.
///
/// On success the program records the validation in the proof account which
/// the `mint` instruction then checks.
pub fn route_allow_list_proof(
    program_id: &Pubkey,
    candy_guard: Pubkey,
    candy_machine: Pubkey,
    payer: Pubkey,
    merkle_root: &[u8; 32],
    proof: Vec<[u8; 32]>,
    label: Option<Label>,
) -> Result<Instruction> {
    let (proof_pda, _) = pda::find_allow_list_proof(
        merkle_root,
        &payer,
        &candy_guard,
        &candy_machine,
        program_id,
    )?;
    let args = RouteArgs {
        guard: GuardType::AllowList,
        data: crate::codec::to_vec(&proof),
        label,
    };
    Ok(route(program_id, candy_guard, candy_machine, payer, args, [
        AccountMeta::new(proof_pda, false),
        AccountMeta::new_readonly(solana_program::system_program::ID, false),
    ]))
}
