//! Program derived addresses used by the guard and the programs it calls.
//!
//! Derivation is a pure function of the seeds and the program id so nothing is
//! cached; callers who derive the same address repeatedly may keep the result
//! themselves.

use solana_program::pubkey::Pubkey;

use crate::{Error, Result};

/// Seed of the candy guard account.
pub const CANDY_GUARD_SEED: &[u8] = b"candy_guard";

/// Seed of the allow-list proof account.
pub const ALLOW_LIST_SEED: &[u8] = b"allow_list";

/// Seed of the mint-limit counter account.
pub const MINT_LIMIT_SEED: &[u8] = b"mint_limit";


/// Finds program address for given seeds and its bump.
///
/// Returns [`Error::AddressDerivationFailed`] if no bump yields a valid
/// address (or seeds are too long).  Retrying with different seeds is up to
/// the caller.
pub fn derive(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8)> {
    Pubkey::try_find_program_address(seeds, program_id)
        .ok_or(Error::AddressDerivationFailed)
}

/// Creates program address from seeds and a known bump.
///
/// This is the hook for callers which store the bump (as the candy guard
/// account does) and want to skip the search.
pub fn create_address(
    seeds: &[&[u8]],
    bump: u8,
    program_id: &Pubkey,
) -> Result<Pubkey> {
    let bump = [bump];
    let seeds: Vec<&[u8]> =
        seeds.iter().copied().chain(core::iter::once(&bump[..])).collect();
    Pubkey::create_program_address(&seeds, program_id)
        .map_err(|_| Error::AddressDerivationFailed)
}


/// Finds the candy guard account for given base key.
pub fn find_candy_guard(
    base: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8)> {
    derive(&[CANDY_GUARD_SEED, base.as_ref()], program_id)
}

/// Finds the account recording that `user` proved membership of the allow
/// list with given Merkle root.
pub fn find_allow_list_proof(
    merkle_root: &[u8; 32],
    user: &Pubkey,
    candy_guard: &Pubkey,
    candy_machine: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8)> {
    derive(
        &[
            ALLOW_LIST_SEED,
            &merkle_root[..],
            user.as_ref(),
            candy_guard.as_ref(),
            candy_machine.as_ref(),
        ],
        program_id,
    )
}

/// Finds the account counting mints of `user` for mint limit guard with
/// given `id`.
pub fn find_mint_counter(
    id: u8,
    user: &Pubkey,
    candy_guard: &Pubkey,
    candy_machine: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8)> {
    derive(
        &[
            MINT_LIMIT_SEED,
            &[id],
            user.as_ref(),
            candy_guard.as_ref(),
            candy_machine.as_ref(),
        ],
        program_id,
    )
}

/// Finds the metadata account of given mint.
pub fn find_metadata(mint: &Pubkey) -> Result<Pubkey> {
    let program = crate::TOKEN_METADATA_PROGRAM_ID;
    derive(&[b"metadata", program.as_ref(), mint.as_ref()], &program)
        .map(|(address, _)| address)
}

/// Finds the master edition account of given mint.
pub fn find_master_edition(mint: &Pubkey) -> Result<Pubkey> {
    let program = crate::TOKEN_METADATA_PROGRAM_ID;
    derive(
        &[b"metadata", program.as_ref(), mint.as_ref(), b"edition"],
        &program,
    )
    .map(|(address, _)| address)
}

/// Finds the collection authority record delegating collection `mint` to
/// `authority`.
pub fn find_collection_authority_record(
    mint: &Pubkey,
    authority: &Pubkey,
) -> Result<Pubkey> {
    let program = crate::TOKEN_METADATA_PROGRAM_ID;
    derive(
        &[
            b"metadata",
            program.as_ref(),
            mint.as_ref(),
            b"collection_authority",
            authority.as_ref(),
        ],
        &program,
    )
    .map(|(address, _)| address)
}

/// Finds the candy machine’s authority PDA, the update authority it uses when
/// minting.
pub fn find_candy_machine_authority(candy_machine: &Pubkey) -> Result<Pubkey> {
    derive(
        &[b"candy_machine", candy_machine.as_ref()],
        &crate::CANDY_MACHINE_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}
