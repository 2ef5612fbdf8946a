//! The few SPL Token and Associated Token Account instructions needed to
//! prepare a fresh NFT mint.

use solana_program::instruction::Instruction;
use solana_program::program_pack::Pack;
use solana_program::pubkey::Pubkey;

use crate::Result;

pub use spl_associated_token_account::ID as ASSOCIATED_TOKEN_PROGRAM_ID;
pub use spl_token::ID as TOKEN_PROGRAM_ID;

/// Size of an SPL Token mint account.
pub const MINT_SIZE: usize = spl_token::state::Mint::LEN;

/// Returns the associated token account of `wallet` for `mint`.
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}

/// Generates instruction creating an account owned by the Token program large
/// enough to hold a mint.  `lamports` should cover rent exemption.
pub fn create_mint_account(
    payer: &Pubkey,
    mint: &Pubkey,
    lamports: u64,
) -> Instruction {
    solana_system_interface::instruction::create_account(
        payer,
        mint,
        lamports,
        MINT_SIZE as u64,
        &TOKEN_PROGRAM_ID,
    )
}

/// Generates the `InitializeMint2` instruction.
pub fn initialize_mint(
    mint: &Pubkey,
    decimals: u8,
    authority: &Pubkey,
    freeze_authority: Option<&Pubkey>,
) -> Result<Instruction> {
    let instruction = spl_token::instruction::initialize_mint2(
        &TOKEN_PROGRAM_ID,
        mint,
        authority,
        freeze_authority,
        decimals,
    )?;
    Ok(instruction)
}

/// Generates the `MintTo` instruction.
pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: u64,
) -> Result<Instruction> {
    let instruction = spl_token::instruction::mint_to(
        &TOKEN_PROGRAM_ID,
        mint,
        destination,
        authority,
        &[],
        amount,
    )?;
    Ok(instruction)
}

/// Generates instruction creating the associated token account of `wallet`
/// for `mint`.  Returns the instruction and the account’s address.
///
/// With `idempotent` set, the instruction succeeds if the account exists.
pub fn create_associated_token_account(
    payer: &Pubkey,
    wallet: &Pubkey,
    mint: &Pubkey,
    idempotent: bool,
) -> (Instruction, Pubkey) {
    use spl_associated_token_account::instruction as ata;

    let create = if idempotent {
        ata::create_associated_token_account_idempotent
    } else {
        ata::create_associated_token_account
    };
    let instruction = create(payer, wallet, mint, &TOKEN_PROGRAM_ID);
    (instruction, associated_token_address(wallet, mint))
}
