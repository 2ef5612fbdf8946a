//! Assembling instructions into atomic groups and driving the
//! deploy-and-mint flow.
//!
//! An [`InstructionGroup`] is submitted as a single transaction so either all
//! of its instructions apply or none do.  Instructions execute in the order
//! they were pushed; the group never reorders them.
//!
//! [`MintFlow`] walks the stages of setting up a candy guard and minting
//! through it:
//!
//! ```text
//! Uninitialized → AccountCreated → Initialized → Wrapped
//!               → ReadyToMint → Minted
//! ```
//!
//! Each step submits one group.  If the ledger rejects it the flow stays where
//! it was and the error is returned to the caller; nothing is retried.

use solana_program::instruction::Instruction;
use solana_program::pubkey::Pubkey;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;

use crate::discriminator::AccountKind;
use crate::guards::MintContext;
use crate::instruction::{
    self, Collection, InitializeAccounts, MintAccounts, MintArgs, WrapAccounts,
};
use crate::state::{CandyGuard, CandyGuardData, Label};
use crate::{token, Error, Rejection, RejectionCategory, Result};


/// Ordered list of instructions executed atomically.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstructionGroup {
    instructions: Vec<Instruction>,
}

impl InstructionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends instruction at the end of the group.
    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns keys which must sign the group, in order of first appearance.
    pub fn signers(&self) -> Vec<Pubkey> {
        let mut signers = Vec::new();
        let metas = self.instructions.iter().flat_map(|ix| ix.accounts.iter());
        for meta in metas.filter(|meta| meta.is_signer) {
            if !signers.contains(&meta.pubkey) {
                signers.push(meta.pubkey);
            }
        }
        signers
    }

    /// Compiles the group into a message paid for by `payer`.
    pub fn message(&self, payer: &Pubkey, blockhash: &Hash) -> Message {
        Message::new_with_blockhash(&self.instructions, Some(payer), blockhash)
    }

    /// Builds and signs the transaction.
    ///
    /// `payer` always signs.  Of the remaining `signers`, those the group
    /// doesn’t require are skipped.  Fails if a required signature is missing.
    pub fn sign(
        &self,
        payer: &Keypair,
        signers: &[&Keypair],
        blockhash: Hash,
    ) -> Result<Transaction> {
        let message = self.message(&payer.pubkey(), &blockhash);
        let required = usize::from(message.header.num_required_signatures);
        let required = &message.account_keys[..required];
        let mut keypairs: Vec<&Keypair> = vec![payer];
        for signer in signers {
            let key = signer.pubkey();
            if required.contains(&key) &&
                !keypairs.iter().any(|kp| kp.pubkey() == key)
            {
                keypairs.push(*signer);
            }
        }
        let mut tx = Transaction::new_unsigned(message);
        tx.try_sign(keypairs.as_slice(), blockhash)?;
        Ok(tx)
    }
}

impl Extend<Instruction> for InstructionGroup {
    fn extend<I: IntoIterator<Item = Instruction>>(&mut self, iter: I) {
        self.instructions.extend(iter)
    }
}

impl FromIterator<Instruction> for InstructionGroup {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Self { instructions: iter.into_iter().collect() }
    }
}


/// Outcome of a successfully confirmed group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: Signature,
    /// Program log messages emitted while executing the group.
    pub logs: Vec<String>,
}

/// Services of the ledger the client talks to.
///
/// Submission suspends until the ledger confirms or rejects the group.
/// Rejections are reported as [`Error::TransactionRejected`].
#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Signs and submits the group as one transaction paid for by `payer`.
    async fn submit(
        &self,
        group: &InstructionGroup,
        payer: &Keypair,
        signers: &[&Keypair],
    ) -> Result<Confirmation>;

    /// Returns data of given account or `None` if it doesn’t exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    /// Returns minimum balance making an account of given size rent exempt.
    async fn minimum_balance(&self, size: usize) -> Result<u64>;
}

/// Reads and decodes account of kind `A`.
///
/// Returns [`Error::NotFound`] if there’s no such account and
/// [`Error::WrongAccountKind`] if it holds something else.
pub async fn fetch<A: AccountKind>(
    ledger: &impl Ledger,
    address: &Pubkey,
) -> Result<A> {
    let data = ledger
        .account_data(address)
        .await?
        .ok_or(Error::NotFound(*address))?;
    A::from_account_data(&data).map(|(account, _)| account)
}


/// Stage of the deploy-and-mint flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Uninitialized,
    AccountCreated,
    Initialized,
    Wrapped,
    ReadyToMint,
    Minted,
}

impl Stage {
    /// Returns the stage following this one.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::AccountCreated),
            Self::AccountCreated => Some(Self::Initialized),
            Self::Initialized => Some(Self::Wrapped),
            Self::Wrapped => Some(Self::ReadyToMint),
            Self::ReadyToMint => Some(Self::Minted),
            Self::Minted => None,
        }
    }
}


/// Deploys a candy guard over a candy machine and mints through it.
///
/// `authority` pays for the setup and is the authority of both the candy
/// guard and the candy machine.
pub struct MintFlow<'a, L> {
    ledger: &'a L,
    program_id: Pubkey,
    authority: &'a Keypair,
    candy_machine: Pubkey,
    collection: Collection,
    candy_guard: Option<Pubkey>,
    nft_mint: Option<Pubkey>,
    stage: Stage,
}

impl<'a, L: Ledger> MintFlow<'a, L> {
    pub fn new(
        ledger: &'a L,
        authority: &'a Keypair,
        candy_machine: Pubkey,
        collection: Collection,
    ) -> Self {
        Self {
            ledger,
            program_id: crate::PROGRAM_ID,
            authority,
            candy_machine,
            collection,
            candy_guard: None,
            nft_mint: None,
            stage: Stage::Uninitialized,
        }
    }

    /// Picks up a candy guard which already wraps the candy machine.
    pub fn attach(
        ledger: &'a L,
        authority: &'a Keypair,
        candy_machine: Pubkey,
        collection: Collection,
        candy_guard: Pubkey,
    ) -> Self {
        Self {
            candy_guard: Some(candy_guard),
            stage: Stage::Wrapped,
            ..Self::new(ledger, authority, candy_machine, collection)
        }
    }

    /// Uses a different deployment of the guard program.
    pub fn with_program_id(mut self, program_id: Pubkey) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn candy_guard(&self) -> Option<Pubkey> {
        self.candy_guard
    }

    pub fn nft_mint(&self) -> Option<Pubkey> {
        self.nft_mint
    }

    /// Submits the group creating the accounts the guard will operate on
    /// (typically the candy machine).  An empty group only records that the
    /// accounts exist.
    pub async fn create_accounts(
        &mut self,
        group: InstructionGroup,
        signers: &[&Keypair],
    ) -> Result<Option<Confirmation>> {
        self.check(Stage::AccountCreated)?;
        let confirmation = if group.is_empty() {
            None
        } else {
            Some(self.submit(&group, self.authority, signers).await?)
        };
        self.advance(Stage::AccountCreated);
        Ok(confirmation)
    }

    /// Creates the candy guard account with given configuration.
    pub async fn initialize(
        &mut self,
        data: CandyGuardData,
    ) -> Result<Confirmation> {
        self.check(Stage::Initialized)?;
        let base = Keypair::new();
        let authority = self.authority.pubkey();
        let (accounts, _) = InitializeAccounts::new(
            &self.program_id,
            base.pubkey(),
            authority,
            authority,
        )?;
        let group: InstructionGroup =
            [instruction::initialize(&self.program_id, &accounts, data)]
                .into_iter()
                .collect();
        let confirmation = self.submit(&group, self.authority, &[&base]).await?;
        self.candy_guard = Some(accounts.candy_guard);
        self.advance(Stage::Initialized);
        Ok(confirmation)
    }

    /// Makes the candy guard the mint authority of the candy machine.
    pub async fn wrap(&mut self) -> Result<Confirmation> {
        self.check(Stage::Wrapped)?;
        let authority = self.authority.pubkey();
        let accounts = WrapAccounts {
            candy_guard: self.require_candy_guard(Stage::Wrapped)?,
            authority,
            candy_machine: self.candy_machine,
            candy_machine_authority: authority,
            candy_machine_program: crate::CANDY_MACHINE_PROGRAM_ID,
        };
        let group: InstructionGroup =
            [instruction::wrap(&self.program_id, &accounts)]
                .into_iter()
                .collect();
        let confirmation = self.submit(&group, self.authority, &[]).await?;
        self.advance(Stage::Wrapped);
        Ok(confirmation)
    }

    /// Replaces the guard configuration.  Doesn’t change the stage.
    pub async fn update(
        &mut self,
        data: CandyGuardData,
    ) -> Result<Confirmation> {
        let candy_guard = self.require_candy_guard(Stage::Initialized)?;
        let authority = self.authority.pubkey();
        let group: InstructionGroup = [instruction::update(
            &self.program_id,
            candy_guard,
            authority,
            authority,
            data,
        )]
        .into_iter()
        .collect();
        self.submit(&group, self.authority, &[]).await
    }

    /// Creates a fresh NFT mint owned by `minter` with one token in
    /// `minter`’s associated token account.
    pub async fn prepare_mint(
        &mut self,
        minter: &Keypair,
        nft_mint: &Keypair,
    ) -> Result<Confirmation> {
        self.check(Stage::ReadyToMint)?;
        let owner = minter.pubkey();
        let mint = nft_mint.pubkey();
        let lamports = self.ledger.minimum_balance(token::MINT_SIZE).await?;
        let (create_ata, ata) = token::create_associated_token_account(
            &owner, &owner, &mint, false,
        );

        let mut group = InstructionGroup::new();
        group
            .push(token::create_mint_account(&owner, &mint, lamports))
            .push(token::initialize_mint(&mint, 0, &owner, Some(&owner))?)
            .push(create_ata)
            .push(token::mint_to(&mint, &ata, &owner, 1)?);
        let confirmation = self.submit(&group, minter, &[nft_mint]).await?;
        self.nft_mint = Some(mint);
        self.advance(Stage::ReadyToMint);
        Ok(confirmation)
    }

    /// Mints the prepared NFT through the guard.
    ///
    /// `label` selects the group whose guards apply; it must be given if and
    /// only if the configuration has groups.  `mint_args` are passed to the
    /// guards as is and `signers` are any extra signatures they require.
    ///
    /// The bot tax guard doesn’t fail the transaction; it charges the minter
    /// and logs the offence instead.  Such mints are reported as
    /// [`Error::TransactionRejected`] too and the flow stays where it was.
    pub async fn mint(
        &mut self,
        minter: &Keypair,
        label: Option<&str>,
        mint_args: Vec<u8>,
        signers: &[&Keypair],
    ) -> Result<Confirmation> {
        self.check(Stage::Minted)?;
        let candy_guard = self.require_candy_guard(Stage::Minted)?;
        let nft_mint = self.nft_mint.ok_or(Error::InvalidTransition {
            from: self.stage,
            to: Stage::Minted,
        })?;
        let payer = minter.pubkey();

        let account: CandyGuard = fetch(self.ledger, &candy_guard).await?;
        let guards = account.data.active_set(label)?;
        let remaining = guards.mint_accounts(&MintContext {
            program_id: self.program_id,
            payer,
            candy_guard,
            candy_machine: self.candy_machine,
        })?;
        log::debug!("mint requires {} guard accounts", remaining.len());

        let accounts = MintAccounts::new(
            candy_guard,
            self.candy_machine,
            payer,
            nft_mint,
            &self.collection,
        )?;
        let args = MintArgs {
            mint_args,
            label: label.map(Label::new).transpose()?,
        };
        let group: InstructionGroup =
            [instruction::mint(&self.program_id, &accounts, args, remaining)]
                .into_iter()
                .collect();
        let confirmation = self.submit(&group, minter, signers).await?;

        let rejection = Rejection::from_logs(confirmation.logs.clone());
        if rejection.has(RejectionCategory::BotTax) {
            log::warn!("bot tax charged for {payer}: {rejection}");
            return Err(rejection.into());
        }
        self.advance(Stage::Minted);
        Ok(confirmation)
    }

    fn check(&self, to: Stage) -> Result {
        if self.stage.next() == Some(to) {
            Ok(())
        } else {
            Err(Error::InvalidTransition { from: self.stage, to })
        }
    }

    fn advance(&mut self, to: Stage) {
        log::info!("{:?} → {to:?}", self.stage);
        self.stage = to;
    }

    fn require_candy_guard(&self, to: Stage) -> Result<Pubkey> {
        self.candy_guard
            .ok_or(Error::InvalidTransition { from: self.stage, to })
    }

    async fn submit(
        &self,
        group: &InstructionGroup,
        payer: &Keypair,
        signers: &[&Keypair],
    ) -> Result<Confirmation> {
        log::debug!(
            "submitting {} instructions paid by {}",
            group.len(),
            payer.pubkey()
        );
        match self.ledger.submit(group, payer, signers).await {
            Ok(confirmation) => {
                log::debug!("confirmed {}", confirmation.signature);
                Ok(confirmation)
            }
            Err(Error::TransactionRejected(rejection)) => {
                log::warn!("{rejection}");
                Err(rejection.into())
            }
            Err(err) => Err(err),
        }
    }
}
