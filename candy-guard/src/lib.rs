// candy-guard-client — client library for the Candy Guard program
// © 2025 by the candy-guard-client authors
//
// This program is free software; you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation; either version 2 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program; if not, see <https://www.gnu.org/licenses/>.

//! Client library for the Candy Guard Solana program.
//!
//! The Candy Guard program gates minting from a candy machine behind a set of
//! independently optional conditions called guards (payment, start and end
//! dates, allow lists, bot tax and so on).  The program itself enforces the
//! guards; this library is concerned with everything on the client side of
//! the wire:
//!
//! - encoding and decoding guard configurations ([`codec`], [`guards`],
//!   [`state`]),
//! - recognising account and instruction kinds by their 8-byte discriminator
//!   ([`discriminator`]),
//! - building the program’s instructions ([`instruction`]) and deriving the
//!   program addresses they reference ([`pda`]),
//! - assembling ordered instruction groups and driving the deploy-and-mint
//!   flow against a [`transaction::Ledger`] ([`transaction`]).
//!
//! The `Ledger` trait is implemented over the non-blocking Solana RPC client in
//! the [`rpc`] module (when built with the `rpc` feature).
//!
//! # Features
#![doc = document_features::document_features!()]

pub mod codec;
pub mod discriminator;
mod error;
pub mod guards;
pub mod instruction;
pub mod pda;
#[cfg(feature = "rpc")]
pub mod rpc;
pub mod state;
pub mod token;
pub mod transaction;

pub use error::{Error, Rejection, RejectionCategory, Result};

/// Address of the Candy Guard program.
pub const PROGRAM_ID: solana_program::pubkey::Pubkey =
    solana_program::pubkey!("Guard1JwRhJkVH6XZhzoYxeBVQe872VH6QggF4BWmS9g");

/// Address of the Candy Machine Core program wrapped by the guard.
pub const CANDY_MACHINE_PROGRAM_ID: solana_program::pubkey::Pubkey =
    solana_program::pubkey!("CndyV3LdqHUfDLmE5naZjVN8rBZz4tqhdefbAnjHG3JR");

/// Address of the Token Metadata program.
pub const TOKEN_METADATA_PROGRAM_ID: solana_program::pubkey::Pubkey =
    solana_program::pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");
