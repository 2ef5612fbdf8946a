//! [`Ledger`] over the Solana JSON RPC.

use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::{RpcError, RpcResponseErrorData};
use solana_program::pubkey::Pubkey;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::InstructionError;
use solana_sdk::signer::keypair::Keypair;
use solana_sdk::transaction::TransactionError;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::UiTransactionEncoding;

use crate::transaction::{Confirmation, InstructionGroup, Ledger};
use crate::{Error, Rejection, Result};


/// Ledger reached through an RPC node.
pub struct RpcLedger {
    client: RpcClient,
}

impl RpcLedger {
    /// Connects to node at given URL using `confirmed` commitment.
    pub fn new(url: impl ToString) -> Self {
        Self::from_client(RpcClient::new_with_commitment(
            url.to_string(),
            CommitmentConfig::confirmed(),
        ))
    }

    pub fn from_client(client: RpcClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }
}

impl Ledger for RpcLedger {
    async fn submit(
        &self,
        group: &InstructionGroup,
        payer: &Keypair,
        signers: &[&Keypair],
    ) -> Result<Confirmation> {
        let blockhash =
            self.client.get_latest_blockhash().await.map_err(transport)?;
        log::debug!("latest blockhash: {blockhash}");
        let tx = group.sign(payer, signers, blockhash)?;

        let signature = self
            .client
            .send_and_confirm_transaction(&tx)
            .await
            .map_err(rejection)?;
        log::debug!("signature: {signature}");

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Binary),
            commitment: Some(self.client.commitment()),
            max_supported_transaction_version: Some(0),
        };
        let resp = self
            .client
            .get_transaction_with_config(&signature, config)
            .await
            .map_err(transport)?;
        log::debug!("executed in slot {}", resp.slot);

        let logs = resp
            .transaction
            .meta
            .map(|meta| meta.log_messages)
            .and_then(|logs| match logs {
                OptionSerializer::Some(logs) => Some(logs),
                _ => None,
            })
            .unwrap_or_default();
        Ok(Confirmation { signature, logs })
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let resp = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map_err(transport)?;
        Ok(resp.value.map(|account| account.data))
    }

    async fn minimum_balance(&self, size: usize) -> Result<u64> {
        self.client
            .get_minimum_balance_for_rent_exemption(size)
            .await
            .map_err(transport)
    }
}


fn transport(err: ClientError) -> Error {
    Error::Transport(Box::new(err))
}

/// Converts submission error into [`Error::TransactionRejected`] if the
/// transaction reached the program.  Other failures are transport errors.
fn rejection(err: ClientError) -> Error {
    let tx_err = match err.get_transaction_error() {
        Some(tx_err) => tx_err,
        None => return transport(err),
    };
    let (instruction, code) = match tx_err {
        TransactionError::InstructionError(
            index,
            InstructionError::Custom(code),
        ) => (Some(index), Some(code)),
        TransactionError::InstructionError(index, _) => (Some(index), None),
        _ => (None, None),
    };
    let logs = match err.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            data: RpcResponseErrorData::SendTransactionPreflightFailure(sim),
            ..
        }) => sim.logs.clone().unwrap_or_default(),
        _ => Vec::new(),
    };
    Rejection { instruction, code, logs }.into()
}


#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use solana_client::rpc_response::RpcSimulateTransactionResult;

    use super::*;
    use crate::RejectionCategory;

    fn preflight_failure(sim: serde_json::Value) -> ClientError {
        let sim: RpcSimulateTransactionResult =
            serde_json::from_value(sim).unwrap();
        ClientError::from(ClientErrorKind::RpcError(
            RpcError::RpcResponseError {
                code: -32002,
                message: "Transaction simulation failed".into(),
                data: RpcResponseErrorData::SendTransactionPreflightFailure(
                    sim,
                ),
            },
        ))
    }

    fn expect_rejection(err: Error) -> Rejection {
        match err {
            Error::TransactionRejected(rejection) => rejection,
            err => panic!("expected rejection, got {err:?}"),
        }
    }

    #[test]
    fn test_custom_error_code() {
        let err = ClientError::from(TransactionError::InstructionError(
            0,
            InstructionError::Custom(6017),
        ));
        let rejection = expect_rejection(rejection(err));
        assert_eq!(Some(0), rejection.instruction);
        assert_eq!(Some(6017), rejection.code);
        assert_eq!(RejectionCategory::MintNotLive, rejection.category());
        assert!(rejection.logs.is_empty());
    }

    #[test]
    fn test_builtin_instruction_error() {
        let err = ClientError::from(TransactionError::InstructionError(
            3,
            InstructionError::MissingRequiredSignature,
        ));
        let rejection = expect_rejection(rejection(err));
        assert_eq!(Some(3), rejection.instruction);
        assert_eq!(None, rejection.code);
        assert_eq!(RejectionCategory::Other, rejection.category());
    }

    #[test]
    fn test_preflight_logs() {
        let logs = vec![
            "Program log: AnchorError occurred. Error Code: MintNotLive. \
             Error Number: 6017. Error Message: Mint is not live."
                .to_string(),
            "Program log: Botting".to_string(),
        ];
        let err = preflight_failure(serde_json::json!({
            "err": { "InstructionError": [1, { "Custom": 6017 }] },
            "logs": logs,
        }));
        let rejection = expect_rejection(rejection(err));
        assert_eq!(Some(1), rejection.instruction);
        assert_eq!(Some(6017), rejection.code);
        assert_eq!(logs, rejection.logs);
        assert_eq!(
            vec![RejectionCategory::MintNotLive, RejectionCategory::BotTax],
            rejection.categories()
        );
    }

    #[test]
    fn test_transport_failure() {
        let err = ClientError::from(ClientErrorKind::Custom(
            "connection refused".into(),
        ));
        assert!(matches!(rejection(err), Error::Transport(_)));

        let err = preflight_failure(serde_json::json!({ "err": null }));
        assert!(matches!(rejection(err), Error::Transport(_)));
    }
}
