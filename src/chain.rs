use crate::view_state::ContractSnapshot;
use alloy::{
    network::{
        EthereumWallet,
        ReceiptResponse as _,
    },
    primitives::{
        Address,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    signers::local::PrivateKeySigner,
    sol,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::future::Future;
use thiserror::Error;
use url::Url;

sol! {
    #[sol(rpc)]
    contract LuckyMoney {
        function owner() external view returns (address);
        function balance() external view returns (uint256);
        function num() external view returns (uint256);

        function initOwner(address newOwner) external;
        function reset() external;
        function createLuckyMoney(uint256 count, uint256 amount) external payable;
        function giveOutMoney(address to) external;

        event LuckyMoneyDistributed(address indexed to, uint256 amount);
    }
}

/// State-mutating contract calls the client can submit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ContractCall {
    InitOwner { owner: Address },
    Reset,
    /// `value` attached to the transaction always equals `amount`.
    CreateLuckyMoney { count: U256, amount: U256 },
    GiveOutMoney { recipient: Address },
}

impl ContractCall {
    pub fn kind(&self) -> TxKind {
        match self {
            ContractCall::InitOwner { .. } => TxKind::InitOwner,
            ContractCall::Reset => TxKind::Reset,
            ContractCall::CreateLuckyMoney { .. } => TxKind::CreatePacket,
            ContractCall::GiveOutMoney { .. } => TxKind::Grab,
        }
    }

    pub fn value(&self) -> U256 {
        match self {
            ContractCall::CreateLuckyMoney { amount, .. } => *amount,
            _ => U256::ZERO,
        }
    }

    pub fn function_name(&self) -> &'static str {
        match self {
            ContractCall::InitOwner { .. } => "initOwner",
            ContractCall::Reset => "reset",
            ContractCall::CreateLuckyMoney { .. } => "createLuckyMoney",
            ContractCall::GiveOutMoney { .. } => "giveOutMoney",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TxKind {
    InitOwner,
    CreatePacket,
    Grab,
    Reset,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TxOutcome {
    Pending,
    Confirmed { block: u64 },
    Failed { reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The signer declined. Callers treat this as a no-op.
    #[error("submission rejected: {0}")]
    Rejected(String),
    #[error("no wallet connected")]
    NoWallet,
    #[error("another transaction from this panel is still pending")]
    Busy,
    #[error("call reverted: {0}")]
    Reverted(String),
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ChainField {
    Owner,
    Balance,
    RemainingCount,
    NativeBalance,
}

impl ChainField {
    pub const ALL: [ChainField; 4] = [
        ChainField::Owner,
        ChainField::Balance,
        ChainField::RemainingCount,
        ChainField::NativeBalance,
    ];
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainReading {
    Owner(Address),
    Balance(U256),
    RemainingCount(U256),
    NativeBalance(U256),
}

impl ChainReading {
    pub fn field(&self) -> ChainField {
        match self {
            ChainReading::Owner(_) => ChainField::Owner,
            ChainReading::Balance(_) => ChainField::Balance,
            ChainReading::RemainingCount(_) => ChainField::RemainingCount,
            ChainReading::NativeBalance(_) => ChainField::NativeBalance,
        }
    }
}

/// Last known value of every polled field. A failed read never clears a slot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChainCache {
    pub owner: Option<Address>,
    pub balance: Option<U256>,
    pub remaining_count: Option<U256>,
    pub native_balance: Option<U256>,
}

impl ChainCache {
    pub fn apply(&mut self, reading: ChainReading) {
        match reading {
            ChainReading::Owner(owner) => self.owner = Some(owner),
            ChainReading::Balance(balance) => self.balance = Some(balance),
            ChainReading::RemainingCount(n) => self.remaining_count = Some(n),
            ChainReading::NativeBalance(balance) => self.native_balance = Some(balance),
        }
    }

    /// Available once owner, balance and count have each been read at least once.
    pub fn snapshot(&self) -> Option<ContractSnapshot> {
        Some(ContractSnapshot {
            owner: self.owner?,
            balance: self.balance?,
            remaining_count: self.remaining_count?,
        })
    }
}

pub trait LuckyMoneyChain: Clone + Send + Sync + 'static {
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    fn owner(&self) -> impl Future<Output = Result<Address>> + Send;

    fn balance(&self) -> impl Future<Output = Result<U256>> + Send;

    fn remaining_count(&self) -> impl Future<Output = Result<U256>> + Send;

    fn native_balance(&self, account: Address) -> impl Future<Output = Result<U256>> + Send;

    fn signer_address(&self) -> Option<Address>;

    fn send(
        &self,
        call: &ContractCall,
    ) -> impl Future<Output = std::result::Result<TxHash, SubmitError>> + Send;

    fn transaction_outcome(
        &self,
        hash: TxHash,
        confirmations: u64,
    ) -> impl Future<Output = Result<TxOutcome>> + Send;

    fn read(&self, field: ChainField) -> impl Future<Output = Result<Option<ChainReading>>> + Send {
        async move {
            let reading = match field {
                ChainField::Owner => ChainReading::Owner(self.owner().await?),
                ChainField::Balance => ChainReading::Balance(self.balance().await?),
                ChainField::RemainingCount => {
                    ChainReading::RemainingCount(self.remaining_count().await?)
                }
                ChainField::NativeBalance => {
                    let Some(account) = self.signer_address() else {
                        return Ok(None);
                    };
                    ChainReading::NativeBalance(self.native_balance(account).await?)
                }
            };
            Ok(Some(reading))
        }
    }
}

/// JSON-RPC implementation over `alloy`.
#[derive(Clone)]
pub struct RpcChain {
    provider: DynProvider,
    contract: LuckyMoney::LuckyMoneyInstance<DynProvider>,
    signer: Option<Address>,
}

impl RpcChain {
    pub fn read_only(url: Url, contract: Address) -> Self {
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Self::from_provider(provider, contract, None)
    }

    pub fn with_signer(url: Url, contract: Address, signer: PrivateKeySigner) -> Self {
        let account = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        Self::from_provider(provider, contract, Some(account))
    }

    fn from_provider(
        provider: DynProvider,
        contract: Address,
        signer: Option<Address>,
    ) -> Self {
        let contract = LuckyMoney::new(contract, provider.clone());
        Self {
            provider,
            contract,
            signer,
        }
    }
}

fn classify_send_error(err: alloy::contract::Error) -> SubmitError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("user rejected") || lowered.contains("user denied") {
        SubmitError::Rejected(message)
    } else if lowered.contains("revert") {
        SubmitError::Reverted(message)
    } else {
        SubmitError::Transport(message)
    }
}

impl LuckyMoneyChain for RpcChain {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .wrap_err("eth_chainId request failed")
    }

    async fn owner(&self) -> Result<Address> {
        self.contract.owner().call().await.wrap_err("owner() call failed")
    }

    async fn balance(&self) -> Result<U256> {
        self.contract
            .balance()
            .call()
            .await
            .wrap_err("balance() call failed")
    }

    async fn remaining_count(&self) -> Result<U256> {
        self.contract.num().call().await.wrap_err("num() call failed")
    }

    async fn native_balance(&self, account: Address) -> Result<U256> {
        self.provider
            .get_balance(account)
            .await
            .wrap_err_with(|| format!("eth_getBalance failed for {account}"))
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn send(&self, call: &ContractCall) -> std::result::Result<TxHash, SubmitError> {
        if self.signer.is_none() {
            return Err(SubmitError::NoWallet);
        }
        let pending = match call {
            ContractCall::InitOwner { owner } => {
                self.contract.initOwner(*owner).send().await
            }
            ContractCall::Reset => self.contract.reset().send().await,
            ContractCall::CreateLuckyMoney { count, amount } => {
                self.contract
                    .createLuckyMoney(*count, *amount)
                    .value(*amount)
                    .send()
                    .await
            }
            ContractCall::GiveOutMoney { recipient } => {
                self.contract.giveOutMoney(*recipient).send().await
            }
        }
        .map_err(classify_send_error)?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_outcome(
        &self,
        hash: TxHash,
        confirmations: u64,
    ) -> Result<TxOutcome> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .wrap_err_with(|| format!("eth_getTransactionReceipt failed for {hash}"))?;
        let Some(receipt) = receipt else {
            return Ok(TxOutcome::Pending);
        };
        if !receipt.status() {
            return Ok(TxOutcome::Failed {
                reason: format!("transaction {hash} reverted"),
            });
        }
        let Some(mined_at) = receipt.block_number else {
            return Ok(TxOutcome::Pending);
        };
        let head = self
            .provider
            .get_block_number()
            .await
            .wrap_err("eth_blockNumber request failed")?;
        let depth = head.saturating_sub(mined_at).saturating_add(1);
        if depth >= confirmations.max(1) {
            Ok(TxOutcome::Confirmed { block: mined_at })
        } else {
            Ok(TxOutcome::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn create_call__attaches_the_declared_total_as_value() {
        let call = ContractCall::CreateLuckyMoney {
            count: U256::from(4u64),
            amount: U256::from(1_000u64),
        };
        assert_eq!(call.value(), U256::from(1_000u64));
        assert_eq!(call.kind(), TxKind::CreatePacket);
    }

    #[test]
    fn non_payable_calls__carry_no_value() {
        let who = address!("00000000000000000000000000000000000000aa");
        for call in [
            ContractCall::InitOwner { owner: who },
            ContractCall::Reset,
            ContractCall::GiveOutMoney { recipient: who },
        ] {
            assert_eq!(call.value(), U256::ZERO);
        }
    }

    #[test]
    fn chain_cache__snapshot_requires_all_contract_fields() {
        // given
        let mut cache = ChainCache::default();
        cache.apply(ChainReading::Owner(Address::ZERO));
        cache.apply(ChainReading::Balance(U256::from(5u64)));
        cache.apply(ChainReading::NativeBalance(U256::from(1u64)));

        // then
        assert!(cache.snapshot().is_none());

        // when
        cache.apply(ChainReading::RemainingCount(U256::from(2u64)));

        // then
        let snap = cache.snapshot().unwrap();
        assert_eq!(snap.balance, U256::from(5u64));
        assert_eq!(snap.remaining_count, U256::from(2u64));
    }

    #[test]
    fn chain_cache__later_reading_replaces_earlier_value() {
        let mut cache = ChainCache::default();
        cache.apply(ChainReading::RemainingCount(U256::from(3u64)));
        cache.apply(ChainReading::RemainingCount(U256::from(2u64)));
        assert_eq!(cache.remaining_count, Some(U256::from(2u64)));
    }
}
