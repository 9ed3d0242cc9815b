use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Value,
    json,
};
use std::{
    future::Future,
    str::FromStr,
};

pub const DEFAULT_SUBGRAPH_URL: &str = "http://localhost:8000/subgraphs/name/lucky-money";

const RECENT_DISTRIBUTIONS_QUERY: &str = r#"
query RecentDistributions($first: Int!) {
  luckyMoneyDistributeds(first: $first, orderBy: blockTimestamp, orderDirection: desc) {
    id
    to
    amount
    transactionHash
  }
}
"#;

const DISTRIBUTION_BY_TX_QUERY: &str = r#"
query DistributionByTx($to: String!, $hash: String!) {
  luckyMoneyDistributeds(where: { to: $to, transactionHash: $hash }) {
    id
    to
    amount
    transactionHash
  }
}
"#;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DistributionRecord {
    pub id: String,
    pub to: Address,
    pub amount: U256,
    pub transaction_hash: TxHash,
}

pub trait DistributionIndex: Clone + Send + Sync + 'static {
    /// Most recent distributions, newest first.
    fn recent_distributions(
        &self,
        first: usize,
    ) -> impl Future<Output = Result<Vec<DistributionRecord>>> + Send;

    /// The distribution emitted by transaction `tx_hash` to `to`, once indexed.
    fn distribution_for(
        &self,
        to: Address,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<DistributionRecord>>> + Send;
}

/// GraphQL client for the subgraph that indexes `LuckyMoneyDistributed` events.
#[derive(Clone)]
pub struct IndexerClient {
    endpoint: String,
    http: reqwest::Client,
}

impl IndexerClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for indexer")?;
        Ok(Self { endpoint, http })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query(&self, body: &GraphQlRequest<'_>) -> Result<Vec<DistributionRecord>> {
        let res = self
            .http
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .wrap_err("indexer request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .wrap_err("failed to read indexer response body")?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(eyre!("indexer responded with {status}: {body}"));
        }
        parse_distributions(&bytes)
    }
}

impl DistributionIndex for IndexerClient {
    async fn recent_distributions(&self, first: usize) -> Result<Vec<DistributionRecord>> {
        self.query(&recent_distributions_request(first)).await
    }

    async fn distribution_for(
        &self,
        to: Address,
        tx_hash: TxHash,
    ) -> Result<Option<DistributionRecord>> {
        let records = self.query(&distribution_for_request(to, tx_hash)).await?;
        Ok(records.into_iter().next())
    }
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

fn recent_distributions_request(first: usize) -> GraphQlRequest<'static> {
    GraphQlRequest {
        query: RECENT_DISTRIBUTIONS_QUERY,
        variables: json!({ "first": first }),
    }
}

/// The subgraph stores addresses and hashes lowercased.
fn distribution_for_request(to: Address, tx_hash: TxHash) -> GraphQlRequest<'static> {
    GraphQlRequest {
        query: DISTRIBUTION_BY_TX_QUERY,
        variables: json!({
            "to": lower_hex(to.as_slice()),
            "hash": lower_hex(tx_hash.as_slice()),
        }),
    }
}

fn lower_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<DistributionsDataDto>,
    #[serde(default)]
    errors: Vec<GraphQlErrorDto>,
}

#[derive(Deserialize)]
struct GraphQlErrorDto {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DistributionsDataDto {
    lucky_money_distributeds: Vec<DistributionDto>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DistributionDto {
    id: String,
    to: String,
    amount: String,
    transaction_hash: String,
}

impl TryFrom<DistributionDto> for DistributionRecord {
    type Error = color_eyre::eyre::Report;

    fn try_from(dto: DistributionDto) -> Result<Self> {
        let to = Address::from_str(&dto.to)
            .map_err(|e| eyre!("invalid recipient address '{}': {e}", dto.to))?;
        let amount = U256::from_str_radix(&dto.amount, 10)
            .map_err(|e| eyre!("invalid amount '{}': {e}", dto.amount))?;
        let transaction_hash = TxHash::from_str(&dto.transaction_hash).map_err(|e| {
            eyre!("invalid transaction hash '{}': {e}", dto.transaction_hash)
        })?;
        Ok(DistributionRecord {
            id: dto.id,
            to,
            amount,
            transaction_hash,
        })
    }
}

fn parse_distributions(bytes: &[u8]) -> Result<Vec<DistributionRecord>> {
    let response: GraphQlResponse =
        serde_json::from_slice(bytes).wrap_err("invalid indexer payload")?;
    if !response.errors.is_empty() {
        let messages: Vec<String> =
            response.errors.into_iter().map(|e| e.message).collect();
        return Err(eyre!("indexer query failed: {}", messages.join("; ")));
    }
    let data = response
        .data
        .ok_or_else(|| eyre!("indexer response carried no data"))?;
    data.lucky_money_distributeds
        .into_iter()
        .map(DistributionRecord::try_from)
        .collect()
}
