//! Aggregated on-chain state, read through the multicall contract.

use crate::contracts::IMulticall;
use crate::types::{Address, Amount, U256};
use alloy::primitives::I256;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("contract call failed: {0}")]
    Call(String),

    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Community (unit token) state for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitSnapshot {
    pub unit: Address,
    pub quote: Address,
    pub auction: Address,
    pub rewarder: Address,
    pub launcher: Address,
    pub uri: String,
    pub total_supply: Amount,
    /// Unit price in the reference token, 18 decimals.
    pub price: Amount,
    pub market_cap: Amount,
    pub liquidity: Amount,
    pub account_quote_balance: Amount,
    pub account_unit_balance: Amount,
    pub account_content_staked: Amount,
    pub account_unit_earned: Amount,
}

impl From<IMulticall::UnitState> for UnitSnapshot {
    fn from(state: IMulticall::UnitState) -> Self {
        Self {
            unit: state.unit,
            quote: state.quote,
            auction: state.auction,
            rewarder: state.rewarder,
            launcher: state.launcher,
            uri: state.uri,
            total_supply: state.totalSupply,
            price: state.priceInDonut,
            market_cap: state.marketCapInDonut,
            liquidity: state.liquidityInDonut,
            account_quote_balance: state.accountQuoteBalance,
            account_unit_balance: state.accountUnitBalance,
            account_content_staked: state.accountContentStaked,
            account_unit_earned: state.accountUnitEarned,
        }
    }
}

/// Community auction state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuctionSnapshot {
    pub epoch_id: U256,
    pub start_time: U256,
    pub payment_token: Address,
    pub price: Amount,
    /// Payment token price in the reference token, 18 decimals.
    pub payment_token_price: Amount,
    /// Quote (USDC) collected by the auction so far.
    pub quote_accumulated: Amount,
    pub account_payment_token_balance: Amount,
}

impl From<IMulticall::AuctionState> for AuctionSnapshot {
    fn from(state: IMulticall::AuctionState) -> Self {
        Self {
            epoch_id: state.epochId,
            start_time: state.startTime,
            payment_token: state.paymentToken,
            price: state.price,
            payment_token_price: state.paymentTokenPrice,
            quote_accumulated: state.quoteAccumulated,
            account_payment_token_balance: state.paymentTokenBalance,
        }
    }
}

/// One content token and its collect auction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub token_id: U256,
    pub epoch_id: U256,
    pub start_time: U256,
    pub price: Amount,
    pub stake: Amount,
    pub creator: Address,
    pub owner: Address,
    pub uri: String,
    pub is_approved: bool,
}

impl From<IMulticall::ContentState> for ContentSnapshot {
    fn from(state: IMulticall::ContentState) -> Self {
        Self {
            token_id: state.tokenId,
            epoch_id: state.epochId,
            start_time: state.startTime,
            price: state.price,
            stake: state.stake,
            creator: state.creator,
            owner: state.owner,
            uri: state.uri,
            is_approved: state.isApproved,
        }
    }
}

/// Batched reads of per-entity state keyed by (entity, account).
#[async_trait]
pub trait StateReader: Send + Sync {
    async fn unit_state(&self, content: Address, account: Address) -> Result<UnitSnapshot, ReadError>;

    async fn auction_state(
        &self,
        content: Address,
        account: Address,
    ) -> Result<AuctionSnapshot, ReadError>;

    async fn content_state(&self, content: Address, token_id: U256) -> Result<ContentSnapshot, ReadError>;
}

/// Pending rewards of one community.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommunityRewards {
    pub earned: Amount,
    pub staked: Amount,
}

/// Rewards across communities for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardsSummary {
    pub per_community: BTreeMap<Address, CommunityRewards>,
    pub total_earned: Amount,
    pub total_staked: Amount,
}

impl RewardsSummary {
    /// Read every community; communities whose read fails are skipped.
    pub async fn load<R: StateReader + ?Sized>(
        reader: &R,
        communities: &[Address],
        account: Address,
    ) -> Self {
        let mut summary = Self::default();
        for &content in communities {
            match reader.unit_state(content, account).await {
                Ok(state) => summary.add(
                    content,
                    CommunityRewards {
                        earned: state.account_unit_earned,
                        staked: state.account_content_staked,
                    },
                ),
                Err(err) => warn!(%content, %err, "skipping community"),
            }
        }
        summary
    }

    fn add(&mut self, content: Address, rewards: CommunityRewards) {
        self.total_earned = self.total_earned.saturating_add(rewards.earned);
        self.total_staked = self.total_staked.saturating_add(rewards.staked);
        self.per_community.insert(content, rewards);
    }

    /// Communities with something to claim.
    pub fn with_rewards(&self) -> Vec<Address> {
        self.per_community
            .iter()
            .filter(|(_, rewards)| !rewards.earned.is_zero())
            .map(|(content, _)| *content)
            .collect()
    }

    pub fn has_rewards(&self) -> bool {
        !self.total_earned.is_zero()
    }
}

/// An auction with its estimated profit for a buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedAuction {
    pub content: Address,
    pub state: AuctionSnapshot,
    /// `quote_accumulated - price * payment_token_price / 1e18`.
    pub profit_loss: I256,
}

impl RankedAuction {
    pub fn new(content: Address, state: AuctionSnapshot) -> Self {
        let cost = state
            .price
            .saturating_mul(state.payment_token_price)
            / U256::from(10u64).pow(U256::from(18u64));
        let profit_loss = signed(state.quote_accumulated).saturating_sub(signed(cost));
        Self {
            content,
            state,
            profit_loss,
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.profit_loss.is_positive()
    }
}

fn signed(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}

/// Read every auction and sort most profitable first. Failed reads are
/// skipped.
pub async fn rank_auctions<R: StateReader + ?Sized>(
    reader: &R,
    communities: &[Address],
    account: Address,
) -> Vec<RankedAuction> {
    let mut ranked = Vec::with_capacity(communities.len());
    for &content in communities {
        match reader.auction_state(content, account).await {
            Ok(state) => ranked.push(RankedAuction::new(content, state)),
            Err(err) => warn!(%content, %err, "skipping auction"),
        }
    }
    ranked.sort_by(|a, b| b.profit_loss.cmp(&a.profit_loss));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FixedReader {
        units: HashMap<Address, UnitSnapshot>,
        auctions: HashMap<Address, AuctionSnapshot>,
    }

    #[async_trait]
    impl StateReader for FixedReader {
        async fn unit_state(&self, content: Address, _account: Address) -> Result<UnitSnapshot, ReadError> {
            self.units
                .get(&content)
                .cloned()
                .ok_or_else(|| ReadError::Call("execution reverted".to_string()))
        }

        async fn auction_state(
            &self,
            content: Address,
            _account: Address,
        ) -> Result<AuctionSnapshot, ReadError> {
            self.auctions
                .get(&content)
                .cloned()
                .ok_or_else(|| ReadError::Call("execution reverted".to_string()))
        }

        async fn content_state(
            &self,
            _content: Address,
            _token_id: U256,
        ) -> Result<ContentSnapshot, ReadError> {
            Err(ReadError::Decode("not used".to_string()))
        }
    }

    fn community(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[tokio::test]
    async fn test_rewards_summary_skips_failures() {
        let mut reader = FixedReader::default();
        reader.units.insert(
            community(1),
            UnitSnapshot {
                account_unit_earned: U256::from(5u64),
                account_content_staked: U256::from(100u64),
                ..Default::default()
            },
        );
        reader.units.insert(
            community(2),
            UnitSnapshot {
                account_content_staked: U256::from(50u64),
                ..Default::default()
            },
        );

        let summary = RewardsSummary::load(
            &reader,
            &[community(1), community(2), community(3)],
            community(0xAA),
        )
        .await;

        assert_eq!(summary.per_community.len(), 2);
        assert_eq!(summary.total_earned, U256::from(5u64));
        assert_eq!(summary.total_staked, U256::from(150u64));
        assert_eq!(summary.with_rewards(), vec![community(1)]);
        assert!(summary.has_rewards());
    }

    #[test]
    fn test_profit_loss() {
        // 2 payment tokens at 0.5 each cost 1 unit of quote.
        let state = AuctionSnapshot {
            price: ether(2),
            payment_token_price: ether(1) / U256::from(2u64),
            quote_accumulated: ether(3),
            ..Default::default()
        };
        let ranked = RankedAuction::new(community(1), state);
        assert_eq!(ranked.profit_loss, I256::try_from(ether(2)).unwrap());
        assert!(ranked.is_profitable());

        let losing = RankedAuction::new(
            community(2),
            AuctionSnapshot {
                price: ether(4),
                payment_token_price: ether(1),
                quote_accumulated: ether(1),
                ..Default::default()
            },
        );
        assert!(losing.profit_loss.is_negative());
        assert!(!losing.is_profitable());
    }

    #[tokio::test]
    async fn test_rank_auctions_most_profitable_first() {
        let mut reader = FixedReader::default();
        for (byte, accumulated) in [(1u8, 1u64), (2, 10), (3, 5)] {
            reader.auctions.insert(
                community(byte),
                AuctionSnapshot {
                    price: ether(1),
                    payment_token_price: ether(1),
                    quote_accumulated: ether(accumulated),
                    ..Default::default()
                },
            );
        }

        let ranked = rank_auctions(
            &reader,
            &[community(1), community(2), community(3), community(4)],
            community(0xAA),
        )
        .await;

        let order: Vec<Address> = ranked.iter().map(|r| r.content).collect();
        assert_eq!(order, vec![community(2), community(3), community(1)]);
        assert!(!ranked[2].is_profitable());
    }
}
