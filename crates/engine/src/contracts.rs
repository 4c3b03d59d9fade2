//! Contract bindings and selectors.

use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IMulticall {
        struct UnitState {
            uint256 index;
            address unit;
            address quote;
            address launcher;
            address minter;
            address rewarder;
            address auction;
            address lp;
            string uri;
            bool isModerated;
            uint256 totalSupply;
            uint256 marketCapInDonut;
            uint256 liquidityInDonut;
            uint256 priceInDonut;
            uint256 contentRewardForDuration;
            uint256 accountQuoteBalance;
            uint256 accountUnitBalance;
            uint256 accountContentOwned;
            uint256 accountContentStaked;
            uint256 accountUnitEarned;
            bool accountIsModerator;
        }

        struct ContentState {
            uint256 tokenId;
            uint256 epochId;
            uint256 startTime;
            uint256 initPrice;
            uint256 stake;
            uint256 price;
            uint256 rewardForDuration;
            address creator;
            address owner;
            string uri;
            bool isApproved;
        }

        struct AuctionState {
            uint256 epochId;
            uint256 initPrice;
            uint256 startTime;
            address paymentToken;
            uint256 price;
            uint256 paymentTokenPrice;
            uint256 quoteAccumulated;
            uint256 quoteBalance;
            uint256 paymentTokenBalance;
        }

        function collect(address content, uint256 tokenId, uint256 epochId, uint256 deadline, uint256 maxPrice) external;
        function buy(address content, uint256 epochId, uint256 deadline, uint256 maxPaymentTokenAmount) external;
        function claimRewards(address content) external;

        function getUnitState(address content, address account) external view returns (UnitState memory state);
        function getContentState(address content, uint256 tokenId) external view returns (ContentState memory state);
        function getAuctionState(address content, address account) external view returns (AuctionState memory state);
    }
}

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IContent {
        function create(address to, string tokenUri) external returns (uint256 tokenId);
    }
}

pub mod selectors {
    use super::{IContent, IMulticall, IERC20};
    use alloy::sol_types::SolCall;

    pub const APPROVE: [u8; 4] = IERC20::approveCall::SELECTOR;
    pub const COLLECT: [u8; 4] = IMulticall::collectCall::SELECTOR;
    pub const AUCTION_BUY: [u8; 4] = IMulticall::buyCall::SELECTOR;
    pub const CLAIM_REWARDS: [u8; 4] = IMulticall::claimRewardsCall::SELECTOR;
    pub const CREATE_CONTENT: [u8; 4] = IContent::createCall::SELECTOR;
}
