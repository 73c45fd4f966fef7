//! CCTP contract ABI definitions
//!
//! Uses alloy's sol! macro to generate type-safe bindings for the token,
//! TokenMessenger and MessageTransmitter contracts.

use alloy::sol;

sol! {
    /// Minimal ERC20 interface (USDC)
    #[sol(rpc)]
    contract ERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }

    /// CCTP v1 TokenMessenger (burn side)
    #[sol(rpc)]
    contract TokenMessenger {
        function depositForBurn(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken
        ) external returns (uint64 nonce);

        event DepositForBurn(
            uint64 indexed nonce,
            address indexed burnToken,
            uint256 amount,
            address indexed depositor,
            bytes32 mintRecipient,
            uint32 destinationDomain,
            bytes32 destinationTokenMessenger,
            bytes32 destinationCaller
        );
    }

    /// CCTP v1 MessageTransmitter (both sides)
    #[sol(rpc)]
    contract MessageTransmitter {
        function receiveMessage(bytes message, bytes attestation) external returns (bool success);

        /// Non-zero once (sourceDomain, nonce) has been received
        function usedNonces(bytes32 sourceAndNonce) external view returns (uint256);

        event MessageSent(bytes message);
    }
}
