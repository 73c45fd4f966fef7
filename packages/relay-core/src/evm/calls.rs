//! Unsigned EVM calls
//!
//! The relay never signs. Every EVM step is returned as an [`EvmCall`] the
//! caller signs and broadcasts in order.

use alloy::primitives::{Address, Bytes, FixedBytes, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;

use super::contracts::{MessageTransmitter, TokenMessenger, ERC20};

/// One unsigned contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvmCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Human-readable label for logs and CLI output
    pub description: String,
}

/// `token.approve(spender, amount)`
pub fn approve_call(token: Address, spender: Address, amount: U256) -> EvmCall {
    let data = ERC20::approveCall { spender, amount }.abi_encode();
    EvmCall {
        to: token,
        data: data.into(),
        value: U256::ZERO,
        description: format!("approve {} for {}", amount, spender),
    }
}

/// `tokenMessenger.depositForBurn(amount, destinationDomain, mintRecipient, burnToken)`
pub fn deposit_for_burn_call(
    token_messenger: Address,
    amount: U256,
    destination_domain: u32,
    mint_recipient: [u8; 32],
    burn_token: Address,
) -> EvmCall {
    let data = TokenMessenger::depositForBurnCall {
        amount,
        destinationDomain: destination_domain,
        mintRecipient: FixedBytes(mint_recipient),
        burnToken: burn_token,
    }
    .abi_encode();
    EvmCall {
        to: token_messenger,
        data: data.into(),
        value: U256::ZERO,
        description: format!("depositForBurn {} to domain {}", amount, destination_domain),
    }
}

/// `messageTransmitter.receiveMessage(message, attestation)`
pub fn receive_message_call(message_transmitter: Address, message: &[u8], attestation: &[u8]) -> EvmCall {
    let data = MessageTransmitter::receiveMessageCall {
        message: Bytes::copy_from_slice(message),
        attestation: Bytes::copy_from_slice(attestation),
    }
    .abi_encode();
    EvmCall {
        to: message_transmitter,
        data: data.into(),
        value: U256::ZERO,
        description: "receiveMessage".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_call_encoding() {
        let token = Address::repeat_byte(0x01);
        let spender = Address::repeat_byte(0x02);
        let call = approve_call(token, spender, U256::from(1_000_000u64));

        assert_eq!(call.to, token);
        assert_eq!(&call.data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(&call.data[16..36], spender.as_slice());
        assert_eq!(
            U256::from_be_slice(&call.data[36..68]),
            U256::from(1_000_000u64)
        );
    }

    #[test]
    fn test_deposit_for_burn_encoding() {
        let recipient = [0x0a; 32];
        let call = deposit_for_burn_call(
            Address::repeat_byte(0x03),
            U256::from(5u64),
            6,
            recipient,
            Address::repeat_byte(0x04),
        );
        assert_eq!(&call.data[..4], &[0x6f, 0xd3, 0x50, 0x4e]);
        // amount | domain | recipient | token
        assert_eq!(U256::from_be_slice(&call.data[4..36]), U256::from(5u64));
        assert_eq!(U256::from_be_slice(&call.data[36..68]), U256::from(6u64));
        assert_eq!(&call.data[68..100], &recipient);
        assert_eq!(&call.data[112..132], Address::repeat_byte(0x04).as_slice());
    }

    #[test]
    fn test_receive_message_round_trip() {
        let call = receive_message_call(Address::repeat_byte(0x05), &[1, 2, 3], &[9; 65]);
        let decoded = MessageTransmitter::receiveMessageCall::abi_decode(&call.data, true).unwrap();
        assert_eq!(decoded.message.as_ref(), &[1, 2, 3]);
        assert_eq!(decoded.attestation.len(), 65);
    }
}
