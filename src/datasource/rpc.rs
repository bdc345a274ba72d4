//! JSON-RPC `eth_call` client for the pool, position manager and pool registry.

use super::{BlockTag, ChainError, ChainSource};
use crate::domain::{Address, PoolState, PositionId, PositionInfo, TokenAmount};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use primitive_types::U256;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const SEL_TOKEN0: [u8; 4] = [0x0d, 0xfe, 0x16, 0x81];
const SEL_TOKEN1: [u8; 4] = [0xd2, 0x12, 0x20, 0xa7];
const SEL_LIQUIDITY: [u8; 4] = [0x1a, 0x68, 0x65, 0x02];
const SEL_GLOBAL_STATE: [u8; 4] = [0xe7, 0x6c, 0x01, 0xe4];
const SEL_POSITIONS: [u8; 4] = [0x99, 0xfb, 0xab, 0x88];
const SEL_OWNER_OF: [u8; 4] = [0x63, 0x52, 0x21, 0x1e];
const SEL_POOL_BY_PAIR: [u8; 4] = [0xd9, 0xa6, 0x41, 0xe1];

const WORD: usize = 32;

/// Chain source backed by a node's JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcChainSource {
    client: Client,
    rpc_url: String,
    position_manager: Address,
    pool_registry: Address,
}

impl JsonRpcChainSource {
    pub fn new(rpc_url: String, position_manager: Address, pool_registry: Address) -> Self {
        Self {
            client: Client::new(),
            rpc_url,
            position_manager,
            pool_registry,
        }
    }

    async fn eth_call(
        &self,
        to: &Address,
        data: Vec<u8>,
        at: BlockTag,
    ) -> Result<Vec<u8>, ChainError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": to.as_str(), "data": format!("0x{}", hex::encode(&data)) },
                at.to_rpc_param()
            ]
        });
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let body = retry(backoff, || async {
            let response = self
                .client
                .post(&self.rpc_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ChainError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(ChainError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(ChainError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(ChainError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(ChainError::DecodeError(e.to_string())))
        })
        .await?;

        parse_call_result(&body)
    }

    async fn call_address(
        &self,
        to: &Address,
        selector: [u8; 4],
        at: BlockTag,
    ) -> Result<Address, ChainError> {
        let out = self.eth_call(to, selector.to_vec(), at).await?;
        decode_address(&out, 0)
    }
}

#[async_trait]
impl ChainSource for JsonRpcChainSource {
    async fn pool_state(&self, pool: &Address, at: BlockTag) -> Result<PoolState, ChainError> {
        debug!(pool = %pool, block = %at, "Fetching pool state");

        let (global_state, liquidity, token0, token1) = futures::try_join!(
            self.eth_call(pool, SEL_GLOBAL_STATE.to_vec(), at),
            self.eth_call(pool, SEL_LIQUIDITY.to_vec(), at),
            self.call_address(pool, SEL_TOKEN0, at),
            self.call_address(pool, SEL_TOKEN1, at),
        )?;

        Ok(PoolState {
            sqrt_price_x96: decode_u256(&global_state, 0)?,
            tick: decode_i32(&global_state, 1)?,
            liquidity: decode_u128(&liquidity, 0)?,
            token0,
            token1,
        })
    }

    async fn position_info(
        &self,
        token_id: &PositionId,
        at: BlockTag,
    ) -> Result<Option<PositionInfo>, ChainError> {
        debug!(token_id = %token_id, block = %at, "Fetching position info");

        let id_word = encode_position_id(token_id)?;
        let positions_call = [SEL_POSITIONS.as_slice(), &id_word].concat();
        let owner_call = [SEL_OWNER_OF.as_slice(), &id_word].concat();

        let result = futures::try_join!(
            self.eth_call(&self.position_manager, positions_call, at),
            self.eth_call(&self.position_manager, owner_call, at),
        );
        let (position, owner) = match result {
            Ok(outputs) => outputs,
            // Nonexistent or burned token ids revert.
            Err(ChainError::Reverted(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        // positions(): nonce, operator, token0, token1, tickLower, tickUpper, liquidity, ...
        Ok(Some(PositionInfo {
            owner: decode_address(&owner, 0)?,
            token0: decode_address(&position, 2)?,
            token1: decode_address(&position, 3)?,
            tick_lower: decode_i32(&position, 4)?,
            tick_upper: decode_i32(&position, 5)?,
            liquidity: TokenAmount::new(decode_u128(&position, 6)?),
        }))
    }

    async fn pool_by_pair(
        &self,
        token0: &Address,
        token1: &Address,
        at: BlockTag,
    ) -> Result<Address, ChainError> {
        let mut data = SEL_POOL_BY_PAIR.to_vec();
        data.extend_from_slice(&encode_address(token0));
        data.extend_from_slice(&encode_address(token1));
        let out = self.eth_call(&self.pool_registry, data, at).await?;
        decode_address(&out, 0)
    }
}

fn parse_call_result(body: &serde_json::Value) -> Result<Vec<u8>, ChainError> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(|v| v.as_i64()).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string();
        // Geth reports reverts as code 3; other nodes only say so in the message.
        if code == 3 || message.to_ascii_lowercase().contains("revert") {
            return Err(ChainError::Reverted(message));
        }
        return Err(ChainError::Rpc { code, message });
    }

    let result = body
        .get("result")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ChainError::DecodeError("Missing result field".to_string()))?;
    let hex_body = result.strip_prefix("0x").unwrap_or(result);
    let bytes = hex::decode(hex_body).map_err(|e| ChainError::DecodeError(e.to_string()))?;
    if bytes.is_empty() {
        // Calls to an address without code return empty data.
        return Err(ChainError::Reverted("empty return data".to_string()));
    }
    Ok(bytes)
}

fn encode_address(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(&address.to_bytes());
    word
}

fn encode_position_id(token_id: &PositionId) -> Result<[u8; WORD], ChainError> {
    let value = U256::from_dec_str(token_id.as_str())
        .map_err(|_| ChainError::DecodeError(format!("token id out of range: {}", token_id)))?;
    Ok(value.to_big_endian())
}

fn word(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        ChainError::DecodeError(format!(
            "return data too short: {} bytes, wanted word {}",
            data.len(),
            index
        ))
    })
}

fn decode_u256(data: &[u8], index: usize) -> Result<U256, ChainError> {
    Ok(U256::from_big_endian(word(data, index)?))
}

fn decode_u128(data: &[u8], index: usize) -> Result<u128, ChainError> {
    let value = decode_u256(data, index)?;
    if value > U256::from(u128::MAX) {
        return Err(ChainError::DecodeError(format!("uint128 overflow: {}", value)));
    }
    Ok(value.as_u128())
}

/// Signed values (int24 ticks) are sign-extended to the full word.
fn decode_i32(data: &[u8], index: usize) -> Result<i32, ChainError> {
    let w = word(data, index)?;
    let mut low = [0u8; 4];
    low.copy_from_slice(&w[28..]);
    Ok(i32::from_be_bytes(low))
}

fn decode_address(data: &[u8], index: usize) -> Result<Address, ChainError> {
    let w = word(data, index)?;
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&w[12..]);
    Ok(Address::from_bytes(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn words(ws: &[[u8; WORD]]) -> Vec<u8> {
        ws.concat()
    }

    fn int_word(v: i64) -> [u8; WORD] {
        let fill = if v < 0 { 0xff } else { 0x00 };
        let mut w = [fill; WORD];
        w[24..].copy_from_slice(&v.to_be_bytes());
        w
    }

    #[test]
    fn test_parse_call_result_hex() {
        let body = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": "0x0102" });
        assert_eq!(parse_call_result(&body).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_parse_call_result_revert() {
        let body = serde_json::json!({
            "jsonrpc": "2.0", "id": 1,
            "error": { "code": 3, "message": "execution reverted: Invalid token ID" }
        });
        assert!(matches!(parse_call_result(&body), Err(ChainError::Reverted(_))));

        let body = serde_json::json!({
            "jsonrpc": "2.0", "id": 1,
            "error": { "code": -32000, "message": "execution reverted" }
        });
        assert!(matches!(parse_call_result(&body), Err(ChainError::Reverted(_))));

        let body = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": "0x" });
        assert!(matches!(parse_call_result(&body), Err(ChainError::Reverted(_))));
    }

    #[test]
    fn test_parse_call_result_rpc_error() {
        let body = serde_json::json!({
            "jsonrpc": "2.0", "id": 1,
            "error": { "code": -32005, "message": "limit exceeded" }
        });
        match parse_call_result(&body) {
            Err(ChainError::Rpc { code, .. }) => assert_eq!(code, -32005),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_negative_tick() {
        let data = words(&[int_word(12345), int_word(-887272)]);
        assert_eq!(decode_i32(&data, 0).unwrap(), 12345);
        assert_eq!(decode_i32(&data, 1).unwrap(), -887272);
    }

    #[test]
    fn test_address_word_roundtrip() {
        let addr = Address::from_str("0xaa45265a94c93802be9511e426933239117e658f").unwrap();
        let data = encode_address(&addr);
        assert_eq!(decode_address(&data, 0).unwrap(), addr);
    }

    #[test]
    fn test_decode_short_data_is_error() {
        let data = vec![0u8; 40];
        assert!(matches!(
            decode_u256(&data, 1),
            Err(ChainError::DecodeError(_))
        ));
    }

    #[test]
    fn test_encode_position_id() {
        let word = encode_position_id(&PositionId::from(258u64)).unwrap();
        assert_eq!(word[30], 1);
        assert_eq!(word[31], 2);
        assert!(word[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_u128_overflow() {
        let data = [0xffu8; WORD];
        assert!(matches!(
            decode_u128(&data, 0),
            Err(ChainError::DecodeError(_))
        ));
    }
}
