//! JSON-RPC ledger client
//!
//! Talks JSON-RPC 2.0 to a ledger gateway exposing decoded account state and
//! history (`getContractState`, `getTransactionsList`, `sendMessage`).
//!
//! `sendMessage` on the gateway is fire-and-forget, so `submit_message`
//! implements the blocking contract itself: send once, then poll state and
//! new history until the message shows up or ledger time passes `expire_at`.
//! A message that is already expired, or an account that does not exist, is
//! not broadcast; an account whose state stays missing for
//! `max_missing_polls` polls ends the watch. All of these return `None` and
//! leave the verdict to reconciliation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::{
    AccountState, LedgerClient, LedgerError, TransactionId, TransactionRecord, TransactionsBatch,
};
use crate::core_types::{Address, Hash256, Lt};
use crate::logging::RPC_TRACE_TARGET;
use crate::message::SignedMessage;

#[derive(Debug, Clone)]
pub struct JrpcConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    /// Delay between state polls while waiting for inclusion
    pub poll_interval: Duration,
    /// Page size used while watching for the sent message
    pub watch_page_size: u8,
    /// Pages walked per poll before giving up on this round
    pub watch_max_pages: usize,
    /// Consecutive polls without account state before handing over to
    /// reconciliation
    pub max_missing_polls: u32,
}

impl Default for JrpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://jrpc.everwallet.net".to_string(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            watch_page_size: 16,
            watch_max_pages: 8,
            max_missing_polls: 10,
        }
    }
}

/// JSON-RPC request structure
#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Serialize)]
struct AddressParams<'a> {
    address: &'a Address,
}

#[derive(Deserialize)]
struct ContractStateResult {
    state: Option<AccountState>,
}

#[derive(Serialize)]
struct TransactionsListParams<'a> {
    address: &'a Address,
    limit: u8,
    continuation: Option<TransactionId>,
}

#[derive(Serialize)]
struct SendMessageParams<'a> {
    dst: &'a Address,
    hash: &'a Hash256,
    body: &'a str,
}

pub struct JrpcLedgerClient {
    config: JrpcConfig,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JrpcLedgerClient {
    pub fn new(config: JrpcConfig) -> Result<Self, LedgerError> {
        info!(endpoint = %config.endpoint, "Initializing JSON-RPC ledger client");

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &'static str, params: P) -> Result<R, LedgerError>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| LedgerError::Decode(format!("{}: missing result", method)))
    }

    /// Same as `call`, but a `null` result is not an error.
    async fn call_optional<P, R>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<Option<R>, LedgerError>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        trace!(target: RPC_TRACE_TARGET, method, id = request.id, "RPC request");

        let response: JsonRpcResponse<R> = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            trace!(target: RPC_TRACE_TARGET, method, code = err.code, "RPC error");
            return Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(response.result)
    }

    /// Walk history from `head` down to (excluding) `known_lt` looking for `hash`.
    async fn find_in_message(
        &self,
        address: &Address,
        head: TransactionId,
        known_lt: Lt,
        hash: &Hash256,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        let mut continuation = Some(head);

        for _ in 0..self.config.watch_max_pages {
            let Some(cursor) = continuation else {
                break;
            };
            let batch = self
                .get_transactions(address, self.config.watch_page_size, Some(cursor))
                .await?;

            for tx in batch.transactions {
                if tx.id.lt <= known_lt {
                    return Ok(None);
                }
                if tx.in_message_hash() == Some(hash) {
                    return Ok(Some(tx));
                }
            }
            continuation = batch.continuation;
        }

        Ok(None)
    }
}

#[async_trait]
impl LedgerClient for JrpcLedgerClient {
    async fn submit_message(
        &self,
        dst: &Address,
        message: &SignedMessage,
    ) -> Result<Option<TransactionRecord>, LedgerError> {
        let Some(initial) = self.get_account_state(dst).await? else {
            warn!(address = %dst, "Account does not exist, message not broadcast");
            return Ok(None);
        };
        if initial.gen_utime > message.expire_at {
            debug!(
                gen_utime = initial.gen_utime,
                expire_at = message.expire_at,
                "Message already expired, not broadcast"
            );
            return Ok(None);
        }
        let mut known_lt = initial.last_transaction_id.lt;

        let _: Option<serde_json::Value> = self
            .call_optional(
                "sendMessage",
                SendMessageParams {
                    dst,
                    hash: &message.hash,
                    body: &message.body,
                },
            )
            .await?;
        debug!(message_hash = %message.hash, expire_at = message.expire_at, "Message broadcast");

        let mut missing_polls = 0u32;
        loop {
            tokio::time::sleep(self.config.poll_interval).await;

            let Some(state) = self.get_account_state(dst).await? else {
                missing_polls += 1;
                warn!(address = %dst, missing_polls, "Account state missing while waiting for inclusion");
                if missing_polls >= self.config.max_missing_polls {
                    return Ok(None);
                }
                continue;
            };
            missing_polls = 0;

            let head = state.last_transaction_id;
            if head.lt != known_lt {
                if let Some(tx) = self
                    .find_in_message(dst, head, known_lt, &message.hash)
                    .await?
                {
                    debug!(tx_lt = tx.id.lt, tx_hash = %tx.id.hash, "Message included");
                    return Ok(Some(tx));
                }
                known_lt = head.lt;
            }

            if state.gen_utime > message.expire_at {
                debug!(
                    gen_utime = state.gen_utime,
                    expire_at = message.expire_at,
                    "Message expired while watching"
                );
                return Ok(None);
            }
        }
    }

    async fn get_account_state(
        &self,
        address: &Address,
    ) -> Result<Option<AccountState>, LedgerError> {
        let result: ContractStateResult = self
            .call("getContractState", AddressParams { address })
            .await?;
        Ok(result.state)
    }

    async fn get_transactions(
        &self,
        address: &Address,
        limit: u8,
        continuation: Option<TransactionId>,
    ) -> Result<TransactionsBatch, LedgerError> {
        self.call(
            "getTransactionsList",
            TransactionsListParams {
                address,
                limit,
                continuation,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use crate::message::{DEFAULT_SEND_FLAGS, MessageBuilder, TransferParams};
    use crate::money::Amount;
    use crate::signer::{KeyPairSigner, Signer};

    const WALLET: &str = "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74";
    /// Built at 1_700_000_000 with a 240s timeout
    const EXPIRE_AT: u32 = 1_700_000_240;

    /// Answers `(method, nth call of that method)` with a JSON-RPC result
    type Handler = fn(&str, usize) -> serde_json::Value;

    /// Minimal HTTP/1.1 JSON-RPC server on a random local port
    async fn spawn_gateway(handler: Handler) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/rpc", listener.local_addr().unwrap());
        let methods = Arc::new(Mutex::new(Vec::new()));

        let seen = methods.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let seen = seen.clone();
                tokio::spawn(async move {
                    let Some(body) = read_request_body(&mut socket).await else {
                        return;
                    };
                    let request: serde_json::Value = serde_json::from_slice(&body).unwrap();
                    let method = request["method"].as_str().unwrap_or_default().to_string();
                    let nth = {
                        let mut seen = seen.lock().unwrap();
                        let nth = seen.iter().filter(|m| **m == method).count();
                        seen.push(method.clone());
                        nth
                    };
                    let reply = serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": request["id"],
                        "result": handler(&method, nth),
                    })
                    .to_string();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        reply.len(),
                        reply
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (endpoint, methods)
    }

    async fn read_request_body(socket: &mut TcpStream) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = end + 4;
            if buf.len() >= start + len {
                return Some(buf[start..start + len].to_vec());
            }
        }
    }

    fn state_json(gen_utime: u32) -> serde_json::Value {
        serde_json::json!({
            "state": {
                "balance": "1000000000",
                "status": "active",
                "lastTransactionId": {
                    "lt": 1200,
                    "hash": "0101010101010101010101010101010101010101010101010101010101010101"
                },
                "genUtime": gen_utime
            }
        })
    }

    fn signed_message() -> SignedMessage {
        let signer = KeyPairSigner::from_secret(&[7u8; 32]);
        let params = TransferParams {
            src: WALLET.parse().unwrap(),
            dest: "0:00ee4a5d98e8e9c4b5dd3e5bf31432e9e95bb53c1db85d45e101779f5420b000"
                .parse()
                .unwrap(),
            amount: Amount::from(100_000_000),
            bounce: false,
            flags: DEFAULT_SEND_FLAGS,
            payload: None,
            state_init: None,
            timeout_secs: 240,
            public_key: signer.public_key(),
        };
        let message = MessageBuilder::new()
            .with_time_fn(|| 1_700_000_000_000)
            .prepare(&params)
            .unwrap()
            .sign(&signer, None)
            .unwrap();
        assert_eq!(message.expire_at, EXPIRE_AT);
        message
    }

    fn client(endpoint: String) -> JrpcLedgerClient {
        JrpcLedgerClient::new(JrpcConfig {
            endpoint,
            request_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(5),
            max_missing_polls: 3,
            ..JrpcConfig::default()
        })
        .unwrap()
    }

    async fn submit(
        client: &JrpcLedgerClient,
        message: &SignedMessage,
    ) -> Option<TransactionRecord> {
        let dst: Address = WALLET.parse().unwrap();
        tokio::time::timeout(Duration::from_secs(5), client.submit_message(&dst, message))
            .await
            .expect("submit_message must return")
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_missing_account_returns() {
        let (endpoint, methods) = spawn_gateway(|_, _| serde_json::json!({ "state": null })).await;
        let client = client(endpoint);

        assert!(submit(&client, &signed_message()).await.is_none());
        assert!(!methods.lock().unwrap().iter().any(|m| m == "sendMessage"));
    }

    #[tokio::test]
    async fn test_submit_expired_message_not_broadcast() {
        let (endpoint, methods) =
            spawn_gateway(|_, _| state_json(EXPIRE_AT + 3_600)).await;
        let client = client(endpoint);

        assert!(submit(&client, &signed_message()).await.is_none());
        assert_eq!(*methods.lock().unwrap(), vec!["getContractState".to_string()]);
    }

    #[tokio::test]
    async fn test_submit_gives_up_when_account_disappears() {
        let (endpoint, methods) = spawn_gateway(|method, nth| match method {
            "getContractState" if nth == 0 => state_json(EXPIRE_AT - 100),
            "getContractState" => serde_json::json!({ "state": null }),
            _ => serde_json::Value::Null,
        })
        .await;
        let client = client(endpoint);

        assert!(submit(&client, &signed_message()).await.is_none());
        let methods = methods.lock().unwrap();
        assert_eq!(methods.iter().filter(|m| *m == "sendMessage").count(), 1);
        // Initial read plus max_missing_polls
        assert_eq!(methods.iter().filter(|m| *m == "getContractState").count(), 4);
    }

    #[tokio::test]
    async fn test_submit_returns_none_once_ledger_passes_expiry() {
        let (endpoint, methods) = spawn_gateway(|method, nth| match method {
            "getContractState" if nth < 2 => state_json(EXPIRE_AT - 100),
            "getContractState" => state_json(EXPIRE_AT + 1),
            _ => serde_json::Value::Null,
        })
        .await;
        let client = client(endpoint);

        assert!(submit(&client, &signed_message()).await.is_none());
        let methods = methods.lock().unwrap();
        assert_eq!(methods.iter().filter(|m| *m == "sendMessage").count(), 1);
        assert!(!methods.iter().any(|m| m == "getTransactionsList"));
    }

    #[test]
    fn test_request_shape() {
        let addr: Address = "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74"
            .parse()
            .unwrap();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "getTransactionsList",
            params: TransactionsListParams {
                address: &addr,
                limit: 10,
                continuation: None,
            },
            id: 7,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["method"], "getTransactionsList");
        assert_eq!(value["params"]["limit"], 10);
        assert_eq!(
            value["params"]["address"],
            "0:f625baf264c0e270ab4a56614c3316ed7bebc6cff0eb2f3d462dd867830ddf74"
        );
        assert!(value["params"]["continuation"].is_null());
    }

    #[test]
    fn test_error_response_decodes() {
        let json = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"bad address"},"id":1}"#;
        let resp: JsonRpcResponse<ContractStateResult> = serde_json::from_str(json).unwrap();
        assert!(resp.result.is_none());
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32602);
        assert_eq!(err.message, "bad address");
    }

    #[test]
    fn test_missing_account_decodes() {
        let json = r#"{"jsonrpc":"2.0","result":{"state":null},"id":1}"#;
        let resp: JsonRpcResponse<ContractStateResult> = serde_json::from_str(json).unwrap();
        assert!(resp.result.unwrap().state.is_none());
    }

    #[test]
    fn test_client_builds() {
        let client = JrpcLedgerClient::new(JrpcConfig::default()).unwrap();
        assert_eq!(client.next_id.load(Ordering::Relaxed), 1);
    }
}
