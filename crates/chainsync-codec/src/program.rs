//! Read-time byte-code decoding for program submissions.
//!
//! Ingestion never calls into this module. Readers go through
//! [`EnrichmentCache`], which asks the external [`ProgramDecoder`] once per
//! distinct byte-code and falls back to the raw hex view on failure.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::ProgramDecodeError;

/// External decoder that turns program byte-code into a structured summary.
#[async_trait]
pub trait ProgramDecoder: Send + Sync {
    async fn decode(&self, bytecode: &[u8]) -> Result<Value, ProgramDecodeError>;
}

/// What a reader gets back for a program submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ProgramView {
    Decoded { summary: Value },
    Raw { bytecode_hex: String },
}

struct CacheInner {
    entries: HashMap<String, Value>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Cache-aside front for a [`ProgramDecoder`], keyed by SHA-256 of the
/// byte-code. Only successes are cached, so a failed lookup is retried on
/// the next read.
pub struct EnrichmentCache<D: ProgramDecoder> {
    decoder: D,
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl<D: ProgramDecoder> EnrichmentCache<D> {
    pub fn new(decoder: D, capacity: usize) -> Self {
        Self {
            decoder,
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn cache_key(bytecode: &[u8]) -> String {
        hex::encode(Sha256::digest(bytecode))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded summary if available, raw hex otherwise.
    pub async fn view(&self, bytecode: &[u8]) -> ProgramView {
        let key = Self::cache_key(bytecode);
        if let Some(summary) = self.cached(&key) {
            return ProgramView::Decoded { summary };
        }

        match self.decoder.decode(bytecode).await {
            Ok(summary) => {
                self.insert(key, summary.clone());
                ProgramView::Decoded { summary }
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "program decode failed, serving raw byte-code");
                ProgramView::Raw {
                    bytecode_hex: format!("0x{}", hex::encode(bytecode)),
                }
            }
        }
    }

    fn cached(&self, key: &str) -> Option<Value> {
        self.inner.lock().ok()?.entries.get(key).cloned()
    }

    fn insert(&self, key: String, summary: Value) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.entries.insert(key.clone(), summary).is_none() {
            inner.order.push_back(key);
        }
        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

// ─── HTTP decoder ─────────────────────────────────────────────────────────────

/// Posts `{"bytecode": "0x…"}` to the decoder service and expects
/// `{"summary": …}` back.
#[cfg(feature = "remote")]
pub struct HttpProgramDecoder {
    url: String,
    http: reqwest::Client,
    timeout: std::time::Duration,
}

#[cfg(feature = "remote")]
impl HttpProgramDecoder {
    pub fn new(
        url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, ProgramDecodeError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProgramDecodeError::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            timeout,
        })
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl ProgramDecoder for HttpProgramDecoder {
    async fn decode(&self, bytecode: &[u8]) -> Result<Value, ProgramDecodeError> {
        #[derive(Deserialize)]
        struct DecoderResponse {
            summary: Value,
        }

        let body = serde_json::json!({ "bytecode": format!("0x{}", hex::encode(bytecode)) });
        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProgramDecodeError::Timeout {
                        ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    ProgramDecodeError::Http(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(ProgramDecodeError::Http(format!("HTTP {}", resp.status().as_u16())));
        }

        let parsed: DecoderResponse = resp
            .json()
            .await
            .map_err(|e| ProgramDecodeError::BadResponse(e.to_string()))?;
        Ok(parsed.summary)
    }
}
