use crate::blockchain::Blockchain;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state: the one authoritative ledger.
#[derive(Clone)]
pub struct AppState {
    pub blockchain: Arc<Blockchain>,
}

impl AppState {
    pub fn new(blockchain: Arc<Blockchain>) -> Self {
        Self { blockchain }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub start: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: Option<u64>,
    pub length: usize,
    pub difficulty: i32,
    pub adjust_interval: u64,
    pub slow_above_secs: f64,
    pub fast_below_secs: f64,
    pub mining_mode: &'static str,
    pub last_interval_secs: Option<i64>,
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct NewWalletResponse {
    pub private_key: String,
    pub public_key: String,
    pub address: String,
}
