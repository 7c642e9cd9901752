use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};
use crate::blockchain::MiningMode;

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    let bc = &state.blockchain;
    let policy = bc.policy();

    HttpResponse::Ok().json(StatsResponse {
        height: bc.tip().map(|b| b.height),
        length: bc.len(),
        difficulty: bc.difficulty(),
        adjust_interval: policy.interval,
        slow_above_secs: policy.slow_above_secs,
        fast_below_secs: policy.fast_below_secs,
        mining_mode: match bc.mode() {
            MiningMode::Exclusive => "exclusive",
            MiningMode::Optimistic => "optimistic",
        },
        last_interval_secs: bc.last_interval_secs(),
    })
}
