use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};
use std::time::Instant;

use super::models::{AppState, ErrorResponse, ListQuery};

/// List blocks from height `start` (default 0) to the tip.
#[get("/blocks/")]
pub async fn list_blocks(state: web::Data<AppState>, query: web::Query<ListQuery>) -> impl Responder {
    let blocks = state.blockchain.blocks_from(query.start);
    debug!("GET /blocks/ - start={} returned {}", query.start, blocks.len());
    HttpResponse::Ok().json(blocks)
}

/// Seal the raw request body into a new block.
///
/// Mining is CPU-bound and unbounded, so it runs on the blocking pool rather
/// than on the async workers.
#[post("/blocks/")]
pub async fn submit_block(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let t0 = Instant::now();
    let payload = body.to_vec();
    debug!("POST /blocks/ - received {} bytes", payload.len());

    let chain = state.blockchain.clone();
    let outcome = web::block(move || chain.submit(payload, None)).await;

    match outcome {
        Ok(Ok(block)) => {
            info!(
                "POST /blocks/ - sealed block #{} (hash={}, nonce={}) in {} ms",
                block.height,
                block.hash,
                block.nonce,
                t0.elapsed().as_millis()
            );
            HttpResponse::Ok().json(block)
        }
        Ok(Err(e)) => {
            warn!("POST /blocks/ - rejected: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            warn!("POST /blocks/ - mining task failed: {e}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "mining task failed".to_string(),
            })
        }
    }
}
