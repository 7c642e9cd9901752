mod chain;
mod health;
pub mod models;
mod stats;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::list_blocks)
            .service(chain::submit_block)
            .service(stats::get_stats)
            .service(wallet::create_wallet),
    );
}
