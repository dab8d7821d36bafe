mod chain;
mod health;
mod lookup;
pub mod models;

use actix_web::web::ServiceConfig;

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(health::health_check)
        .service(chain::get_chain)
        .service(chain::validate_chain)
        .service(chain::mine_block)
        .service(lookup::get_block)
        .service(lookup::search_block);
}
