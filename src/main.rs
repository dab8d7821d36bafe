mod api;
mod ledger;

use std::env;
use std::fs;
use std::path::PathBuf;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;

use api::AppState;
use ledger::Ledger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let data_dir = env::var("DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));

    fs::create_dir_all(&data_dir)?;

    println!("⛓️ Starting detection ledger API at http://{host}:{port}");

    let state = web::Data::new(AppState {
        ledger: Ledger::open(data_dir.join("blockchain.json")),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
