use std::env;

use actix_web::{middleware, web, App, HttpServer};

use massage2wellness::contact::ContactLog;
use massage2wellness::{routes, AppState, BookingStore, Storage};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let storage = Storage::new(&data_dir);

    let store = BookingStore::load(storage.clone()).await?;
    let contact = ContactLog::load(storage).await?;
    let state = AppState::new(store, contact);

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting Massage2Wellness on http://{address}, data in {data_dir}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::public::configure)
            .configure(routes::admin::configure)
            .configure(routes::events::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
