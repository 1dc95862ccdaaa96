use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use school_payment_engine::{ReconciliationApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::EdvironApi,
    routes::{
        check_gateway_status,
        create_payment,
        health,
        payment_callback,
        transaction_status,
        transactions,
        transactions_by_school,
        webhook,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let gateway = EdvironApi::new(&config.gateway).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = HttpServer::new(move || {
        let api = ReconciliationApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("sps::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(config.gateway.clone()));
        let api_scope = web::scope("/api")
            .route("/create-payment", web::post().to(create_payment::<SqliteDatabase>))
            .route("/webhook", web::post().to(webhook::<SqliteDatabase>))
            .route("/payment-callback", web::get().to(payment_callback::<SqliteDatabase>))
            .route("/transaction-status/{order_id}", web::get().to(transaction_status::<SqliteDatabase>))
            .route("/check-status/{order_id}", web::get().to(check_gateway_status::<SqliteDatabase>))
            .route("/transactions", web::get().to(transactions::<SqliteDatabase>))
            .route("/transactions/school/{school_id}", web::get().to(transactions_by_school::<SqliteDatabase>));
        app.service(health).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
