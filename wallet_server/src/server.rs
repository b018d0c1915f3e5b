use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use wallet_engine::{
    events::EventProducers,
    AccountApi,
    CartApi,
    CatalogApi,
    LedgerApi,
    OrderFlowApi,
    ReconciliationApi,
    ReconciliationCache,
    SqliteDatabase,
    TopUpApi,
};

use crate::{
    cache_janitor::start_cache_janitor,
    config::ServerConfig,
    errors::ServerError,
    integrations::audit_log::create_audit_event_handlers,
    routes::{
        health,
        AccountByIdRoute,
        AddCartItemRoute,
        AddCartItemsRoute,
        AddProductRoute,
        AssignLoanRoute,
        AuditLogRoute,
        BalanceSummaryRoute,
        CartRoute,
        ClearCartRoute,
        CompleteProcessingItemsRoute,
        CreateAccountRoute,
        DeductLoanRoute,
        DirectOrderRoute,
        LoanStatusRoute,
        OrderByIdRoute,
        OrdersForAccountRoute,
        ProcessTopUpRoute,
        ProductByIdRoute,
        RefundRoute,
        RemoveCartItemRoute,
        RepayLoanRoute,
        SearchOrdersRoute,
        SetItemStatusRoute,
        SetOrderItemsStatusRoute,
        SetOrderStatusRoute,
        SetStockRoute,
        StatisticsRoute,
        StatusCountsRoute,
        SubmitCartRoute,
        TransactionsRoute,
        UpdatePriceRoute,
        VerifyLedgerRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?
        .with_retry_policy(config.retry);
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    } else {
        warn!("🪛️ Skipping database migrations. Make sure the schema is up to date.");
    }
    let handlers = create_audit_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let cache = ReconciliationCache::new(config.cache.ttl, config.cache.max_entries);
    // Not awaited. The janitor lives as long as the server.
    let _janitor = start_cache_janitor(cache.clone(), config.cache.janitor_period);
    let srv = create_server_instance(config, db, producers, cache)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    cache: ReconciliationCache,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let db = db.clone();
        let producers = producers.clone();
        let cache = cache.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("wallet::access_log"))
            .configure(move |cfg| configure_app(cfg, db, producers, cache))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the engine APIs, the extractor error handlers and every route on `cfg`.
pub fn configure_app(
    cfg: &mut web::ServiceConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    cache: ReconciliationCache,
) {
    cfg.app_data(web::Data::new(AccountApi::new(db.clone())))
        .app_data(web::Data::new(CatalogApi::new(db.clone())))
        .app_data(web::Data::new(CartApi::new(db.clone())))
        .app_data(web::Data::new(OrderFlowApi::new(db.clone(), producers)))
        .app_data(web::Data::new(LedgerApi::new(db.clone())))
        .app_data(web::Data::new(TopUpApi::new(db.clone())))
        .app_data(web::Data::new(ReconciliationApi::new(db, cache)));
    configure_extractors(cfg);
    // Static paths are registered ahead of the parameterised paths they would otherwise collide with.
    let api_scope = web::scope("/api")
        .service(CreateAccountRoute::<SqliteDatabase>::new())
        .service(AccountByIdRoute::<SqliteDatabase>::new())
        .service(OrdersForAccountRoute::<SqliteDatabase>::new())
        .service(AddProductRoute::<SqliteDatabase>::new())
        .service(ProductByIdRoute::<SqliteDatabase>::new())
        .service(UpdatePriceRoute::<SqliteDatabase>::new())
        .service(SetStockRoute::<SqliteDatabase>::new())
        .service(RemoveCartItemRoute::<SqliteDatabase>::new())
        .service(AddCartItemsRoute::<SqliteDatabase>::new())
        .service(AddCartItemRoute::<SqliteDatabase>::new())
        .service(CartRoute::<SqliteDatabase>::new())
        .service(ClearCartRoute::<SqliteDatabase>::new())
        .service(DirectOrderRoute::<SqliteDatabase>::new())
        .service(SearchOrdersRoute::<SqliteDatabase>::new())
        .service(SubmitCartRoute::<SqliteDatabase>::new())
        .service(OrderByIdRoute::<SqliteDatabase>::new())
        .service(SetOrderItemsStatusRoute::<SqliteDatabase>::new())
        .service(SetOrderStatusRoute::<SqliteDatabase>::new())
        .service(CompleteProcessingItemsRoute::<SqliteDatabase>::new())
        .service(StatusCountsRoute::<SqliteDatabase>::new())
        .service(SetItemStatusRoute::<SqliteDatabase>::new())
        .service(TransactionsRoute::<SqliteDatabase>::new())
        .service(BalanceSummaryRoute::<SqliteDatabase>::new())
        .service(AuditLogRoute::<SqliteDatabase>::new())
        .service(StatisticsRoute::<SqliteDatabase>::new())
        .service(VerifyLedgerRoute::<SqliteDatabase>::new())
        .service(ProcessTopUpRoute::<SqliteDatabase>::new())
        .service(AssignLoanRoute::<SqliteDatabase>::new())
        .service(RepayLoanRoute::<SqliteDatabase>::new())
        .service(DeductLoanRoute::<SqliteDatabase>::new())
        .service(LoanStatusRoute::<SqliteDatabase>::new())
        .service(RefundRoute::<SqliteDatabase>::new());
    cfg.service(health).service(api_scope);
}

/// Malformed bodies, paths and query strings are reported with the same error envelope as everything else.
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default().error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into()),
    )
    .app_data(web::QueryConfig::default().error_handler(|err, _req| ServerError::InvalidQuery(err.to_string()).into()));
}
