use prometheus::{Counter, Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_metrics(&registry).expect("metrics can be registered");
        registry
    };

    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests"),
        &["method", "status"]
    ).expect("metric can be created");

    // Business metrics - seed inventory
    pub static ref BATCHES_CREATED: IntCounter = IntCounter::new(
        "seed_batches_created_total",
        "Total seed batches registered"
    ).expect("metric can be created");

    pub static ref BATCHES_DELETED: IntCounter = IntCounter::new(
        "seed_batches_deleted_total",
        "Total seed batches deleted"
    ).expect("metric can be created");

    pub static ref OUTGOING_TRANSACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("outgoing_transactions_total", "Outgoing transactions recorded"),
        &["type"]
    ).expect("metric can be created");

    pub static ref OUTGOING_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("outgoing_rejections_total", "Outgoing transactions rejected by business rules"),
        &["reason"]
    ).expect("metric can be created");

    pub static ref GRAMS_DISPENSED: Counter = Counter::new(
        "seed_grams_dispensed_total",
        "Grams of seed removed from inventory"
    ).expect("metric can be created");

    pub static ref PHOTOS_UPLOADED: IntCounter = IntCounter::new(
        "batch_photos_uploaded_total",
        "Total batch photos stored"
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;

    registry.register(Box::new(BATCHES_CREATED.clone()))?;
    registry.register(Box::new(BATCHES_DELETED.clone()))?;
    registry.register(Box::new(OUTGOING_TRANSACTIONS.clone()))?;
    registry.register(Box::new(OUTGOING_REJECTIONS.clone()))?;
    registry.register(Box::new(GRAMS_DISPENSED.clone()))?;
    registry.register(Box::new(PHOTOS_UPLOADED.clone()))?;

    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
