use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_total: IntCounterVec,
    pub dispatch_latency_seconds: HistogramVec,
    pub dispatch_queue_depth: IntGauge,
    pub drivers_by_availability: IntGaugeVec,
    pub proximity_alerts_total: IntCounter,
    pub notification_failures_total: IntCounterVec,
    pub order_transitions_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_total = IntCounterVec::new(
            Opts::new("dispatch_total", "Total dispatch attempts by outcome"),
            &["outcome"],
        )
        .expect("valid dispatch_total metric");

        let dispatch_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "dispatch_latency_seconds",
                "Latency of driver dispatch in seconds",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_latency_seconds metric");

        let dispatch_queue_depth =
            IntGauge::new("dispatch_queue_depth", "Dispatch requests waiting in the queue")
                .expect("valid dispatch_queue_depth metric");

        let drivers_by_availability = IntGaugeVec::new(
            Opts::new("drivers_by_availability", "Registered drivers per availability"),
            &["availability"],
        )
        .expect("valid drivers_by_availability metric");

        let proximity_alerts_total = IntCounter::new(
            "proximity_alerts_total",
            "Proximity alerts raised for customers",
        )
        .expect("valid proximity_alerts_total metric");

        let notification_failures_total = IntCounterVec::new(
            Opts::new(
                "notification_failures_total",
                "Notifications that could not be handed to the gateway",
            ),
            &["channel"],
        )
        .expect("valid notification_failures_total metric");

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Order status writes by target status"),
            &["status"],
        )
        .expect("valid order_transitions_total metric");

        registry
            .register(Box::new(dispatch_total.clone()))
            .expect("register dispatch_total");
        registry
            .register(Box::new(dispatch_latency_seconds.clone()))
            .expect("register dispatch_latency_seconds");
        registry
            .register(Box::new(dispatch_queue_depth.clone()))
            .expect("register dispatch_queue_depth");
        registry
            .register(Box::new(drivers_by_availability.clone()))
            .expect("register drivers_by_availability");
        registry
            .register(Box::new(proximity_alerts_total.clone()))
            .expect("register proximity_alerts_total");
        registry
            .register(Box::new(notification_failures_total.clone()))
            .expect("register notification_failures_total");
        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");

        Self {
            registry,
            dispatch_total,
            dispatch_latency_seconds,
            dispatch_queue_depth,
            drivers_by_availability,
            proximity_alerts_total,
            notification_failures_total,
            order_transitions_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
