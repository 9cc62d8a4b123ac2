use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bag_claims_total: IntCounterVec,
    pub bags_claimed_total: IntCounter,
    pub mission_completions_total: IntCounterVec,
    pub mission_completion_latency_seconds: HistogramVec,
    pub rank_promotions_total: IntCounterVec,
    pub active_missions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bag_claims_total = IntCounterVec::new(
            Opts::new("bag_claims_total", "Bag claims by outcome"),
            &["outcome"],
        )
        .expect("valid bag_claims_total metric");

        let bags_claimed_total =
            IntCounter::new("bags_claimed_total", "Bags taken from campaign inventory")
                .expect("valid bags_claimed_total metric");

        let mission_completions_total = IntCounterVec::new(
            Opts::new("mission_completions_total", "Mission completions by outcome"),
            &["outcome"],
        )
        .expect("valid mission_completions_total metric");

        let mission_completion_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "mission_completion_latency_seconds",
                "Latency of mission completion including upload and geofence",
            ),
            &["outcome"],
        )
        .expect("valid mission_completion_latency_seconds metric");

        let rank_promotions_total = IntCounterVec::new(
            Opts::new("rank_promotions_total", "Rank promotions by new rank"),
            &["rank"],
        )
        .expect("valid rank_promotions_total metric");

        let active_missions = IntGauge::new("active_missions", "Missions started and not finished")
            .expect("valid active_missions metric");

        registry
            .register(Box::new(bag_claims_total.clone()))
            .expect("register bag_claims_total");
        registry
            .register(Box::new(bags_claimed_total.clone()))
            .expect("register bags_claimed_total");
        registry
            .register(Box::new(mission_completions_total.clone()))
            .expect("register mission_completions_total");
        registry
            .register(Box::new(mission_completion_latency_seconds.clone()))
            .expect("register mission_completion_latency_seconds");
        registry
            .register(Box::new(rank_promotions_total.clone()))
            .expect("register rank_promotions_total");
        registry
            .register(Box::new(active_missions.clone()))
            .expect("register active_missions");

        Self {
            registry,
            bag_claims_total,
            bags_claimed_total,
            mission_completions_total,
            mission_completion_latency_seconds,
            rank_promotions_total,
            active_missions,
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
