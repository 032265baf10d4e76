//! Thin, optional metrics façade (ambient, §6 of `SPEC_FULL.md`).
//!
//! Uses the `metrics` crate the way the teacher workspace depends on it for
//! its own observability surface (`mesh`/`model_gateway` both carry a
//! `metrics` dependency for worker-keyed counters/gauges). Recording is a
//! cheap no-op unless the host process has installed a recorder, so calling
//! these helpers imposes no cost on callers who don't care about metrics.

pub fn ring_refresh_attempted() {
    metrics::counter!("dora_client_ring_refresh_attempted_total").increment(1);
}

pub fn ring_swapped(worker_count: usize) {
    metrics::counter!("dora_client_ring_swap_total").increment(1);
    metrics::gauge!("dora_client_ring_worker_count").set(worker_count as f64);
}

pub fn ring_refresh_failed() {
    metrics::counter!("dora_client_ring_refresh_failed_total").increment(1);
}

pub fn page_read_latency(seconds: f64) {
    metrics::histogram!("dora_client_page_read_seconds").record(seconds);
}

pub fn page_write_latency(seconds: f64) {
    metrics::histogram!("dora_client_page_write_seconds").record(seconds);
}
