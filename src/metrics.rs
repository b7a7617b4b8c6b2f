use std::sync::LazyLock;

use prometheus::*;

static METRIC_RECOGNITION_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "va_recognition_count",
        "count of recognition requests by outcome",
        &["outcome"]
    )
    .expect("failed to register va_recognition_count")
});

static METRIC_RECOGNITION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "va_recognition_duration",
        "duration of feature extraction and matching in seconds"
    )
    .expect("failed to register va_recognition_duration")
});

static METRIC_RECOGNITION_CONFIDENCE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "va_recognition_confidence",
        "best cosine similarity of the recognition",
        &["outcome"],
        (-4..=20).map(|x| x as f64 / 20.0).collect()
    )
    .expect("failed to register va_recognition_confidence")
});

/// 记录一次识别的结果和置信度
pub fn inc_recognition(outcome: &str, confidence: f32) {
    METRIC_RECOGNITION_COUNT.with_label_values(&[outcome]).inc();
    METRIC_RECOGNITION_CONFIDENCE.with_label_values(&[outcome]).observe(confidence as f64);
}

pub fn observe_recognition_duration(duration: f32) {
    METRIC_RECOGNITION_DURATION.observe(duration as f64);
}
