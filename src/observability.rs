use biometrics::{Collector, Counter, Moments};

pub(crate) static TRANSPORT_REQUESTS: Counter = Counter::new("converse.transport.requests");
pub(crate) static TRANSPORT_REQUEST_ERRORS: Counter =
    Counter::new("converse.transport.request_errors");
pub(crate) static TRANSPORT_TTFB: Moments = Moments::new("converse.transport.ttfb_seconds");

pub(crate) static STREAM_BYTES: Counter = Counter::new("converse.stream.bytes");
pub(crate) static STREAM_FRAMES: Counter = Counter::new("converse.stream.frames");
pub(crate) static STREAM_DECODE_ERRORS: Counter = Counter::new("converse.stream.decode_errors");
pub(crate) static STREAM_STALE_FRAMES: Counter = Counter::new("converse.stream.stale_frames");

pub(crate) static SESSION_SUBMITS: Counter = Counter::new("converse.session.submits");
pub(crate) static SESSION_REJECTED_SUBMITS: Counter =
    Counter::new("converse.session.rejected_submits");
pub(crate) static SESSION_RESETS: Counter = Counter::new("converse.session.resets");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TRANSPORT_REQUESTS);
    collector.register_counter(&TRANSPORT_REQUEST_ERRORS);
    collector.register_moments(&TRANSPORT_TTFB);

    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_DECODE_ERRORS);
    collector.register_counter(&STREAM_STALE_FRAMES);

    collector.register_counter(&SESSION_SUBMITS);
    collector.register_counter(&SESSION_REJECTED_SUBMITS);
    collector.register_counter(&SESSION_RESETS);
}
