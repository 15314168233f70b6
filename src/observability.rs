use biometrics::{Collector, Counter, Moments};

pub(crate) static TURNS_STARTED: Counter = Counter::new("thinkstream.turn.started");
pub(crate) static TURNS_FAILED: Counter = Counter::new("thinkstream.turn.failed");
pub(crate) static TURNS_INTERRUPTED: Counter = Counter::new("thinkstream.turn.interrupted");
pub(crate) static TURN_DURATION: Moments = Moments::new("thinkstream.turn.duration_seconds");

pub(crate) static FRAGMENTS_RECEIVED: Counter = Counter::new("thinkstream.fragment.received");
pub(crate) static FRAGMENT_SHAPE_ERRORS: Counter =
    Counter::new("thinkstream.fragment.shape_errors");
pub(crate) static UNCLASSIFIABLE_BLOCKS: Counter =
    Counter::new("thinkstream.block.unclassifiable");

pub(crate) static REASONING_SEGMENTS: Counter = Counter::new("thinkstream.segment.reasoning");
pub(crate) static ANSWER_SEGMENTS: Counter = Counter::new("thinkstream.segment.answer");
pub(crate) static CHANNEL_TRANSITIONS: Counter = Counter::new("thinkstream.channel.transitions");

pub(crate) static PROVIDER_REQUESTS: Counter = Counter::new("thinkstream.provider.requests");
pub(crate) static PROVIDER_ERRORS: Counter = Counter::new("thinkstream.provider.errors");
pub(crate) static PROVIDER_REQUEST_DURATION: Moments =
    Moments::new("thinkstream.provider.request_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TURNS_STARTED);
    collector.register_counter(&TURNS_FAILED);
    collector.register_counter(&TURNS_INTERRUPTED);
    collector.register_moments(&TURN_DURATION);

    collector.register_counter(&FRAGMENTS_RECEIVED);
    collector.register_counter(&FRAGMENT_SHAPE_ERRORS);
    collector.register_counter(&UNCLASSIFIABLE_BLOCKS);

    collector.register_counter(&REASONING_SEGMENTS);
    collector.register_counter(&ANSWER_SEGMENTS);
    collector.register_counter(&CHANNEL_TRANSITIONS);

    collector.register_counter(&PROVIDER_REQUESTS);
    collector.register_counter(&PROVIDER_ERRORS);
    collector.register_moments(&PROVIDER_REQUEST_DURATION);
}
