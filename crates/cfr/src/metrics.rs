//! Metric descriptions.
//!
//! The crates record through the `metrics` facade; install any recorder to
//! collect them.

use metrics::{Unit, describe_counter, describe_histogram};

/// Initialize metric descriptions.
///
/// Call this once at startup, after installing a recorder.
pub fn init() {
    describe_counter!(
        "cfr_blocks_disassembled_total",
        Unit::Count,
        "Total blocks produced by disassembly"
    );
    describe_counter!(
        "cfr_decode_failures_total",
        Unit::Count,
        "Total instructions that failed to decode or translate"
    );
    describe_counter!(
        "cfr_blocks_classified_total",
        Unit::Count,
        "Total blocks classified, labelled by terminator kind"
    );
    describe_counter!(
        "cfr_classify_failures_total",
        Unit::Count,
        "Total blocks no classifier could explain"
    );
    describe_counter!(
        "cfr_functions_explored_total",
        Unit::Count,
        "Total functions explored"
    );
    describe_histogram!(
        "cfr_function_blocks",
        Unit::Count,
        "Blocks discovered per function"
    );
}
