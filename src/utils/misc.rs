/// Progress interval used when a session has no trigger limit.
pub const DEFAULT_REPORTING_THRESHOLD: u64 = 1000;

/// Trigger progress is reported every time the counter passes a multiple of
/// this value: `10^(ceil(log10(max_triggers)) - 1)`, at least 1.
///
/// Exact powers of ten report one magnitude finer than their digit count
/// suggests: a limit of 10 gives 1, a limit of 100 gives 10.
pub fn reporting_threshold(max_triggers: Option<u64>) -> u64 {
    let Some(max_triggers) = max_triggers else {
        return DEFAULT_REPORTING_THRESHOLD;
    };
    // ceil(log10(n)) is the digit count of n - 1
    let magnitude = decimal_digits(max_triggers.saturating_sub(1));
    if magnitude == 0 {
        1
    } else {
        10u64.pow(magnitude - 1)
    }
}

pub fn decimal_digits(value: u64) -> u32 {
    if value == 0 { 0 } else { value.ilog10() + 1 }
}

/// Positions of the set bits, lowest first.
pub fn bits_set(value: u64) -> Vec<usize> {
    (0..u64::BITS as usize)
        .filter(|&bit| value & (1 << bit) != 0)
        .collect()
}
