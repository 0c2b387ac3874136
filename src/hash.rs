use crate::types::TieBreaker;

/// MD5 digest of `name` read as a big-endian integer.
///
/// Peers running other implementations compare the hex digest as an
/// integer, so the byte order must stay big-endian.
pub fn column_tiebreaker(name: &str) -> TieBreaker {
    TieBreaker::from_be_bytes(md5::compute(name.as_bytes()).0)
}

/// Per-record RNG seed: the leading 8 bytes of `md5(seed_be ++ value)`.
///
/// Independent of the toolchain's `std` hasher, so every build derives the
/// same seed.
pub fn record_seed(seed: u64, value: &str) -> u64 {
    let mut context = md5::Context::new();
    context.consume(seed.to_be_bytes());
    context.consume(value.as_bytes());
    let digest = context.compute();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.0[..8]);
    u64::from_be_bytes(head)
}
