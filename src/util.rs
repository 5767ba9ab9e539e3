const FNV1A_OFFSET: u64 = 0xcbf29ce484222325;
const FNV1A_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a over the UTF-8 bytes of `key`. Fixed algorithm, so the value
/// does not depend on the toolchain or the process.
pub fn fnv1a(key: &str) -> u64 {
    key.bytes().fold(FNV1A_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV1A_PRIME)
    })
}

/// Deterministic index in `0..len` derived from `key`. Same key, same pick,
/// across runs, redraws and builds.
pub fn stable_index(key: &str, len: usize) -> usize {
    if len == 0 {
        return 0;
    }

    (fnv1a(key) % len as u64) as usize
}

/// Length in characters, the unit word filters are expressed in.
pub fn char_len(word: &str) -> usize {
    word.chars().count()
}
