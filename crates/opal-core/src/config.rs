use std::sync::OnceLock;

fn usize_from_env(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|val| val.trim().parse().ok())
}

/// Upper bound on the element count the planner will place in a
/// fixed-capacity inline stack buffer before degrading to a heap array.
pub fn inline_buffer_cap() -> usize {
    static CAP: OnceLock<usize> = OnceLock::new();
    *CAP.get_or_init(|| usize_from_env("OPAL_INLINE_BUFFER_CAP").unwrap_or(512))
}
