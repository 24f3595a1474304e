pub mod logging;

/// Set to a truthy value such as `1` or `true`.
fn env_flag(var: &str) -> bool {
    std::env::var(var)
        .map(|value| crate::config::is_truthy(&value))
        .unwrap_or(false)
}
