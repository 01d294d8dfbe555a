use anyhow::Result;

/// The daemon runs every tick handler on one logical thread, so a
/// current-thread runtime is enough and keeps state access lock-free.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
