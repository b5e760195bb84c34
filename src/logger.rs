use tracing_subscriber::{EnvFilter, fmt};

/// 初始化全局 `tracing` 订阅者
///
/// 过滤规则优先读取 `RUST_LOG`，否则使用 `default_level`
/// （普通运行为 `info`，`--verbose` 时为 `debug`）。
///
/// 示例：
/// - RUST_LOG=debug ocrun run collection.json
/// - RUST_LOG=ocrun::script=debug ocrun run collection.json
pub fn init_logger(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 可能已经安装过订阅者（测试或嵌入宿主），用 try_init
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    tracing::debug!("Logger initialized");
}
