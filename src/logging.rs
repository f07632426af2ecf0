// ==========================================
// PCB产线排产系统 - 日志系统初始化
// ==========================================
// 过滤来源优先级: APS_LOG > RUST_LOG > 内置缺省
// 缺省: 依赖库 warn, 排产核心 info
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 内置缺省过滤: 网关/顾问等依赖库只留 warn, 排产核心 info
const DEFAULT_DIRECTIVES: &str = "warn,pcb_line_aps=info";

/// 初始化日志系统 (服务启动时调用一次)
///
/// # 环境变量
/// - APS_LOG: 排产系统专用过滤器, 优先生效
/// - RUST_LOG: 通用过滤器, APS_LOG 未设置时生效
///   例如: APS_LOG=pcb_line_aps::orchestrator=debug
pub fn init() {
    fmt()
        .with_env_filter(filter_from_env())
        .with_target(true)
        .init();
}

/// 初始化测试环境的日志系统 (可重复调用)
///
/// 排产核心放到 debug, 输出交给测试捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("pcb_line_aps=debug"))
        .with_test_writer()
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    std::env::var("APS_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}
