// ==========================================
// PCB产线排产系统 - 网关错误类型
// ==========================================
// 错误分级: 瞬时 (可重试) / 永久 / 认证过期
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 网关层错误类型
#[derive(Error, Debug)]
pub enum GatewayError {
    // ===== 可重试 =====
    #[error("网关请求超时: {0}")]
    Timeout(String),

    #[error("网关瞬时错误: {0}")]
    Transient(String),

    // ===== 认证 =====
    #[error("认证已过期且刷新失败")]
    AuthExpired,

    #[error("认证失败: {0}")]
    AuthFailed(String),

    // ===== 永久 =====
    #[error("记录未找到: {resource}")]
    NotFound { resource: String },

    #[error("网关永久错误: status={status}, {message}")]
    Permanent { status: u16, message: String },

    #[error("响应解析失败: {0}")]
    Decode(String),
}

impl GatewayError {
    /// 是否值得按退避策略重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Timeout(_) | GatewayError::Transient(_))
    }
}

/// Result 类型别名
pub type GatewayResult<T> = Result<T, GatewayError>;
