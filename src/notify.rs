// ==========================================
// PCB产线排产系统 - 邮件通知边界
// ==========================================
// 职责: 审批结果 / 迟交告警的邮件外发
// 说明: SMTP 投递在边界之外, 核心只依赖 trait;
//       通知失败不阻断排产流程, 仅记录日志
// ==========================================

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("邮件发送失败: {0}")]
    Send(String),
}

/// 邮件通知器
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// 空操作通知器: 用于未配置 SMTP 的部署与测试
#[derive(Debug, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl EmailNotifier for NoOpNotifier {
    async fn send(&self, subject: &str, _body: &str) -> Result<(), NotifyError> {
        debug!("NoOpNotifier: 丢弃邮件通知 subject={subject}");
        Ok(())
    }
}
