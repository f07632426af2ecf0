// ==========================================
// PCB产线排产系统 - 操作员通道边界
// ==========================================
// 职责: 向操作员推送方案/告警, 接收封闭指令集
// 说明: 具体聊天框架 (Telegram 等) 在边界之外;
//       指令在边界处解析为封闭枚举, 核心只接受枚举
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::types::Policy;

/// 通道错误
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("无法识别的操作指令: {0}")]
    UnknownCommand(String),

    #[error("通道发送失败: {0}")]
    Send(String),

    #[error("通道已关闭")]
    Closed,
}

// ==========================================
// 操作员指令 (封闭集合)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatorCommand {
    Approve,
    Reject,
    Revise(String),
    CancelOrder {
        sales_order_id: String,
        production_order_id: String,
    },
    RestartOrder {
        sales_order_id: String,
        production_order_id: String,
    },
    RequestNewSchedule(Policy),
}

impl OperatorCommand {
    /// 解析通道回传的指令数据
    ///
    /// 格式:
    /// - "approve" / "reject"
    /// - "revise:<自由文本>"
    /// - "ff:cancel:<so_id>:<po_id>" / "ff:restart:<so_id>:<po_id>"
    /// - "schedule" / "schedule:<policy>"
    pub fn parse(data: &str) -> Result<Self, ChannelError> {
        let data = data.trim();
        if data.eq_ignore_ascii_case("approve") {
            return Ok(OperatorCommand::Approve);
        }
        if data.eq_ignore_ascii_case("reject") {
            return Ok(OperatorCommand::Reject);
        }
        if let Some(text) = data.strip_prefix("revise:") {
            let text = text.trim();
            if text.is_empty() {
                return Err(ChannelError::UnknownCommand(data.to_string()));
            }
            return Ok(OperatorCommand::Revise(text.to_string()));
        }
        if let Some(rest) = data.strip_prefix("ff:cancel:") {
            return Self::parse_order_pair(rest, data).map(|(so, po)| {
                OperatorCommand::CancelOrder {
                    sales_order_id: so,
                    production_order_id: po,
                }
            });
        }
        if let Some(rest) = data.strip_prefix("ff:restart:") {
            return Self::parse_order_pair(rest, data).map(|(so, po)| {
                OperatorCommand::RestartOrder {
                    sales_order_id: so,
                    production_order_id: po,
                }
            });
        }
        if data.eq_ignore_ascii_case("schedule") {
            return Ok(OperatorCommand::RequestNewSchedule(Policy::default()));
        }
        if let Some(policy) = data.strip_prefix("schedule:") {
            return Policy::parse(policy)
                .map(OperatorCommand::RequestNewSchedule)
                .ok_or_else(|| ChannelError::UnknownCommand(data.to_string()));
        }
        Err(ChannelError::UnknownCommand(data.to_string()))
    }

    /// 生成按钮回传数据 (与 parse 互逆)
    pub fn callback_data(&self) -> String {
        match self {
            OperatorCommand::Approve => "approve".to_string(),
            OperatorCommand::Reject => "reject".to_string(),
            OperatorCommand::Revise(text) => format!("revise:{text}"),
            OperatorCommand::CancelOrder {
                sales_order_id,
                production_order_id,
            } => format!("ff:cancel:{sales_order_id}:{production_order_id}"),
            OperatorCommand::RestartOrder {
                sales_order_id,
                production_order_id,
            } => format!("ff:restart:{sales_order_id}:{production_order_id}"),
            OperatorCommand::RequestNewSchedule(policy) => {
                format!("schedule:{}", policy.to_string().to_lowercase())
            }
        }
    }

    fn parse_order_pair(rest: &str, raw: &str) -> Result<(String, String), ChannelError> {
        let mut parts = rest.splitn(2, ':');
        match (parts.next(), parts.next()) {
            (Some(so), Some(po)) if !so.is_empty() && !po.is_empty() => {
                Ok((so.to_string(), po.to_string()))
            }
            _ => Err(ChannelError::UnknownCommand(raw.to_string())),
        }
    }
}

// ==========================================
// 推送载荷
// ==========================================

/// 待审批方案通知
#[derive(Debug, Clone)]
pub struct ProposalNotice {
    pub schedule_id: i64,
    /// 文字摘要
    pub summary: String,
    /// 甘特图渲染结果 (可为空)
    pub image: Vec<u8>,
}

/// 工厂失败告警
#[derive(Debug, Clone)]
pub struct FailureAlert {
    pub production_order_id: String,
    pub sales_order_id: Option<String>,
    pub sales_order_internal_id: Option<String>,
    pub product_id: String,
    pub description: String,
    /// 失败照片
    pub image: Vec<u8>,
    /// 供操作员选择的恢复动作
    pub actions: Vec<OperatorCommand>,
}

// ==========================================
// OperatorChannel trait
// ==========================================

/// 操作员通道
///
/// 发送与接收均可能挂起
#[async_trait]
pub trait OperatorChannel: Send + Sync {
    async fn send_proposal(&self, notice: &ProposalNotice) -> Result<(), ChannelError>;

    async fn send_failure_alert(&self, alert: &FailureAlert) -> Result<(), ChannelError>;

    async fn send_text(&self, text: &str) -> Result<(), ChannelError>;

    /// 阻塞等待下一条操作员指令
    async fn next_command(&self) -> Result<OperatorCommand, ChannelError>;
}

/// 空操作通道
///
/// 用于未接入聊天框架的部署与单元测试
#[derive(Debug, Default)]
pub struct NoOpChannel;

#[async_trait]
impl OperatorChannel for NoOpChannel {
    async fn send_proposal(&self, notice: &ProposalNotice) -> Result<(), ChannelError> {
        debug!("NoOpChannel: 丢弃方案通知 schedule_id={}", notice.schedule_id);
        Ok(())
    }

    async fn send_failure_alert(&self, alert: &FailureAlert) -> Result<(), ChannelError> {
        debug!(
            "NoOpChannel: 丢弃失败告警 po={}",
            alert.production_order_id
        );
        Ok(())
    }

    async fn send_text(&self, _text: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn next_command(&self) -> Result<OperatorCommand, ChannelError> {
        // 无上游指令来源, 永久挂起
        std::future::pending().await
    }
}
