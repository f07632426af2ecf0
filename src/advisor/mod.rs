// ==========================================
// PCB产线排产系统 - AI 排程顾问边界
// ==========================================
// 职责: 再计划时向顾问征询排序建议
// 红线: 顾问只产出提示 (排列 + 优先级调整 + 文字),
//       确定性内核是唯一写入者, 顾问失败回退纯 EDF
// ==========================================

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub use gemini::GeminiAdvisor;

/// 顾问调用超时 (秒)
pub const ADVISOR_TIMEOUT_SECS: u64 = 60;

/// 优先级合法区间
const PRIORITY_MIN: i32 = 1;
const PRIORITY_MAX: i32 = 4;

/// 顾问错误
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("顾问调用超时")]
    Timeout,

    #[error("顾问传输失败: {0}")]
    Transport(String),

    #[error("顾问响应解析失败: {0}")]
    Decode(String),

    #[error("顾问未配置")]
    Unconfigured,
}

/// 提交给顾问的单条订单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorOrder {
    pub sales_order_id: String,
    pub sales_order_internal_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub priority: i32,
    pub deadline: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub planned_start: Option<String>,
    #[serde(default)]
    pub planned_end: Option<String>,
    #[serde(default)]
    pub is_existing: bool,
}

/// 顾问请求: 操作员反馈 + 当前方案 + 待排订单 + EDF 基线
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorRequest {
    pub now: String,
    pub operator_feedback: String,
    pub current_schedule: Vec<AdvisorOrder>,
    pub pending_orders: Vec<AdvisorOrder>,
    /// EDF 基线排序 (sales_order_id 序列)
    pub edf_baseline: Vec<String>,
}

/// 顾问建议的优先级调整
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityUpdate {
    pub sales_order_id: String,
    pub new_priority: i32,
    #[serde(default)]
    pub reason: String,
}

/// 顾问回复 (已净化)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReply {
    /// 待排订单的建议排列 (只含合法 id)
    #[serde(default)]
    pub reordered_so_ids: Vec<String>,
    #[serde(default)]
    pub priority_updates: Vec<PriorityUpdate>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

/// 排程顾问
#[async_trait]
pub trait ScheduleAdvisor: Send + Sync {
    async fn propose_revision(
        &self,
        request: &AdvisorRequest,
    ) -> Result<AdvisorReply, AdvisorError>;
}

/// 净化顾问的原始 JSON 回复
///
/// - 丢弃不在待排集合中的订单 id 与重复 id
/// - 丢弃优先级不在 1..=4 的调整
/// - JSON 非法时返回仅含说明文字的空回复
pub fn sanitize_reply(raw_text: &str, pending_ids: &HashSet<String>) -> AdvisorReply {
    let data: serde_json::Value = match serde_json::from_str(raw_text) {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!("顾问回复非法 JSON, 回退 EDF: {}", &raw_text.chars().take(120).collect::<String>());
            return AdvisorReply {
                comment: "AI response was not valid JSON. Using default EDF order.".to_string(),
                ..Default::default()
            };
        }
    };

    let mut seen = HashSet::new();
    let reordered: Vec<String> = data
        .get("reordered_so_ids")
        .and_then(serde_json::Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(serde_json::Value::as_str)
                .filter(|sid| pending_ids.contains(*sid))
                .filter(|sid| seen.insert(sid.to_string()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let priority_updates: Vec<PriorityUpdate> = data
        .get("priority_updates")
        .and_then(serde_json::Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(|u| {
                    let sid = u.get("sales_order_id")?.as_str()?;
                    let pri = u.get("new_priority")?.as_i64()? as i32;
                    if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&pri) {
                        return None;
                    }
                    Some(PriorityUpdate {
                        sales_order_id: sid.to_string(),
                        new_priority: pri,
                        reason: u
                            .get("reason")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let comment = data
        .get("ai_comment")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    let conflicts = data
        .get("conflicts")
        .and_then(serde_json::Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    AdvisorReply {
        reordered_so_ids: reordered,
        priority_updates,
        comment,
        conflicts,
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> HashSet<String> {
        ["so-1", "so-2", "so-3"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_sanitize_drops_unknown_and_duplicate_ids() {
        let raw = r#"{
            "reordered_so_ids": ["so-2", "ghost", "so-1", "so-2"],
            "priority_updates": [],
            "ai_comment": "ok",
            "conflicts": []
        }"#;
        let reply = sanitize_reply(raw, &pending());
        assert_eq!(reply.reordered_so_ids, vec!["so-2", "so-1"]);
        assert_eq!(reply.comment, "ok");
    }

    #[test]
    fn test_sanitize_drops_out_of_range_priority() {
        let raw = r#"{
            "reordered_so_ids": [],
            "priority_updates": [
                {"sales_order_id": "so-1", "new_priority": 1, "reason": "escalated"},
                {"sales_order_id": "so-2", "new_priority": 0},
                {"sales_order_id": "so-3", "new_priority": 9}
            ]
        }"#;
        let reply = sanitize_reply(raw, &pending());
        assert_eq!(reply.priority_updates.len(), 1);
        assert_eq!(reply.priority_updates[0].sales_order_id, "so-1");
        assert_eq!(reply.priority_updates[0].reason, "escalated");
    }

    #[test]
    fn test_sanitize_invalid_json_falls_back() {
        let reply = sanitize_reply("not json at all", &pending());
        assert!(reply.reordered_so_ids.is_empty());
        assert!(reply.comment.contains("EDF"));
    }
}
