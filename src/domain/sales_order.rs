// ==========================================
// PCB产线排产系统 - 销售订单实体
// ==========================================
// 职责: 客户承诺 (产品/数量/交期/优先级)
// 说明: 核心只允许修改 priority 与 status
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::SalesOrderStatus;

/// 客户
///
/// rank 为客户分级 (1 最高), 缺省时由排序引擎查表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rank: Option<i32>,
}

impl Customer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rank: None,
        }
    }
}

/// 销售订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    /// 外部系统 ID
    pub id: String,
    /// 业务编号 (如 SO-001)
    pub internal_id: String,
    pub customer: Customer,
    /// 产品业务编码 (如 PCB-IND-100)
    pub product_id: String,
    pub product_name: String,
    /// 件数, 恒为正
    pub quantity: u32,
    /// 交期 (UTC)
    pub deadline: DateTime<Utc>,
    /// 1 = 最高优先级
    pub priority: i32,
    pub status: SalesOrderStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
