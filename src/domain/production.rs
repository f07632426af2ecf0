// ==========================================
// PCB产线排产系统 - 生产订单实体
// ==========================================
// 职责: 一个销售订单的物化执行记录及其阶段
// 不变量:
// - 阶段计划开始时间单调递增, phase(k).end ≤ phase(k+1).start
// - PO 计划开始 = 首阶段开始, 计划结束 = 末阶段结束
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{PhaseStatus, PhaseType, ProductionOrderStatus};

/// 生产订单的一个工艺阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionPhase {
    /// 外部系统 ID
    pub id: String,
    pub phase_type: PhaseType,
    /// 在 PO 内的序号 (0 起)
    pub sequence: u32,
    #[serde(default)]
    pub planned_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub planned_end: Option<DateTime<Utc>>,
    pub status: PhaseStatus,
    /// 工作时间总工时 = 单件工时 × 件数 (分钟)
    pub duration_minutes: i64,
}

/// 生产订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    /// 外部系统分配的 ID
    pub id: String,
    pub sales_order_id: String,
    /// 产品业务编码
    pub product_id: String,
    pub quantity: u32,
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub status: ProductionOrderStatus,
    /// 按工艺顺序排列
    pub phases: Vec<ProductionPhase>,
}

impl ProductionOrder {
    /// 计划窗口是否覆盖给定时刻
    pub fn window_contains(&self, t: DateTime<Utc>) -> bool {
        self.planned_start <= t && t < self.planned_end
    }
}
