// ==========================================
// PCB产线排产系统 - 排产方案快照
// ==========================================
// 职责: 一次排产流水线运行的不可变快照
// 不变量:
// - 同一方案内条目窗口两两不重叠 (单线)
// - proposed 状态的方案在任一时刻至多一个
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::types::{PhaseType, Policy, ScheduleStatus};

/// 条目内一个已定窗口的阶段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPhase {
    /// 外部系统阶段 ID
    pub phase_id: String,
    pub phase_type: PhaseType,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// 排产方案中的一个条目 (每个 PO 一条)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub production_order_id: String,
    pub sales_order_id: String,
    /// 业务编号 (如 SO-001)
    pub sales_order_internal_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub customer_name: String,
    pub priority: i32,
    pub planned_start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// 有符号裕量 (工作分钟), 负值 = 迟交
    pub slack_minutes: i64,
    pub late: bool,
    pub phases: Vec<EntryPhase>,
}

/// 排产方案快照
///
/// id 由仓储层在持久化时单调分配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub generated_at: DateTime<Utc>,
    pub policy: Policy,
    pub entries: Vec<ScheduleEntry>,
    /// 迟交订单的业务编号列表
    pub conflicts: Vec<String>,
    pub status: ScheduleStatus,
    /// 顾问备注或操作员备注
    #[serde(default)]
    pub notes: String,
}

impl Schedule {
    /// 是否全部条目按期
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| !e.late)
    }

    pub fn late_count(&self) -> usize {
        self.entries.iter().filter(|e| e.late).count()
    }
}
