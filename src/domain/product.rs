// ==========================================
// PCB产线排产系统 - 产品与工艺 BOM
// ==========================================
// 职责: 产品主数据 (只读) 与阶段工时表
// 约束: BOM 为 2..7 个阶段的有序序列, 单件工时恒为正
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::types::PhaseType;

/// BOM 中的一个工艺阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomPhase {
    pub phase_type: PhaseType,
    /// 单件工时 (分钟)
    pub duration_per_unit_min: u32,
}

/// 产品主数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// 外部系统 ID
    pub id: String,
    /// 业务编码 (如 PCB-IND-100)
    pub internal_id: String,
    pub name: String,
    /// 有序工艺阶段序列
    pub bom: Vec<BomPhase>,
}

impl Product {
    /// 单件总工时 (分钟)
    pub fn minutes_per_unit(&self) -> i64 {
        self.bom
            .iter()
            .map(|p| i64::from(p.duration_per_unit_min))
            .sum()
    }

    /// 指定件数的总生产工时 (分钟)
    pub fn production_minutes(&self, quantity: u32) -> i64 {
        self.minutes_per_unit() * i64::from(quantity)
    }
}
