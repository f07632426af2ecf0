// ==========================================
// PCB产线排产系统 - 领域类型定义
// ==========================================
// 职责: 排序策略与各实体状态的封闭枚举
// 序列化格式: snake_case (与制造平台 API 一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 排序策略 (Scheduling Policy)
// ==========================================
// 在通道边界解析为封闭枚举, 核心只接受枚举值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// 最早交期优先 (默认)
    Edf,
    /// 优先级优先
    Priority,
    /// 最短作业优先
    Sjf,
    /// 最长作业优先
    Ljf,
    /// 最小裕量优先
    Slack,
    /// 客户分级优先
    Customer,
}

impl Policy {
    /// 从操作员输入解析策略名
    ///
    /// # 返回
    /// - Some(Policy): 识别的策略
    /// - None: 未知策略名
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "edf" => Some(Policy::Edf),
            "priority" => Some(Policy::Priority),
            "sjf" => Some(Policy::Sjf),
            "ljf" => Some(Policy::Ljf),
            "slack" => Some(Policy::Slack),
            "customer" => Some(Policy::Customer),
            _ => None,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy::Edf
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Edf => write!(f, "EDF"),
            Policy::Priority => write!(f, "PRIORITY"),
            Policy::Sjf => write!(f, "SJF"),
            Policy::Ljf => write!(f, "LJF"),
            Policy::Slack => write!(f, "SLACK"),
            Policy::Customer => write!(f, "CUSTOMER"),
        }
    }
}

// ==========================================
// 销售订单状态 (Sales Order Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl SalesOrderStatus {
    /// API 侧的状态字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::Accepted => "accepted",
            SalesOrderStatus::InProgress => "in_progress",
            SalesOrderStatus::Completed => "completed",
            SalesOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(SalesOrderStatus::Accepted),
            "in_progress" => Some(SalesOrderStatus::InProgress),
            "completed" => Some(SalesOrderStatus::Completed),
            "cancelled" => Some(SalesOrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for SalesOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 生产订单状态 (Production Order Status)
// ==========================================
// 生命周期: draft → scheduled → ready → in_progress → completed
// cancelled 可由任意前置状态进入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionOrderStatus {
    Draft,
    Scheduled,
    Ready,
    InProgress,
    Completed,
    Cancelled,
}

impl ProductionOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionOrderStatus::Draft => "draft",
            ProductionOrderStatus::Scheduled => "scheduled",
            ProductionOrderStatus::Ready => "ready",
            ProductionOrderStatus::InProgress => "in_progress",
            ProductionOrderStatus::Completed => "completed",
            ProductionOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ProductionOrderStatus::Draft),
            "scheduled" => Some(ProductionOrderStatus::Scheduled),
            "ready" => Some(ProductionOrderStatus::Ready),
            "in_progress" => Some(ProductionOrderStatus::InProgress),
            "completed" => Some(ProductionOrderStatus::Completed),
            "cancelled" => Some(ProductionOrderStatus::Cancelled),
            _ => None,
        }
    }

    /// 是否占用产线 (执行层尚未结束)
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ProductionOrderStatus::Draft
                | ProductionOrderStatus::Scheduled
                | ProductionOrderStatus::Ready
                | ProductionOrderStatus::InProgress
        )
    }
}

impl fmt::Display for ProductionOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 生产阶段状态 (Phase Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    NotReady,
    Ready,
    Started,
    Completed,
}

impl PhaseStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_ready" => Some(PhaseStatus::NotReady),
            "ready" => Some(PhaseStatus::Ready),
            "started" => Some(PhaseStatus::Started),
            "completed" => Some(PhaseStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStatus::NotReady => write!(f, "not_ready"),
            PhaseStatus::Ready => write!(f, "ready"),
            PhaseStatus::Started => write!(f, "started"),
            PhaseStatus::Completed => write!(f, "completed"),
        }
    }
}

// ==========================================
// 工艺阶段类型 (Phase Type)
// ==========================================
// 封闭集合, 与产品 BOM 的阶段顺序一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseType {
    #[serde(rename = "SMT")]
    Smt,
    #[serde(rename = "Reflow")]
    Reflow,
    #[serde(rename = "THT")]
    Tht,
    #[serde(rename = "AOI")]
    Aoi,
    #[serde(rename = "Test")]
    Test,
    #[serde(rename = "Coating")]
    Coating,
    #[serde(rename = "Pack")]
    Pack,
}

impl PhaseType {
    /// 工艺阶段的标准顺序
    pub const ALL: [PhaseType; 7] = [
        PhaseType::Smt,
        PhaseType::Reflow,
        PhaseType::Tht,
        PhaseType::Aoi,
        PhaseType::Test,
        PhaseType::Coating,
        PhaseType::Pack,
    ];

    /// API 侧的阶段名
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseType::Smt => "SMT",
            PhaseType::Reflow => "Reflow",
            PhaseType::Tht => "THT",
            PhaseType::Aoi => "AOI",
            PhaseType::Test => "Test",
            PhaseType::Coating => "Coating",
            PhaseType::Pack => "Pack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SMT" => Some(PhaseType::Smt),
            "Reflow" => Some(PhaseType::Reflow),
            "THT" => Some(PhaseType::Tht),
            "AOI" => Some(PhaseType::Aoi),
            "Test" => Some(PhaseType::Test),
            "Coating" => Some(PhaseType::Coating),
            "Pack" => Some(PhaseType::Pack),
            _ => None,
        }
    }

    /// 标准顺序中的序号 (未知阶段排在末尾)
    pub fn order_index(&self) -> usize {
        Self::ALL.iter().position(|p| p == self).unwrap_or(Self::ALL.len())
    }
}

impl fmt::Display for PhaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 排产方案状态 (Schedule Status)
// ==========================================
// proposed 状态在任一时刻至多存在一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Proposed,
    Approved,
    Rejected,
    Superseded,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Proposed => "proposed",
            ScheduleStatus::Approved => "approved",
            ScheduleStatus::Rejected => "rejected",
            ScheduleStatus::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "proposed" => Some(ScheduleStatus::Proposed),
            "approved" => Some(ScheduleStatus::Approved),
            "rejected" => Some(ScheduleStatus::Rejected),
            "superseded" => Some(ScheduleStatus::Superseded),
            _ => None,
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse_roundtrip() {
        assert_eq!(Policy::parse("edf"), Some(Policy::Edf));
        assert_eq!(Policy::parse(" EDF "), Some(Policy::Edf));
        assert_eq!(Policy::parse("customer"), Some(Policy::Customer));
        assert_eq!(Policy::parse("fifo"), None);
        assert_eq!(Policy::default(), Policy::Edf);
    }

    #[test]
    fn test_po_status_is_open() {
        assert!(ProductionOrderStatus::Draft.is_open());
        assert!(ProductionOrderStatus::Ready.is_open());
        assert!(ProductionOrderStatus::InProgress.is_open());
        assert!(!ProductionOrderStatus::Completed.is_open());
        assert!(!ProductionOrderStatus::Cancelled.is_open());
    }

    #[test]
    fn test_phase_type_order() {
        assert!(PhaseType::Smt.order_index() < PhaseType::Reflow.order_index());
        assert!(PhaseType::Coating.order_index() < PhaseType::Pack.order_index());
        assert_eq!(PhaseType::parse("AOI"), Some(PhaseType::Aoi));
        assert_eq!(PhaseType::parse("aoi"), None);
    }

    #[test]
    fn test_status_wire_format() {
        let s = serde_json::to_string(&ProductionOrderStatus::InProgress).unwrap();
        assert_eq!(s, "\"in_progress\"");
        let s = serde_json::to_string(&PhaseType::Smt).unwrap();
        assert_eq!(s, "\"SMT\"");
        let s = serde_json::to_string(&ScheduleStatus::Proposed).unwrap();
        assert_eq!(s, "\"proposed\"");
    }
}
