// ==========================================
// PCB产线排产系统 - 网关报文结构
// ==========================================
// 职责: 制造平台 JSON 报文 → 领域实体
// 说明: 平台字段宽松解析, 缺失字段取保守缺省值
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::{BomPhase, Product};
use crate::domain::production::{ProductionOrder, ProductionPhase};
use crate::domain::sales_order::{Customer, SalesOrder};
use crate::domain::types::{
    PhaseStatus, PhaseType, ProductionOrderStatus, SalesOrderStatus,
};

/// 平台侧时间戳格式
pub const WIRE_DT_FMT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// 格式化为平台时间戳
pub fn format_wire_dt(dt: DateTime<Utc>) -> String {
    dt.format(WIRE_DT_FMT).to_string()
}

/// 宽松解析平台时间戳 (RFC3339 或缺省 Z 后缀)
pub fn parse_wire_dt(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ==========================================
// 销售订单报文
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerDto {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rank: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesOrderLineDto {
    /// 产品业务编码
    #[serde(default)]
    pub extra_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesOrderDto {
    pub id: String,
    #[serde(default)]
    pub internal_id: String,
    #[serde(default)]
    pub customer_attr: CustomerDto,
    #[serde(default)]
    pub products: Vec<SalesOrderLineDto>,
    /// 交期
    #[serde(default)]
    pub expected_shipping_time: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub notes: String,
    /// 下单时间
    #[serde(default)]
    pub time: Option<String>,
}

fn default_priority() -> i32 {
    99
}

impl SalesOrderDto {
    /// 转换为领域实体; 缺少交期或行项目时返回 None
    pub fn into_domain(self) -> Option<SalesOrder> {
        let deadline = self
            .expected_shipping_time
            .as_deref()
            .and_then(parse_wire_dt)?;
        let line = self.products.into_iter().next()?;
        Some(SalesOrder {
            id: self.id,
            internal_id: self.internal_id,
            customer: Customer {
                id: self.customer_attr.id,
                name: self.customer_attr.name,
                rank: self.customer_attr.rank,
            },
            product_id: line.extra_id.clone(),
            product_name: if line.name.is_empty() { line.extra_id } else { line.name },
            quantity: line.quantity,
            deadline,
            priority: self.priority,
            status: SalesOrderStatus::parse(&self.status)
                .unwrap_or(SalesOrderStatus::Accepted),
            notes: self.notes,
            created_at: self.time.as_deref().and_then(parse_wire_dt),
        })
    }
}

// ==========================================
// 产品报文
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BomPhaseDto {
    #[serde(default)]
    pub name: String,
    /// 单件工时 (分钟)
    #[serde(default)]
    pub duration_per_unit: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductDto {
    pub id: String,
    #[serde(default)]
    pub internal_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phases: Vec<BomPhaseDto>,
}

impl ProductDto {
    /// 转换为领域实体
    ///
    /// 工时为 0 或阶段名未知的条目不进入 BOM; 阶段按标准工艺顺序排列
    pub fn into_domain(self) -> Product {
        let mut bom: Vec<BomPhase> = self
            .phases
            .into_iter()
            .filter(|p| p.duration_per_unit > 0)
            .filter_map(|p| {
                PhaseType::parse(&p.name).map(|phase_type| BomPhase {
                    phase_type,
                    duration_per_unit_min: p.duration_per_unit,
                })
            })
            .collect();
        bom.sort_by_key(|p| p.phase_type.order_index());

        Product {
            id: self.id,
            internal_id: self.internal_id.clone(),
            name: if self.name.is_empty() { self.internal_id } else { self.name },
            bom,
        }
    }
}

// ==========================================
// 生产订单报文
// ==========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseRefDto {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionPhaseDto {
    #[serde(default)]
    pub id: String,
    /// 阶段名可能平铺或嵌套在 phase 对象里
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phase: Option<PhaseRefDto>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub duration: i64,
}

impl ProductionPhaseDto {
    fn phase_name(&self) -> &str {
        if let Some(name) = self.name.as_deref() {
            if !name.is_empty() {
                return name;
            }
        }
        self.phase.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductionOrderDto {
    pub id: String,
    #[serde(default)]
    pub product_internal_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub phases: Vec<ProductionPhaseDto>,
}

impl ProductionOrderDto {
    /// 转换为领域实体
    ///
    /// sales_order_id 由调用方依据本地 SO↔PO 映射补齐
    pub fn into_domain(self) -> ProductionOrder {
        let product_id = if self.product_internal_id.is_empty() {
            self.product_id
        } else {
            self.product_internal_id
        };

        let mut phases: Vec<ProductionPhase> = self
            .phases
            .iter()
            .filter_map(|p| {
                let phase_type = PhaseType::parse(p.phase_name())?;
                Some(ProductionPhase {
                    id: p.id.clone(),
                    phase_type,
                    sequence: 0,
                    planned_start: p.starts_at.as_deref().and_then(parse_wire_dt),
                    planned_end: p.ends_at.as_deref().and_then(parse_wire_dt),
                    status: PhaseStatus::parse(&p.status).unwrap_or(PhaseStatus::NotReady),
                    duration_minutes: p.duration,
                })
            })
            .collect();
        phases.sort_by_key(|p| p.phase_type.order_index());
        for (i, phase) in phases.iter_mut().enumerate() {
            phase.sequence = i as u32;
        }

        // 窗口优先取已定阶段的首尾
        let dated: Vec<_> = phases
            .iter()
            .filter(|p| p.planned_start.is_some() && p.planned_end.is_some())
            .collect();
        let fallback = DateTime::<Utc>::MIN_UTC;
        let planned_start = dated
            .iter()
            .filter_map(|p| p.planned_start)
            .min()
            .or_else(|| self.starts_at.as_deref().and_then(parse_wire_dt))
            .unwrap_or(fallback);
        let planned_end = dated
            .iter()
            .filter_map(|p| p.planned_end)
            .max()
            .or_else(|| self.ends_at.as_deref().and_then(parse_wire_dt))
            .unwrap_or(fallback);

        ProductionOrder {
            id: self.id,
            sales_order_id: String::new(),
            product_id,
            quantity: self.quantity,
            planned_start,
            planned_end,
            status: ProductionOrderStatus::parse(&self.status)
                .unwrap_or(ProductionOrderStatus::Draft),
            phases,
        }
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sales_order_dto() {
        let raw = serde_json::json!({
            "id": "uuid-1",
            "internal_id": "SO-001",
            "customer_attr": {"id": "c-1", "name": "IndustrialCore"},
            "products": [{"extra_id": "PCB-IND-100", "name": "Industrial Board", "quantity": 2}],
            "expected_shipping_time": "2026-03-02T08:00:00Z",
            "priority": 1,
            "status": "accepted",
            "notes": "URGENT - line stopped"
        });
        let dto: SalesOrderDto = serde_json::from_value(raw).unwrap();
        let so = dto.into_domain().unwrap();
        assert_eq!(so.internal_id, "SO-001");
        assert_eq!(so.product_id, "PCB-IND-100");
        assert_eq!(so.quantity, 2);
        assert_eq!(so.priority, 1);
        assert_eq!(so.status, SalesOrderStatus::Accepted);
        assert_eq!(format_wire_dt(so.deadline), "2026-03-02T08:00:00Z");
    }

    #[test]
    fn test_sales_order_without_deadline_is_dropped() {
        let dto = SalesOrderDto {
            id: "uuid-2".to_string(),
            products: vec![SalesOrderLineDto {
                extra_id: "IOT-200".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(dto.into_domain().is_none());
    }

    #[test]
    fn test_product_dto_filters_zero_phases_and_sorts() {
        let dto = ProductDto {
            id: "p-1".to_string(),
            internal_id: "IOT-200".to_string(),
            name: String::new(),
            phases: vec![
                BomPhaseDto { name: "Test".to_string(), duration_per_unit: 18 },
                BomPhaseDto { name: "THT".to_string(), duration_per_unit: 0 },
                BomPhaseDto { name: "SMT".to_string(), duration_per_unit: 18 },
                BomPhaseDto { name: "Mystery".to_string(), duration_per_unit: 5 },
            ],
        };
        let product = dto.into_domain();
        assert_eq!(product.name, "IOT-200");
        let names: Vec<_> = product.bom.iter().map(|p| p.phase_type.as_str()).collect();
        assert_eq!(names, vec!["SMT", "Test"]);
    }

    #[test]
    fn test_production_order_dto_nested_phase_names() {
        let raw = serde_json::json!({
            "id": "po-1",
            "product_internal_id": "PCB-IND-100",
            "quantity": 2,
            "status": "draft",
            "phases": [
                {"id": "ph-2", "phase": {"name": "Reflow"}, "status": "not_ready"},
                {"id": "ph-1", "name": "SMT", "status": "not_ready",
                 "starts_at": "2026-02-28T08:00:00Z", "ends_at": "2026-02-28T09:00:00Z"}
            ]
        });
        let dto: ProductionOrderDto = serde_json::from_value(raw).unwrap();
        let po = dto.into_domain();
        assert_eq!(po.status, ProductionOrderStatus::Draft);
        assert_eq!(po.phases.len(), 2);
        assert_eq!(po.phases[0].phase_type, PhaseType::Smt);
        assert_eq!(po.phases[0].sequence, 0);
        assert_eq!(po.phases[1].phase_type, PhaseType::Reflow);
        // 窗口取自已定阶段
        assert_eq!(format_wire_dt(po.planned_start), "2026-02-28T08:00:00Z");
    }
}
