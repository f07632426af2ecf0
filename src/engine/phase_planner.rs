// ==========================================
// PCB产线排产系统 - 阶段规划引擎
// ==========================================
// 职责: 将有序订单序列沿单线游标展开为逐阶段计划窗口
// 约束: 纯函数, 不做任何写入; 批次串行, 阶段顺序执行
// ==========================================

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::product::Product;
use crate::domain::sales_order::SalesOrder;
use crate::domain::types::PhaseType;
use crate::engine::shift_clock::ShiftClock;

/// 规划错误
#[derive(Error, Debug)]
pub enum PlanningError {
    #[error("未知产品: 订单 {so_internal_id} 引用产品 {product_id}")]
    UnknownProduct {
        so_internal_id: String,
        product_id: String,
    },

    #[error("产品 {product_id} 的工艺 BOM 为空")]
    EmptyBom { product_id: String },
}

/// 规划出的一个阶段窗口
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPhase {
    pub phase_type: PhaseType,
    /// 总工时 = 单件工时 × 件数 (分钟)
    pub minutes: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// 规划出的一个订单窗口 (尚未物化为 PO)
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOrder {
    pub sales_order: SalesOrder,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub phases: Vec<PlannedPhase>,
    /// 迟交工时 (分钟), 0 = 按期
    pub lateness_minutes: i64,
}

// ==========================================
// PhasePlanner - 阶段规划引擎
// ==========================================
pub struct PhasePlanner {
    clock: ShiftClock,
}

impl PhasePlanner {
    pub fn new(clock: ShiftClock) -> Self {
        Self { clock }
    }

    /// 沿游标展开订单序列
    ///
    /// 游标初值取 ceil_to_shift(start_cursor); 每个订单的首阶段自游标开始,
    /// 后续阶段自前一阶段结束开始; 订单结束后游标推进到其末阶段结束。
    ///
    /// # 参数
    /// - ordered: 已按策略排序的订单
    /// - products: 产品编码 → 产品主数据
    /// - start_cursor: 产线空闲起点
    ///
    /// # 返回
    /// 每订单一个 PlannedOrder, 顺序与输入一致
    pub fn plan(
        &self,
        ordered: &[SalesOrder],
        products: &HashMap<String, Product>,
        start_cursor: DateTime<Utc>,
    ) -> Result<Vec<PlannedOrder>, PlanningError> {
        let mut cursor = self.clock.ceil_to_shift(start_cursor);
        let mut planned = Vec::with_capacity(ordered.len());

        for so in ordered {
            let product =
                products
                    .get(&so.product_id)
                    .ok_or_else(|| PlanningError::UnknownProduct {
                        so_internal_id: so.internal_id.clone(),
                        product_id: so.product_id.clone(),
                    })?;
            if product.bom.is_empty() {
                return Err(PlanningError::EmptyBom {
                    product_id: product.internal_id.clone(),
                });
            }

            let order_start = cursor;
            let mut phases = Vec::with_capacity(product.bom.len());
            let mut phase_cursor = order_start;

            for bom_phase in &product.bom {
                let minutes =
                    i64::from(bom_phase.duration_per_unit_min) * i64::from(so.quantity);
                let ends_at = self.clock.add_working_minutes(phase_cursor, minutes);
                phases.push(PlannedPhase {
                    phase_type: bom_phase.phase_type,
                    minutes,
                    starts_at: phase_cursor,
                    ends_at,
                });
                phase_cursor = ends_at;
            }

            let order_end = phase_cursor;
            let lateness_minutes = self.clock.working_minutes_between(so.deadline, order_end);

            planned.push(PlannedOrder {
                sales_order: so.clone(),
                starts_at: order_start,
                ends_at: order_end,
                phases,
                lateness_minutes,
            });

            // 单线: 下一订单只能在本订单完成后开始
            cursor = order_end;
        }

        Ok(planned)
    }
}
