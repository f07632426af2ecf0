// ==========================================
// PCB产线排产系统 - 工厂事件匹配与驾驶舱
// ==========================================
// 职责:
// - 失败事件 → 当前执行中 PO 的匹配链
// - 失败告警推送 (携带取消/重启两个恢复动作)
// - 驾驶舱只读汇总
// 说明: 本模块不改变排产状态, 只触发通知;
//       恢复动作由操作员经通道指令进入编排器
// ==========================================

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::channel::{FailureAlert, OperatorCommand};
use crate::domain::production::ProductionOrder;
use crate::domain::sales_order::SalesOrder;
use crate::domain::types::{ProductionOrderStatus, SalesOrderStatus, ScheduleStatus};
use crate::gateway::GatewayError;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::repository::ActionType;

/// 驾驶舱交期告警阈值 (天)
const DEADLINE_ALERT_DAYS: i64 = 2;

/// 失败事件的投递回执
#[derive(Debug, Clone)]
pub struct FailureDispatch {
    pub production_order_id: String,
    pub sales_order_id: Option<String>,
    pub sales_order_internal_id: Option<String>,
}

/// 驾驶舱汇总 (操作员只读视图)
#[derive(Debug, Clone)]
pub struct DashboardSummary {
    pub total_sales_orders: usize,
    pub orders_by_priority: BTreeMap<i32, usize>,
    pub total_production_orders: usize,
    pub production_by_status: BTreeMap<String, usize>,
    /// 最近的 5 个交期
    pub upcoming_deadlines: Vec<SalesOrder>,
    pub active_alerts: Vec<String>,
    pub current_schedule_status: Option<ScheduleStatus>,
}

impl Orchestrator {
    // ==========================================
    // 失败事件处理
    // ==========================================

    /// 处理工厂失败事件: 匹配执行中 PO, 推送告警
    ///
    /// 匹配链:
    /// 1. 显式 po_id 且处于 ready|in_progress
    /// 2. 唯一的 in_progress PO
    /// 3. 计划窗口覆盖 now 的 PO
    /// 4. 最早开工的 ready PO
    /// 全部落空 → Unresolved, 不做任何状态变更
    pub async fn handle_factory_failure(
        &self,
        image: Vec<u8>,
        description: String,
        explicit_po_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<FailureDispatch, OrchestratorError> {
        let map = self.tracked_orders();
        if map.is_empty() {
            return Err(OrchestratorError::Unresolved(
                "no production orders are currently tracked".to_string(),
            ));
        }

        let mut tracked_pos: Vec<ProductionOrder> = Vec::new();
        for po_id in map.values() {
            match self.gateway.get_production_order(po_id).await {
                Ok(po) => tracked_pos.push(po),
                Err(GatewayError::NotFound { .. }) => {
                    warn!(%po_id, "跟踪 PO 在平台侧已不存在");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let executing = resolve_executing_po(&tracked_pos, explicit_po_id.as_deref(), now)
            .ok_or_else(|| {
                OrchestratorError::Unresolved(
                    "no executing production order could be identified".to_string(),
                )
            })?;

        // PO → SO 反查
        let sales_order_id = map
            .iter()
            .find(|(_, pid)| **pid == executing.id)
            .map(|(sid, _)| sid.clone());

        let linked_so = match &sales_order_id {
            Some(so_id) => match self.gateway.get_sales_order(so_id).await {
                Ok(so) => Some(so),
                Err(e) => {
                    warn!(%so_id, "关联销售订单读取失败: {e}");
                    None
                }
            },
            None => None,
        };

        let mut actions = Vec::new();
        if let Some(so_id) = &sales_order_id {
            actions.push(OperatorCommand::CancelOrder {
                sales_order_id: so_id.clone(),
                production_order_id: executing.id.clone(),
            });
            actions.push(OperatorCommand::RestartOrder {
                sales_order_id: so_id.clone(),
                production_order_id: executing.id.clone(),
            });
        }

        let alert = FailureAlert {
            production_order_id: executing.id.clone(),
            sales_order_id: sales_order_id.clone(),
            sales_order_internal_id: linked_so.as_ref().map(|so| so.internal_id.clone()),
            product_id: executing.product_id.clone(),
            description: description.clone(),
            image,
            actions,
        };
        self.channel.send_failure_alert(&alert).await?;

        if let Err(e) = self.action_log.log(
            ActionType::FactoryFailure,
            None,
            sales_order_id.as_deref(),
            Some(&executing.id),
            &description,
        ) {
            warn!("操作日志写入失败: {e}");
        }
        info!(
            po_id = %executing.id,
            so = linked_so.as_ref().map(|so| so.internal_id.as_str()).unwrap_or("?"),
            "工厂失败告警已推送"
        );

        Ok(FailureDispatch {
            production_order_id: executing.id.clone(),
            sales_order_id,
            sales_order_internal_id: linked_so.map(|so| so.internal_id),
        })
    }

    // ==========================================
    // 驾驶舱
    // ==========================================

    /// 驾驶舱只读汇总
    pub async fn dashboard_summary(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, OrchestratorError> {
        let orders = self
            .gateway
            .list_sales_orders(SalesOrderStatus::Accepted)
            .await?;

        let mut orders_by_priority: BTreeMap<i32, usize> = BTreeMap::new();
        for so in &orders {
            *orders_by_priority.entry(so.priority).or_insert(0) += 1;
        }

        let mut upcoming: Vec<SalesOrder> = orders.clone();
        upcoming.sort_by_key(|so| so.deadline);
        upcoming.truncate(5);

        let alert_horizon = now + Duration::days(DEADLINE_ALERT_DAYS);
        let active_alerts: Vec<String> = orders
            .iter()
            .filter(|so| so.deadline <= alert_horizon)
            .map(|so| {
                let days_left = (so.deadline - now).num_days();
                format!(
                    "{} deadline in {}d ({})",
                    so.internal_id, days_left, so.product_id
                )
            })
            .collect();

        let map = self.tracked_orders();
        let mut production_by_status: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_production_orders = 0;
        for po_id in map.values() {
            match self.gateway.get_production_order(po_id).await {
                Ok(po) => {
                    total_production_orders += 1;
                    *production_by_status
                        .entry(po.status.to_string())
                        .or_insert(0) += 1;
                }
                Err(e) => warn!(%po_id, "驾驶舱读取 PO 失败: {e}"),
            }
        }

        let current_schedule_status = {
            if self.proposed_schedule().is_some() {
                Some(ScheduleStatus::Proposed)
            } else if self.approved_schedule().is_some() {
                Some(ScheduleStatus::Approved)
            } else {
                None
            }
        };

        Ok(DashboardSummary {
            total_sales_orders: orders.len(),
            orders_by_priority,
            total_production_orders,
            production_by_status,
            upcoming_deadlines: upcoming,
            active_alerts,
            current_schedule_status,
        })
    }
}

/// 执行中 PO 匹配链 (纯函数, 便于单测)
pub fn resolve_executing_po<'a>(
    tracked: &'a [ProductionOrder],
    explicit_po_id: Option<&str>,
    now: DateTime<Utc>,
) -> Option<&'a ProductionOrder> {
    // 1. 显式指定且状态允许
    if let Some(po_id) = explicit_po_id {
        if let Some(po) = tracked.iter().find(|po| {
            po.id == po_id
                && matches!(
                    po.status,
                    ProductionOrderStatus::Ready | ProductionOrderStatus::InProgress
                )
        }) {
            return Some(po);
        }
    }

    // 2. 唯一的 in_progress
    let in_progress: Vec<&ProductionOrder> = tracked
        .iter()
        .filter(|po| po.status == ProductionOrderStatus::InProgress)
        .collect();
    if in_progress.len() == 1 {
        return Some(in_progress[0]);
    }

    // 3. 计划窗口覆盖 now (取最早开工者)
    if let Some(po) = tracked
        .iter()
        .filter(|po| po.window_contains(now))
        .min_by_key(|po| po.planned_start)
    {
        return Some(po);
    }

    // 4. 最早开工的 ready
    tracked
        .iter()
        .filter(|po| po.status == ProductionOrderStatus::Ready)
        .min_by_key(|po| po.planned_start)
}
