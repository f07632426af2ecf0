// ==========================================
// PCB产线排产系统 - 排产编排器
// ==========================================
// 职责: 方案生命周期 (生成/审批/驳回/修订) 与恢复动作
// 并发模型:
// - op_gate (tokio::Mutex) 串行化全部编排操作
// - state (std::Mutex) 保护内存槽位, 持锁期间不做 I/O
//   取锁 → 读/暂存 → 放锁 → 网关写入 → 再取锁 → 提交
// 红线:
// - 任一时刻至多一个 proposed 方案
// - 生成中途失败时, 本轮已创建的 PO 必须全部清理
// ==========================================

pub mod factory;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::advisor::{AdvisorError, AdvisorOrder, AdvisorReply, AdvisorRequest, ScheduleAdvisor};
use crate::channel::{ChannelError, OperatorChannel, ProposalNotice};
use crate::domain::product::Product;
use crate::domain::sales_order::SalesOrder;
use crate::domain::schedule::{EntryPhase, Schedule, ScheduleEntry};
use crate::domain::types::{Policy, SalesOrderStatus, ScheduleStatus};
use crate::engine::conflict::{ConflictAnalyzer, ConflictReport};
use crate::engine::phase_planner::{PhasePlanner, PlannedOrder, PlanningError};
use crate::engine::policy::PolicySorter;
use crate::engine::report::build_text_summary;
use crate::engine::shift_clock::ShiftClock;
use crate::gateway::dto::format_wire_dt;
use crate::gateway::{
    CreateProductionOrder, GatewayError, ManufacturingGateway, SalesOrderPatch,
};
use crate::notify::EmailNotifier;
use crate::render::TimelineRenderer;
use crate::repository::{ActionLogRepository, ActionType, RepositoryError, StateRepository};

/// 编排器错误
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("方案 {0} 不存在或已不在待审批状态")]
    NoSuchProposal(i64),

    #[error("无法匹配执行中的生产订单: {0}")]
    Unresolved(String),
}

/// 一次方案生成的产物包 (文字摘要 + 甘特图 + 冲突报告)
#[derive(Debug, Clone)]
pub struct ProposalArtifacts {
    pub schedule: Schedule,
    pub summary: String,
    pub image: Vec<u8>,
    pub report: ConflictReport,
}

/// 顾问提示: 建议排列 + 备注
#[derive(Debug, Clone, Default)]
pub struct AdvisorHint {
    pub ordering: Vec<String>,
    pub notes: String,
}

/// 内存槽位 (state 锁保护)
struct SharedState {
    proposed: Option<Schedule>,
    approved: Option<Schedule>,
    so_po_map: HashMap<String, String>,
}

/// 编排器依赖集合
pub struct OrchestratorParts {
    pub gateway: Arc<dyn ManufacturingGateway>,
    pub advisor: Option<Arc<dyn ScheduleAdvisor>>,
    pub channel: Arc<dyn OperatorChannel>,
    pub notifier: Arc<dyn EmailNotifier>,
    pub renderer: Arc<dyn TimelineRenderer>,
    pub state_repo: Arc<StateRepository>,
    pub action_log: Arc<ActionLogRepository>,
    pub clock: ShiftClock,
}

// ==========================================
// Orchestrator - 排产编排器
// ==========================================
pub struct Orchestrator {
    gateway: Arc<dyn ManufacturingGateway>,
    advisor: Option<Arc<dyn ScheduleAdvisor>>,
    channel: Arc<dyn OperatorChannel>,
    notifier: Arc<dyn EmailNotifier>,
    renderer: Arc<dyn TimelineRenderer>,
    state_repo: Arc<StateRepository>,
    action_log: Arc<ActionLogRepository>,
    clock: ShiftClock,
    sorter: PolicySorter,
    planner: PhasePlanner,
    analyzer: ConflictAnalyzer,
    /// 编排操作串行化门闩
    op_gate: tokio::sync::Mutex<()>,
    state: std::sync::Mutex<SharedState>,
}

impl Orchestrator {
    /// 构造编排器并从仓储恢复持久状态
    ///
    /// 上次运行遗留的 proposed 快照在此标记为 rejected
    /// (审批上下文已随进程丢失)
    pub fn new(parts: OrchestratorParts) -> Result<Self, OrchestratorError> {
        let so_po_map = parts.state_repo.load_so_po_map()?;
        let approved = parts
            .state_repo
            .load_latest_by_status(ScheduleStatus::Approved)?;

        let mut dangling = 0;
        while let Some(stale) = parts
            .state_repo
            .load_latest_by_status(ScheduleStatus::Proposed)?
        {
            parts
                .state_repo
                .update_schedule_status(stale.id, ScheduleStatus::Rejected)?;
            dangling += 1;
            if dangling >= 16 {
                break;
            }
        }
        if dangling > 0 {
            warn!("启动清理: {} 个遗留 proposed 快照已标记为 rejected", dangling);
        }

        info!(
            tracked = so_po_map.len(),
            approved = approved.as_ref().map(|s| s.id),
            "编排器状态已恢复"
        );

        Ok(Self {
            sorter: PolicySorter::new(parts.clock.clone()),
            planner: PhasePlanner::new(parts.clock.clone()),
            analyzer: ConflictAnalyzer::new(parts.clock.clone()),
            gateway: parts.gateway,
            advisor: parts.advisor,
            channel: parts.channel,
            notifier: parts.notifier,
            renderer: parts.renderer,
            state_repo: parts.state_repo,
            action_log: parts.action_log,
            clock: parts.clock,
            op_gate: tokio::sync::Mutex::new(()),
            state: std::sync::Mutex::new(SharedState {
                proposed: None,
                approved,
                so_po_map,
            }),
        })
    }

    // ==========================================
    // 只读访问
    // ==========================================

    pub fn proposed_schedule(&self) -> Option<Schedule> {
        self.lock_state().proposed.clone()
    }

    pub fn approved_schedule(&self) -> Option<Schedule> {
        self.lock_state().approved.clone()
    }

    pub fn tracked_orders(&self) -> HashMap<String, String> {
        self.lock_state().so_po_map.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SharedState> {
        // state 锁只做内存读写, 持锁方不会 panic, 毒化视为致命
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // ==========================================
    // 方案生成
    // ==========================================

    /// 生成新方案 (操作员 request_new_schedule 入口)
    pub async fn compute_proposal(
        &self,
        policy: Policy,
        now: DateTime<Utc>,
    ) -> Result<ProposalArtifacts, OrchestratorError> {
        let _gate = self.op_gate.lock().await;
        self.compute_proposal_locked(policy, None, now).await
    }

    /// 生成流水线 (调用方必须已持有 op_gate)
    async fn compute_proposal_locked(
        &self,
        policy: Policy,
        hint: Option<AdvisorHint>,
        now: DateTime<Utc>,
    ) -> Result<ProposalArtifacts, OrchestratorError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, %policy, "开始生成排产方案");

        // 步骤1: 驳回未决方案 (至多一个在途)
        let outstanding = self.lock_state().proposed.clone();
        if let Some(prev) = outstanding {
            info!(%run_id, prev_id = prev.id, "驳回未决方案后重新生成");
            self.reject_locked(prev).await?;
        }

        // 步骤2: 清空平台侧跟踪 PO, 整单重建
        let tracked = {
            let mut state = self.lock_state();
            std::mem::take(&mut state.so_po_map)
        };
        for (so_id, po_id) in &tracked {
            match self.gateway.delete_production_order(po_id).await {
                Ok(()) | Err(GatewayError::NotFound { .. }) => {}
                Err(e) => {
                    warn!(%run_id, %so_id, %po_id, "清理跟踪 PO 失败: {e}");
                }
            }
        }
        self.state_repo.clear_so_po_map()?;

        // 步骤3: 拉取待排销售订单
        let all_orders = self
            .gateway
            .list_sales_orders(SalesOrderStatus::Accepted)
            .await?;
        let (pending, skipped): (Vec<SalesOrder>, Vec<SalesOrder>) =
            all_orders.into_iter().partition(|so| so.deadline > now);
        if !skipped.is_empty() {
            info!(
                %run_id,
                skipped = skipped.len(),
                ids = %skipped.iter().map(|s| s.internal_id.as_str()).collect::<Vec<_>>().join(","),
                "跳过已过交期的订单"
            );
        }

        // 步骤4: 产品主数据与 BOM
        let products = self.fetch_products(&pending).await?;

        // 步骤5: 排序 (顾问提示优先, 其余回退 EDF)
        let ordered = match &hint {
            Some(h) if !h.ordering.is_empty() => self.apply_hint(&pending, h, now, &products),
            _ => self.sorter.sort(&pending, &products, policy, now),
        };

        // 步骤6: 纯规划
        let planned = self
            .planner
            .plan(&ordered, &products, self.clock.ceil_to_shift(now))?;

        // 步骤7: 平台物化 (失败即清理本轮已建 PO)
        let mut created: Vec<String> = Vec::new();
        let mut entries: Vec<ScheduleEntry> = Vec::new();
        let mut new_map: HashMap<String, String> = HashMap::new();

        for order in &planned {
            match self.materialize_order(order, &mut created).await {
                Ok(entry) => {
                    new_map.insert(
                        entry.sales_order_id.clone(),
                        entry.production_order_id.clone(),
                    );
                    entries.push(entry);
                }
                Err(e) => {
                    warn!(%run_id, so = %order.sales_order.internal_id, "物化失败, 回滚本轮 PO: {e}");
                    self.cleanup_created(&created).await;
                    return Err(e.into());
                }
            }
        }

        // 步骤8: 冲突分析
        let report = self.analyzer.analyze(&mut entries);

        // 步骤9: 快照持久化
        let mut schedule = Schedule {
            id: 0,
            generated_at: now,
            policy,
            entries,
            conflicts: report.late_order_ids.clone(),
            status: ScheduleStatus::Proposed,
            notes: hint.map(|h| h.notes).unwrap_or_default(),
        };
        let persisted = (|| -> Result<(), OrchestratorError> {
            schedule.id = self.state_repo.insert_schedule(&schedule)?;
            for (so_id, po_id) in &new_map {
                self.state_repo.upsert_so_po(so_id, po_id)?;
            }
            Ok(())
        })();
        if let Err(e) = persisted {
            warn!(%run_id, "快照持久化失败, 回滚本轮 PO: {e}");
            self.cleanup_created(&created).await;
            return Err(e);
        }

        // 步骤10: 提交内存槽位
        {
            let mut state = self.lock_state();
            state.proposed = Some(schedule.clone());
            state.so_po_map = new_map;
        }

        if let Err(e) = self.action_log.log(
            ActionType::ProposalCreated,
            Some(schedule.id),
            None,
            None,
            &format!("run={run_id} policy={policy} entries={}", schedule.entries.len()),
        ) {
            warn!(%run_id, "操作日志写入失败: {e}");
        }

        info!(
            %run_id,
            schedule_id = schedule.id,
            entries = schedule.entries.len(),
            late = schedule.conflicts.len(),
            "方案生成完成, 等待审批"
        );

        // 步骤11: 产物包并推送操作员通道
        let summary = build_text_summary(&schedule, self.clock.minutes_per_day());
        let image = match self.renderer.render(&schedule.entries, now) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%run_id, "甘特图渲染失败, 仅推送文字: {e}");
                Vec::new()
            }
        };
        let notice = ProposalNotice {
            schedule_id: schedule.id,
            summary: summary.clone(),
            image: image.clone(),
        };
        if let Err(e) = self.channel.send_proposal(&notice).await {
            warn!(%run_id, "方案通知推送失败: {e}");
        }

        Ok(ProposalArtifacts {
            schedule,
            summary,
            image,
            report,
        })
    }

    /// 拉取待排订单涉及的产品主数据
    async fn fetch_products(
        &self,
        pending: &[SalesOrder],
    ) -> Result<HashMap<String, Product>, OrchestratorError> {
        let mut products = HashMap::new();
        for so in pending {
            if products.contains_key(&so.product_id) {
                continue;
            }
            match self.gateway.get_product(&so.product_id).await {
                Ok(product) => {
                    products.insert(so.product_id.clone(), product);
                }
                Err(GatewayError::NotFound { .. }) => {
                    return Err(PlanningError::UnknownProduct {
                        so_internal_id: so.internal_id.clone(),
                        product_id: so.product_id.clone(),
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(products)
    }

    /// 顾问提示排序: 命中的 id 按提示顺序在前, 其余按 EDF 兜底
    fn apply_hint(
        &self,
        pending: &[SalesOrder],
        hint: &AdvisorHint,
        now: DateTime<Utc>,
        products: &HashMap<String, Product>,
    ) -> Vec<SalesOrder> {
        let by_id: HashMap<&str, &SalesOrder> =
            pending.iter().map(|so| (so.id.as_str(), so)).collect();
        let mut ordered: Vec<SalesOrder> = hint
            .ordering
            .iter()
            .filter_map(|sid| by_id.get(sid.as_str()).map(|so| (*so).clone()))
            .collect();

        let hinted: std::collections::HashSet<&str> =
            hint.ordering.iter().map(String::as_str).collect();
        let rest: Vec<SalesOrder> = pending
            .iter()
            .filter(|so| !hinted.contains(so.id.as_str()))
            .cloned()
            .collect();
        ordered.extend(self.sorter.sort(&rest, products, Policy::Edf, now));

        debug!(
            hinted = hint.ordering.len(),
            total = ordered.len(),
            "应用顾问排序提示"
        );
        ordered
    }

    /// 将一个规划订单物化到平台: 建 PO → 物化阶段 → 写窗口
    async fn materialize_order(
        &self,
        planned: &PlannedOrder,
        created: &mut Vec<String>,
    ) -> Result<ScheduleEntry, GatewayError> {
        let so = &planned.sales_order;

        let po_id = self
            .gateway
            .create_production_order(CreateProductionOrder {
                sales_order_id: so.id.clone(),
                product_id: so.product_id.clone(),
                quantity: so.quantity,
                starts_at: planned.starts_at,
                ends_at: planned.ends_at,
            })
            .await?;
        created.push(po_id.clone());

        let platform_phases = self.gateway.schedule_production_order(&po_id).await?;

        // 以阶段类型对齐平台阶段与规划窗口; 平台缺失的阶段跳过
        let mut entry_phases = Vec::with_capacity(planned.phases.len());
        for phase in &planned.phases {
            let matching = platform_phases
                .iter()
                .find(|p| p.phase_type == phase.phase_type);
            let Some(platform_phase) = matching else {
                warn!(
                    %po_id,
                    phase = %phase.phase_type,
                    "平台未物化该阶段, 跳过窗口写入"
                );
                continue;
            };
            self.gateway
                .update_phase_window(&platform_phase.id, phase.starts_at, phase.ends_at)
                .await?;
            entry_phases.push(EntryPhase {
                phase_id: platform_phase.id.clone(),
                phase_type: phase.phase_type,
                starts_at: phase.starts_at,
                ends_at: phase.ends_at,
                duration_minutes: phase.minutes,
            });
        }

        self.gateway
            .update_po_window(&po_id, planned.starts_at, planned.ends_at)
            .await?;

        Ok(ScheduleEntry {
            production_order_id: po_id,
            sales_order_id: so.id.clone(),
            sales_order_internal_id: so.internal_id.clone(),
            product_id: so.product_id.clone(),
            quantity: so.quantity,
            customer_name: so.customer.name.clone(),
            priority: so.priority,
            planned_start: planned.starts_at,
            planned_end: planned.ends_at,
            deadline: so.deadline,
            slack_minutes: 0,
            late: false,
            phases: entry_phases,
        })
    }

    /// 失败清理: 删除本轮创建的全部 PO (尽力而为)
    async fn cleanup_created(&self, created: &[String]) {
        for po_id in created {
            match self.gateway.delete_production_order(po_id).await {
                Ok(()) | Err(GatewayError::NotFound { .. }) => {}
                Err(e) => warn!(%po_id, "回滚删除 PO 失败: {e}"),
            }
        }
    }

    // ==========================================
    // 审批 / 驳回
    // ==========================================

    /// 审批方案: 全部 PO 确认为 ready, 旧审批方案被取代
    ///
    /// 对同一 id 重复调用幂等
    pub async fn approve(
        &self,
        proposal_id: i64,
        _now: DateTime<Utc>,
    ) -> Result<Schedule, OrchestratorError> {
        let _gate = self.op_gate.lock().await;

        let (proposal, prev_approved) = {
            let state = self.lock_state();
            match (&state.proposed, &state.approved) {
                (Some(p), _) if p.id == proposal_id => {
                    (p.clone(), state.approved.clone())
                }
                // 幂等: 已审批的同一方案直接返回
                (_, Some(a)) if a.id == proposal_id => return Ok(a.clone()),
                _ => return Err(OrchestratorError::NoSuchProposal(proposal_id)),
            }
        };

        for entry in &proposal.entries {
            self.gateway
                .confirm_production_order(&entry.production_order_id)
                .await?;
        }

        if let Some(prev) = &prev_approved {
            self.state_repo
                .update_schedule_status(prev.id, ScheduleStatus::Superseded)?;
            if let Err(e) = self.action_log.log(
                ActionType::ProposalSuperseded,
                Some(prev.id),
                None,
                None,
                &format!("superseded_by={proposal_id}"),
            ) {
                warn!("操作日志写入失败: {e}");
            }
        }
        self.state_repo
            .update_schedule_status(proposal_id, ScheduleStatus::Approved)?;

        let approved = {
            let mut state = self.lock_state();
            let mut schedule = proposal;
            schedule.status = ScheduleStatus::Approved;
            state.approved = Some(schedule.clone());
            state.proposed = None;
            schedule
        };

        if let Err(e) = self.action_log.log(
            ActionType::ProposalApproved,
            Some(proposal_id),
            None,
            None,
            "",
        ) {
            warn!("操作日志写入失败: {e}");
        }
        info!(schedule_id = proposal_id, "方案已审批");

        let body = format!(
            "Schedule #{} approved: {} orders, {} late.",
            approved.id,
            approved.entries.len(),
            approved.conflicts.len(),
        );
        if let Err(e) = self
            .notifier
            .send(&format!("Schedule #{} approved", approved.id), &body)
            .await
        {
            warn!("审批邮件通知失败: {e}");
        }

        Ok(approved)
    }

    /// 驳回方案: 删除方案创建的全部 PO, 不留部分状态
    pub async fn reject(
        &self,
        proposal_id: i64,
        _now: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        let _gate = self.op_gate.lock().await;

        let proposal = {
            let state = self.lock_state();
            match &state.proposed {
                Some(p) if p.id == proposal_id => p.clone(),
                _ => return Err(OrchestratorError::NoSuchProposal(proposal_id)),
            }
        };
        self.reject_locked(proposal).await
    }

    /// 驳回实现 (调用方必须已持有 op_gate)
    async fn reject_locked(&self, proposal: Schedule) -> Result<(), OrchestratorError> {
        let mut first_failure: Option<GatewayError> = None;
        for entry in &proposal.entries {
            match self
                .gateway
                .delete_production_order(&entry.production_order_id)
                .await
            {
                Ok(()) | Err(GatewayError::NotFound { .. }) => {}
                Err(e) => {
                    warn!(po_id = %entry.production_order_id, "驳回删除 PO 失败: {e}");
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }
        // 删除未完全成功时保留槽位, 供操作员重试
        if let Some(e) = first_failure {
            return Err(e.into());
        }

        for entry in &proposal.entries {
            self.state_repo.remove_so_po(&entry.sales_order_id)?;
        }
        self.state_repo
            .update_schedule_status(proposal.id, ScheduleStatus::Rejected)?;

        {
            let mut state = self.lock_state();
            for entry in &proposal.entries {
                state.so_po_map.remove(&entry.sales_order_id);
            }
            if state
                .proposed
                .as_ref()
                .map(|p| p.id == proposal.id)
                .unwrap_or(false)
            {
                state.proposed = None;
            }
        }

        if let Err(e) = self.action_log.log(
            ActionType::ProposalRejected,
            Some(proposal.id),
            None,
            None,
            "",
        ) {
            warn!("操作日志写入失败: {e}");
        }
        info!(schedule_id = proposal.id, "方案已驳回");
        Ok(())
    }

    // ==========================================
    // 修订 (操作员反馈 → 顾问 → 重新生成)
    // ==========================================

    /// 按操作员反馈修订方案
    ///
    /// 顾问失败或超时时回退纯 EDF, 并告知操作员
    pub async fn revise(
        &self,
        proposal_id: i64,
        operator_text: &str,
        now: DateTime<Utc>,
    ) -> Result<ProposalArtifacts, OrchestratorError> {
        let _gate = self.op_gate.lock().await;

        let current = {
            let state = self.lock_state();
            match &state.proposed {
                Some(p) if p.id == proposal_id => p.clone(),
                _ => return Err(OrchestratorError::NoSuchProposal(proposal_id)),
            }
        };

        let pending: Vec<SalesOrder> = self
            .gateway
            .list_sales_orders(SalesOrderStatus::Accepted)
            .await?
            .into_iter()
            .filter(|so| so.deadline > now)
            .collect();
        let products = self.fetch_products(&pending).await?;
        let baseline: Vec<String> = self
            .sorter
            .sort(&pending, &products, Policy::Edf, now)
            .iter()
            .map(|so| so.id.clone())
            .collect();

        let request = AdvisorRequest {
            now: format_wire_dt(now),
            operator_feedback: operator_text.to_string(),
            current_schedule: current.entries.iter().map(advisor_order_from_entry).collect(),
            pending_orders: pending.iter().map(advisor_order_from_so).collect(),
            edf_baseline: baseline,
        };

        let hint = match self.consult_advisor(&request).await {
            Ok(reply) => {
                self.apply_priority_updates(&reply).await;
                AdvisorHint {
                    ordering: reply.reordered_so_ids,
                    notes: reply.comment,
                }
            }
            Err(e) => {
                warn!("顾问调用失败, 回退 EDF: {e}");
                if let Err(send_err) = self
                    .channel
                    .send_text("AI advisor unavailable - falling back to pure EDF ordering.")
                    .await
                {
                    warn!("操作员通知失败: {send_err}");
                }
                AdvisorHint {
                    ordering: Vec::new(),
                    notes: "AI advisor unavailable; pure EDF ordering applied.".to_string(),
                }
            }
        };

        self.compute_proposal_locked(Policy::Edf, Some(hint), now)
            .await
    }

    async fn consult_advisor(
        &self,
        request: &AdvisorRequest,
    ) -> Result<AdvisorReply, AdvisorError> {
        match &self.advisor {
            None => Err(AdvisorError::Unconfigured),
            Some(advisor) => advisor.propose_revision(request).await,
        }
    }

    /// 应用顾问建议的优先级调整 (单条失败不阻断)
    async fn apply_priority_updates(&self, reply: &AdvisorReply) {
        for update in &reply.priority_updates {
            match self
                .gateway
                .update_sales_order(
                    &update.sales_order_id,
                    SalesOrderPatch::priority(update.new_priority),
                )
                .await
            {
                Ok(_) => {
                    info!(
                        so_id = %update.sales_order_id,
                        new_priority = update.new_priority,
                        reason = %update.reason,
                        "顾问优先级调整已应用"
                    );
                    if let Err(e) = self.action_log.log(
                        ActionType::PriorityUpdated,
                        None,
                        Some(&update.sales_order_id),
                        None,
                        &format!("new_priority={} reason={}", update.new_priority, update.reason),
                    ) {
                        warn!("操作日志写入失败: {e}");
                    }
                }
                Err(e) => {
                    warn!(so_id = %update.sales_order_id, "优先级调整失败: {e}");
                }
            }
        }
    }

    // ==========================================
    // 恢复动作 (工厂失败后由操作员触发)
    // ==========================================

    /// 取消订单: SO 标记 cancelled, 余单重新生成方案
    pub async fn cancel_order(
        &self,
        sales_order_id: &str,
        production_order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProposalArtifacts, OrchestratorError> {
        let _gate = self.op_gate.lock().await;

        self.gateway
            .update_sales_order(
                sales_order_id,
                SalesOrderPatch::status(SalesOrderStatus::Cancelled),
            )
            .await?;
        if let Err(e) = self.action_log.log(
            ActionType::OrderCancelled,
            None,
            Some(sales_order_id),
            Some(production_order_id),
            "",
        ) {
            warn!("操作日志写入失败: {e}");
        }
        info!(sales_order_id, "订单已取消, 重新生成方案");

        let policy = self.policy_of_record();
        self.compute_proposal_locked(policy, None, now).await
    }

    /// 重启订单: 删除失败 PO, SO 保留并重新排产
    ///
    /// 失败历史保留在操作日志中
    pub async fn restart_order(
        &self,
        sales_order_id: &str,
        production_order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ProposalArtifacts, OrchestratorError> {
        let _gate = self.op_gate.lock().await;

        match self
            .gateway
            .delete_production_order(production_order_id)
            .await
        {
            Ok(()) | Err(GatewayError::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        self.state_repo.remove_so_po(sales_order_id)?;
        {
            let mut state = self.lock_state();
            state.so_po_map.remove(sales_order_id);
        }
        if let Err(e) = self.action_log.log(
            ActionType::OrderRestarted,
            None,
            Some(sales_order_id),
            Some(production_order_id),
            "",
        ) {
            warn!("操作日志写入失败: {e}");
        }
        info!(sales_order_id, production_order_id, "订单重启, 重新生成方案");

        let policy = self.policy_of_record();
        self.compute_proposal_locked(policy, None, now).await
    }

    /// 恢复动作沿用的策略: 在途方案 > 审批方案 > EDF
    fn policy_of_record(&self) -> Policy {
        let state = self.lock_state();
        state
            .proposed
            .as_ref()
            .or(state.approved.as_ref())
            .map(|s| s.policy)
            .unwrap_or_default()
    }
}

// ==========================================
// 顾问输入转换
// ==========================================

fn advisor_order_from_entry(entry: &ScheduleEntry) -> AdvisorOrder {
    AdvisorOrder {
        sales_order_id: entry.sales_order_id.clone(),
        sales_order_internal_id: entry.sales_order_internal_id.clone(),
        product_id: entry.product_id.clone(),
        quantity: entry.quantity,
        priority: entry.priority,
        deadline: format_wire_dt(entry.deadline),
        customer: entry.customer_name.clone(),
        planned_start: Some(format_wire_dt(entry.planned_start)),
        planned_end: Some(format_wire_dt(entry.planned_end)),
        is_existing: true,
    }
}

fn advisor_order_from_so(so: &SalesOrder) -> AdvisorOrder {
    AdvisorOrder {
        sales_order_id: so.id.clone(),
        sales_order_internal_id: so.internal_id.clone(),
        product_id: so.product_id.clone(),
        quantity: so.quantity,
        priority: so.priority,
        deadline: format_wire_dt(so.deadline),
        customer: so.customer.name.clone(),
        planned_start: None,
        planned_end: None,
        is_existing: false,
    }
}
