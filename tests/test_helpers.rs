// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 参考工厂数据 (五产品 BOM / SO-001..SO-012)、
//       内存版网关替身、录制通道、桩顾问、编排器装配
// ==========================================
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use pcb_line_aps::advisor::{AdvisorError, AdvisorReply, AdvisorRequest, ScheduleAdvisor};
use pcb_line_aps::channel::{
    ChannelError, FailureAlert, OperatorChannel, ProposalNotice,
};
use pcb_line_aps::domain::product::{BomPhase, Product};
use pcb_line_aps::domain::production::{ProductionOrder, ProductionPhase};
use pcb_line_aps::domain::sales_order::{Customer, SalesOrder};
use pcb_line_aps::domain::types::{
    PhaseStatus, PhaseType, ProductionOrderStatus, SalesOrderStatus,
};
use pcb_line_aps::engine::ShiftClock;
use pcb_line_aps::gateway::{
    CreateProductionOrder, GatewayError, GatewayResult, ManufacturingGateway, SalesOrderPatch,
};
use pcb_line_aps::notify::NoOpNotifier;
use pcb_line_aps::orchestrator::{Orchestrator, OrchestratorParts};
use pcb_line_aps::render::NoOpRenderer;
use pcb_line_aps::repository::{ActionLogRepository, StateRepository};

// ==========================================
// 参考数据 (基准日 2026-02-28T08:00:00Z)
// ==========================================

/// 基准当前时刻
pub fn ref_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 28, 8, 0, 0).unwrap()
}

pub fn deadline(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, month, day, 8, 0, 0).unwrap()
}

fn product(code: &str, name: &str, durations: [(PhaseType, u32); 7]) -> Product {
    Product {
        id: format!("prod-{code}"),
        internal_id: code.to_string(),
        name: name.to_string(),
        bom: durations
            .into_iter()
            .filter(|(_, minutes)| *minutes > 0)
            .map(|(phase_type, minutes)| BomPhase {
                phase_type,
                duration_per_unit_min: minutes,
            })
            .collect(),
    }
}

/// 五个参考产品的工艺 BOM
pub fn reference_products() -> HashMap<String, Product> {
    use PhaseType::*;
    let table = [
        ("PCB-IND-100", "Industrial Controller Board",
         [(Smt, 30), (Reflow, 15), (Tht, 45), (Aoi, 12), (Test, 30), (Coating, 9), (Pack, 6)]),
        ("MED-300", "Medical Sensor Module",
         [(Smt, 45), (Reflow, 30), (Tht, 60), (Aoi, 30), (Test, 90), (Coating, 15), (Pack, 9)]),
        ("IOT-200", "IoT Gateway Board",
         [(Smt, 18), (Reflow, 12), (Tht, 0), (Aoi, 9), (Test, 18), (Coating, 0), (Pack, 6)]),
        ("AGR-400", "Agricultural Controller",
         [(Smt, 30), (Reflow, 15), (Tht, 30), (Aoi, 12), (Test, 45), (Coating, 12), (Pack, 0)]),
        ("PCB-PWR-500", "Power Distribution Board",
         [(Smt, 24), (Reflow, 12), (Tht, 0), (Aoi, 9), (Test, 24), (Coating, 0), (Pack, 6)]),
    ];
    table
        .into_iter()
        .map(|(code, name, durations)| (code.to_string(), product(code, name, durations)))
        .collect()
}

pub fn make_so(
    internal_id: &str,
    customer: &str,
    product_code: &str,
    quantity: u32,
    deadline_at: DateTime<Utc>,
    priority: i32,
    notes: &str,
) -> SalesOrder {
    SalesOrder {
        id: internal_id.to_lowercase().replace("so-", "so-uuid-"),
        internal_id: internal_id.to_string(),
        customer: Customer::new(format!("cust-{customer}"), customer),
        product_id: product_code.to_string(),
        product_name: product_code.to_string(),
        quantity,
        deadline: deadline_at,
        priority,
        status: SalesOrderStatus::Accepted,
        notes: notes.to_string(),
        created_at: None,
    }
}

/// 参考订单簿 SO-001..SO-012
pub fn reference_orders() -> Vec<SalesOrder> {
    vec![
        make_so("SO-001", "IndustrialCore", "PCB-IND-100", 2, deadline(3, 2), 1, "URGENT - line stopped"),
        make_so("SO-002", "MedTec Devices", "MED-300", 1, deadline(3, 3), 1, "Penalty clause"),
        make_so("SO-003", "AgriBot Systems", "AGR-400", 5, deadline(3, 4), 2, "Spring deployment - confirmed window"),
        make_so("SO-004", "TechFlex", "PCB-IND-100", 4, deadline(3, 6), 2, ""),
        make_so("SO-005", "SmartHome IoT", "IOT-200", 10, deadline(3, 8), 1, "ESCALATED P3->P1"),
        make_so("SO-006", "IndustrialCore", "PCB-PWR-500", 8, deadline(3, 9), 2, ""),
        make_so("SO-007", "TechFlex", "IOT-200", 12, deadline(3, 11), 3, ""),
        make_so("SO-008", "SmartHome IoT", "PCB-PWR-500", 6, deadline(3, 12), 3, ""),
        make_so("SO-009", "MedTec Devices", "MED-300", 3, deadline(3, 4), 1, "Penalty clause"),
        make_so("SO-010", "IndustrialCore", "PCB-IND-100", 8, deadline(3, 14), 2, ""),
        make_so("SO-011", "AgriBot Systems", "AGR-400", 4, deadline(3, 13), 3, ""),
        make_so("SO-012", "TechFlex", "PCB-PWR-500", 6, deadline(3, 15), 4, ""),
    ]
}

// ==========================================
// 内存版制造平台替身
// ==========================================

#[derive(Default)]
pub struct InMemoryGateway {
    pub sales_orders: Mutex<Vec<SalesOrder>>,
    pub products: HashMap<String, Product>,
    pub production_orders: Mutex<HashMap<String, ProductionOrder>>,
    pub next_po: AtomicU64,
    pub next_phase: AtomicU64,
    pub create_calls: AtomicU64,
    /// 第 N 次 create_production_order 返回永久错误 (清理路径测试)
    pub fail_on_create: Option<u64>,
}

impl InMemoryGateway {
    pub fn with_reference_data() -> Self {
        Self {
            sales_orders: Mutex::new(reference_orders()),
            products: reference_products(),
            ..Default::default()
        }
    }

    pub fn po_count(&self) -> usize {
        self.production_orders.lock().unwrap().len()
    }

    pub fn po_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .production_orders
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn sales_order_status(&self, internal_id: &str) -> Option<SalesOrderStatus> {
        self.sales_orders
            .lock()
            .unwrap()
            .iter()
            .find(|so| so.internal_id == internal_id)
            .map(|so| so.status)
    }

    /// 直接改写 PO 状态 (模拟执行层推进)
    pub fn set_po_status(&self, po_id: &str, status: ProductionOrderStatus) {
        if let Some(po) = self.production_orders.lock().unwrap().get_mut(po_id) {
            po.status = status;
        }
    }
}

#[async_trait]
impl ManufacturingGateway for InMemoryGateway {
    async fn list_sales_orders(
        &self,
        status: SalesOrderStatus,
    ) -> GatewayResult<Vec<SalesOrder>> {
        let mut orders: Vec<SalesOrder> = self
            .sales_orders
            .lock()
            .unwrap()
            .iter()
            .filter(|so| so.status == status)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.deadline.cmp(&b.deadline).then(a.priority.cmp(&b.priority)));
        Ok(orders)
    }

    async fn get_sales_order(&self, id: &str) -> GatewayResult<SalesOrder> {
        self.sales_orders
            .lock()
            .unwrap()
            .iter()
            .find(|so| so.id == id)
            .cloned()
            .ok_or(GatewayError::NotFound {
                resource: format!("sales order {id}"),
            })
    }

    async fn get_product(&self, product_id: &str) -> GatewayResult<Product> {
        self.products
            .get(product_id)
            .cloned()
            .ok_or(GatewayError::NotFound {
                resource: format!("product {product_id}"),
            })
    }

    async fn update_sales_order(
        &self,
        id: &str,
        patch: SalesOrderPatch,
    ) -> GatewayResult<SalesOrder> {
        let mut orders = self.sales_orders.lock().unwrap();
        let so = orders
            .iter_mut()
            .find(|so| so.id == id)
            .ok_or(GatewayError::NotFound {
                resource: format!("sales order {id}"),
            })?;
        if let Some(priority) = patch.priority {
            so.priority = priority;
        }
        if let Some(quantity) = patch.quantity {
            so.quantity = quantity;
        }
        if let Some(notes) = patch.notes {
            so.notes = notes;
        }
        if let Some(status) = patch.status {
            so.status = status;
        }
        Ok(so.clone())
    }

    async fn create_production_order(
        &self,
        req: CreateProductionOrder,
    ) -> GatewayResult<String> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(call) == self.fail_on_create {
            return Err(GatewayError::Permanent {
                status: 422,
                message: "injected create failure".to_string(),
            });
        }

        let id = format!("po-{:03}", self.next_po.fetch_add(1, Ordering::SeqCst) + 1);
        let po = ProductionOrder {
            id: id.clone(),
            sales_order_id: req.sales_order_id,
            product_id: req.product_id,
            quantity: req.quantity,
            planned_start: req.starts_at,
            planned_end: req.ends_at,
            status: ProductionOrderStatus::Draft,
            phases: Vec::new(),
        };
        self.production_orders.lock().unwrap().insert(id.clone(), po);
        Ok(id)
    }

    async fn schedule_production_order(
        &self,
        po_id: &str,
    ) -> GatewayResult<Vec<ProductionPhase>> {
        let mut pos = self.production_orders.lock().unwrap();
        let po = pos.get_mut(po_id).ok_or(GatewayError::NotFound {
            resource: format!("production order {po_id}"),
        })?;
        let product = self
            .products
            .get(&po.product_id)
            .ok_or(GatewayError::NotFound {
                resource: format!("product {}", po.product_id),
            })?;

        po.phases = product
            .bom
            .iter()
            .enumerate()
            .map(|(i, bom_phase)| ProductionPhase {
                id: format!("ph-{:04}", self.next_phase.fetch_add(1, Ordering::SeqCst) + 1),
                phase_type: bom_phase.phase_type,
                sequence: i as u32,
                planned_start: None,
                planned_end: None,
                status: PhaseStatus::NotReady,
                duration_minutes: 0,
            })
            .collect();
        po.status = ProductionOrderStatus::Scheduled;
        Ok(po.phases.clone())
    }

    async fn update_phase_window(
        &self,
        phase_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> GatewayResult<()> {
        let mut pos = self.production_orders.lock().unwrap();
        for po in pos.values_mut() {
            if let Some(phase) = po.phases.iter_mut().find(|p| p.id == phase_id) {
                phase.planned_start = Some(starts_at);
                phase.planned_end = Some(ends_at);
                phase.duration_minutes = (ends_at - starts_at).num_minutes();
                return Ok(());
            }
        }
        Err(GatewayError::NotFound {
            resource: format!("phase {phase_id}"),
        })
    }

    async fn update_po_window(
        &self,
        po_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> GatewayResult<()> {
        let mut pos = self.production_orders.lock().unwrap();
        let po = pos.get_mut(po_id).ok_or(GatewayError::NotFound {
            resource: format!("production order {po_id}"),
        })?;
        po.planned_start = starts_at;
        po.planned_end = ends_at;
        Ok(())
    }

    async fn confirm_production_order(&self, po_id: &str) -> GatewayResult<()> {
        let mut pos = self.production_orders.lock().unwrap();
        let po = pos.get_mut(po_id).ok_or(GatewayError::NotFound {
            resource: format!("production order {po_id}"),
        })?;
        po.status = ProductionOrderStatus::Ready;
        Ok(())
    }

    async fn delete_production_order(&self, po_id: &str) -> GatewayResult<()> {
        self.production_orders
            .lock()
            .unwrap()
            .remove(po_id)
            .map(|_| ())
            .ok_or(GatewayError::NotFound {
                resource: format!("production order {po_id}"),
            })
    }

    async fn get_production_order(&self, po_id: &str) -> GatewayResult<ProductionOrder> {
        self.production_orders
            .lock()
            .unwrap()
            .get(po_id)
            .cloned()
            .ok_or(GatewayError::NotFound {
                resource: format!("production order {po_id}"),
            })
    }
}

// ==========================================
// 录制通道 (收集推送, 不产生指令)
// ==========================================

#[derive(Default)]
pub struct RecordingChannel {
    pub proposals: Mutex<Vec<ProposalNotice>>,
    pub alerts: Mutex<Vec<FailureAlert>>,
    pub texts: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn proposal_count(&self) -> usize {
        self.proposals.lock().unwrap().len()
    }

    pub fn last_alert(&self) -> Option<FailureAlert> {
        self.alerts.lock().unwrap().last().cloned()
    }

    pub fn texts_snapshot(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperatorChannel for RecordingChannel {
    async fn send_proposal(&self, notice: &ProposalNotice) -> Result<(), ChannelError> {
        self.proposals.lock().unwrap().push(notice.clone());
        Ok(())
    }

    async fn send_failure_alert(&self, alert: &FailureAlert) -> Result<(), ChannelError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn next_command(
        &self,
    ) -> Result<pcb_line_aps::channel::OperatorCommand, ChannelError> {
        std::future::pending().await
    }
}

// ==========================================
// 桩顾问
// ==========================================

/// 固定回复的顾问
pub struct StubAdvisor {
    pub reply: AdvisorReply,
}

#[async_trait]
impl ScheduleAdvisor for StubAdvisor {
    async fn propose_revision(
        &self,
        _request: &AdvisorRequest,
    ) -> Result<AdvisorReply, AdvisorError> {
        Ok(self.reply.clone())
    }
}

/// 永远超时的顾问
pub struct FailingAdvisor;

#[async_trait]
impl ScheduleAdvisor for FailingAdvisor {
    async fn propose_revision(
        &self,
        _request: &AdvisorRequest,
    ) -> Result<AdvisorReply, AdvisorError> {
        Err(AdvisorError::Timeout)
    }
}

// ==========================================
// 编排器装配
// ==========================================

pub struct TestRig {
    pub orchestrator: Arc<Orchestrator>,
    pub gateway: Arc<InMemoryGateway>,
    pub channel: Arc<RecordingChannel>,
    pub action_log: Arc<ActionLogRepository>,
    /// 状态库文件 (保持存活)
    pub db_file: NamedTempFile,
}

/// 以参考数据装配编排器
pub fn build_rig(advisor: Option<Arc<dyn ScheduleAdvisor>>) -> TestRig {
    build_rig_with_gateway(Arc::new(InMemoryGateway::with_reference_data()), advisor)
}

pub fn build_rig_with_gateway(
    gateway: Arc<InMemoryGateway>,
    advisor: Option<Arc<dyn ScheduleAdvisor>>,
) -> TestRig {
    let db_file = NamedTempFile::new().expect("临时数据库创建失败");
    let db_path = db_file.path().to_str().expect("路径非法").to_string();
    let (orchestrator, channel, action_log) =
        build_orchestrator_at(gateway.clone(), advisor, &db_path);
    TestRig {
        orchestrator,
        gateway,
        channel,
        action_log,
        db_file,
    }
}

/// 在指定状态库路径上装配编排器 (重启测试复用同一路径)
pub fn build_orchestrator_at(
    gateway: Arc<InMemoryGateway>,
    advisor: Option<Arc<dyn ScheduleAdvisor>>,
    db_path: &str,
) -> (Arc<Orchestrator>, Arc<RecordingChannel>, Arc<ActionLogRepository>) {
    pcb_line_aps::logging::init_test();
    let state_repo = Arc::new(StateRepository::new(db_path).expect("状态库初始化失败"));
    let action_log = Arc::new(
        ActionLogRepository::from_connection(state_repo.connection())
            .expect("操作日志初始化失败"),
    );
    let channel = Arc::new(RecordingChannel::default());
    let orchestrator = Orchestrator::new(OrchestratorParts {
        gateway,
        advisor,
        channel: channel.clone(),
        notifier: Arc::new(NoOpNotifier),
        renderer: Arc::new(NoOpRenderer),
        state_repo,
        action_log: action_log.clone(),
        clock: ShiftClock::new(),
    })
    .expect("编排器初始化失败");
    (Arc::new(orchestrator), channel, action_log)
}
