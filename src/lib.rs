// ==========================================
// PCB产线排产系统 - 核心库
// ==========================================
// 技术栈: tokio + axum + reqwest + SQLite
// 系统定位: 单线排产决策支持 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 确定性排产内核
pub mod engine;

// 编排层 - 方案生命周期
pub mod orchestrator;

// 网关层 - 制造平台适配
pub mod gateway;

// 顾问边界 - AI 排序建议
pub mod advisor;

// 操作员通道边界
pub mod channel;

// 工厂事件接入端点
pub mod intake;

// 数据仓储层 - 本地持久化
pub mod repository;

// 配置层 - 环境变量
pub mod config;

// 渲染 / 通知边界
pub mod notify;
pub mod render;

// 数据库基础设施 (连接初始化/PRAGMA 统一)
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    PhaseStatus, PhaseType, Policy, ProductionOrderStatus, SalesOrderStatus, ScheduleStatus,
};

// 领域实体
pub use domain::{
    BomPhase, Customer, EntryPhase, Product, ProductionOrder, ProductionPhase, SalesOrder,
    Schedule, ScheduleEntry,
};

// 引擎
pub use engine::{
    build_text_summary, ConflictAnalyzer, ConflictReport, PhasePlanner, PlanningError,
    PolicySorter, ShiftClock,
};

// 编排器
pub use orchestrator::factory::{DashboardSummary, FailureDispatch};
pub use orchestrator::{
    AdvisorHint, Orchestrator, OrchestratorError, OrchestratorParts, ProposalArtifacts,
};

// 网关
pub use gateway::{
    CreateProductionOrder, GatewayError, GatewayResult, HttpGateway, ManufacturingGateway,
    SalesOrderPatch,
};

// 边界
pub use advisor::{AdvisorReply, AdvisorRequest, GeminiAdvisor, ScheduleAdvisor};
pub use channel::{FailureAlert, NoOpChannel, OperatorChannel, OperatorCommand, ProposalNotice};
pub use notify::{EmailNotifier, NoOpNotifier};
pub use render::{NoOpRenderer, TimelineRenderer};

// 配置与仓储
pub use config::{AppConfig, ConfigError};
pub use repository::{ActionLogRepository, ActionType, StateRepository};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "PCB产线排产系统";
