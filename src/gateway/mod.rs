// ==========================================
// PCB产线排产系统 - 外部系统网关
// ==========================================
// 职责: 仅暴露核心所需的制造平台操作
// 说明: 重试 / 退避 / 令牌刷新在网关内部完成,
//       调用方只看到分级后的错误类型
// ==========================================

pub mod dto;
pub mod error;
pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::product::Product;
use crate::domain::production::{ProductionOrder, ProductionPhase};
use crate::domain::sales_order::SalesOrder;
use crate::domain::types::SalesOrderStatus;

pub use error::{GatewayError, GatewayResult};
pub use http::HttpGateway;

/// 销售订单部分更新
#[derive(Debug, Clone, Default)]
pub struct SalesOrderPatch {
    pub priority: Option<i32>,
    pub quantity: Option<u32>,
    pub notes: Option<String>,
    pub status: Option<SalesOrderStatus>,
}

impl SalesOrderPatch {
    pub fn priority(priority: i32) -> Self {
        Self {
            priority: Some(priority),
            ..Default::default()
        }
    }

    pub fn status(status: SalesOrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// 创建生产订单请求
#[derive(Debug, Clone)]
pub struct CreateProductionOrder {
    pub sales_order_id: String,
    pub product_id: String,
    pub quantity: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// 制造平台网关
///
/// 所有方法均可能挂起; 超时与重试由实现负责
#[async_trait]
pub trait ManufacturingGateway: Send + Sync {
    /// 按状态列出销售订单
    async fn list_sales_orders(&self, status: SalesOrderStatus)
        -> GatewayResult<Vec<SalesOrder>>;

    async fn get_sales_order(&self, id: &str) -> GatewayResult<SalesOrder>;

    /// 读取产品主数据与工艺 BOM
    async fn get_product(&self, product_id: &str) -> GatewayResult<Product>;

    /// 部分更新销售订单 (priority / quantity / notes / status)
    async fn update_sales_order(
        &self,
        id: &str,
        patch: SalesOrderPatch,
    ) -> GatewayResult<SalesOrder>;

    /// 创建草稿 PO, 返回平台分配的 ID
    async fn create_production_order(
        &self,
        req: CreateProductionOrder,
    ) -> GatewayResult<String>;

    /// 指示平台按 BOM 物化阶段, 返回阶段列表
    async fn schedule_production_order(
        &self,
        po_id: &str,
    ) -> GatewayResult<Vec<ProductionPhase>>;

    async fn update_phase_window(
        &self,
        phase_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> GatewayResult<()>;

    async fn update_po_window(
        &self,
        po_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> GatewayResult<()>;

    /// PO → ready
    async fn confirm_production_order(&self, po_id: &str) -> GatewayResult<()>;

    async fn delete_production_order(&self, po_id: &str) -> GatewayResult<()>;

    async fn get_production_order(&self, po_id: &str) -> GatewayResult<ProductionOrder>;
}
