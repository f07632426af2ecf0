// ==========================================
// PCB产线排产系统 - 制造平台 HTTP 网关
// ==========================================
// 职责: ManufacturingGateway 的 reqwest 实现
// 策略:
// - 每次调用 30 秒超时
// - 瞬时错误按上限 3 次的指数退避重试
// - 401 静默刷新令牌并重试一次
// ==========================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::product::Product;
use crate::domain::production::{ProductionOrder, ProductionPhase};
use crate::domain::sales_order::SalesOrder;
use crate::domain::types::SalesOrderStatus;
use crate::gateway::dto::{
    format_wire_dt, ProductDto, ProductionOrderDto, SalesOrderDto,
};
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::{CreateProductionOrder, ManufacturingGateway, SalesOrderPatch};

/// 单次调用超时 (秒)
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// 瞬时错误最大尝试次数
const MAX_ATTEMPTS: u32 = 3;
/// 退避基数 (毫秒)
const BACKOFF_BASE_MS: u64 = 250;
/// 退避上限 (毫秒)
const BACKOFF_CAP_MS: u64 = 2_000;

// ==========================================
// HttpGateway
// ==========================================
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
}

impl HttpGateway {
    /// 构造网关客户端 (不立即登录, 首次调用时取令牌)
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::Transient(format!("HTTP 客户端构造失败: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// 登录并缓存令牌
    async fn login(&self) -> GatewayResult<String> {
        info!("网关登录: {}", self.base_url);
        let resp = self
            .http
            .post(self.url("/login"))
            .json(&json!({ "username": self.username, "password": self.password }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(format!("登录超时: {e}"))
                } else {
                    GatewayError::Transient(format!("登录失败: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            return Err(GatewayError::AuthFailed(format!(
                "status={}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("登录响应解析失败: {e}")))?;
        let token = body
            .get("accessToken")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::Decode("登录响应缺少 accessToken".to_string()))?
            .to_string();

        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn ensure_token(&self) -> GatewayResult<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await
    }

    /// 统一请求入口: 令牌 / 重试 / 错误分级
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> GatewayResult<Value> {
        let mut attempt: u32 = 0;
        let mut refreshed = false;

        loop {
            attempt += 1;
            let token = self.ensure_token().await?;

            let mut req = self
                .http
                .request(method.clone(), self.url(path))
                .bearer_auth(&token);
            if let Some(b) = &body {
                req = req.json(b);
            }

            let outcome: GatewayResult<Value> = match req.send().await {
                Err(e) if e.is_timeout() => {
                    Err(GatewayError::Timeout(format!("{} {path}: {e}", method)))
                }
                Err(e) => Err(GatewayError::Transient(format!("{} {path}: {e}", method))),
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::UNAUTHORIZED {
                        if refreshed {
                            Err(GatewayError::AuthExpired)
                        } else {
                            // 令牌过期: 静默刷新后重试一次, 不计入退避次数
                            debug!("令牌过期, 刷新后重试: {} {path}", method);
                            refreshed = true;
                            *self.token.write().await = None;
                            attempt -= 1;
                            continue;
                        }
                    } else if status == StatusCode::NOT_FOUND {
                        Err(GatewayError::NotFound {
                            resource: path.to_string(),
                        })
                    } else if status.is_server_error()
                        || status == StatusCode::REQUEST_TIMEOUT
                        || status == StatusCode::TOO_MANY_REQUESTS
                    {
                        Err(GatewayError::Transient(format!(
                            "{} {path}: status={}",
                            method, status
                        )))
                    } else if status.is_client_error() {
                        let message = resp.text().await.unwrap_or_default();
                        Err(GatewayError::Permanent {
                            status: status.as_u16(),
                            message,
                        })
                    } else {
                        let text = resp
                            .text()
                            .await
                            .map_err(|e| GatewayError::Decode(e.to_string()))?;
                        if text.is_empty() {
                            Ok(Value::Null)
                        } else {
                            serde_json::from_str(&text)
                                .map_err(|e| GatewayError::Decode(format!("{path}: {e}")))
                        }
                    }
                }
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    let delay =
                        (BACKOFF_BASE_MS << (attempt - 1)).min(BACKOFF_CAP_MS);
                    warn!("网关调用重试 ({}/{}): {e}, 退避 {delay}ms", attempt, MAX_ATTEMPTS);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get(&self, path: &str) -> GatewayResult<Value> {
        self.request(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> GatewayResult<Value> {
        self.request(Method::POST, path, body).await
    }
}

#[async_trait]
impl ManufacturingGateway for HttpGateway {
    async fn list_sales_orders(
        &self,
        status: SalesOrderStatus,
    ) -> GatewayResult<Vec<SalesOrder>> {
        let raw = self.get("/sales/order/_active").await?;
        let dtos: Vec<SalesOrderDto> = serde_json::from_value(raw)
            .map_err(|e| GatewayError::Decode(format!("销售订单列表: {e}")))?;

        let mut orders: Vec<SalesOrder> = dtos
            .into_iter()
            .filter_map(SalesOrderDto::into_domain)
            .filter(|so| so.status == status)
            .collect();
        orders.sort_by(|a, b| {
            a.deadline
                .cmp(&b.deadline)
                .then(a.priority.cmp(&b.priority))
        });
        Ok(orders)
    }

    async fn get_sales_order(&self, id: &str) -> GatewayResult<SalesOrder> {
        let raw = self.get(&format!("/sales/order/{id}")).await?;
        let dto: SalesOrderDto = serde_json::from_value(raw)
            .map_err(|e| GatewayError::Decode(format!("销售订单 {id}: {e}")))?;
        dto.into_domain().ok_or(GatewayError::NotFound {
            resource: format!("sales order {id}"),
        })
    }

    async fn get_product(&self, product_id: &str) -> GatewayResult<Product> {
        let raw = self.get(&format!("/product/product/{product_id}")).await?;
        let dto: ProductDto = serde_json::from_value(raw)
            .map_err(|e| GatewayError::Decode(format!("产品 {product_id}: {e}")))?;
        Ok(dto.into_domain())
    }

    async fn update_sales_order(
        &self,
        id: &str,
        patch: SalesOrderPatch,
    ) -> GatewayResult<SalesOrder> {
        // 平台要求整体 PUT: 先读全量再改写指定字段
        let mut raw = self.get(&format!("/sales/order/{id}")).await?;
        {
            let fields = raw.as_object_mut().ok_or_else(|| {
                GatewayError::Decode(format!("销售订单 {id} 响应不是对象"))
            })?;
            if let Some(priority) = patch.priority {
                fields.insert("priority".to_string(), json!(priority));
            }
            if let Some(notes) = &patch.notes {
                fields.insert("notes".to_string(), json!(notes));
            }
            if let Some(status) = patch.status {
                fields.insert("status".to_string(), json!(status.as_str()));
            }
            if let Some(quantity) = patch.quantity {
                if let Some(line) = fields
                    .get_mut("products")
                    .and_then(Value::as_array_mut)
                    .and_then(|a| a.first_mut())
                    .and_then(Value::as_object_mut)
                {
                    line.insert("quantity".to_string(), json!(quantity));
                }
            }
        }

        let updated = self
            .request(Method::PUT, &format!("/sales/order/{id}"), Some(raw))
            .await?;
        let dto: SalesOrderDto = serde_json::from_value(updated)
            .map_err(|e| GatewayError::Decode(format!("销售订单 {id}: {e}")))?;
        dto.into_domain().ok_or(GatewayError::Decode(format!(
            "销售订单 {id} 更新响应不完整"
        )))
    }

    async fn create_production_order(
        &self,
        req: CreateProductionOrder,
    ) -> GatewayResult<String> {
        let body = json!({
            "sales_order_id": req.sales_order_id,
            "product_id": req.product_id,
            "quantity": req.quantity,
            "starts_at": format_wire_dt(req.starts_at),
            "ends_at": format_wire_dt(req.ends_at),
        });
        let raw = self
            .request(Method::PUT, "/product/production", Some(body))
            .await?;
        raw.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Decode("创建 PO 响应缺少 id".to_string()))
    }

    async fn schedule_production_order(
        &self,
        po_id: &str,
    ) -> GatewayResult<Vec<ProductionPhase>> {
        self.post(&format!("/product/production/{po_id}/_schedule"), None)
            .await?;
        let po = self.get_production_order(po_id).await?;
        Ok(po.phases)
    }

    async fn update_phase_window(
        &self,
        phase_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> GatewayResult<()> {
        self.post(
            &format!("/product/production-order-phase/{phase_id}/_update_ending_date"),
            Some(json!({ "ends_at": format_wire_dt(ends_at) })),
        )
        .await?;
        self.post(
            &format!("/product/production-order-phase/{phase_id}/_update_starting_date"),
            Some(json!({ "starts_at": format_wire_dt(starts_at) })),
        )
        .await?;
        Ok(())
    }

    async fn update_po_window(
        &self,
        po_id: &str,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> GatewayResult<()> {
        self.post(
            &format!("/product/production/{po_id}/_update_starting_date"),
            Some(json!({ "starts_at": format_wire_dt(starts_at) })),
        )
        .await?;
        self.post(
            &format!("/product/production/{po_id}/_update_ending_date"),
            Some(json!({ "ends_at": format_wire_dt(ends_at) })),
        )
        .await?;
        Ok(())
    }

    async fn confirm_production_order(&self, po_id: &str) -> GatewayResult<()> {
        self.post(&format!("/product/production/{po_id}/_confirm"), None)
            .await?;
        Ok(())
    }

    async fn delete_production_order(&self, po_id: &str) -> GatewayResult<()> {
        self.request(
            Method::DELETE,
            &format!("/product/production/{po_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn get_production_order(&self, po_id: &str) -> GatewayResult<ProductionOrder> {
        let raw = self.get(&format!("/product/production/{po_id}")).await?;
        let dto: ProductionOrderDto = serde_json::from_value(raw)
            .map_err(|e| GatewayError::Decode(format!("生产订单 {po_id}: {e}")))?;
        Ok(dto.into_domain())
    }
}
