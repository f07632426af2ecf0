// ==========================================
// PCB产线排产系统 - 排序策略引擎
// ==========================================
// 职责: (订单集, 策略, 当前时刻) → 有序序列
// 约束: 纯函数, 稳定排序, 不修改输入
// ==========================================
// 六种策略:
// - EDF      交期升序; 平手按优先级、订单号
// - PRIORITY 优先级升序; 平手按交期、订单号
// - SJF/LJF  总工时升/降序; 平手按交期、订单号
// - SLACK    (交期 − now 的工时) − 总工时 升序; 平手按交期、订单号
// - CUSTOMER 客户分级升序 (未知=99); 平手按交期、优先级
// ==========================================

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::product::Product;
use crate::domain::sales_order::{Customer, SalesOrder};
use crate::domain::types::Policy;
use crate::engine::shift_clock::ShiftClock;

/// 未知客户的缺省分级
const UNKNOWN_CUSTOMER_RANK: i32 = 99;

// ==========================================
// PolicySorter - 排序策略引擎
// ==========================================
pub struct PolicySorter {
    clock: ShiftClock,
    customer_ranks: HashMap<String, i32>,
}

impl PolicySorter {
    /// 使用内置客户分级表构造
    pub fn new(clock: ShiftClock) -> Self {
        Self::with_customer_ranks(clock, default_customer_ranks())
    }

    pub fn with_customer_ranks(clock: ShiftClock, customer_ranks: HashMap<String, i32>) -> Self {
        Self {
            clock,
            customer_ranks,
        }
    }

    /// 按策略排序订单
    ///
    /// # 参数
    /// - orders: 待排序订单 (不被修改)
    /// - products: 产品编码 → 产品主数据 (供工时类策略查询)
    /// - policy: 排序策略
    /// - now: 当前时刻 (仅 SLACK 使用)
    ///
    /// # 返回
    /// 新的有序序列; 等键订单保持输入相对顺序
    pub fn sort(
        &self,
        orders: &[SalesOrder],
        products: &HashMap<String, Product>,
        policy: Policy,
        now: DateTime<Utc>,
    ) -> Vec<SalesOrder> {
        let mut sorted: Vec<SalesOrder> = orders.to_vec();
        sorted.sort_by(|a, b| self.compare(a, b, products, policy, now));
        sorted
    }

    /// 订单总工时 = 件数 × 单件各阶段工时之和 (分钟)
    ///
    /// 产品未知时记 0, 由规划引擎在展开阶段报错
    pub fn production_minutes(
        &self,
        order: &SalesOrder,
        products: &HashMap<String, Product>,
    ) -> i64 {
        products
            .get(&order.product_id)
            .map(|p| p.production_minutes(order.quantity))
            .unwrap_or(0)
    }

    fn compare(
        &self,
        a: &SalesOrder,
        b: &SalesOrder,
        products: &HashMap<String, Product>,
        policy: Policy,
        now: DateTime<Utc>,
    ) -> Ordering {
        match policy {
            Policy::Edf => a
                .deadline
                .cmp(&b.deadline)
                .then(a.priority.cmp(&b.priority))
                .then(a.internal_id.cmp(&b.internal_id)),

            Policy::Priority => a
                .priority
                .cmp(&b.priority)
                .then(a.deadline.cmp(&b.deadline))
                .then(a.internal_id.cmp(&b.internal_id)),

            Policy::Sjf => {
                let ma = self.production_minutes(a, products);
                let mb = self.production_minutes(b, products);
                ma.cmp(&mb)
                    .then(a.deadline.cmp(&b.deadline))
                    .then(a.internal_id.cmp(&b.internal_id))
            }

            Policy::Ljf => {
                let ma = self.production_minutes(a, products);
                let mb = self.production_minutes(b, products);
                mb.cmp(&ma)
                    .then(a.deadline.cmp(&b.deadline))
                    .then(a.internal_id.cmp(&b.internal_id))
            }

            Policy::Slack => {
                let sa = self.slack_key(a, products, now);
                let sb = self.slack_key(b, products, now);
                sa.cmp(&sb)
                    .then(a.deadline.cmp(&b.deadline))
                    .then(a.internal_id.cmp(&b.internal_id))
            }

            Policy::Customer => self
                .customer_rank(&a.customer)
                .cmp(&self.customer_rank(&b.customer))
                .then(a.deadline.cmp(&b.deadline))
                .then(a.priority.cmp(&b.priority)),
        }
    }

    /// SLACK 键: now 到交期的工时减去订单总工时
    fn slack_key(
        &self,
        order: &SalesOrder,
        products: &HashMap<String, Product>,
        now: DateTime<Utc>,
    ) -> i64 {
        self.clock.working_minutes_between(now, order.deadline)
            - self.production_minutes(order, products)
    }

    /// 客户分级: 订单记录上的显式分级优先, 否则查表, 未知记 99
    fn customer_rank(&self, customer: &Customer) -> i32 {
        customer
            .rank
            .or_else(|| self.customer_ranks.get(&customer.name).copied())
            .unwrap_or(UNKNOWN_CUSTOMER_RANK)
    }
}

/// 内置客户分级表
fn default_customer_ranks() -> HashMap<String, i32> {
    [
        ("MedTec Devices", 1),
        ("AgriBot Systems", 2),
        ("SmartHome IoT", 3),
        ("IndustrialCore", 4),
        ("TechFlex", 5),
    ]
    .into_iter()
    .map(|(name, rank)| (name.to_string(), rank))
    .collect()
}
