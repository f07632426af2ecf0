// ==========================================
// 端到端排产流程测试
// ==========================================
// 场景: 参考订单簿 SO-001..SO-012, 基准日 2026-02-28
// - S1 EDF 基线排序与迟交集合
// - S2 PRIORITY 策略制造 SO-003 冲突
// - S3 SJF 最短作业优先
// - S4 CUSTOMER 客户分级优先
// - S5 工厂失败 → 取消订单 → 重排
// - S6 操作员修订 → 顾问提示 → 重排
// ==========================================

mod test_helpers;

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use pcb_line_aps::advisor::{AdvisorReply, PriorityUpdate};
use pcb_line_aps::domain::schedule::Schedule;
use pcb_line_aps::domain::types::{Policy, ProductionOrderStatus, SalesOrderStatus};
use pcb_line_aps::gateway::ManufacturingGateway;

use test_helpers::{build_rig, ref_now, StubAdvisor};

fn sequence(schedule: &Schedule) -> Vec<&str> {
    schedule
        .entries
        .iter()
        .map(|e| e.sales_order_internal_id.as_str())
        .collect()
}

/// 不变量: 条目窗口两两不重叠, 阶段链单调且与条目窗口一致
fn assert_schedule_invariants(schedule: &Schedule) {
    for w in schedule.entries.windows(2) {
        assert!(
            w[0].planned_end <= w[1].planned_start,
            "条目重叠: {} 结束 {} 晚于 {} 开始 {}",
            w[0].sales_order_internal_id,
            w[0].planned_end,
            w[1].sales_order_internal_id,
            w[1].planned_start,
        );
    }
    for entry in &schedule.entries {
        assert!(!entry.phases.is_empty(), "{} 无阶段", entry.sales_order_internal_id);
        assert_eq!(entry.phases[0].starts_at, entry.planned_start);
        assert_eq!(
            entry.phases[entry.phases.len() - 1].ends_at,
            entry.planned_end
        );
        for w in entry.phases.windows(2) {
            assert!(w[0].ends_at <= w[1].starts_at);
        }
    }
}

// ==========================================
// S1: EDF
// ==========================================
#[tokio::test]
async fn test_s1_edf_baseline() {
    let rig = build_rig(None);
    let artifacts = rig
        .orchestrator
        .compute_proposal(Policy::Edf, ref_now())
        .await
        .unwrap();
    let schedule = &artifacts.schedule;

    assert_eq!(
        sequence(schedule),
        vec![
            "SO-001", "SO-002", "SO-009", "SO-003", "SO-004", "SO-005", "SO-006", "SO-007",
            "SO-008", "SO-011", "SO-010", "SO-012",
        ],
    );
    assert_schedule_invariants(schedule);

    // 算例核对: SO-001 = 294 工作分钟, 当日 12:54 完工
    let first = &schedule.entries[0];
    assert_eq!(
        first.planned_end,
        Utc.with_ymd_and_hms(2026, 2, 28, 12, 54, 0).unwrap(),
    );
    assert!(!first.late);

    // 结构性迟交: 总工时 7356 分钟超出 Mar 15 前的可用工时
    assert_eq!(
        schedule.conflicts,
        vec!["SO-003".to_string(), "SO-010".to_string(), "SO-012".to_string()],
    );
    let so003 = schedule
        .entries
        .iter()
        .find(|e| e.sales_order_internal_id == "SO-003")
        .unwrap();
    assert_eq!(so003.slack_minutes, -210);

    assert_eq!(artifacts.report.on_time_count, 9);
    assert_eq!(artifacts.report.entry_count, 12);
    assert!(artifacts.summary.contains("Production Schedule (EDF)"));
    assert_eq!(rig.channel.proposal_count(), 1);
}

// ==========================================
// S2: PRIORITY 制造 SO-005 冲突
// ==========================================
#[tokio::test]
async fn test_s2_priority_policy_flags_so003_late() {
    let rig = build_rig(None);
    let artifacts = rig
        .orchestrator
        .compute_proposal(Policy::Priority, ref_now())
        .await
        .unwrap();
    let schedule = &artifacts.schedule;
    let seq = sequence(schedule);

    // P1 等级内 SO-005 (Mar 8) 插到 SO-003 (Mar 4) 之前
    let pos_005 = seq.iter().position(|id| *id == "SO-005").unwrap();
    let pos_003 = seq.iter().position(|id| *id == "SO-003").unwrap();
    assert!(pos_005 < pos_003, "PRIORITY 策略应将 SO-005 排在 SO-003 前");

    // 经典冲突: SO-003 被挤过交期, SO-005 自身按期
    assert!(schedule.conflicts.contains(&"SO-003".to_string()));
    let so005 = &schedule.entries[pos_005];
    assert!(!so005.late);
    let so003 = &schedule.entries[pos_003];
    assert!(so003.late);
    assert_eq!(so003.slack_minutes, -840);

    assert_schedule_invariants(schedule);
}

// ==========================================
// S3: SJF
// ==========================================
#[tokio::test]
async fn test_s3_sjf_shortest_first() {
    let rig = build_rig(None);
    let artifacts = rig
        .orchestrator
        .compute_proposal(Policy::Sjf, ref_now())
        .await
        .unwrap();
    let schedule = &artifacts.schedule;

    // 总工时升序, 平手按交期 (SO-008 Mar12 先于 SO-012 Mar15)
    assert_eq!(
        sequence(schedule),
        vec![
            "SO-002", "SO-001", "SO-008", "SO-012", "SO-011", "SO-004", "SO-006", "SO-005",
            "SO-003", "SO-007", "SO-009", "SO-010",
        ],
    );
    assert_schedule_invariants(schedule);

    // 大单被挤到后段, 必有迟交
    assert!(!schedule.is_clean());
    assert!(schedule.conflicts.contains(&"SO-010".to_string()));
}

// ==========================================
// S4: CUSTOMER
// ==========================================
#[tokio::test]
async fn test_s4_customer_rank_order() {
    let rig = build_rig(None);
    let artifacts = rig
        .orchestrator
        .compute_proposal(Policy::Customer, ref_now())
        .await
        .unwrap();
    let schedule = &artifacts.schedule;
    let seq = sequence(schedule);

    assert_eq!(
        seq,
        vec![
            "SO-002", "SO-009", "SO-003", "SO-011", "SO-005", "SO-008", "SO-001", "SO-006",
            "SO-010", "SO-004", "SO-007", "SO-012",
        ],
    );

    // MedTec → AgriBot → SmartHome 的块顺序
    let pos = |id: &str| seq.iter().position(|x| *x == id).unwrap();
    assert!(pos("SO-009") < pos("SO-003"));
    assert!(pos("SO-011") < pos("SO-005"));
    assert!(pos("SO-008") < pos("SO-001"));

    // 近交期的 IndustrialCore 单被客户分级挤迟
    assert!(schedule.conflicts.contains(&"SO-001".to_string()));
    assert_schedule_invariants(schedule);
}

// ==========================================
// S5: 工厂失败 → 取消订单 → 重排
// ==========================================
#[tokio::test]
async fn test_s5_factory_failure_cancel_order() {
    let rig = build_rig(None);
    let now = ref_now();

    let artifacts = rig
        .orchestrator
        .compute_proposal(Policy::Edf, now)
        .await
        .unwrap();
    rig.orchestrator
        .approve(artifacts.schedule.id, now)
        .await
        .unwrap();

    // 执行层推进: SO-005 的 PO 进入 in_progress 后产线报障
    let tracked = rig.orchestrator.tracked_orders();
    let failed_po = tracked.get("so-uuid-005").cloned().unwrap();
    rig.gateway
        .set_po_status(&failed_po, ProductionOrderStatus::InProgress);

    let event_time = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let dispatch = rig
        .orchestrator
        .handle_factory_failure(vec![0xFF, 0xD8], "solder bridge on AOI".to_string(), None, event_time)
        .await
        .unwrap();
    assert_eq!(dispatch.production_order_id, failed_po);
    assert_eq!(dispatch.sales_order_internal_id.as_deref(), Some("SO-005"));

    // 告警携带两个参数化恢复动作
    let alert = rig.channel.last_alert().unwrap();
    assert_eq!(alert.production_order_id, failed_po);
    assert_eq!(alert.actions.len(), 2);

    // 操作员选择取消订单
    let artifacts = rig
        .orchestrator
        .cancel_order("so-uuid-005", &failed_po, event_time)
        .await
        .unwrap();
    let schedule = &artifacts.schedule;

    assert_eq!(
        rig.gateway.sales_order_status("SO-005"),
        Some(SalesOrderStatus::Cancelled),
    );
    assert!(
        !sequence(schedule).contains(&"SO-005"),
        "取消后的方案不应再包含 SO-005"
    );
    assert_eq!(schedule.entries.len(), 11);
    assert_schedule_invariants(schedule);

    // 旧 PO 全部重建, 平台侧数量与新方案一致
    assert_eq!(rig.gateway.po_count(), schedule.entries.len());
    assert!(!rig.gateway.po_ids().contains(&failed_po));

    // 重排后重新进入审批闸口
    let proposed = rig.orchestrator.proposed_schedule().unwrap();
    assert_eq!(proposed.id, schedule.id);
}

// ==========================================
// S6: 修订 → 顾问提示
// ==========================================
#[tokio::test]
async fn test_s6_revise_with_advisor_hint() {
    let advisor = Arc::new(StubAdvisor {
        reply: AdvisorReply {
            reordered_so_ids: vec![
                "so-uuid-001".to_string(),
                "so-uuid-006".to_string(),
                "so-uuid-010".to_string(),
            ],
            priority_updates: vec![PriorityUpdate {
                sales_order_id: "so-uuid-010".to_string(),
                new_priority: 1,
                reason: "customer escalation".to_string(),
            }],
            comment: "IndustrialCore orders moved to the front.".to_string(),
            conflicts: vec![],
        },
    });
    let rig = build_rig(Some(advisor));
    let now = ref_now();

    let artifacts = rig
        .orchestrator
        .compute_proposal(Policy::Edf, now)
        .await
        .unwrap();
    let revised = rig
        .orchestrator
        .revise(artifacts.schedule.id, "prioritise IndustrialCore", now)
        .await
        .unwrap();
    let schedule = &revised.schedule;
    let seq = sequence(schedule);

    // 命中提示的订单按提示顺序在前, 其余回退 EDF
    assert_eq!(&seq[..3], &["SO-001", "SO-006", "SO-010"]);
    assert_eq!(
        &seq[3..],
        &["SO-002", "SO-009", "SO-003", "SO-004", "SO-005", "SO-007", "SO-008", "SO-011", "SO-012"],
    );
    assert_eq!(schedule.notes, "IndustrialCore orders moved to the front.");
    assert_schedule_invariants(schedule);

    // 顾问的优先级调整已写回平台
    let so010 = rig
        .gateway
        .get_sales_order("so-uuid-010")
        .await
        .unwrap();
    assert_eq!(so010.priority, 1);

    // 迟交集合照常上报
    assert!(schedule.conflicts.contains(&"SO-002".to_string()));
    assert!(!schedule.conflicts.is_empty());

    // 原方案被驳回, 新方案成为唯一在途方案
    let proposed = rig.orchestrator.proposed_schedule().unwrap();
    assert_eq!(proposed.id, schedule.id);
    assert!(proposed.id != artifacts.schedule.id);
    assert_eq!(rig.channel.proposal_count(), 2);
}
