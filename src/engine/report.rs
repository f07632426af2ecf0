// ==========================================
// PCB产线排产系统 - 方案文字报告
// ==========================================
// 职责: 面向操作员通道的确定性文字摘要
// 说明: 操作员文案使用英文 (现场工作语言)
// ==========================================

use crate::domain::schedule::Schedule;

/// 生成方案文字摘要
///
/// 格式: 每条目一行 (序号/订单/产品×数量/窗口/交期/裕量/优先级/按期标记),
/// 随后是按期计数; 存在迟交时附工作量折算与迟交明细。
pub fn build_text_summary(schedule: &Schedule, minutes_per_day: i64) -> String {
    let mut lines = vec![format!("Production Schedule ({})\n", schedule.policy)];

    for (i, e) in schedule.entries.iter().enumerate() {
        let status = if e.late { "LATE" } else { "ON TIME" };
        let slack_h = e.slack_minutes as f64 / 60.0;
        let slack = if e.late {
            format!("{:.0}h", slack_h)
        } else {
            format!("+{:.0}h", slack_h)
        };
        lines.push(format!(
            "{:02}. {} | {} x{} | {} -> {} | Deadline: {} | {} | P{} | {}",
            i + 1,
            e.sales_order_internal_id,
            e.product_id,
            e.quantity,
            e.planned_start.format("%b %d %H:%M"),
            e.planned_end.format("%b %d %H:%M"),
            e.deadline.format("%b %d"),
            slack,
            e.priority,
            status,
        ));
    }

    let on_time = schedule.entries.iter().filter(|e| !e.late).count();
    lines.push(format!("\nOn time: {}/{}", on_time, schedule.entries.len()));

    let late: Vec<_> = schedule.entries.iter().filter(|e| e.late).collect();
    if !late.is_empty() {
        let total_work: i64 = schedule
            .entries
            .iter()
            .map(|e| e.phases.iter().map(|p| p.duration_minutes).sum::<i64>())
            .sum();
        lines.push(format!(
            "Total work: {} min = {:.1} working days",
            total_work,
            total_work as f64 / minutes_per_day as f64,
        ));
        for e in late {
            lines.push(format!(
                "  LATE: {} | {} x{} | late by {:.1}h",
                e.sales_order_internal_id,
                e.product_id,
                e.quantity,
                (-e.slack_minutes) as f64 / 60.0,
            ));
        }
    }

    if !schedule.notes.is_empty() {
        lines.push(format!("\nNotes: {}", schedule.notes));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::ScheduleEntry;
    use crate::domain::types::{Policy, ScheduleStatus};
    use chrono::{TimeZone, Utc};

    fn sample_schedule() -> Schedule {
        let entry = ScheduleEntry {
            production_order_id: "po-1".to_string(),
            sales_order_id: "uuid-1".to_string(),
            sales_order_internal_id: "SO-001".to_string(),
            product_id: "PCB-IND-100".to_string(),
            quantity: 2,
            customer_name: "IndustrialCore".to_string(),
            priority: 1,
            planned_start: Utc.with_ymd_and_hms(2026, 2, 28, 8, 0, 0).unwrap(),
            planned_end: Utc.with_ymd_and_hms(2026, 2, 28, 12, 54, 0).unwrap(),
            deadline: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
            slack_minutes: 666,
            late: false,
            phases: Vec::new(),
        };
        Schedule {
            id: 1,
            generated_at: Utc.with_ymd_and_hms(2026, 2, 28, 8, 0, 0).unwrap(),
            policy: Policy::Edf,
            entries: vec![entry],
            conflicts: Vec::new(),
            status: ScheduleStatus::Proposed,
            notes: String::new(),
        }
    }

    #[test]
    fn test_summary_lists_entries_and_on_time_count() {
        let text = build_text_summary(&sample_schedule(), 480);
        assert!(text.starts_with("Production Schedule (EDF)"));
        assert!(text.contains("01. SO-001 | PCB-IND-100 x2"));
        assert!(text.contains("Feb 28 08:00 -> Feb 28 12:54"));
        assert!(text.contains("+11h | P1 | ON TIME"));
        assert!(text.contains("On time: 1/1"));
        assert!(!text.contains("LATE:"));
    }

    #[test]
    fn test_summary_late_section() {
        let mut schedule = sample_schedule();
        schedule.entries[0].late = true;
        schedule.entries[0].slack_minutes = -210;
        let text = build_text_summary(&schedule, 480);
        assert!(text.contains("LATE: SO-001 | PCB-IND-100 x2 | late by 3.5h"));
        assert!(text.contains("On time: 0/1"));
    }
}
