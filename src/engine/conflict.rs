// ==========================================
// PCB产线排产系统 - 交期冲突分析引擎
// ==========================================
// 职责: 逐条目计算有符号裕量与迟交标记, 汇总整单指标
// 约束: 同步纯计算; 裕量单位为工作分钟
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::schedule::ScheduleEntry;
use crate::engine::shift_clock::ShiftClock;

/// 冲突分析汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// 迟交订单的业务编号 (按条目顺序)
    pub late_order_ids: Vec<String>,
    /// 最差 (最小) 裕量, 空方案为 None
    pub worst_slack_minutes: Option<i64>,
    /// 平均裕量 (分钟, 向零取整)
    pub average_slack_minutes: Option<i64>,
    pub on_time_count: usize,
    pub entry_count: usize,
}

impl ConflictReport {
    /// 无任何迟交条目
    pub fn is_clean(&self) -> bool {
        self.late_order_ids.is_empty()
    }
}

// ==========================================
// ConflictAnalyzer - 冲突分析引擎
// ==========================================
pub struct ConflictAnalyzer {
    clock: ShiftClock,
}

impl ConflictAnalyzer {
    pub fn new(clock: ShiftClock) -> Self {
        Self { clock }
    }

    /// 分析方案条目
    ///
    /// 就地回填每个条目的 slack_minutes / late, 返回汇总报告
    pub fn analyze(&self, entries: &mut [ScheduleEntry]) -> ConflictReport {
        let mut late_order_ids = Vec::new();
        let mut worst: Option<i64> = None;
        let mut sum: i64 = 0;
        let mut on_time = 0usize;

        for entry in entries.iter_mut() {
            let slack = self.clock.signed_slack(entry.planned_end, entry.deadline);
            entry.slack_minutes = slack;
            entry.late = slack < 0;

            if entry.late {
                late_order_ids.push(entry.sales_order_internal_id.clone());
            } else {
                on_time += 1;
            }
            worst = Some(worst.map_or(slack, |w| w.min(slack)));
            sum += slack;
        }

        let entry_count = entries.len();
        ConflictReport {
            late_order_ids,
            worst_slack_minutes: worst,
            average_slack_minutes: if entry_count > 0 {
                Some(sum / entry_count as i64)
            } else {
                None
            },
            on_time_count: on_time,
            entry_count,
        }
    }
}

// ==========================================
// 测试模块
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, mo, d, h, mi, 0).unwrap()
    }

    fn make_entry(
        internal_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> ScheduleEntry {
        ScheduleEntry {
            production_order_id: format!("po-{}", internal_id),
            sales_order_id: format!("uuid-{}", internal_id),
            sales_order_internal_id: internal_id.to_string(),
            product_id: "PCB-IND-100".to_string(),
            quantity: 1,
            customer_name: "IndustrialCore".to_string(),
            priority: 2,
            planned_start: start,
            planned_end: end,
            deadline,
            slack_minutes: 0,
            late: false,
            phases: Vec::new(),
        }
    }

    #[test]
    fn test_on_time_entry_has_positive_slack() {
        let analyzer = ConflictAnalyzer::new(ShiftClock::new());
        let mut entries = vec![make_entry(
            "SO-001",
            utc(2, 28, 8, 0),
            utc(2, 28, 12, 54),
            utc(3, 2, 8, 0),
        )];
        let report = analyzer.analyze(&mut entries);

        assert!(report.is_clean());
        assert_eq!(report.on_time_count, 1);
        assert_eq!(entries[0].slack_minutes, 666);
        assert!(!entries[0].late);
        assert_eq!(report.worst_slack_minutes, Some(666));
    }

    #[test]
    fn test_late_entry_gets_negative_slack_and_flag() {
        let analyzer = ConflictAnalyzer::new(ShiftClock::new());
        let mut entries = vec![
            make_entry("SO-001", utc(2, 28, 8, 0), utc(2, 28, 12, 0), utc(3, 2, 8, 0)),
            make_entry("SO-003", utc(2, 28, 12, 0), utc(3, 4, 11, 30), utc(3, 4, 8, 0)),
        ];
        let report = analyzer.analyze(&mut entries);

        assert!(!report.is_clean());
        assert_eq!(report.late_order_ids, vec!["SO-003".to_string()]);
        assert_eq!(entries[1].slack_minutes, -210);
        assert!(entries[1].late);
        assert_eq!(report.worst_slack_minutes, Some(-210));
        assert_eq!(report.on_time_count, 1);
        assert_eq!(report.entry_count, 2);
    }

    #[test]
    fn test_empty_schedule_report() {
        let analyzer = ConflictAnalyzer::new(ShiftClock::new());
        let report = analyzer.analyze(&mut []);
        assert!(report.is_clean());
        assert_eq!(report.worst_slack_minutes, None);
        assert_eq!(report.average_slack_minutes, None);
        assert_eq!(report.entry_count, 0);
    }
}
