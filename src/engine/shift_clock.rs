// ==========================================
// PCB产线排产系统 - 工作时间日历引擎
// ==========================================
// 职责: 8小时班次日历上的确定性时间运算
// 默认: 08:00-16:00 (UTC), 每周 7 天运转
// 约束: 运算封闭、确定、全函数; 同步执行, 不得挂起
// ==========================================

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// 单日最多前探的天数上限 (防御全非运转日的非法配置)
const MAX_DAY_SCAN: u32 = 366;

/// 工作时间日历
///
/// 班次窗口为 [shift_start, shift_end), 窗口外的分钟不计入工时
#[derive(Debug, Clone)]
pub struct ShiftClock {
    shift_start: NaiveTime,
    shift_end: NaiveTime,
    /// Mon..Sun 的运转标记
    operating_weekdays: [bool; 7],
}

impl ShiftClock {
    /// 默认日历: 08:00-16:00, 每天运转
    pub fn new() -> Self {
        Self::from_hours(8, 16)
    }

    /// 按整点小时构造班次窗口
    ///
    /// # 参数
    /// - start_hour: 开班小时 (0..24)
    /// - end_hour: 收班小时, 须大于 start_hour
    pub fn from_hours(start_hour: u32, end_hour: u32) -> Self {
        debug_assert!(start_hour < end_hour && end_hour <= 24);
        let end = if end_hour == 24 {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
        } else {
            NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap_or(NaiveTime::MIN)
        };
        Self {
            shift_start: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap_or(NaiveTime::MIN),
            shift_end: end,
            operating_weekdays: [true; 7],
        }
    }

    /// 指定每周运转日 (Mon..Sun), 至少一天为 true
    pub fn with_operating_weekdays(mut self, days: [bool; 7]) -> Self {
        debug_assert!(days.iter().any(|d| *d));
        self.operating_weekdays = days;
        self
    }

    /// 每个运转日的工时 (分钟)
    pub fn minutes_per_day(&self) -> i64 {
        (self.shift_end - self.shift_start).num_minutes()
    }

    /// 给定日期是否运转
    pub fn is_operating_day(&self, date: NaiveDate) -> bool {
        self.operating_weekdays[date.weekday().num_days_from_monday() as usize]
    }

    // ==========================================
    // 核心运算
    // ==========================================

    /// 向前吸附到最近的班内时刻 (班内原样返回)
    pub fn ceil_to_shift(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let date = t.date_naive();
        if self.is_operating_day(date) {
            let tod = t.time();
            if tod >= self.shift_start && tod < self.shift_end {
                return t;
            }
            if tod < self.shift_start {
                return self.shift_open_on(date);
            }
        }
        self.shift_open_on(self.next_operating_day(date))
    }

    /// 从 t 起消耗 minutes 分钟工时, 返回最后一分钟之后的时刻
    ///
    /// minutes = 0 时等价于 ceil_to_shift(t)
    pub fn add_working_minutes(&self, t: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        let mut cur = self.ceil_to_shift(t);
        let mut remaining = minutes.max(0);

        while remaining > 0 {
            let close = self.shift_close_on(cur.date_naive());
            let left_in_shift = (close - cur).num_minutes();
            if remaining <= left_in_shift {
                cur = cur + Duration::minutes(remaining);
                remaining = 0;
            } else {
                remaining -= left_in_shift;
                cur = self.shift_open_on(self.next_operating_day(cur.date_naive()));
            }
        }
        cur
    }

    /// a 到 b 之间的工时 (分钟), b ≤ a 时为 0
    pub fn working_minutes_between(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> i64 {
        if b <= a {
            return 0;
        }
        let mut cur = self.ceil_to_shift(a);
        let mut total = 0i64;

        while cur < b {
            let close = self.shift_close_on(cur.date_naive());
            let segment_end = close.min(b);
            if segment_end > cur {
                total += (segment_end - cur).num_minutes();
            }
            if close >= b {
                break;
            }
            cur = self.shift_open_on(self.next_operating_day(cur.date_naive()));
        }
        total
    }

    /// 有符号裕量: end 早于 deadline 为正, 晚于为负 (工作分钟)
    pub fn signed_slack(&self, end: DateTime<Utc>, deadline: DateTime<Utc>) -> i64 {
        if end <= deadline {
            self.working_minutes_between(end, deadline)
        } else {
            -self.working_minutes_between(deadline, end)
        }
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn shift_open_on(&self, date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(self.shift_start))
    }

    fn shift_close_on(&self, date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(self.shift_end))
    }

    /// date 之后 (不含当天) 的第一个运转日
    fn next_operating_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        for _ in 0..MAX_DAY_SCAN {
            d = d.succ_opt().unwrap_or(d);
            if self.is_operating_day(d) {
                return d;
            }
        }
        d
    }
}

impl Default for ShiftClock {
    fn default() -> Self {
        Self::new()
    }
}
