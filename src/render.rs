// ==========================================
// PCB产线排产系统 - 时间轴渲染边界
// ==========================================
// 职责: 方案条目 → 甘特图图像字节
// 说明: 具体渲染器在边界之外, 核心只依赖 trait
// ==========================================

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::schedule::ScheduleEntry;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("渲染失败: {0}")]
    Failed(String),
}

/// 甘特图渲染器 (同步, 本地计算)
pub trait TimelineRenderer: Send + Sync {
    fn render(
        &self,
        entries: &[ScheduleEntry],
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, RenderError>;
}

/// 空操作渲染器: 返回空图像
#[derive(Debug, Default)]
pub struct NoOpRenderer;

impl TimelineRenderer for NoOpRenderer {
    fn render(
        &self,
        _entries: &[ScheduleEntry],
        _now: DateTime<Utc>,
    ) -> Result<Vec<u8>, RenderError> {
        Ok(Vec::new())
    }
}
