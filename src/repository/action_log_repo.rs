// ==========================================
// PCB产线排产系统 - 操作日志仓储
// ==========================================
// 职责: 排产决策与工厂事件的审计追踪
// 说明: restart_order 在平台侧硬删除失败 PO,
//       失败历史由本日志保留
// ==========================================

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    ProposalCreated,
    ProposalApproved,
    ProposalRejected,
    ProposalSuperseded,
    FactoryFailure,
    OrderCancelled,
    OrderRestarted,
    PriorityUpdated,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ProposalCreated => "PROPOSAL_CREATED",
            ActionType::ProposalApproved => "PROPOSAL_APPROVED",
            ActionType::ProposalRejected => "PROPOSAL_REJECTED",
            ActionType::ProposalSuperseded => "PROPOSAL_SUPERSEDED",
            ActionType::FactoryFailure => "FACTORY_FAILURE",
            ActionType::OrderCancelled => "ORDER_CANCELLED",
            ActionType::OrderRestarted => "ORDER_RESTARTED",
            ActionType::PriorityUpdated => "PRIORITY_UPDATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PROPOSAL_CREATED" => Some(ActionType::ProposalCreated),
            "PROPOSAL_APPROVED" => Some(ActionType::ProposalApproved),
            "PROPOSAL_REJECTED" => Some(ActionType::ProposalRejected),
            "PROPOSAL_SUPERSEDED" => Some(ActionType::ProposalSuperseded),
            "FACTORY_FAILURE" => Some(ActionType::FactoryFailure),
            "ORDER_CANCELLED" => Some(ActionType::OrderCancelled),
            "ORDER_RESTARTED" => Some(ActionType::OrderRestarted),
            "PRIORITY_UPDATED" => Some(ActionType::PriorityUpdated),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 一条操作日志
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    pub id: i64,
    pub occurred_at: DateTime<Utc>,
    pub action_type: ActionType,
    pub schedule_id: Option<i64>,
    pub sales_order_id: Option<String>,
    pub production_order_id: Option<String>,
    pub detail: String,
}

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.init_schema()?;
        Ok(repo)
    }

    fn init_schema(&self) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS action_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                occurred_at TEXT NOT NULL,
                action_type TEXT NOT NULL,
                schedule_id INTEGER,
                so_id TEXT,
                po_id TEXT,
                detail TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_action_log_type ON action_log(action_type);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加一条日志
    pub fn log(
        &self,
        action_type: ActionType,
        schedule_id: Option<i64>,
        sales_order_id: Option<&str>,
        production_order_id: Option<&str>,
        detail: &str,
    ) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO action_log (occurred_at, action_type, schedule_id, so_id, po_id, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().to_rfc3339(),
                action_type.as_str(),
                schedule_id,
                sales_order_id,
                production_order_id,
                detail,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 最近 N 条日志 (新→旧)
    pub fn recent(&self, limit: u32) -> RepositoryResult<Vec<ActionLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, occurred_at, action_type, schedule_id, so_id, po_id, detail
             FROM action_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, occurred_at, action_type, schedule_id, so_id, po_id, detail) = row?;
            let action_type = ActionType::parse(&action_type).ok_or_else(|| {
                RepositoryError::InternalError(format!("未知操作类型: {action_type}"))
            })?;
            let occurred_at = DateTime::parse_from_rfc3339(&occurred_at)
                .map_err(|e| RepositoryError::InternalError(format!("时间解析失败: {e}")))?
                .with_timezone(&Utc);
            entries.push(ActionLogEntry {
                id,
                occurred_at,
                action_type,
                schedule_id,
                sales_order_id: so_id,
                production_order_id: po_id,
                detail,
            });
        }
        Ok(entries)
    }
}
