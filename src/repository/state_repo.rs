// ==========================================
// PCB产线排产系统 - 排产状态仓储
// ==========================================
// 职责: 跨进程重启存活的状态
// - 方案快照 (schedule_snapshot, rowid 单调分配方案 ID)
// - SO↔PO 跟踪映射 (so_po_map)
// ==========================================

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::open_sqlite_connection;
use crate::domain::schedule::Schedule;
use crate::domain::types::ScheduleStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};

// ==========================================
// StateRepository - 排产状态仓储
// ==========================================
pub struct StateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StateRepository {
    /// 打开数据库并初始化 schema
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 (共享连接场景)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.init_schema()?;
        Ok(repo)
    }

    /// 共享底层连接 (供其他仓储复用)
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn init_schema(&self) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_snapshot (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                generated_at TEXT NOT NULL,
                policy TEXT NOT NULL,
                status TEXT NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS so_po_map (
                so_id TEXT PRIMARY KEY,
                po_id TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 方案快照
    // ==========================================

    /// 持久化方案快照, 返回单调分配的方案 ID
    ///
    /// 入参的 id 字段被忽略, 以数据库 rowid 为准
    pub fn insert_schedule(&self, schedule: &Schedule) -> RepositoryResult<i64> {
        let payload = serde_json::to_string(schedule)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO schedule_snapshot (generated_at, policy, status, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                schedule.generated_at.to_rfc3339(),
                schedule.policy.to_string(),
                schedule.status.as_str(),
                payload,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 更新方案状态
    pub fn update_schedule_status(
        &self,
        id: i64,
        status: ScheduleStatus,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE schedule_snapshot SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "schedule_snapshot".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 读取指定状态下最新的方案
    pub fn load_latest_by_status(
        &self,
        status: ScheduleStatus,
    ) -> RepositoryResult<Option<Schedule>> {
        let conn = self.lock()?;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, payload FROM schedule_snapshot
                 WHERE status = ?1 ORDER BY id DESC LIMIT 1",
                params![status.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, payload)) => {
                let mut schedule: Schedule = serde_json::from_str(&payload)?;
                schedule.id = id;
                schedule.status = status;
                Ok(Some(schedule))
            }
        }
    }

    // ==========================================
    // SO↔PO 跟踪映射
    // ==========================================

    pub fn upsert_so_po(&self, so_id: &str, po_id: &str) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO so_po_map (so_id, po_id, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(so_id) DO UPDATE SET po_id = ?2, updated_at = ?3",
            params![so_id, po_id, now_rfc3339()],
        )?;
        Ok(())
    }

    pub fn remove_so_po(&self, so_id: &str) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM so_po_map WHERE so_id = ?1", params![so_id])?;
        Ok(())
    }

    pub fn clear_so_po_map(&self) -> RepositoryResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM so_po_map", [])?;
        Ok(())
    }

    pub fn load_so_po_map(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT so_id, po_id FROM so_po_map")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (so_id, po_id) = row?;
            map.insert(so_id, po_id);
        }
        Ok(map)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
