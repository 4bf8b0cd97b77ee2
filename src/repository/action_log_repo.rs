// ==========================================
// 定制水槽订单系统 - 操作日志仓储
// ==========================================
// 红线: 只追加, 不更新不删除
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{datetime_col, DATETIME_FMT};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的ActionLogRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 追加审计事件
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, log)
    }

    /// 追加审计事件 (事务内)
    pub fn insert_tx(conn: &Connection, log: &ActionLog) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO action_log (
                action_id, action_type, entity_type, entity_id, actor,
                action_ts, before_json, after_json, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &log.action_id,
                &log.action_type,
                &log.entity_type,
                &log.entity_id,
                &log.actor,
                &log.action_ts.format(DATETIME_FMT).to_string(),
                &log.before_json.as_ref().map(|v| v.to_string()),
                &log.after_json.as_ref().map(|v| v.to_string()),
                &log.detail,
            ],
        )?;
        Ok(())
    }

    /// 查询实体的审计事件, 按追加顺序 (追加型表, rowid 即事件顺序)
    pub fn find_by_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, action_type, entity_type, entity_id, actor,
                      action_ts, before_json, after_json, detail
               FROM action_log
               WHERE entity_type = ? AND entity_id = ?
               ORDER BY rowid"#,
        )?;

        let logs = stmt
            .query_map(params![entity_type, entity_id], Self::map_row)?
            .collect::<Result<Vec<ActionLog>, _>>()?;

        Ok(logs)
    }

    /// 按操作类型统计 (测试与诊断用)
    pub fn count_by_type(&self, action_type: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE action_type = ?",
            params![action_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 映射数据库行到ActionLog对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ActionLog> {
        let parse_json = |idx: usize, s: Option<String>| -> rusqlite::Result<Option<serde_json::Value>> {
            s.map(|s| {
                serde_json::from_str(&s).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()
        };

        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: row.get(1)?,
            entity_type: row.get(2)?,
            entity_id: row.get(3)?,
            actor: row.get(4)?,
            action_ts: datetime_col(5, row.get::<_, String>(5)?)?,
            before_json: parse_json(6, row.get(6)?)?,
            after_json: parse_json(7, row.get(7)?)?,
            detail: row.get(8)?,
        })
    }
}
