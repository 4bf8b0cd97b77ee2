// ==========================================
// 定制水槽订单系统 - 订单仓储
// ==========================================
// 红线: Repository 不含业务逻辑 (迁移表与权限在生命周期引擎)
// 并发控制: sales_order.revision 乐观锁, 并发阶段迁移由此序列化
// ==========================================

use crate::domain::order::{OrderItem, OrderStatusHistory, SalesOrder};
use crate::domain::types::{OrderPhase, ProductionStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{datetime_col, DATETIME_FMT};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    /// 创建新的OrderRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 订单
    // ==========================================

    /// 创建订单
    pub fn create_order(&self, order: &SalesOrder) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO sales_order (
                order_id, order_no, current_phase, held_from_phase, phase_entered_at,
                actual_delivery_date, revision, created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &order.order_id,
                &order.order_no,
                order.current_phase.to_db_str(),
                &order.held_from_phase.map(|p| p.to_db_str()),
                &order.phase_entered_at.format(DATETIME_FMT).to_string(),
                &order
                    .actual_delivery_date
                    .map(|d| d.format(DATETIME_FMT).to_string()),
                &order.revision,
                &order.created_by,
                &order.created_at.format(DATETIME_FMT).to_string(),
                &order.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(order.order_id.clone())
    }

    /// 按ID查询订单
    pub fn find_order(&self, order_id: &str) -> RepositoryResult<Option<SalesOrder>> {
        let conn = self.get_conn()?;
        Self::find_order_tx(&conn, order_id)
    }

    /// 按ID查询订单 (事务内)
    pub fn find_order_tx(conn: &Connection, order_id: &str) -> RepositoryResult<Option<SalesOrder>> {
        match conn.query_row(
            r#"SELECT order_id, order_no, current_phase, held_from_phase, phase_entered_at,
                      actual_delivery_date, revision, created_by, created_at, updated_at
               FROM sales_order
               WHERE order_id = ?"#,
            params![order_id],
            Self::map_order_row,
        ) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 更新订单阶段 (事务内, 带乐观锁检查)
    ///
    /// # 并发控制
    /// revision 不匹配说明另一笔迁移已提交, 返回乐观锁冲突;
    /// 调用方 (生命周期引擎) 据此回滚整个工作单元, 副作用不会重复触发
    pub fn update_phase_tx(
        conn: &Connection,
        order: &SalesOrder,
        expected_revision: i32,
    ) -> RepositoryResult<()> {
        let rows_affected = conn.execute(
            r#"UPDATE sales_order
               SET current_phase = ?, held_from_phase = ?, phase_entered_at = ?,
                   actual_delivery_date = ?, revision = revision + 1, updated_at = ?
               WHERE order_id = ? AND revision = ?"#,
            params![
                order.current_phase.to_db_str(),
                &order.held_from_phase.map(|p| p.to_db_str()),
                &order.phase_entered_at.format(DATETIME_FMT).to_string(),
                &order
                    .actual_delivery_date
                    .map(|d| d.format(DATETIME_FMT).to_string()),
                &order.updated_at.format(DATETIME_FMT).to_string(),
                &order.order_id,
                &expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            let exists: Result<i32, _> = conn.query_row(
                "SELECT revision FROM sales_order WHERE order_id = ?",
                params![&order.order_id],
                |row| row.get(0),
            );

            return match exists {
                Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "SalesOrder".to_string(),
                    id: order.order_id.clone(),
                    expected: expected_revision,
                    actual: actual_revision,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "SalesOrder".to_string(),
                    id: order.order_id.clone(),
                }),
            };
        }

        Ok(())
    }

    // ==========================================
    // 订单项
    // ==========================================

    /// 创建订单项
    pub fn create_item(&self, item: &OrderItem) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO order_item (
                order_item_id, order_id, assembly_id, configuration_id,
                active_bom_id, production_status
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                &item.order_item_id,
                &item.order_id,
                &item.assembly_id,
                &item.configuration_id,
                &item.active_bom_id,
                item.production_status.to_db_str(),
            ],
        )?;
        Ok(item.order_item_id.clone())
    }

    /// 按ID查询订单项
    pub fn find_item(&self, order_item_id: &str) -> RepositoryResult<Option<OrderItem>> {
        let conn = self.get_conn()?;
        Self::find_item_tx(&conn, order_item_id)
    }

    /// 按ID查询订单项 (事务内)
    pub fn find_item_tx(
        conn: &Connection,
        order_item_id: &str,
    ) -> RepositoryResult<Option<OrderItem>> {
        match conn.query_row(
            r#"SELECT order_item_id, order_id, assembly_id, configuration_id,
                      active_bom_id, production_status
               FROM order_item
               WHERE order_item_id = ?"#,
            params![order_item_id],
            Self::map_item_row,
        ) {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询订单的全部订单项 (事务内)
    pub fn find_items_by_order_tx(
        conn: &Connection,
        order_id: &str,
    ) -> RepositoryResult<Vec<OrderItem>> {
        let mut stmt = conn.prepare(
            r#"SELECT order_item_id, order_id, assembly_id, configuration_id,
                      active_bom_id, production_status
               FROM order_item
               WHERE order_id = ?
               ORDER BY order_item_id"#,
        )?;

        let items = stmt
            .query_map(params![order_id], Self::map_item_row)?
            .collect::<Result<Vec<OrderItem>, _>>()?;

        Ok(items)
    }

    /// 更新订单项当前配置 (事务内)
    pub fn set_item_configuration_tx(
        conn: &Connection,
        order_item_id: &str,
        configuration_id: &str,
    ) -> RepositoryResult<()> {
        let rows_affected = conn.execute(
            "UPDATE order_item SET configuration_id = ? WHERE order_item_id = ?",
            params![configuration_id, order_item_id],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "OrderItem".to_string(),
                id: order_item_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新订单项激活 BOM 引用 (事务内)
    pub fn set_item_active_bom_tx(
        conn: &Connection,
        order_item_id: &str,
        bom_id: &str,
    ) -> RepositoryResult<()> {
        let rows_affected = conn.execute(
            "UPDATE order_item SET active_bom_id = ? WHERE order_item_id = ?",
            params![bom_id, order_item_id],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "OrderItem".to_string(),
                id: order_item_id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新订单项生产状态 (事务内)
    pub fn set_item_production_status_tx(
        conn: &Connection,
        order_item_id: &str,
        status: ProductionStatus,
    ) -> RepositoryResult<()> {
        let rows_affected = conn.execute(
            "UPDATE order_item SET production_status = ? WHERE order_item_id = ?",
            params![status.to_db_str(), order_item_id],
        )?;
        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "OrderItem".to_string(),
                id: order_item_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 阶段历史 (追加型)
    // ==========================================

    /// 追加历史行 (事务内)
    pub fn insert_history_tx(
        conn: &Connection,
        history: &OrderStatusHistory,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO order_status_history (
                history_id, order_id, from_phase, to_phase, actor,
                transitioned_at, reason, duration_in_prior_phase_s
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &history.history_id,
                &history.order_id,
                history.from_phase.to_db_str(),
                history.to_phase.to_db_str(),
                &history.actor,
                &history.transitioned_at.format(DATETIME_FMT).to_string(),
                &history.reason,
                &history.duration_in_prior_phase_s,
            ],
        )?;
        Ok(())
    }

    /// 查询订单的阶段历史, 按追加顺序 (追加型表, rowid 即迁移顺序)
    pub fn find_history(&self, order_id: &str) -> RepositoryResult<Vec<OrderStatusHistory>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT history_id, order_id, from_phase, to_phase, actor,
                      transitioned_at, reason, duration_in_prior_phase_s
               FROM order_status_history
               WHERE order_id = ?
               ORDER BY rowid"#,
        )?;

        let rows = stmt
            .query_map(params![order_id], Self::map_history_row)?
            .collect::<Result<Vec<OrderStatusHistory>, _>>()?;

        Ok(rows)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn parse_phase(idx: usize, s: String) -> rusqlite::Result<OrderPhase> {
        OrderPhase::from_str(&s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("未知订单阶段: {}", s).into(),
            )
        })
    }

    fn map_order_row(row: &rusqlite::Row) -> rusqlite::Result<SalesOrder> {
        Ok(SalesOrder {
            order_id: row.get(0)?,
            order_no: row.get(1)?,
            current_phase: Self::parse_phase(2, row.get::<_, String>(2)?)?,
            held_from_phase: row
                .get::<_, Option<String>>(3)?
                .map(|s| Self::parse_phase(3, s))
                .transpose()?,
            phase_entered_at: datetime_col(4, row.get::<_, String>(4)?)?,
            actual_delivery_date: row
                .get::<_, Option<String>>(5)?
                .map(|s| datetime_col(5, s))
                .transpose()?,
            revision: row.get(6)?,
            created_by: row.get(7)?,
            created_at: datetime_col(8, row.get::<_, String>(8)?)?,
            updated_at: datetime_col(9, row.get::<_, String>(9)?)?,
        })
    }

    fn map_item_row(row: &rusqlite::Row) -> rusqlite::Result<OrderItem> {
        let status_s: String = row.get(5)?;
        let production_status = ProductionStatus::from_str(&status_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("未知生产状态: {}", status_s).into(),
            )
        })?;

        Ok(OrderItem {
            order_item_id: row.get(0)?,
            order_id: row.get(1)?,
            assembly_id: row.get(2)?,
            configuration_id: row.get(3)?,
            active_bom_id: row.get(4)?,
            production_status,
        })
    }

    fn map_history_row(row: &rusqlite::Row) -> rusqlite::Result<OrderStatusHistory> {
        Ok(OrderStatusHistory {
            history_id: row.get(0)?,
            order_id: row.get(1)?,
            from_phase: Self::parse_phase(2, row.get::<_, String>(2)?)?,
            to_phase: Self::parse_phase(3, row.get::<_, String>(3)?)?,
            actor: row.get(4)?,
            transitioned_at: datetime_col(5, row.get::<_, String>(5)?)?,
            reason: row.get(6)?,
            duration_in_prior_phase_s: row.get(7)?,
        })
    }
}
