// ==========================================
// 定制水槽订单系统 - BOM 仓储
// ==========================================
// 红线: 头+行+合计必须在同一事务内落库, 不允许只有头没有行
// 红线: 激活必须与替代旧 ACTIVE 在同一事务内完成
// ==========================================

use crate::domain::bom::{Bom, BomLineItem};
use crate::domain::types::{BomStatus, ComponentType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{datetime_col, decimal_col, DATETIME_FMT};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// BomRepository - BOM 仓储
// ==========================================
pub struct BomRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BomRepository {
    /// 创建新的BomRepository实例
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
    // 写入 (引擎事务内)
    // ==========================================

    /// 插入 BOM 头 (事务内)
    pub fn insert_header_tx(conn: &Connection, bom: &Bom) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO bom (
                bom_id, configuration_id, assembly_id, status,
                total_parts, custom_parts_count, total_cost, total_weight,
                generation_time_ms, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &bom.bom_id,
                &bom.configuration_id,
                &bom.assembly_id,
                bom.status.to_db_str(),
                &bom.total_parts,
                &bom.custom_parts_count,
                &bom.total_cost.to_string(),
                &bom.total_weight.to_string(),
                &bom.generation_time_ms,
                &bom.created_by,
                &bom.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 批量插入 BOM 行 (事务内)
    pub fn insert_lines_tx(conn: &Connection, lines: &[BomLineItem]) -> RepositoryResult<usize> {
        for line in lines {
            conn.execute(
                r#"INSERT INTO bom_line_item (
                    bom_id, line_no, component_id, component_type,
                    base_quantity, waste_factor, adjusted_quantity,
                    unit_cost, extended_cost, is_custom
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    &line.bom_id,
                    &line.line_no,
                    &line.component_id,
                    line.component_type.to_db_str(),
                    &line.base_quantity.to_string(),
                    &line.waste_factor.to_string(),
                    &line.adjusted_quantity.to_string(),
                    &line.unit_cost.to_string(),
                    &line.extended_cost.to_string(),
                    if line.is_custom { 1 } else { 0 },
                ],
            )?;
        }
        Ok(lines.len())
    }

    /// 回写头部合计与生成耗时 (事务内)
    pub fn update_totals_tx(conn: &Connection, bom: &Bom) -> RepositoryResult<()> {
        let rows_affected = conn.execute(
            r#"UPDATE bom
               SET total_parts = ?, custom_parts_count = ?,
                   total_cost = ?, total_weight = ?, generation_time_ms = ?
               WHERE bom_id = ?"#,
            params![
                &bom.total_parts,
                &bom.custom_parts_count,
                &bom.total_cost.to_string(),
                &bom.total_weight.to_string(),
                &bom.generation_time_ms,
                &bom.bom_id,
            ],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Bom".to_string(),
                id: bom.bom_id.clone(),
            });
        }
        Ok(())
    }

    /// 激活 BOM (事务内, 同时替代同配置的旧 ACTIVE)
    ///
    /// # 红线
    /// - 同一配置同时最多一个 ACTIVE
    /// - 两步更新共用调用方事务, 保证原子性
    pub fn activate_tx(
        conn: &Connection,
        bom_id: &str,
        configuration_id: &str,
    ) -> RepositoryResult<()> {
        // 1. 将该配置的其他激活 BOM 标记为已替代
        conn.execute(
            r#"UPDATE bom SET status = 'SUPERSEDED'
               WHERE configuration_id = ? AND status = 'ACTIVE' AND bom_id != ?"#,
            params![configuration_id, bom_id],
        )?;

        // 2. 激活指定 BOM
        let rows_affected = conn.execute(
            "UPDATE bom SET status = 'ACTIVE' WHERE bom_id = ?",
            params![bom_id],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Bom".to_string(),
                id: bom_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 读取
    // ==========================================

    /// 按ID查询 BOM 头
    pub fn find_by_id(&self, bom_id: &str) -> RepositoryResult<Option<Bom>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, bom_id)
    }

    /// 按ID查询 BOM 头 (事务内)
    pub fn find_by_id_tx(conn: &Connection, bom_id: &str) -> RepositoryResult<Option<Bom>> {
        match conn.query_row(
            r#"SELECT bom_id, configuration_id, assembly_id, status,
                      total_parts, custom_parts_count, total_cost, total_weight,
                      generation_time_ms, created_by, created_at
               FROM bom
               WHERE bom_id = ?"#,
            params![bom_id],
            Self::map_header_row,
        ) {
            Ok(bom) => Ok(Some(bom)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询配置当前激活的 BOM
    pub fn find_active_by_configuration(
        &self,
        configuration_id: &str,
    ) -> RepositoryResult<Option<Bom>> {
        let conn = self.get_conn()?;
        Self::find_active_by_configuration_tx(&conn, configuration_id)
    }

    /// 查询配置当前激活的 BOM (事务内)
    pub fn find_active_by_configuration_tx(
        conn: &Connection,
        configuration_id: &str,
    ) -> RepositoryResult<Option<Bom>> {
        match conn.query_row(
            r#"SELECT bom_id, configuration_id, assembly_id, status,
                      total_parts, custom_parts_count, total_cost, total_weight,
                      generation_time_ms, created_by, created_at
               FROM bom
               WHERE configuration_id = ? AND status = 'ACTIVE'"#,
            params![configuration_id],
            Self::map_header_row,
        ) {
            Ok(bom) => Ok(Some(bom)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询 BOM 的全部行, 按行号升序
    pub fn find_lines(&self, bom_id: &str) -> RepositoryResult<Vec<BomLineItem>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT bom_id, line_no, component_id, component_type,
                      base_quantity, waste_factor, adjusted_quantity,
                      unit_cost, extended_cost, is_custom
               FROM bom_line_item
               WHERE bom_id = ?
               ORDER BY line_no"#,
        )?;

        let lines = stmt
            .query_map(params![bom_id], Self::map_line_row)?
            .collect::<Result<Vec<BomLineItem>, _>>()?;

        Ok(lines)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_header_row(row: &rusqlite::Row) -> rusqlite::Result<Bom> {
        let status_s: String = row.get(3)?;
        let status = BomStatus::from_str(&status_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("未知BOM状态: {}", status_s).into(),
            )
        })?;

        Ok(Bom {
            bom_id: row.get(0)?,
            configuration_id: row.get(1)?,
            assembly_id: row.get(2)?,
            status,
            total_parts: row.get(4)?,
            custom_parts_count: row.get(5)?,
            total_cost: decimal_col(6, row.get::<_, String>(6)?)?,
            total_weight: decimal_col(7, row.get::<_, String>(7)?)?,
            generation_time_ms: row.get(8)?,
            created_by: row.get(9)?,
            created_at: datetime_col(10, row.get::<_, String>(10)?)?,
        })
    }

    fn map_line_row(row: &rusqlite::Row) -> rusqlite::Result<BomLineItem> {
        let component_type_s: String = row.get(3)?;
        let component_type = ComponentType::from_str(&component_type_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("未知组件类型: {}", component_type_s).into(),
            )
        })?;

        Ok(BomLineItem {
            bom_id: row.get(0)?,
            line_no: row.get(1)?,
            component_id: row.get(2)?,
            component_type,
            base_quantity: decimal_col(4, row.get::<_, String>(4)?)?,
            waste_factor: decimal_col(5, row.get::<_, String>(5)?)?,
            adjusted_quantity: decimal_col(6, row.get::<_, String>(6)?)?,
            unit_cost: decimal_col(7, row.get::<_, String>(7)?)?,
            extended_cost: decimal_col(8, row.get::<_, String>(8)?)?,
            is_custom: row.get::<_, i32>(9)? == 1,
        })
    }
}
