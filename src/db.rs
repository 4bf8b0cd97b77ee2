// ==========================================
// 定制水槽订单系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为 (外键必须逐连接开启)
// - 统一 busy_timeout, 减少并发写入时的偶发 busy 错误
// - 内嵌 schema DDL, 库可在空文件上自举
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version (若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(v)
}

/// 初始化数据库 schema (幂等)
///
/// 金额/数量/重量列统一存 TEXT, 由 rust_decimal 精确解析, 不走 REAL
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ===== 配置键值 (引擎参数) =====
        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- ===== 产品目录 =====
        CREATE TABLE IF NOT EXISTS category (
            category_code TEXT PRIMARY KEY,
            category_name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS assembly (
            assembly_id TEXT PRIMARY KEY,
            assembly_name TEXT NOT NULL,
            category_code TEXT NOT NULL REFERENCES category(category_code),
            unit_cost TEXT NOT NULL,
            unit_weight TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS part (
            part_no TEXT PRIMARY KEY,
            part_name TEXT NOT NULL,
            category_code TEXT NOT NULL REFERENCES category(category_code),
            spec_code TEXT NOT NULL,
            unit_cost TEXT NOT NULL,
            unit_weight TEXT NOT NULL,
            is_custom INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(category_code, spec_code)
        );

        CREATE TABLE IF NOT EXISTS assembly_component (
            assembly_id TEXT NOT NULL REFERENCES assembly(assembly_id),
            component_id TEXT NOT NULL,
            component_type TEXT NOT NULL,
            base_quantity TEXT NOT NULL,
            waste_factor TEXT NOT NULL,
            is_optional INTEGER NOT NULL DEFAULT 0,
            option_code TEXT,
            substitute_group TEXT,
            effective_from TEXT NOT NULL,
            effective_to TEXT,
            sort_no INTEGER NOT NULL,
            PRIMARY KEY (assembly_id, component_id, effective_from)
        );

        -- ===== 配置与规则 =====
        CREATE TABLE IF NOT EXISTS configuration (
            configuration_id TEXT PRIMARY KEY,
            order_item_id TEXT NOT NULL,
            assembly_id TEXT NOT NULL REFERENCES assembly(assembly_id),
            version_no INTEGER NOT NULL,
            parent_configuration_id TEXT,
            selections_json TEXT NOT NULL,
            is_valid INTEGER NOT NULL DEFAULT 0,
            errors_json TEXT NOT NULL DEFAULT '[]',
            warnings_json TEXT NOT NULL DEFAULT '[]',
            revision INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS configuration_rule (
            rule_id TEXT PRIMARY KEY,
            rule_name TEXT NOT NULL,
            kind TEXT NOT NULL,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            priority INTEGER NOT NULL,
            is_blocking INTEGER NOT NULL,
            predicate_json TEXT NOT NULL,
            message TEXT NOT NULL
        );

        -- ===== BOM =====
        CREATE TABLE IF NOT EXISTS bom (
            bom_id TEXT PRIMARY KEY,
            configuration_id TEXT NOT NULL REFERENCES configuration(configuration_id),
            assembly_id TEXT NOT NULL REFERENCES assembly(assembly_id),
            status TEXT NOT NULL,
            total_parts INTEGER NOT NULL DEFAULT 0,
            custom_parts_count INTEGER NOT NULL DEFAULT 0,
            total_cost TEXT NOT NULL DEFAULT '0',
            total_weight TEXT NOT NULL DEFAULT '0',
            generation_time_ms INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS bom_line_item (
            bom_id TEXT NOT NULL REFERENCES bom(bom_id) ON DELETE CASCADE,
            line_no INTEGER NOT NULL,
            component_id TEXT NOT NULL,
            component_type TEXT NOT NULL,
            base_quantity TEXT NOT NULL,
            waste_factor TEXT NOT NULL,
            adjusted_quantity TEXT NOT NULL,
            unit_cost TEXT NOT NULL,
            extended_cost TEXT NOT NULL,
            is_custom INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (bom_id, line_no)
        );

        -- ===== 订单 =====
        CREATE TABLE IF NOT EXISTS sales_order (
            order_id TEXT PRIMARY KEY,
            order_no TEXT NOT NULL UNIQUE,
            current_phase TEXT NOT NULL,
            held_from_phase TEXT,
            phase_entered_at TEXT NOT NULL,
            actual_delivery_date TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS order_item (
            order_item_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES sales_order(order_id) ON DELETE CASCADE,
            assembly_id TEXT NOT NULL REFERENCES assembly(assembly_id),
            configuration_id TEXT,
            active_bom_id TEXT,
            production_status TEXT NOT NULL DEFAULT 'NOT_STARTED'
        );

        CREATE TABLE IF NOT EXISTS order_status_history (
            history_id TEXT PRIMARY KEY,
            order_id TEXT NOT NULL REFERENCES sales_order(order_id) ON DELETE CASCADE,
            from_phase TEXT NOT NULL,
            to_phase TEXT NOT NULL,
            actor TEXT NOT NULL,
            transitioned_at TEXT NOT NULL,
            reason TEXT,
            duration_in_prior_phase_s INTEGER NOT NULL DEFAULT 0
        );

        -- ===== 审计 =====
        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            action_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            before_json TEXT,
            after_json TEXT,
            detail TEXT
        );

        -- ===== 编号序列 (唯一的跨请求原子计数器) =====
        CREATE TABLE IF NOT EXISTS number_series (
            series_code TEXT PRIMARY KEY,
            prefix TEXT NOT NULL,
            pad_width INTEGER NOT NULL DEFAULT 4,
            next_value INTEGER NOT NULL
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(
            read_schema_version(&conn).unwrap(),
            Some(CURRENT_SCHEMA_VERSION)
        );
    }
}
