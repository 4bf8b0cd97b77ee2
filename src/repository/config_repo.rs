// ==========================================
// 定制水槽订单系统 - 配置与规则仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 并发控制: configuration.revision 乐观锁, 并发 BOM 生成由此序列化
// ==========================================

use crate::domain::configuration::{
    Configuration, ConfigurationRule, RulePredicate, RuleViolation, Selections, ValidationResult,
};
use crate::domain::types::{RuleKind, RuleScope};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{datetime_col, DATETIME_FMT};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigurationRepository - 配置仓储
// ==========================================
pub struct ConfigurationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigurationRepository {
    /// 创建新的ConfigurationRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建配置
    pub fn create(&self, config: &Configuration) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::create_tx(&conn, config)?;
        Ok(config.configuration_id.clone())
    }

    /// 创建配置 (事务内)
    pub fn create_tx(conn: &Connection, config: &Configuration) -> RepositoryResult<()> {
        let selections_json = serde_json::to_string(&config.selections)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let errors_json = serde_json::to_string(&config.errors)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let warnings_json = serde_json::to_string(&config.warnings)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        conn.execute(
            r#"INSERT INTO configuration (
                configuration_id, order_item_id, assembly_id, version_no,
                parent_configuration_id, selections_json, is_valid,
                errors_json, warnings_json, revision, created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &config.configuration_id,
                &config.order_item_id,
                &config.assembly_id,
                &config.version_no,
                &config.parent_configuration_id,
                &selections_json,
                if config.is_valid { 1 } else { 0 },
                &errors_json,
                &warnings_json,
                &config.revision,
                &config.created_by,
                &config.created_at.format(DATETIME_FMT).to_string(),
                &config.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 按ID查询配置
    pub fn find_by_id(&self, configuration_id: &str) -> RepositoryResult<Option<Configuration>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, configuration_id)
    }

    /// 按ID查询配置 (事务内)
    pub fn find_by_id_tx(
        conn: &Connection,
        configuration_id: &str,
    ) -> RepositoryResult<Option<Configuration>> {
        match conn.query_row(
            r#"SELECT configuration_id, order_item_id, assembly_id, version_no,
                      parent_configuration_id, selections_json, is_valid,
                      errors_json, warnings_json, revision, created_by, created_at, updated_at
               FROM configuration
               WHERE configuration_id = ?"#,
            params![configuration_id],
            Self::map_row,
        ) {
            Ok(config) => Ok(Some(config)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 回写校验结论 (带乐观锁检查)
    ///
    /// # 并发控制
    /// revision 不匹配说明配置已被并发修改/校验, 返回乐观锁冲突;
    /// 并发 BOM 生成的序列化点也在这里 (同一 revision 只有一个提交者成功)
    pub fn record_validation_tx(
        conn: &Connection,
        configuration_id: &str,
        result: &ValidationResult,
        expected_revision: i32,
        updated_at: chrono::NaiveDateTime,
    ) -> RepositoryResult<()> {
        let errors_json = serde_json::to_string(&result.errors)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;
        let warnings_json = serde_json::to_string(&result.warnings)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let rows_affected = conn.execute(
            r#"UPDATE configuration
               SET is_valid = ?, errors_json = ?, warnings_json = ?,
                   revision = revision + 1, updated_at = ?
               WHERE configuration_id = ? AND revision = ?"#,
            params![
                if result.is_valid { 1 } else { 0 },
                &errors_json,
                &warnings_json,
                &updated_at.format(DATETIME_FMT).to_string(),
                configuration_id,
                &expected_revision,
            ],
        )?;

        if rows_affected == 0 {
            let exists: Result<i32, _> = conn.query_row(
                "SELECT revision FROM configuration WHERE configuration_id = ?",
                params![configuration_id],
                |row| row.get(0),
            );

            return match exists {
                Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    entity: "Configuration".to_string(),
                    id: configuration_id.to_string(),
                    expected: expected_revision,
                    actual: actual_revision,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "Configuration".to_string(),
                    id: configuration_id.to_string(),
                }),
            };
        }

        Ok(())
    }

    /// 查询订单项的最大配置版本号
    pub fn max_version_no(&self, order_item_id: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        Self::max_version_no_tx(&conn, order_item_id)
    }

    /// 查询订单项的最大配置版本号 (事务内)
    pub fn max_version_no_tx(conn: &Connection, order_item_id: &str) -> RepositoryResult<i32> {
        let max: Option<i32> = conn.query_row(
            "SELECT MAX(version_no) FROM configuration WHERE order_item_id = ?",
            params![order_item_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// 映射数据库行到Configuration对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Configuration> {
        let selections_json: String = row.get(5)?;
        let selections: Selections = serde_json::from_str(&selections_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let errors_json: String = row.get(7)?;
        let errors: Vec<RuleViolation> = serde_json::from_str(&errors_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let warnings_json: String = row.get(8)?;
        let warnings: Vec<RuleViolation> = serde_json::from_str(&warnings_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Configuration {
            configuration_id: row.get(0)?,
            order_item_id: row.get(1)?,
            assembly_id: row.get(2)?,
            version_no: row.get(3)?,
            parent_configuration_id: row.get(4)?,
            selections,
            is_valid: row.get::<_, i32>(6)? == 1,
            errors,
            warnings,
            revision: row.get(9)?,
            created_by: row.get(10)?,
            created_at: datetime_col(11, row.get::<_, String>(11)?)?,
            updated_at: datetime_col(12, row.get::<_, String>(12)?)?,
        })
    }
}

// ==========================================
// RuleRepository - 配置规则仓储
// ==========================================
pub struct RuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RuleRepository {
    /// 创建新的RuleRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入规则
    pub fn insert(&self, rule: &ConfigurationRule) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let predicate_json = serde_json::to_string(&rule.predicate)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        conn.execute(
            r#"INSERT INTO configuration_rule (
                rule_id, rule_name, kind, scope_type, scope_key,
                priority, is_blocking, predicate_json, message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &rule.rule_id,
                &rule.rule_name,
                rule.kind.to_db_str(),
                rule.scope.scope_type(),
                rule.scope.scope_key(),
                &rule.priority,
                if rule.is_blocking { 1 } else { 0 },
                &predicate_json,
                &rule.message,
            ],
        )?;
        Ok(())
    }

    /// 查询作用于指定装配/品类的规则, 按 (priority, rule_id) 升序
    ///
    /// 排序是确定性要求的一部分: 相同输入必须得到相同的评估顺序
    pub fn find_for_target(
        &self,
        assembly_id: &str,
        category_code: &str,
    ) -> RepositoryResult<Vec<ConfigurationRule>> {
        let conn = self.get_conn()?;
        Self::find_for_target_tx(&conn, assembly_id, category_code)
    }

    /// 查询作用规则 (事务内)
    pub fn find_for_target_tx(
        conn: &Connection,
        assembly_id: &str,
        category_code: &str,
    ) -> RepositoryResult<Vec<ConfigurationRule>> {
        let mut stmt = conn.prepare(
            r#"SELECT rule_id, rule_name, kind, scope_type, scope_key,
                      priority, is_blocking, predicate_json, message
               FROM configuration_rule
               WHERE (scope_type = 'ASSEMBLY' AND scope_key = ?)
                  OR (scope_type = 'CATEGORY' AND scope_key = ?)
               ORDER BY priority ASC, rule_id ASC"#,
        )?;

        let rules = stmt
            .query_map(params![assembly_id, category_code], Self::map_row)?
            .collect::<Result<Vec<ConfigurationRule>, _>>()?;

        Ok(rules)
    }

    /// 映射数据库行到ConfigurationRule对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ConfigurationRule> {
        let kind_s: String = row.get(2)?;
        let kind = RuleKind::from_str(&kind_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("未知规则种类: {}", kind_s).into(),
            )
        })?;

        let scope_type: String = row.get(3)?;
        let scope = RuleScope::from_db(&scope_type, row.get(4)?).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("未知作用域类型: {}", scope_type).into(),
            )
        })?;

        let predicate_json: String = row.get(7)?;
        let predicate: RulePredicate = serde_json::from_str(&predicate_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(ConfigurationRule {
            rule_id: row.get(0)?,
            rule_name: row.get(1)?,
            kind,
            scope,
            priority: row.get(5)?,
            is_blocking: row.get::<_, i32>(6)? == 1,
            predicate,
            message: row.get(8)?,
        })
    }
}
