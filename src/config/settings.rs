// ==========================================
// 定制水槽订单系统 - 合成引擎参数
// ==========================================
// 职责: 从 config_kv (global 作用域) 读取引擎参数, 缺省取默认值
// 说明: 展开深度是显式参数而不是隐含行为, 当前只支持单层展开
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ==========================================
// ExplosionMode - BOM 展开深度
// ==========================================
// 单层: 嵌套装配作为单行计价, 不在同一次生成中递归展开其子件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExplosionMode {
    SingleLevel, // 单层展开
}

impl ExplosionMode {
    /// 从配置字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SINGLE_LEVEL" => Some(ExplosionMode::SingleLevel),
            _ => None,
        }
    }

    /// 转换为配置存储的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplosionMode::SingleLevel => "SINGLE_LEVEL",
        }
    }
}

// ==========================================
// ComponentOptionBinding - 选件到品类的绑定
// ==========================================
// 配置中的文本选件 (如 pegboard_spec) 在哪个品类下解析零件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentOptionBinding {
    pub option_code: String,   // 选项代码
    pub category_code: String, // 解析品类
}

// ==========================================
// SynthesisSettings - 合成引擎参数
// ==========================================
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub explosion_mode: ExplosionMode,            // 展开深度
    pub custom_part_unit_cost: Decimal,           // 定制件默认单价 (定价属报价环节)
    pub custom_part_unit_weight: Decimal,         // 定制件默认单重
    pub component_options: Vec<ComponentOptionBinding>, // 选件绑定表
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            explosion_mode: ExplosionMode::SingleLevel,
            custom_part_unit_cost: Decimal::ZERO,
            custom_part_unit_weight: Decimal::ZERO,
            component_options: vec![],
        }
    }
}

impl SynthesisSettings {
    /// 从 config_kv 读取参数 (缺失的键取默认值)
    pub fn load(conn: &Connection) -> RepositoryResult<Self> {
        let mut settings = Self::default();

        if let Some(v) = read_kv(conn, "explosion_mode")? {
            settings.explosion_mode = ExplosionMode::from_str(&v).ok_or_else(|| {
                RepositoryError::DataIntegrity(format!("不支持的展开深度: {}", v))
            })?;
        }
        if let Some(v) = read_kv(conn, "custom_part_unit_cost")? {
            settings.custom_part_unit_cost = Decimal::from_str(&v)
                .map_err(|e| RepositoryError::DataIntegrity(format!("custom_part_unit_cost 解析失败: {}", e)))?;
        }
        if let Some(v) = read_kv(conn, "custom_part_unit_weight")? {
            settings.custom_part_unit_weight = Decimal::from_str(&v)
                .map_err(|e| RepositoryError::DataIntegrity(format!("custom_part_unit_weight 解析失败: {}", e)))?;
        }
        if let Some(v) = read_kv(conn, "component_options")? {
            settings.component_options = serde_json::from_str(&v)
                .map_err(|e| RepositoryError::DataIntegrity(format!("component_options 解析失败: {}", e)))?;
        }

        Ok(settings)
    }
}

/// 读取 global 作用域的配置键
fn read_kv(conn: &Connection, key: &str) -> RepositoryResult<Option<String>> {
    let v = conn
        .query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(v)
}

/// 写入 global 作用域的配置键 (种子数据/测试用)
pub fn write_kv(conn: &Connection, key: &str, value: &str) -> RepositoryResult<()> {
    conn.execute(
        r#"INSERT OR REPLACE INTO config_kv (scope_id, key, value, updated_at)
           VALUES ('global', ?, ?, datetime('now'))"#,
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_load_defaults_on_empty_kv() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        let settings = SynthesisSettings::load(&conn).unwrap();
        assert_eq!(settings.explosion_mode, ExplosionMode::SingleLevel);
        assert_eq!(settings.custom_part_unit_cost, Decimal::ZERO);
        assert!(settings.component_options.is_empty());
    }

    #[test]
    fn test_load_reads_bindings() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        write_kv(&conn, "custom_part_unit_cost", "85.50").unwrap();
        write_kv(
            &conn,
            "component_options",
            r#"[{"option_code":"pegboard_spec","category_code":"PEGBOARD"}]"#,
        )
        .unwrap();

        let settings = SynthesisSettings::load(&conn).unwrap();
        assert_eq!(settings.custom_part_unit_cost, Decimal::new(8550, 2));
        assert_eq!(settings.component_options.len(), 1);
        assert_eq!(settings.component_options[0].option_code, "pegboard_spec");
    }

    #[test]
    fn test_unknown_explosion_mode_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();

        write_kv(&conn, "explosion_mode", "FULL_RECURSIVE").unwrap();
        assert!(SynthesisSettings::load(&conn).is_err());
    }
}
