// ==========================================
// 定制水槽订单系统 - 编号序列仓储
// ==========================================
// 这是系统中唯一需要跨请求原子操作的组件:
// 不同订单/配置的并发 BOM 生成可能同时铸造定制件号
// 约定: UPDATE 自增先取写锁, 事务提交前序列值对其他连接不可见;
//       中止的生成允许留下号段空洞, 但已发出的号永不复用
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 定制件序列代码 (700 系列)
pub const CUSTOM_PART_SERIES: &str = "CUSTOM_PART";

// ==========================================
// MintedNumber - 取号结果
// ==========================================
#[derive(Debug, Clone)]
pub struct MintedNumber {
    pub prefix: String, // 序列前缀 (如 "700")
    pub value: i64,     // 本次取得的序列值
    pub pad_width: u32, // 零填充宽度
}

impl MintedNumber {
    /// 格式化为零件号, 如 700-1025
    pub fn format(&self) -> String {
        format!(
            "{}-{:0width$}",
            self.prefix,
            self.value,
            width = self.pad_width as usize
        )
    }
}

// ==========================================
// NumberSeriesRepository - 编号序列仓储
// ==========================================
pub struct NumberSeriesRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NumberSeriesRepository {
    /// 创建新的NumberSeriesRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 注册序列 (已存在则忽略)
    pub fn ensure_series(
        &self,
        series_code: &str,
        prefix: &str,
        pad_width: u32,
        start_value: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR IGNORE INTO number_series (series_code, prefix, pad_width, next_value)
               VALUES (?, ?, ?, ?)"#,
            params![series_code, prefix, pad_width, start_value],
        )?;
        Ok(())
    }

    /// 原子取号 (事务内)
    ///
    /// 先 UPDATE 自增 (获取写锁, 即 fetch-and-add), 再读回本次取得的值。
    /// 同一序列的并发取号由数据库写锁串行化, 两个并发生成不会拿到同一个号。
    pub fn next_value_tx(conn: &Connection, series_code: &str) -> RepositoryResult<MintedNumber> {
        let rows_affected = conn.execute(
            "UPDATE number_series SET next_value = next_value + 1 WHERE series_code = ?",
            params![series_code],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "NumberSeries".to_string(),
                id: series_code.to_string(),
            });
        }

        let (prefix, pad_width, next_value): (String, u32, i64) = conn.query_row(
            "SELECT prefix, pad_width, next_value FROM number_series WHERE series_code = ?",
            params![series_code],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(MintedNumber {
            prefix,
            // 自增后 next_value 指向下一个未发出的号, 本次取得的是前一个
            value: next_value - 1,
            pad_width,
        })
    }

    /// 读取序列当前 next_value (诊断用)
    pub fn peek_next_value(&self, series_code: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let v: i64 = conn.query_row(
            "SELECT next_value FROM number_series WHERE series_code = ?",
            params![series_code],
            |row| row.get(0),
        )?;
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_number_format() {
        let n = MintedNumber {
            prefix: "700".to_string(),
            value: 1025,
            pad_width: 4,
        };
        assert_eq!(n.format(), "700-1025");

        // 不足宽度时零填充
        let n = MintedNumber {
            prefix: "700".to_string(),
            value: 7,
            pad_width: 4,
        };
        assert_eq!(n.format(), "700-0007");
    }
}
