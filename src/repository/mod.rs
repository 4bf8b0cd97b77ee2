// ==========================================
// 定制水槽订单系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 事务约定: 引擎持有显式事务时调用各仓储的 *_tx 关联函数,
//           单步操作走实例方法 (内部自行加锁)
// ==========================================

pub mod action_log_repo;
pub mod bom_repo;
pub mod catalog_repo;
pub mod config_repo;
pub mod error;
pub mod order_repo;
pub mod series_repo;

pub use action_log_repo::ActionLogRepository;
pub use bom_repo::BomRepository;
pub use catalog_repo::CatalogRepository;
pub use config_repo::{ConfigurationRepository, RuleRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use order_repo::OrderRepository;
pub use series_repo::NumberSeriesRepository;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

/// 时间戳统一存储格式
pub(crate) const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 日期统一存储格式
pub(crate) const DATE_FMT: &str = "%Y-%m-%d";

/// TEXT 列解析为 Decimal (解析失败映射为列转换错误)
pub(crate) fn decimal_col(idx: usize, s: String) -> rusqlite::Result<Decimal> {
    Decimal::from_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// TEXT 列解析为 NaiveDateTime
pub(crate) fn datetime_col(idx: usize, s: String) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&s, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// TEXT 列解析为 NaiveDate
pub(crate) fn date_col(idx: usize, s: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&s, DATE_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
