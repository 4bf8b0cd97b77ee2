// ==========================================
// 定制水槽订单系统 - 定制件编号服务
// ==========================================
// 职责: 为无目录匹配的选件铸造 700 系列零件号并注册为一等目录零件
// 红线: 同一序列并发取号绝不重号; 中止的生成允许留空洞, 已发出的号不复用
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::catalog::Part;
use crate::engine::error::EngineResult;
use crate::repository::series_repo::CUSTOM_PART_SERIES;
use crate::repository::{
    ActionLogRepository, CatalogRepository, NumberSeriesRepository, RepositoryError,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::info;

// ==========================================
// CustomPartNumberingService - 定制件编号服务
// ==========================================
pub struct CustomPartNumberingService {
    conn: Arc<Mutex<Connection>>,
}

impl CustomPartNumberingService {
    /// 创建新的编号服务实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 事务内铸造定制件
    ///
    /// # 流程
    /// 1. 序列原子取号 (fetch-and-add, 由数据库写锁串行化)
    /// 2. 以 is_custom=1 注册为一等目录零件, 后续查询与标准件同路径解析
    /// 3. 落审计事件
    ///
    /// 三步共用调用方事务: BOM 生成回滚时注册一并回滚, 序列空洞可容忍
    pub fn mint_tx(
        conn: &Connection,
        category_code: &str,
        spec_code: &str,
        part_name: &str,
        unit_cost: Decimal,
        unit_weight: Decimal,
        actor: &str,
    ) -> EngineResult<Part> {
        let minted = NumberSeriesRepository::next_value_tx(conn, CUSTOM_PART_SERIES)?;
        let part_no = minted.format();

        let part = Part {
            part_no: part_no.clone(),
            part_name: part_name.to_string(),
            category_code: category_code.to_string(),
            spec_code: spec_code.to_string(),
            unit_cost,
            unit_weight,
            is_custom: true,
            created_at: chrono::Utc::now().naive_utc(),
        };

        CatalogRepository::insert_part_tx(conn, &part)?;

        let log = ActionLog::new(ActionType::MintCustomPart, "Part", &part_no, actor)
            .with_after(&part)
            .with_detail(format!("category={} spec={}", category_code, spec_code));
        ActionLogRepository::insert_tx(conn, &log)?;

        info!(
            part_no = %part_no,
            category_code = %category_code,
            spec_code = %spec_code,
            "铸造定制件号"
        );

        Ok(part)
    }

    /// 铸造定制件 (独立工作单元)
    ///
    /// 供目录维护等不在 BOM 生成事务内的调用方使用
    pub fn mint(
        &self,
        category_code: &str,
        spec_code: &str,
        part_name: &str,
        unit_cost: Decimal,
        unit_weight: Decimal,
        actor: &str,
    ) -> EngineResult<Part> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = guard
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let part = Self::mint_tx(
            &tx,
            category_code,
            spec_code,
            part_name,
            unit_cost,
            unit_weight,
            actor,
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(part)
    }
}
