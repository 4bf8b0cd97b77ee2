// ==========================================
// 定制水槽订单系统 - 配置/BOM 业务接口
// ==========================================
// 职责: 调用方入口 (进程内, 不含网络序列化):
//       validate_configuration / generate_bom 及配套的配置创建修订
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::bom::{Bom, BomLineItem, BomResult};
use crate::domain::configuration::{Configuration, Selections, ValidationResult};
use crate::domain::types::Actor;
use crate::engine::orchestrator::BomOrchestrator;
use crate::engine::validator::ConfigurationValidator;
use crate::repository::{
    ActionLogRepository, BomRepository, ConfigurationRepository, OrderRepository, RepositoryError,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::info;

// ==========================================
// ConfigurationApi - 配置/BOM 业务接口
// ==========================================
pub struct ConfigurationApi {
    conn: Arc<Mutex<Connection>>,
    bom_repo: Arc<BomRepository>,
    validator: Arc<ConfigurationValidator>,
    orchestrator: Arc<BomOrchestrator>,
}

impl ConfigurationApi {
    /// 创建新的ConfigurationApi实例
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        bom_repo: Arc<BomRepository>,
        validator: Arc<ConfigurationValidator>,
        orchestrator: Arc<BomOrchestrator>,
    ) -> Self {
        Self {
            conn,
            bom_repo,
            validator,
            orchestrator,
        }
    }

    /// 为订单项创建配置 (首版或修订版)
    ///
    /// # 红线
    /// - 仅订单处于 DRAFT/CONFIGURATION 阶段时允许
    /// - 修订不改写旧版本, 新版本通过 parent_configuration_id 链接
    pub fn create_configuration(
        &self,
        order_item_id: &str,
        selections: Selections,
        actor: &Actor,
    ) -> ApiResult<String> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = guard
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let item = OrderRepository::find_item_tx(&tx, order_item_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("OrderItem(id={})不存在", order_item_id))
        })?;
        let order = OrderRepository::find_order_tx(&tx, &item.order_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("SalesOrder(id={})不存在", item.order_id))
        })?;

        if !order.current_phase.allows_reconfiguration() {
            return Err(ApiError::Conflict(format!(
                "订单处于 {} 阶段, 配置已冻结",
                order.current_phase
            )));
        }

        let parent_configuration_id = item.configuration_id.clone();
        let version_no = ConfigurationRepository::max_version_no_tx(&tx, order_item_id)? + 1;
        let now = chrono::Utc::now().naive_utc();

        let config = Configuration {
            configuration_id: uuid::Uuid::new_v4().to_string(),
            order_item_id: order_item_id.to_string(),
            assembly_id: item.assembly_id.clone(),
            version_no,
            parent_configuration_id: parent_configuration_id.clone(),
            selections,
            is_valid: false,
            errors: vec![],
            warnings: vec![],
            revision: 0,
            created_by: actor.name.clone(),
            created_at: now,
            updated_at: now,
        };

        ConfigurationRepository::create_tx(&tx, &config)?;
        OrderRepository::set_item_configuration_tx(&tx, order_item_id, &config.configuration_id)?;

        let action_type = if parent_configuration_id.is_some() {
            ActionType::ReviseConfiguration
        } else {
            ActionType::CreateConfiguration
        };
        let log = ActionLog::new(
            action_type,
            "Configuration",
            &config.configuration_id,
            &actor.name,
        )
        .with_after(&config.selections)
        .with_detail(format!("version_no={}", version_no));
        ActionLogRepository::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            order_item_id = %order_item_id,
            configuration_id = %config.configuration_id,
            version_no,
            "配置已创建"
        );

        Ok(config.configuration_id)
    }

    /// 修订订单项配置 (要求已有配置, 新版本链接旧版本)
    pub fn revise_configuration(
        &self,
        order_item_id: &str,
        selections: Selections,
        actor: &Actor,
    ) -> ApiResult<String> {
        let item = {
            let guard = self
                .conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            OrderRepository::find_item_tx(&guard, order_item_id)?.ok_or_else(|| {
                ApiError::NotFound(format!("OrderItem(id={})不存在", order_item_id))
            })?
        };
        if item.configuration_id.is_none() {
            return Err(ApiError::InvalidInput(format!(
                "订单项 {} 尚无配置, 请先创建首版配置",
                order_item_id
            )));
        }
        self.create_configuration(order_item_id, selections, actor)
    }

    /// 校验配置并回写结论
    pub fn validate_configuration(
        &self,
        configuration_id: &str,
        actor: &Actor,
    ) -> ApiResult<ValidationResult> {
        Ok(self.validator.validate(configuration_id, &actor.name)?)
    }

    /// 生成并激活 BOM (常规路径: 订单须处于可变更阶段)
    pub fn generate_bom(&self, order_item_id: &str, actor: &Actor) -> ApiResult<BomResult> {
        Ok(self.orchestrator.request_bom(order_item_id, actor, false)?)
    }

    /// 管理员覆盖重新生成 BOM (订单已冻结时的显式覆盖, 单独审计)
    pub fn admin_regenerate_bom(&self, order_item_id: &str, actor: &Actor) -> ApiResult<BomResult> {
        Ok(self.orchestrator.request_bom(order_item_id, actor, true)?)
    }

    /// 查询配置当前激活的 BOM
    pub fn find_active_bom(&self, configuration_id: &str) -> ApiResult<Option<Bom>> {
        Ok(self.bom_repo.find_active_by_configuration(configuration_id)?)
    }

    /// 查询 BOM 行项
    pub fn list_bom_lines(&self, bom_id: &str) -> ApiResult<Vec<BomLineItem>> {
        Ok(self.bom_repo.find_lines(bom_id)?)
    }
}
