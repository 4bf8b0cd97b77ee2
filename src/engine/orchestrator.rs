// ==========================================
// 定制水槽订单系统 - BOM 编排器
// ==========================================
// 职责: 校验 → 合成 → 激活 的单事务编排
// 红线: 同一配置同时恰好一个 ACTIVE BOM, 是强制不变式不是约定
// 并发: 配置行乐观锁序列化并发生成, 落败方得到冲突错误
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::bom::BomResult;
use crate::domain::types::Actor;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lifecycle::OrderLifecycleManager;
use crate::engine::synthesizer::BomSynthesizer;
use crate::engine::validator::ConfigurationValidator;
use crate::repository::{
    ActionLogRepository, BomRepository, ConfigurationRepository, OrderRepository, RepositoryError,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// BomOrchestrator - BOM 编排器
// ==========================================
pub struct BomOrchestrator {
    conn: Arc<Mutex<Connection>>,
    synthesizer: BomSynthesizer,
}

impl BomOrchestrator {
    /// 创建新的编排器实例
    pub fn new(conn: Arc<Mutex<Connection>>, synthesizer: BomSynthesizer) -> Self {
        Self { conn, synthesizer }
    }

    /// 请求生成 BOM
    ///
    /// # 流程 (单事务)
    /// 1. 加载订单项/订单/配置
    /// 2. 可变更性检查 (或管理员覆盖, 覆盖单独审计)
    /// 3. 校验并回写结论 (乐观锁, 并发生成的序列化点)
    /// 4. 校验不过: 提交校验结论, 返回结构化失败, 不留任何 BOM
    /// 5. 合成 BOM (含定制件铸造)
    /// 6. 同事务内: 旧 ACTIVE 置 SUPERSEDED, 新 BOM 置 ACTIVE, 更新订单项引用
    /// 7. 落审计事件并提交
    pub fn request_bom(
        &self,
        order_item_id: &str,
        actor: &Actor,
        admin_override: bool,
    ) -> EngineResult<BomResult> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = guard
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        // ==========================================
        // 步骤1: 加载
        // ==========================================
        let item = OrderRepository::find_item_tx(&tx, order_item_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "OrderItem".to_string(),
                id: order_item_id.to_string(),
            }
        })?;
        let order = OrderRepository::find_order_tx(&tx, &item.order_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "SalesOrder".to_string(),
                id: item.order_id.clone(),
            }
        })?;

        // ==========================================
        // 步骤2: 可变更性检查
        // ==========================================
        OrderLifecycleManager::ensure_mutable(&order, actor, admin_override)?;
        let used_override = !order.current_phase.allows_reconfiguration();

        let configuration_id = item.configuration_id.clone().ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "Configuration".to_string(),
                id: format!("order_item={}", order_item_id),
            }
        })?;
        let config = ConfigurationRepository::find_by_id_tx(&tx, &configuration_id)?.ok_or_else(
            || RepositoryError::NotFound {
                entity: "Configuration".to_string(),
                id: configuration_id.clone(),
            },
        )?;

        // ==========================================
        // 步骤3: 校验并回写 (乐观锁)
        // ==========================================
        let validation = ConfigurationValidator::validate_tx(&tx, &config)?;
        let now = chrono::Utc::now().naive_utc();
        ConfigurationRepository::record_validation_tx(
            &tx,
            &configuration_id,
            &validation,
            config.revision,
            now,
        )?;

        let log = ActionLog::new(
            ActionType::ValidateConfiguration,
            "Configuration",
            &configuration_id,
            &actor.name,
        )
        .with_after(&validation);
        ActionLogRepository::insert_tx(&tx, &log)?;

        // ==========================================
        // 步骤4: 校验不过 → 结构化失败
        // ==========================================
        if !validation.is_valid {
            debug!(
                configuration_id = %configuration_id,
                errors_count = validation.errors.len(),
                "配置校验未通过, 拒绝生成 BOM"
            );
            // 校验结论本身落库, 但不留任何 BOM 痕迹
            tx.commit()
                .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
            return Err(EngineError::ValidationFailed {
                errors: validation.errors,
                warnings: validation.warnings,
            });
        }

        // ==========================================
        // 步骤5: 合成
        // ==========================================
        if used_override {
            let log = ActionLog::new(
                ActionType::AdminOverrideRegenerate,
                "Order",
                &order.order_id,
                &actor.name,
            )
            .with_detail(format!(
                "订单处于 {} 阶段, 管理员覆盖重新生成 BOM",
                order.current_phase
            ));
            ActionLogRepository::insert_tx(&tx, &log)?;
        }

        let prior_active =
            BomRepository::find_active_by_configuration_tx(&tx, &configuration_id)?;
        let as_of = chrono::Utc::now().date_naive();
        let result = self
            .synthesizer
            .generate_tx(&tx, &config, &actor.name, as_of)?;

        // ==========================================
        // 步骤6: 激活 (替代旧 ACTIVE 同事务)
        // ==========================================
        BomRepository::activate_tx(&tx, &result.bom_id, &configuration_id)?;
        OrderRepository::set_item_active_bom_tx(&tx, order_item_id, &result.bom_id)?;

        // ==========================================
        // 步骤7: 审计并提交
        // ==========================================
        let log = ActionLog::new(ActionType::GenerateBom, "Bom", &result.bom_id, &actor.name)
            .with_after(&result);
        ActionLogRepository::insert_tx(&tx, &log)?;

        let log = ActionLog::new(ActionType::ActivateBom, "Bom", &result.bom_id, &actor.name)
            .with_before(&serde_json::json!({
                "superseded_bom_id": prior_active.as_ref().map(|b| b.bom_id.clone())
            }))
            .with_after(&serde_json::json!({ "active_bom_id": result.bom_id }));
        ActionLogRepository::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            order_item_id = %order_item_id,
            bom_id = %result.bom_id,
            superseded = prior_active.is_some(),
            total_parts = result.total_parts,
            custom_parts_count = result.custom_parts_count,
            "BOM 生成并激活完成"
        );

        Ok(result)
    }
}
