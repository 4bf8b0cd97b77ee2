// ==========================================
// 定制水槽订单系统 - 配置校验引擎
// ==========================================
// 职责: 按 (priority, rule_id) 升序逐条评估作用域内规则
// 红线: 单条规则失败不短路后续规则, 全部评估完再汇总
// 红线: 阻断规则失败进 errors 并置 is_valid=false,
//       非阻断规则失败只进 warnings
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::configuration::{
    Configuration, ConfigurationRule, RuleViolation, ValidationResult,
};
use crate::engine::error::EngineResult;
use crate::repository::{
    ActionLogRepository, CatalogRepository, ConfigurationRepository, RepositoryError,
    RuleRepository,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// ConfigurationValidator - 配置校验引擎
// ==========================================
pub struct ConfigurationValidator {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigurationValidator {
    /// 创建新的校验引擎实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 纯评估: 对给定规则集评估配置, 无 I/O
    ///
    /// 评估顺序固定为 (priority, rule_id) 升序, 保证相同输入得到相同结论
    pub fn evaluate(config: &Configuration, rules: &[ConfigurationRule]) -> ValidationResult {
        let mut ordered: Vec<&ConfigurationRule> = rules.iter().collect();
        ordered.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for rule in ordered {
            match rule.predicate.check(config) {
                Ok(()) => {
                    debug!(rule_name = %rule.rule_name, "规则通过");
                }
                Err(detail) => {
                    let violation = RuleViolation {
                        rule_name: rule.rule_name.clone(),
                        option_code: rule.predicate.option_code().map(str::to_string),
                        message: format!("{}: {}", rule.message, detail),
                    };
                    debug!(
                        rule_name = %rule.rule_name,
                        is_blocking = rule.is_blocking,
                        detail = %detail,
                        "规则失败"
                    );
                    if rule.is_blocking {
                        errors.push(violation);
                    } else {
                        warnings.push(violation);
                    }
                }
            }
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// 事务内校验: 取装配与作用域规则后做纯评估
    ///
    /// 不回写配置行, 由调用方决定是否在同一工作单元内落库
    pub fn validate_tx(conn: &Connection, config: &Configuration) -> EngineResult<ValidationResult> {
        let assembly = CatalogRepository::find_assembly_tx(conn, &config.assembly_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Assembly".to_string(),
                id: config.assembly_id.clone(),
            })?;

        let rules =
            RuleRepository::find_for_target_tx(conn, &config.assembly_id, &assembly.category_code)?;

        debug!(
            configuration_id = %config.configuration_id,
            assembly_id = %config.assembly_id,
            rules_count = rules.len(),
            "开始配置校验"
        );

        Ok(Self::evaluate(config, &rules))
    }

    /// 校验配置并回写结论 (独立工作单元)
    ///
    /// # 流程
    /// 1. 加载配置
    /// 2. 事务内评估
    /// 3. 回写 is_valid/errors/warnings (乐观锁检查)
    /// 4. 落审计事件并提交
    pub fn validate(&self, configuration_id: &str, actor: &str) -> EngineResult<ValidationResult> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = guard
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let config = ConfigurationRepository::find_by_id_tx(&tx, configuration_id)?.ok_or_else(
            || RepositoryError::NotFound {
                entity: "Configuration".to_string(),
                id: configuration_id.to_string(),
            },
        )?;

        let result = Self::validate_tx(&tx, &config)?;

        let now = chrono::Utc::now().naive_utc();
        ConfigurationRepository::record_validation_tx(
            &tx,
            configuration_id,
            &result,
            config.revision,
            now,
        )?;

        let log = ActionLog::new(
            ActionType::ValidateConfiguration,
            "Configuration",
            configuration_id,
            actor,
        )
        .with_after(&result);
        ActionLogRepository::insert_tx(&tx, &log)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(
            configuration_id = %configuration_id,
            is_valid = result.is_valid,
            errors_count = result.errors.len(),
            warnings_count = result.warnings.len(),
            "配置校验完成"
        );

        Ok(result)
    }
}
