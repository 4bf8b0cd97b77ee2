// ==========================================
// 定制水槽订单系统 - API层错误类型
// ==========================================
// 职责: 把引擎/仓储层错误转换为调用方可直接处理的结构化错误
// 红线: 每个错误必须带足够细节 (失败规则名/违规选项/当前与目标阶段),
//       调用方无需翻日志
// ==========================================

use crate::domain::configuration::RuleViolation;
use crate::domain::types::{ActorRole, OrderPhase};
use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 预期业务失败 (可恢复)
    // ==========================================
    /// 配置校验未通过, 附带逐条错误/警告
    #[error("配置校验未通过: {} 条错误", errors.len())]
    ValidationFailed {
        errors: Vec<RuleViolation>,
        warnings: Vec<RuleViolation>,
    },

    /// 阶段迁移不在迁移表中 (当前阶段与目标阶段均在载荷中)
    #[error("无效的阶段迁移: from={from} to={to}")]
    InvalidTransition { from: OrderPhase, to: OrderPhase },

    /// 并发修改 / 重复激活 BOM / 配置冻结
    #[error("冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 权限错误
    // ==========================================
    #[error("权限不足: {actor}({role}) 无权执行 {action}")]
    AuthorizationError {
        actor: String,
        role: ActorRole,
        action: String,
    },

    // ==========================================
    // 资源与输入
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 致命错误 (中止事务)
    // ==========================================
    /// 目录引用缺失或装配图有环
    #[error("数据完整性错误: {0}")]
    DataIntegrity(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::OptimisticLockFailure {
                entity,
                id,
                expected,
                actual,
            } => ApiError::Conflict(format!(
                "{}(id={})已被并发修改 (期望revision={}, 实际revision={})",
                entity, id, expected, actual
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DataIntegrity(format!("外键约束违反: {}", msg))
            }
            RepositoryError::DataIntegrity(msg) => ApiError::DataIntegrity(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::Conflict(format!("无效的状态转换: from={} to={}", from, to))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ValidationFailed { errors, warnings } => {
                ApiError::ValidationFailed { errors, warnings }
            }
            EngineError::InvalidTransition { from, to } => {
                ApiError::InvalidTransition { from, to }
            }
            EngineError::Unauthorized {
                actor,
                role,
                target,
            } => ApiError::AuthorizationError {
                actor,
                role,
                action: format!("迁移到 {}", target),
            },
            EngineError::ConfigurationFrozen { phase } => ApiError::Conflict(format!(
                "订单处于 {} 阶段, 配置/BOM 已冻结, 仅管理员覆盖可重新生成",
                phase
            )),
            EngineError::EventSinkFailure(msg) => ApiError::InternalError(msg),
            EngineError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimistic_lock_maps_to_conflict() {
        let repo_err = RepositoryError::OptimisticLockFailure {
            entity: "Configuration".to_string(),
            id: "C001".to_string(),
            expected: 1,
            actual: 2,
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::Conflict(msg) => {
                assert!(msg.contains("C001"));
                assert!(msg.contains("并发修改"));
            }
            _ => panic!("Expected Conflict"),
        }
    }

    #[test]
    fn test_not_found_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "SalesOrder".to_string(),
            id: "O001".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("SalesOrder"));
                assert!(msg.contains("O001"));
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn test_validation_failure_keeps_itemized_violations() {
        let engine_err = EngineError::ValidationFailed {
            errors: vec![RuleViolation {
                rule_name: "basin-count-bounds".to_string(),
                option_code: Some("basin_count".to_string()),
                message: "水槽盆数必须在 1~3 之间".to_string(),
            }],
            warnings: vec![],
        };
        let api_err: ApiError = engine_err.into();
        match api_err {
            ApiError::ValidationFailed { errors, warnings } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].rule_name, "basin-count-bounds");
                assert!(warnings.is_empty());
            }
            _ => panic!("Expected ValidationFailed"),
        }
    }
}
