// ==========================================
// 定制水槽订单系统 - 引擎层错误类型
// ==========================================
// 职责: 承载业务规则层面的结构化失败
// 红线: 预期中的业务失败 (校验不过/冲突) 走结构化返回,
//       数据完整性与存储故障中止事务并向上传播
// ==========================================

use crate::domain::configuration::RuleViolation;
use crate::domain::types::{ActorRole, OrderPhase};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 预期业务失败 (结构化返回给调用方) =====
    /// 配置校验未通过, 附带逐条错误/警告
    #[error("配置校验未通过: {} 条错误", errors.len())]
    ValidationFailed {
        errors: Vec<RuleViolation>,
        warnings: Vec<RuleViolation>,
    },

    /// 阶段迁移不在迁移表中
    #[error("无效的阶段迁移: from={from} to={to}")]
    InvalidTransition { from: OrderPhase, to: OrderPhase },

    /// 操作人角色无权进入目标阶段
    #[error("权限不足: {actor}({role}) 不能执行到 {target} 的迁移")]
    Unauthorized {
        actor: String,
        role: ActorRole,
        target: OrderPhase,
    },

    /// 订单已越过可变更阶段, 配置/BOM 冻结
    #[error("配置已冻结: 订单处于 {phase}, 仅 DRAFT/CONFIGURATION 可重新生成")]
    ConfigurationFrozen { phase: OrderPhase },

    // ===== 副作用投递失败 (中止事务) =====
    #[error("事件投递失败: {0}")]
    EventSinkFailure(String),

    // ===== 仓储层透传 =====
    // 乐观锁冲突/未找到/数据完整性错误由 API 层映射到对应的调用方错误
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
