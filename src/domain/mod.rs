// ==========================================
// 定制水槽订单系统 - 领域层
// ==========================================
// 职责: 实体与封闭类型定义,不含持久化与业务编排
// ==========================================

pub mod action_log;
pub mod bom;
pub mod catalog;
pub mod configuration;
pub mod order;
pub mod types;

// 重导出常用实体
pub use action_log::{ActionLog, ActionType};
pub use bom::{Bom, BomLineItem, BomResult};
pub use catalog::{Assembly, AssemblyComponent, Category, Part, UnitCost};
pub use configuration::{
    Configuration, ConfigurationRule, RulePredicate, RuleViolation, SelectionValue, Selections,
    ValidationResult,
};
pub use order::{OrderItem, OrderStatusHistory, SalesOrder, TransitionResult};
pub use types::{
    Actor, ActorRole, BomStatus, ComponentType, OrderPhase, ProductionStatus, RuleKind, RuleScope,
};
