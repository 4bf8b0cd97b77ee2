// ==========================================
// 定制水槽订单系统 - 核心库
// ==========================================
// 系统定位: 配置校验 → BOM 合成 → 订单生命周期的同步事务核心
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 引擎参数
pub mod config;

// 数据库基础设施 (连接初始化/PRAGMA 统一/schema)
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Actor, ActorRole, BomStatus, ComponentType, OrderPhase, ProductionStatus, RuleKind, RuleScope,
};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Assembly, AssemblyComponent, Bom, BomLineItem, BomResult, Category,
    Configuration, ConfigurationRule, OrderItem, OrderStatusHistory, Part, RulePredicate,
    RuleViolation, SalesOrder, SelectionValue, Selections, TransitionResult, UnitCost,
    ValidationResult,
};

// 引擎
pub use engine::{
    BomOrchestrator, BomSynthesizer, ConfigurationValidator, CustomPartNumberingService,
    EngineError, EngineResult, NoOpEventSink, OrderEvent, OrderEventSink, OrderEventType,
    OrderLifecycleManager, RecordingEventSink,
};

// 配置
pub use config::{ComponentOptionBinding, ExplosionMode, SynthesisSettings};

// API
pub use api::{ApiError, ApiResult, ConfigurationApi, OrderApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "定制水槽订单系统";
