// ==========================================
// 定制水槽订单系统 - 领域类型定义
// ==========================================
// 红线: 状态机与规则种类均为封闭枚举,不做字符串分支
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单阶段 (Order Phase)
// ==========================================
// 正向流: Draft → Configuration → Approval → Production
//         → QualityControl → Packaging → Shipping → Delivered
// 全局边: 非终态 → Cancelled / OnHold, OnHold → 挂起前阶段
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderPhase {
    Draft,          // 草拟
    Configuration,  // 配置中
    Approval,       // 审批
    Production,     // 生产
    QualityControl, // 质检
    Packaging,      // 包装
    Shipping,       // 发运
    Delivered,      // 已交付
    OnHold,         // 挂起
    Cancelled,      // 已取消
}

impl fmt::Display for OrderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderPhase {
    /// 判断是否为终态 (无任何出边)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderPhase::Delivered | OrderPhase::Cancelled)
    }

    /// 判断配置/BOM是否仍可变更
    ///
    /// 红线: Approval 及之后阶段配置冻结,仅管理员覆盖可重新生成
    pub fn allows_reconfiguration(&self) -> bool {
        matches!(self, OrderPhase::Draft | OrderPhase::Configuration)
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderPhase::Draft => "DRAFT",
            OrderPhase::Configuration => "CONFIGURATION",
            OrderPhase::Approval => "APPROVAL",
            OrderPhase::Production => "PRODUCTION",
            OrderPhase::QualityControl => "QUALITY_CONTROL",
            OrderPhase::Packaging => "PACKAGING",
            OrderPhase::Shipping => "SHIPPING",
            OrderPhase::Delivered => "DELIVERED",
            OrderPhase::OnHold => "ON_HOLD",
            OrderPhase::Cancelled => "CANCELLED",
        }
    }

    /// 从字符串解析阶段
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(OrderPhase::Draft),
            "CONFIGURATION" => Some(OrderPhase::Configuration),
            "APPROVAL" => Some(OrderPhase::Approval),
            "PRODUCTION" => Some(OrderPhase::Production),
            "QUALITY_CONTROL" => Some(OrderPhase::QualityControl),
            "PACKAGING" => Some(OrderPhase::Packaging),
            "SHIPPING" => Some(OrderPhase::Shipping),
            "DELIVERED" => Some(OrderPhase::Delivered),
            "ON_HOLD" => Some(OrderPhase::OnHold),
            "CANCELLED" => Some(OrderPhase::Cancelled),
            _ => None,
        }
    }
}

// ==========================================
// BOM 状态 (BOM Status)
// ==========================================
// 红线: 同一配置同时最多一个 ACTIVE, 切换必须在同一事务内完成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BomStatus {
    Draft,           // 草稿
    PendingApproval, // 待审批
    Approved,        // 已审批
    Active,          // 激活
    Superseded,      // 已被替代
}

impl fmt::Display for BomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl BomStatus {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BomStatus::Draft => "DRAFT",
            BomStatus::PendingApproval => "PENDING_APPROVAL",
            BomStatus::Approved => "APPROVED",
            BomStatus::Active => "ACTIVE",
            BomStatus::Superseded => "SUPERSEDED",
        }
    }

    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(BomStatus::Draft),
            "PENDING_APPROVAL" => Some(BomStatus::PendingApproval),
            "APPROVED" => Some(BomStatus::Approved),
            "ACTIVE" => Some(BomStatus::Active),
            "SUPERSEDED" => Some(BomStatus::Superseded),
            _ => None,
        }
    }
}

// ==========================================
// 组件类型 (Component Type)
// ==========================================
// BOM 行引用的组件既可能是零件也可能是子装配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    Part,     // 零件
    Assembly, // 装配件
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ComponentType {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ComponentType::Part => "PART",
            ComponentType::Assembly => "ASSEMBLY",
        }
    }

    /// 从字符串解析组件类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PART" => Some(ComponentType::Part),
            "ASSEMBLY" => Some(ComponentType::Assembly),
            _ => None,
        }
    }
}

// ==========================================
// 规则种类 (Rule Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    Validation,         // 校验
    ComponentSelection, // 选件
    Pricing,            // 定价
    Compatibility,      // 兼容性
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl RuleKind {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RuleKind::Validation => "VALIDATION",
            RuleKind::ComponentSelection => "COMPONENT_SELECTION",
            RuleKind::Pricing => "PRICING",
            RuleKind::Compatibility => "COMPATIBILITY",
        }
    }

    /// 从字符串解析规则种类
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "VALIDATION" => Some(RuleKind::Validation),
            "COMPONENT_SELECTION" => Some(RuleKind::ComponentSelection),
            "PRICING" => Some(RuleKind::Pricing),
            "COMPATIBILITY" => Some(RuleKind::Compatibility),
            _ => None,
        }
    }
}

// ==========================================
// 规则作用域 (Rule Scope)
// ==========================================
// 规则挂在目标装配或其所属品类上
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope_type", content = "scope_key")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleScope {
    Assembly(String), // 指定装配
    Category(String), // 整个品类
}

impl RuleScope {
    /// 作用域类型字符串 (数据库 scope_type 列)
    pub fn scope_type(&self) -> &'static str {
        match self {
            RuleScope::Assembly(_) => "ASSEMBLY",
            RuleScope::Category(_) => "CATEGORY",
        }
    }

    /// 作用域键 (数据库 scope_key 列)
    pub fn scope_key(&self) -> &str {
        match self {
            RuleScope::Assembly(k) | RuleScope::Category(k) => k,
        }
    }

    /// 从数据库两列还原作用域
    pub fn from_db(scope_type: &str, scope_key: String) -> Option<Self> {
        match scope_type.to_uppercase().as_str() {
            "ASSEMBLY" => Some(RuleScope::Assembly(scope_key)),
            "CATEGORY" => Some(RuleScope::Category(scope_key)),
            _ => None,
        }
    }
}

// ==========================================
// 操作人角色 (Actor Role)
// ==========================================
// 用途: 阶段迁移与管理员覆盖的权限判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Sales,       // 销售
    Engineering, // 工程
    Planner,     // 计划员
    Production,  // 生产
    Quality,     // 质检
    Logistics,   // 物流
    Admin,       // 管理员
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ActorRole {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActorRole::Sales => "SALES",
            ActorRole::Engineering => "ENGINEERING",
            ActorRole::Planner => "PLANNER",
            ActorRole::Production => "PRODUCTION",
            ActorRole::Quality => "QUALITY",
            ActorRole::Logistics => "LOGISTICS",
            ActorRole::Admin => "ADMIN",
        }
    }

    /// 从字符串解析角色
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SALES" => Some(ActorRole::Sales),
            "ENGINEERING" => Some(ActorRole::Engineering),
            "PLANNER" => Some(ActorRole::Planner),
            "PRODUCTION" => Some(ActorRole::Production),
            "QUALITY" => Some(ActorRole::Quality),
            "LOGISTICS" => Some(ActorRole::Logistics),
            "ADMIN" => Some(ActorRole::Admin),
            _ => None,
        }
    }
}

// ==========================================
// 操作人 (Actor)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,    // 操作人标识
    pub role: ActorRole, // 角色
}

impl Actor {
    pub fn new(name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

// ==========================================
// 订单项生产状态 (Production Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStatus {
    NotStarted, // 未开始
    Released,   // 已下达
    Completed,  // 已完工
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ProductionStatus {
    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProductionStatus::NotStarted => "NOT_STARTED",
            ProductionStatus::Released => "RELEASED",
            ProductionStatus::Completed => "COMPLETED",
        }
    }

    /// 从字符串解析生产状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NOT_STARTED" => Some(ProductionStatus::NotStarted),
            "RELEASED" => Some(ProductionStatus::Released),
            "COMPLETED" => Some(ProductionStatus::Completed),
            _ => None,
        }
    }
}
