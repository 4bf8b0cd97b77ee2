// ==========================================
// 定制水槽订单系统 - 操作日志领域模型
// ==========================================
// 红线: 每次 BOM 生成与阶段迁移必须落一条不可变审计事件
// 用途: 审计追踪 (存储/保留策略由外部审计系统负责)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateOrder,             // 创建订单
    CreateConfiguration,     // 创建配置
    ReviseConfiguration,     // 修订配置
    ValidateConfiguration,   // 校验配置
    GenerateBom,             // 生成 BOM
    ActivateBom,             // 激活 BOM (含替代旧 BOM)
    MintCustomPart,          // 铸造定制件号
    PhaseTransition,         // 阶段迁移
    AdminOverrideRegenerate, // 管理员覆盖重新生成 (单独审计)
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateOrder => "CreateOrder",
            ActionType::CreateConfiguration => "CreateConfiguration",
            ActionType::ReviseConfiguration => "ReviseConfiguration",
            ActionType::ValidateConfiguration => "ValidateConfiguration",
            ActionType::GenerateBom => "GenerateBom",
            ActionType::ActivateBom => "ActivateBom",
            ActionType::MintCustomPart => "MintCustomPart",
            ActionType::PhaseTransition => "PhaseTransition",
            ActionType::AdminOverrideRegenerate => "AdminOverrideRegenerate",
        }
    }

    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CreateOrder" => Some(ActionType::CreateOrder),
            "CreateConfiguration" => Some(ActionType::CreateConfiguration),
            "ReviseConfiguration" => Some(ActionType::ReviseConfiguration),
            "ValidateConfiguration" => Some(ActionType::ValidateConfiguration),
            "GenerateBom" => Some(ActionType::GenerateBom),
            "ActivateBom" => Some(ActionType::ActivateBom),
            "MintCustomPart" => Some(ActionType::MintCustomPart),
            "PhaseTransition" => Some(ActionType::PhaseTransition),
            "AdminOverrideRegenerate" => Some(ActionType::AdminOverrideRegenerate),
            _ => None,
        }
    }
}

// ==========================================
// ActionLog - 审计事件
// ==========================================
// {actor, action, entity, before, after, timestamp}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,              // 事件ID
    pub action_type: String,            // 操作类型 (存储为字符串)
    pub entity_type: String,            // 实体类型 (Order/Configuration/Bom/Part)
    pub entity_id: String,              // 实体ID
    pub actor: String,                  // 操作人
    pub action_ts: NaiveDateTime,       // 操作时间戳
    pub before_json: Option<JsonValue>, // 操作前快照
    pub after_json: Option<JsonValue>,  // 操作后快照
    pub detail: Option<String>,         // 详细描述
}

impl ActionLog {
    /// 创建新的审计事件
    ///
    /// # 参数
    /// - `action_type`: 操作类型
    /// - `entity_type` / `entity_id`: 被操作实体
    /// - `actor`: 操作人
    pub fn new(
        action_type: ActionType,
        entity_type: &str,
        entity_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.into(),
            actor: actor.into(),
            action_ts: chrono::Utc::now().naive_utc(),
            before_json: None,
            after_json: None,
            detail: None,
        }
    }

    /// 设置操作前快照 (转换为JSON)
    pub fn with_before<T: Serialize>(mut self, before: &T) -> Self {
        self.before_json = serde_json::to_value(before).ok();
        self
    }

    /// 设置操作后快照 (转换为JSON)
    pub fn with_after<T: Serialize>(mut self, after: &T) -> Self {
        self.after_json = serde_json::to_value(after).ok();
        self
    }

    /// 设置详细描述
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
