// ==========================================
// 定制水槽订单系统 - 配置领域模型
// ==========================================
// 红线: 规则判定为封闭的带参变体,不做规则名字符串分发
// 红线: 订单进入 Approval 后配置冻结
// ==========================================

use crate::domain::types::{RuleKind, RuleScope};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// SelectionValue - 选项取值
// ==========================================
// 序列化为带标签 JSON, 避免 Decimal 字符串与 Text 的歧义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionValue {
    Number(Decimal), // 数值选项 (尺寸/数量)
    Text(String),    // 文本选项 (规格代码)
    Flag(bool),      // 开关选项 (特性启用)
}

/// 配置选项集: option_code → 取值 (BTreeMap 保证序列化与遍历顺序确定)
pub type Selections = BTreeMap<String, SelectionValue>;

// ==========================================
// Configuration - 订单项配置
// ==========================================
// 版本化: 修订通过 parent_configuration_id 链接新版本,不原地改写已冻结配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub configuration_id: String,                // 配置ID
    pub order_item_id: String,                   // 所属订单项
    pub assembly_id: String,                     // 目标装配
    pub version_no: i32,                         // 版本号
    pub parent_configuration_id: Option<String>, // 上一版本 (修订来源)
    pub selections: Selections,                  // 已选选项集
    pub is_valid: bool,                          // 最近一次校验结论
    pub errors: Vec<RuleViolation>,              // 最近一次校验错误
    pub warnings: Vec<RuleViolation>,            // 最近一次校验警告
    pub revision: i32,                           // 乐观锁: 修订号
    pub created_by: String,                      // 创建人
    pub created_at: NaiveDateTime,               // 创建时间
    pub updated_at: NaiveDateTime,               // 更新时间
}

impl Configuration {
    /// 读取数值选项
    pub fn number(&self, option_code: &str) -> Option<Decimal> {
        match self.selections.get(option_code) {
            Some(SelectionValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// 读取文本选项
    pub fn text(&self, option_code: &str) -> Option<&str> {
        match self.selections.get(option_code) {
            Some(SelectionValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 读取开关选项 (缺省视为未启用)
    pub fn flag(&self, option_code: &str) -> bool {
        matches!(
            self.selections.get(option_code),
            Some(SelectionValue::Flag(true))
        )
    }
}

// ==========================================
// RuleViolation - 规则违规明细
// ==========================================
// 红线: 每条违规必须带规则名与可读原因,调用方无需翻日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule_name: String,           // 规则名
    pub option_code: Option<String>, // 违规选项 (适用时)
    pub message: String,             // 可读原因
}

// ==========================================
// ValidationResult - 校验结论
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,               // 是否通过 (无阻断错误)
    pub errors: Vec<RuleViolation>,   // 阻断规则失败
    pub warnings: Vec<RuleViolation>, // 非阻断规则失败
}

impl ValidationResult {
    pub fn passed() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
        }
    }
}

// ==========================================
// RulePredicate - 规则判定 (封闭变体)
// ==========================================
// 新增规则种类 = 新增变体,不改中心分发链
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "predicate")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulePredicate {
    /// 尺寸边界: 数值选项必须落在 [min, max]
    DimensionRange {
        option_code: String,
        min: Decimal,
        max: Decimal,
    },
    /// 数量边界: 整数选项必须落在 [min, max]
    CountRange {
        option_code: String,
        min: i64,
        max: i64,
    },
    /// 特性互斥: 启用 feature_code 时 other_option 不得超过 max_allowed
    FeatureConflict {
        feature_code: String,
        other_option: String,
        max_allowed: Decimal,
    },
    /// 必选项: 配置必须包含该选项
    RequiredOption { option_code: String },
}

impl RulePredicate {
    /// 对选项集求值
    ///
    /// # 返回
    /// - `Ok(())`: 规则满足
    /// - `Err(detail)`: 违规,附带可读细节
    pub fn check(&self, config: &Configuration) -> Result<(), String> {
        match self {
            RulePredicate::DimensionRange {
                option_code,
                min,
                max,
            } => match config.number(option_code) {
                Some(v) if v < *min || v > *max => Err(format!(
                    "{}={} 超出允许范围 [{}, {}]",
                    option_code, v, min, max
                )),
                _ => Ok(()),
            },
            RulePredicate::CountRange {
                option_code,
                min,
                max,
            } => match config.number(option_code) {
                Some(v) if v < Decimal::from(*min) || v > Decimal::from(*max) => Err(format!(
                    "{}={} 超出允许数量 [{}, {}]",
                    option_code, v, min, max
                )),
                _ => Ok(()),
            },
            RulePredicate::FeatureConflict {
                feature_code,
                other_option,
                max_allowed,
            } => {
                if !config.flag(feature_code) {
                    return Ok(());
                }
                match config.number(other_option) {
                    Some(v) if v > *max_allowed => Err(format!(
                        "启用 {} 时 {}={} 不得超过 {}",
                        feature_code, other_option, v, max_allowed
                    )),
                    _ => Ok(()),
                }
            }
            RulePredicate::RequiredOption { option_code } => {
                if config.selections.contains_key(option_code) {
                    Ok(())
                } else {
                    Err(format!("缺少必选项 {}", option_code))
                }
            }
        }
    }

    /// 规则关注的选项代码 (用于违规明细定位)
    pub fn option_code(&self) -> Option<&str> {
        match self {
            RulePredicate::DimensionRange { option_code, .. }
            | RulePredicate::CountRange { option_code, .. }
            | RulePredicate::RequiredOption { option_code } => Some(option_code),
            RulePredicate::FeatureConflict { other_option, .. } => Some(other_option),
        }
    }
}

// ==========================================
// ConfigurationRule - 配置规则
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationRule {
    pub rule_id: String,          // 规则ID
    pub rule_name: String,        // 规则名
    pub kind: RuleKind,           // 规则种类
    pub scope: RuleScope,         // 作用域 (装配或品类)
    pub priority: i32,            // 优先级 (升序执行)
    pub is_blocking: bool,        // 阻断性失败产生 error, 否则 warning
    pub predicate: RulePredicate, // 判定
    pub message: String,          // 规则级提示语
}
