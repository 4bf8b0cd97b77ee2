// ==========================================
// 定制水槽订单系统 - BOM 领域模型
// ==========================================
// 红线: BOM 一经生成不可原地修改,重新生成产生新 BOM 并替代旧的
// 红线: total_cost 必须等于所有行 extended_cost 之和
// ==========================================

use crate::domain::types::{BomStatus, ComponentType};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// Bom - BOM 头
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bom {
    pub bom_id: String,           // BOM ID
    pub configuration_id: String, // 来源配置
    pub assembly_id: String,      // 目标装配
    pub status: BomStatus,        // 状态
    pub total_parts: i32,         // 行数 (标准 + 定制)
    pub custom_parts_count: i32,  // 定制件行数
    pub total_cost: Decimal,      // 合计成本
    pub total_weight: Decimal,    // 合计重量 (kg)
    pub generation_time_ms: i64,  // 生成耗时
    pub created_by: String,       // 生成人
    pub created_at: NaiveDateTime, // 生成时间
}

// ==========================================
// BomLineItem - BOM 行
// ==========================================
// 不变式: 每行恰好引用一个组件, adjusted_quantity > 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLineItem {
    pub bom_id: String,                // 所属 BOM
    pub line_no: i32,                  // 行号 (目录行在前,定制行在后,稳定有序)
    pub component_id: String,          // 组件引用
    pub component_type: ComponentType, // PART / ASSEMBLY
    pub base_quantity: Decimal,        // 基础用量
    pub waste_factor: Decimal,         // 损耗系数
    pub adjusted_quantity: Decimal,    // 调整用量 = base * (1 + waste)
    pub unit_cost: Decimal,            // 单件成本
    pub extended_cost: Decimal,        // 行成本 = adjusted * unit_cost
    pub is_custom: bool,               // 是否定制行
}

// ==========================================
// BomResult - 生成结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomResult {
    pub bom_id: String,          // 新 BOM ID
    pub total_parts: i32,        // 行数
    pub custom_parts_count: i32, // 定制件行数
    pub total_cost: Decimal,     // 合计成本
    pub total_weight: Decimal,   // 合计重量
    pub generation_time_ms: i64, // 生成耗时
}
