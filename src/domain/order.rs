// ==========================================
// 定制水槽订单系统 - 订单领域模型
// ==========================================
// 聚合根: SalesOrder, 阶段推进只经由生命周期管理器
// 红线: 状态历史追加后不可改写
// ==========================================

use crate::domain::types::{OrderPhase, ProductionStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// SalesOrder - 销售订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub order_id: String,                    // 订单ID
    pub order_no: String,                    // 订单号 (对外)
    pub current_phase: OrderPhase,           // 当前阶段
    pub held_from_phase: Option<OrderPhase>, // 挂起前阶段 (ON_HOLD 恢复目标)
    pub phase_entered_at: NaiveDateTime,     // 进入当前阶段时间 (历史行时长来源)
    pub actual_delivery_date: Option<NaiveDateTime>, // 实际交付时间 (进入 DELIVERED 时盖章)
    pub revision: i32,                       // 乐观锁: 修订号
    pub created_by: String,                  // 创建人
    pub created_at: NaiveDateTime,           // 创建时间
    pub updated_at: NaiveDateTime,           // 更新时间
}

impl SalesOrder {
    /// 判断当前是否允许重新生成配置/BOM
    pub fn allows_reconfiguration(&self) -> bool {
        self.current_phase.allows_reconfiguration()
    }
}

// ==========================================
// OrderItem - 订单项
// ==========================================
// 一项 = 一个目标装配 + 其配置 + 激活 BOM 引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_id: String,               // 订单项ID
    pub order_id: String,                    // 所属订单
    pub assembly_id: String,                 // 目标装配
    pub configuration_id: Option<String>,    // 当前配置
    pub active_bom_id: Option<String>,       // 当前激活 BOM
    pub production_status: ProductionStatus, // 生产状态
}

// ==========================================
// OrderStatusHistory - 阶段历史 (追加型)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusHistory {
    pub history_id: String,              // 历史行ID
    pub order_id: String,                // 所属订单
    pub from_phase: OrderPhase,          // 迁出阶段
    pub to_phase: OrderPhase,            // 迁入阶段
    pub actor: String,                   // 操作人
    pub transitioned_at: NaiveDateTime,  // 迁移时间
    pub reason: Option<String>,          // 迁移原因
    pub duration_in_prior_phase_s: i64,  // 在迁出阶段停留秒数
}

// ==========================================
// TransitionResult - 迁移结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResult {
    pub order_id: String,               // 订单ID
    pub from_phase: OrderPhase,         // 迁出阶段
    pub to_phase: OrderPhase,           // 迁入阶段
    pub transitioned_at: NaiveDateTime, // 迁移时间
    pub history_id: String,             // 对应历史行
}
