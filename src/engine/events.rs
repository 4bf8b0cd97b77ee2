// ==========================================
// 定制水槽订单系统 - 引擎层事件发布
// ==========================================
// 职责: 定义订单事件 trait, 实现依赖倒置
// 说明: Engine 层定义 trait, 任务/通知系统在外部实现适配器;
//       任务与质检清单的实际物化不在本系统范围内
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Mutex;

// ==========================================
// 订单事件类型
// ==========================================

/// 阶段迁移触发的下游事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEventType {
    /// 进入生产: 下游按激活 BOM 生成生产任务
    EnteredProduction,
    /// 进入质检: 下游创建质检清单实例
    EnteredQualityControl,
}

impl OrderEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            OrderEventType::EnteredProduction => "EnteredProduction",
            OrderEventType::EnteredQualityControl => "EnteredQualityControl",
        }
    }
}

/// 订单事件
///
/// 携带订单项与激活 BOM 引用, 供下游物化任务/清单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_type: OrderEventType,    // 事件类型
    pub order_id: String,              // 订单ID
    pub order_item_id: String,         // 订单项ID
    pub active_bom_id: Option<String>, // 激活 BOM 引用 (生产任务的来源)
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 订单事件接收方 Trait
///
/// Engine 层定义, 任务/通知系统实现
///
/// # 约定
/// - 发布失败视为副作用失败, 调用方回滚整个迁移事务
/// - 同一次迁移对同一订单项只发布一次, 不会重复
pub trait OrderEventSink: Send + Sync {
    /// 投递订单事件
    fn publish(&self, event: OrderEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件接收方
///
/// 用于不需要下游任务系统的场景 (如单元测试)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventSink;

impl OrderEventSink for NoOpEventSink {
    fn publish(&self, event: OrderEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            event_type = event.event_type.as_str(),
            order_item_id = %event.order_item_id,
            "NoOpEventSink: 跳过事件投递"
        );
        Ok(())
    }
}

/// 记录型事件接收方
///
/// 把收到的事件留在内存里, 供测试断言副作用只触发一次
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<OrderEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出已记录事件的副本
    pub fn recorded(&self) -> Vec<OrderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl OrderEventSink for RecordingEventSink {
    fn publish(&self, event: OrderEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events
            .lock()
            .map_err(|e| -> Box<dyn Error + Send + Sync> { e.to_string().into() })?
            .push(event);
        Ok(())
    }
}
