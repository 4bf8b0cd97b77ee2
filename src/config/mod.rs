// ==========================================
// 定制水槽订单系统 - 配置层
// ==========================================
// 职责: 引擎参数的读取与默认值
// ==========================================

pub mod settings;

pub use settings::{write_kv, ComponentOptionBinding, ExplosionMode, SynthesisSettings};
