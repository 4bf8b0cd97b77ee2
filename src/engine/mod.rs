// ==========================================
// 定制水槽订单系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎
// 红线: 所有拒绝必须带可读原因; 工作单元 (事务) 是显式参数,
//       不依赖隐式会话状态
// ==========================================

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod numbering;
pub mod orchestrator;
pub mod synthesizer;
pub mod validator;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use events::{NoOpEventSink, OrderEvent, OrderEventSink, OrderEventType, RecordingEventSink};
pub use lifecycle::OrderLifecycleManager;
pub use numbering::CustomPartNumberingService;
pub use orchestrator::BomOrchestrator;
pub use synthesizer::BomSynthesizer;
pub use validator::ConfigurationValidator;
