pub mod fanout;
pub mod providers;
pub mod sink;

pub use fanout::{FanoutReport, SinkFanout, SinkSet, AUDIT_SINK, CHAT_SINK, DASHBOARD_SINK};
pub use providers::{HttpAuditSink, HttpDashboardSink, WebhookChatSink};
pub use sink::{AuditSink, ChatSink, DashboardSink, SinkError};
