pub mod calendar;
pub mod executor;
pub mod orders;
pub mod products;
pub mod registry;
pub mod returns;
pub mod schema;
pub mod shipping;

pub use calendar::{
    CalendarApi, CalendarError, CalendarToolset, CreateCalendarEventTool, GetCalendarEventsTodayTool,
    GoogleCalendarClient, CALENDAR_SCOPE, DEFAULT_CALENDAR_API,
};
pub use executor::ToolExecutor;
pub use orders::OrderStatusTool;
pub use products::ProductInfoTool;
pub use registry::{required_str, string_arg_schema, Tool, ToolRegistry};
pub use returns::ReturnPolicyTool;
pub use schema::tool_call_schema_json;
pub use shipping::ShippingInfoTool;

/// 注册四个客服 mock 工具（不含需要 OAuth 的日历工具）
pub fn support_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(OrderStatusTool);
    registry.register(ShippingInfoTool);
    registry.register(ReturnPolicyTool);
    registry.register(ProductInfoTool);
    registry
}
