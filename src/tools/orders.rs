//! 订单状态工具（Mock 订单库）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::registry::{required_str, string_arg_schema};
use crate::tools::Tool;

enum OrderState {
    Processing {
        date_ordered: &'static str,
        estimated_delivery: &'static str,
    },
    Shipped {
        date_shipped: &'static str,
        tracking_number: &'static str,
        estimated_delivery: &'static str,
    },
    Delivered {
        delivery_date: &'static str,
        delivered_to: &'static str,
    },
    Returned {
        return_date: &'static str,
        refund_status: &'static str,
    },
}

fn lookup(order_id: &str) -> Option<OrderState> {
    let state = match order_id {
        "12345" => OrderState::Processing {
            date_ordered: "2024-01-15",
            estimated_delivery: "2-3 business days",
        },
        "67890" => OrderState::Shipped {
            date_shipped: "2024-01-16",
            tracking_number: "TRK123456789",
            estimated_delivery: "Tomorrow",
        },
        "11111" => OrderState::Delivered {
            delivery_date: "2024-01-14",
            delivered_to: "Front door",
        },
        "22222" => OrderState::Returned {
            return_date: "2024-01-10",
            refund_status: "Processed",
        },
        _ => return None,
    };
    Some(state)
}

/// 查询订单状态；已知订单的回复总包含订单号
pub fn get_order_status(order_id: &str) -> String {
    let Some(state) = lookup(order_id) else {
        return format!(
            "I couldn't find order #{order_id} in our system. Please check the order number and try again."
        );
    };
    match state {
        OrderState::Processing {
            date_ordered,
            estimated_delivery,
        } => format!(
            "Order #{order_id} is currently being processed. It was placed on {date_ordered} and will ship within {estimated_delivery}."
        ),
        OrderState::Shipped {
            date_shipped,
            tracking_number,
            estimated_delivery,
        } => format!(
            "Great news! Order #{order_id} was shipped on {date_shipped}. Your tracking number is {tracking_number} and it should arrive {}.",
            estimated_delivery.to_lowercase()
        ),
        OrderState::Delivered {
            delivery_date,
            delivered_to,
        } => format!(
            "Order #{order_id} was successfully delivered on {delivery_date} to your {}.",
            delivered_to.to_lowercase()
        ),
        OrderState::Returned {
            return_date,
            refund_status,
        } => format!(
            "Order #{order_id} was returned on {return_date}. Your refund has been {}.",
            refund_status.to_lowercase()
        ),
    }
}

pub struct OrderStatusTool;

#[async_trait]
impl Tool for OrderStatusTool {
    fn name(&self) -> &str {
        "get_order_status"
    }

    fn description(&self) -> &str {
        "Get the status of a customer order. Args: {\"order_id\": \"12345\"}"
    }

    fn parameters_schema(&self) -> Value {
        string_arg_schema("order_id", "The order number")
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        Ok(get_order_status(required_str(&args, "order_id")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_orders_mention_id() {
        for id in ["12345", "67890", "11111", "22222"] {
            let status = get_order_status(id);
            assert!(status.contains(id), "{status}");
            assert!(!status.contains("couldn't find"));
        }
        assert!(get_order_status("67890").contains("TRK123456789"));
        assert!(get_order_status("22222").contains("processed"));
    }

    #[test]
    fn test_unknown_order() {
        let status = get_order_status("99999");
        assert!(status.contains("couldn't find order #99999"));
    }

    #[tokio::test]
    async fn test_tool_missing_argument() {
        let err = OrderStatusTool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(err.contains("order_id"));
    }
}
