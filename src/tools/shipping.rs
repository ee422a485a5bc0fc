//! 物流信息工具（Mock 物流库）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::registry::{required_str, string_arg_schema};
use crate::tools::Tool;

struct Shipment {
    method: &'static str,
    cost: &'static str,
    status: &'static str,
    estimated_delivery: Option<&'static str>,
    tracking_number: Option<&'static str>,
    delivery_date: Option<&'static str>,
}

fn lookup(order_id: &str) -> Option<Shipment> {
    match order_id {
        "12345" => Some(Shipment {
            method: "Standard Shipping",
            cost: "Free",
            status: "Preparing for shipment",
            estimated_delivery: Some("3-5 business days"),
            tracking_number: None,
            delivery_date: None,
        }),
        "67890" => Some(Shipment {
            method: "Express Shipping",
            cost: "$9.99",
            status: "In transit",
            estimated_delivery: Some("1-2 business days"),
            tracking_number: Some("TRK123456789"),
            delivery_date: None,
        }),
        "11111" => Some(Shipment {
            method: "Priority Shipping",
            cost: "$14.99",
            status: "Delivered",
            estimated_delivery: None,
            tracking_number: None,
            delivery_date: Some("Delivered on Jan 14, 2024"),
        }),
        _ => None,
    }
}

pub fn get_shipping_info(order_id: &str) -> String {
    let Some(s) = lookup(order_id) else {
        return format!(
            "I couldn't find shipping information for order #{order_id}. \
             This might be because the order hasn't shipped yet or the order number is incorrect."
        );
    };
    let eta = s.estimated_delivery.unwrap_or("unknown");
    if let Some(delivered) = s.delivery_date {
        format!(
            "Order #{order_id} was delivered using {} ({}). {delivered}.",
            s.method, s.cost
        )
    } else if let Some(tracking) = s.tracking_number {
        format!(
            "Order #{order_id} is being shipped via {} ({}). Tracking number: {tracking}. \
             Expected delivery: {eta}. Status: {}.",
            s.method, s.cost, s.status
        )
    } else {
        format!(
            "Order #{order_id} will be shipped using {} ({}). Estimated delivery: {eta}. \
             Current status: {}.",
            s.method, s.cost, s.status
        )
    }
}

pub struct ShippingInfoTool;

#[async_trait]
impl Tool for ShippingInfoTool {
    fn name(&self) -> &str {
        "get_shipping_info"
    }

    fn description(&self) -> &str {
        "Get shipping information for a specific order. Args: {\"order_id\": \"12345\"}"
    }

    fn parameters_schema(&self) -> Value {
        string_arg_schema("order_id", "The order number")
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        Ok(get_shipping_info(required_str(&args, "order_id")?))
    }
}
