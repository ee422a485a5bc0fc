//! 退货政策工具（Mock 政策库，未知品类走默认政策）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::registry::{required_str, string_arg_schema};
use crate::tools::Tool;

struct ReturnPolicy {
    window: &'static str,
    condition: &'static str,
    process: &'static str,
    refund_time: &'static str,
    shipping: &'static str,
}

const DEFAULT_POLICY: ReturnPolicy = ReturnPolicy {
    window: "30 days",
    condition: "Items must be in original condition and packaging",
    process: "Contact customer service to initiate return",
    refund_time: "5-7 business days after we receive the item",
    shipping: "Return shipping policies vary by item",
};

fn policy_for(category: &str) -> ReturnPolicy {
    match category.to_lowercase().as_str() {
        "electronics" => ReturnPolicy {
            window: "30 days",
            condition: "Items must be in original packaging with all accessories",
            process: "Contact customer service to initiate return",
            refund_time: "5-7 business days after we receive the item",
            shipping: "Free return shipping on defective items",
        },
        "clothing" => ReturnPolicy {
            window: "60 days",
            condition: "Items must be unworn, unwashed, and have tags attached",
            process: "Use our online return portal or contact customer service",
            refund_time: "3-5 business days after we receive the item",
            shipping: "Customer pays return shipping unless item is defective",
        },
        "books" => ReturnPolicy {
            window: "14 days",
            condition: "Books must be in original condition with no writing or damage",
            process: "Contact customer service for return authorization",
            refund_time: "3-5 business days after we receive the item",
            shipping: "Customer pays return shipping",
        },
        _ => DEFAULT_POLICY,
    }
}

/// 品类大小写不敏感
pub fn get_return_policy(product_category: &str) -> String {
    let p = policy_for(product_category);
    format!(
        "Return policy for {product_category}:\n\n\
         • Return window: {} from delivery date\n\
         • Condition requirements: {}\n\
         • Return process: {}\n\
         • Refund timeline: {}\n\
         • Return shipping: {}",
        p.window, p.condition, p.process, p.refund_time, p.shipping
    )
}

pub struct ReturnPolicyTool;

#[async_trait]
impl Tool for ReturnPolicyTool {
    fn name(&self) -> &str {
        "get_return_policy"
    }

    fn description(&self) -> &str {
        "Get return policy information for a product category. Args: {\"product_category\": \"electronics\"}"
    }

    fn parameters_schema(&self) -> Value {
        string_arg_schema("product_category", "Product category, e.g. electronics, clothing, books")
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        Ok(get_return_policy(required_str(&args, "product_category")?))
    }
}
