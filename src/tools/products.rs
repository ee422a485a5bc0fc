//! 产品信息工具（Mock 产品目录）

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::registry::{required_str, string_arg_schema};
use crate::tools::Tool;

struct Product {
    warranty: &'static str,
    models: &'static str,
    features: &'static str,
    shipping: &'static str,
    return_policy: &'static str,
}

fn lookup(product_type: &str) -> Option<Product> {
    match product_type.to_lowercase().as_str() {
        "laptops" => Some(Product {
            warranty: "2-year comprehensive warranty",
            models: "Available in 13-inch and 15-inch models",
            features: "High-performance processors, SSD storage, premium displays",
            shipping: "Free shipping on all orders",
            return_policy: "30-day return policy",
        }),
        "phones" => Some(Product {
            warranty: "1-year manufacturer warranty",
            models: "Multiple models available with various storage options",
            features: "Latest cameras, 5G connectivity, long battery life",
            shipping: "Free shipping on orders over $50",
            return_policy: "14-day return policy",
        }),
        "tablets" => Some(Product {
            warranty: "1-year warranty with optional extended coverage",
            models: "Available in 10-inch and 12-inch sizes",
            features: "Touch screens, stylus support, lightweight design",
            shipping: "Free shipping on all orders",
            return_policy: "30-day return policy",
        }),
        _ => None,
    }
}

pub fn get_product_info(product_type: &str) -> String {
    let Some(p) = lookup(product_type) else {
        return format!(
            "I don't have specific information about {product_type}. \
             Let me connect you with a specialist who can help with detailed product information."
        );
    };
    format!(
        "Here's what I can tell you about our {product_type}:\n\n\
         • Warranty: {}\n\
         • Models: {}\n\
         • Features: {}\n\
         • Shipping: {}\n\
         • Returns: {}",
        p.warranty, p.models, p.features, p.shipping, p.return_policy
    )
}

pub struct ProductInfoTool;

#[async_trait]
impl Tool for ProductInfoTool {
    fn name(&self) -> &str {
        "get_product_info"
    }

    fn description(&self) -> &str {
        "Get information about a specific product type. Args: {\"product_type\": \"laptops\"}"
    }

    fn parameters_schema(&self) -> Value {
        string_arg_schema("product_type", "Product type, e.g. laptops, phones, tablets")
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        Ok(get_product_info(required_str(&args, "product_type")?))
    }
}
