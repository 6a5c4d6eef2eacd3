// Built-in flows
// Name-addressable business flows against the target's /api/test endpoints

pub mod composite;
pub mod order;
pub mod product;
pub mod user;

use crate::flow::Flow;

/// Look up a built-in flow by the name used in scenario configs.
pub fn builtin(name: &str) -> Option<Flow> {
    match name {
        "basic_user" => Some(user::basic_user()),
        "basic_order" => Some(order::basic_order()),
        "basic_product" => Some(product::basic_product()),
        "composite_user_order" => Some(composite::user_order()),
        "composite_product_order" => Some(composite::product_order()),
        _ => None,
    }
}

/// Names accepted by [`builtin`], for config error messages.
pub fn names() -> &'static [&'static str] {
    &[
        "basic_user",
        "basic_order",
        "basic_product",
        "composite_user_order",
        "composite_product_order",
    ]
}
