//! Product lifecycle flow: create, adjust stock, deactivate, reactivate.

use serde_json::json;

use crate::flow::Flow;
use crate::step::{StepDef, Verification};
use crate::transport::{Method, RequestSpec};

pub(crate) fn create_product() -> StepDef {
    StepDef::new(
        "create_product",
        |state| {
            let suffix = state.unique_suffix();
            RequestSpec::new(Method::Post, "/api/test/products").with_body(json!({
                "name": format!("product-{suffix}"),
                "price": 10_000,
                "description": "load test product",
                "stockQuantity": 100,
            }))
        },
        Verification::status_in("createProduct 2xx", &[200, 201]),
    )
    .with_extract(|response, state| {
        if let Some(id) = response.field("id") {
            state.set("product_id", id.clone());
        }
    })
}

pub(crate) fn update_product_stock(quantity: u64) -> StepDef {
    StepDef::new(
        "product_stock",
        move |state| {
            let id = state.path_id("product_id");
            RequestSpec::new(
                Method::Put,
                format!("/api/test/products/{id}/stock?quantity={quantity}"),
            )
        },
        Verification::status_is("productStockChange 2xx", 200),
    )
}

pub(crate) fn toggle_product_active(activate: bool) -> StepDef {
    let action = if activate { "activate" } else { "deactivate" };
    StepDef::new(
        format!("{action}_product"),
        move |state| {
            let id = state.path_id("product_id");
            RequestSpec::new(Method::Put, format!("/api/test/products/{id}/{action}"))
        },
        Verification::status_is(format!("product{action} 2xx"), 200),
    )
}

pub(crate) fn get_product() -> StepDef {
    StepDef::new(
        "get_product",
        |state| {
            let id = state.path_id("product_id");
            RequestSpec::new(Method::Get, format!("/api/test/products/{id}"))
        },
        Verification::status_is("getProduct 200", 200),
    )
}

pub fn basic_product() -> Flow {
    Flow::new(
        "basic_product",
        vec![
            create_product(),
            update_product_stock(80),
            toggle_product_active(false),
            toggle_product_active(true),
        ],
    )
}
