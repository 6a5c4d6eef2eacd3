//! Order lifecycle flow: create an order for a fresh user, walk it through
//! the status transitions, adjust the amount.

use serde_json::json;

use crate::flow::Flow;
use crate::step::{StepDef, Verification};
use crate::transport::{Method, RequestSpec};

use super::user::create_user;

pub(crate) fn create_order() -> StepDef {
    StepDef::new(
        "create_order",
        |state| {
            let user_id = state.get("user_id").cloned().unwrap_or(json!(null));
            RequestSpec::new(Method::Post, "/api/test/orders").with_body(json!({
                "orderNumber": format!(
                    "ORD-{}-{}",
                    state.identity().index,
                    state.iteration()
                ),
                "totalAmount": 50_000,
                "userId": user_id,
            }))
        },
        Verification::status_in("createOrder 2xx", &[200, 201]),
    )
    .with_extract(|response, state| {
        if let Some(id) = response.field("id") {
            state.set("order_id", id.clone());
        }
    })
}

pub(crate) fn update_order_status(status: &'static str) -> StepDef {
    StepDef::new(
        format!("order_status_{}", status.to_lowercase()),
        move |state| {
            let id = state.path_id("order_id");
            RequestSpec::new(
                Method::Put,
                format!("/api/test/orders/{id}/status?status={status}"),
            )
        },
        Verification::status_is(format!("orderStatus {status} 2xx"), 200),
    )
}

pub(crate) fn update_order_amount(amount: u64) -> StepDef {
    StepDef::new(
        "order_amount",
        move |state| {
            let id = state.path_id("order_id");
            RequestSpec::new(
                Method::Put,
                format!("/api/test/orders/{id}/amount?amount={amount}"),
            )
        },
        Verification::status_is("orderAmountChange 2xx", 200),
    )
}

pub fn basic_order() -> Flow {
    Flow::new(
        "basic_order",
        vec![
            create_user(),
            create_order(),
            update_order_status("PAID"),
            update_order_status("SHIPPED"),
            update_order_status("DELIVERED"),
            update_order_amount(45_000),
        ],
    )
}
