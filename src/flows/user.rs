//! User lifecycle flow: create, log in, deactivate, reactivate.

use serde_json::json;

use crate::flow::Flow;
use crate::step::{StepDef, Verification};
use crate::transport::{Method, RequestSpec};

pub(crate) fn create_user() -> StepDef {
    StepDef::new(
        "create_user",
        |state| {
            let suffix = state.unique_suffix();
            RequestSpec::new(Method::Post, "/api/test/users").with_body(json!({
                "name": format!("user-{suffix}"),
                "email": format!("user{suffix}@example.com"),
                "phoneNumber": format!("010-0000-{:04}", state.iteration() % 10_000),
            }))
        },
        Verification::status_in("createUser 2xx", &[200, 201]),
    )
    .with_extract(|response, state| {
        if let Some(id) = response.field("id") {
            state.set("user_id", id.clone());
        }
    })
}

pub(crate) fn update_login() -> StepDef {
    StepDef::new(
        "update_login",
        |state| {
            let id = state.path_id("user_id");
            RequestSpec::new(Method::Put, format!("/api/test/users/{id}/login"))
        },
        Verification::status_is("updateLogin 2xx", 200),
    )
}

pub(crate) fn toggle_user_active(activate: bool) -> StepDef {
    let action = if activate { "activate" } else { "deactivate" };
    StepDef::new(
        format!("{action}_user"),
        move |state| {
            let id = state.path_id("user_id");
            RequestSpec::new(Method::Put, format!("/api/test/users/{id}/{action}"))
        },
        Verification::status_is(format!("user{action} 2xx"), 200),
    )
}

pub fn basic_user() -> Flow {
    Flow::new(
        "basic_user",
        vec![
            create_user(),
            update_login(),
            toggle_user_active(false),
            toggle_user_active(true),
        ],
    )
}
