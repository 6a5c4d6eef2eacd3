//! Composite flows mixing user, order and product steps in one iteration.

use crate::flow::Flow;

use super::order::{create_order, update_order_status};
use super::product::{create_product, get_product, update_product_stock};
use super::user::{create_user, update_login};

pub fn user_order() -> Flow {
    Flow::new(
        "composite_user_order",
        vec![
            create_user(),
            create_order(),
            update_order_status("PAID"),
            update_login(),
        ],
    )
}

pub fn product_order() -> Flow {
    Flow::new(
        "composite_product_order",
        vec![
            create_product(),
            update_product_stock(90),
            create_user(),
            create_order(),
            update_order_status("SHIPPED"),
            get_product(),
        ],
    )
}
