//! Checkout step names, used in logs and metric labels.

pub const STEP_LOAD_CART: &str = "load_cart";

pub const STEP_RESERVE_INVENTORY: &str = "reserve_inventory";

pub const STEP_CHECK_AMOUNT: &str = "check_amount";

pub const STEP_AUTHORIZE_PAYMENT: &str = "authorize_payment";

pub const STEP_PERSIST_ORDER: &str = "persist_order";

pub const STEP_CAPTURE_PAYMENT: &str = "capture_payment";

pub const STEP_CLEAR_CART: &str = "clear_cart";
