pub mod corporate_action;
pub mod filing;
pub mod fundamentals;
pub mod price_bar;
pub mod trade;
