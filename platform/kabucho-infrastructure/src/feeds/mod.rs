pub mod kabu_actions;
