pub mod dispatch;
pub mod edit;
pub mod page_store;
pub mod renderer;
pub mod save;
pub mod title;
pub mod view;
