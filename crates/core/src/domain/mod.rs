pub mod cart;
pub mod event;
pub mod item;
