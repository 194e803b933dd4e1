pub mod analytics;
pub mod draft;
pub mod holding;
pub mod portfolio;
pub mod requests;
pub mod sort;
pub mod view;
