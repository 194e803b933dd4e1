pub mod add_holding_service;
pub mod analytics_service;
pub mod edit_service;
pub mod error_boundary;
pub mod portfolio_service;
pub mod selection_service;
pub mod sort_service;
pub mod upload_service;
