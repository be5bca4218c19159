pub mod import_service;
pub mod reminder_service;
