pub mod campaigns;
pub mod config;
pub mod core;
pub mod leads;
pub mod security;
pub mod shared;
pub mod templates;
pub mod whatsapp;
