pub mod postgres;
pub mod whatsapp;
