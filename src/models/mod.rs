pub mod record;
pub mod response;
pub mod ticket;
pub mod whatsapp;
