pub mod campaign;
pub mod driver;
pub mod driver_campaign;
pub mod event;
pub mod mission;
pub mod rank;
