pub mod allocation;
pub mod matching;
pub mod missions;
pub mod progression;
pub mod scan;
