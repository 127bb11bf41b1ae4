pub mod acquisition;
pub mod extraction;
pub mod classify;
pub mod processor; // acquire → extract → classify → aggregate
