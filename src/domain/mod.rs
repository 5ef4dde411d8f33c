// Domain layer - Core data types for the rainfall sync
pub mod reading;
pub mod sensor;
pub mod session;
pub mod window;
