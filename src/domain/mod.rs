// Domain layer: request/job models, field mapping and the ports the client depends on.

pub mod mapping;
pub mod model;
pub mod ports;
