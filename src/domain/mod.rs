// Domain layer: message models and the ports the bridge talks through.

pub mod model;
pub mod ports;
