//! Sensor module - platform port interface and simulation

mod traits;
mod simulator;

pub use traits::{
    same_listener, AccuracyLevel, DeviceHandle, SamplingRate, SensorEvent, SensorListener,
    SensorPort, SensorType,
};
pub use simulator::SimulatedSensorPort;
