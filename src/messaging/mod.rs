mod kafka;
mod simulator;

pub use kafka::KafkaTrafficConsumer;
pub use simulator::TrafficSimulator;
