mod broker;

pub use broker::UploadBroker;
