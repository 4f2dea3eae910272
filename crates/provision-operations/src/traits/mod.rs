mod event_sink;
mod resource_provider;

pub use event_sink::{EventSink, NullSink};
pub use resource_provider::{ProvisionedResource, ResourceProvider, ResourceRequest};
