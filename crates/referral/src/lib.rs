pub mod code_generator;
pub mod error;
pub mod notifications;
pub mod registry;
pub mod workflow;

pub use code_generator::{code_prefix, CodeGenerator, RandomCodeGenerator};
pub use error::{ReferralError, Result};
pub use notifications::{
    run_dispatcher, sign_payload, DispatchError, DynNotificationDispatcher,
    NotificationDispatcher, NotificationPublisher, TracingDispatcher, WebhookDispatcher,
};
pub use registry::{ReferralRegistry, DEFAULT_MAX_CODE_ATTEMPTS};
pub use workflow::JoinRequestWorkflow;
