//! Courier Domain
//!
//! Event-driven email notifications: subscriptions bind a lifecycle event on an
//! entity type to a template, and every matching event renders that template
//! and mails it to the subscription's recipients.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Entity store   │  ← EntityEvents::saved / deleted
//! └────────┬────────┘
//!          │ LifecycleEvent (created | modified | deleted)
//! ┌────────▼────────┐      ┌──────────────────────┐
//! │ EventDispatcher │ ───► │ SubscriptionRegistry │  ← (event, entity type) → ids
//! └────────┬────────┘      └──────────▲───────────┘
//!          │ per match                │ attach / detach
//! ┌────────▼────────┐      ┌──────────┴───────────┐
//! │ NotificationSvc │      │ LifecycleManager     │  ← SubscriptionService hooks
//! └────────┬────────┘      └──────────────────────┘
//!          │ one email per recipient
//! ┌────────▼────────┐
//! │   EmailSender   │  ← SMTP, recording fake
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_courier::{Courier, CourierConfig, CourierStores, SmtpConfig, SmtpSender};
//! use core_config::FromEnv;
//!
//! let courier = Courier::new(
//!     CourierConfig::from_env()?,
//!     stores,
//!     catalog,
//!     Arc::new(SmtpSender::new(SmtpConfig::from_env()?)?),
//! );
//! courier.start().await?;
//!
//! // In the order store
//! let events = courier.entity_events();
//! events.saved(&"order".into(), &order, is_new).await;
//! ```

pub mod catalog;
pub mod config;
pub mod courier;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod providers;
pub mod recipients;
pub mod registry;
pub mod repository;
pub mod service;
pub mod subscriptions;
pub mod templates;

// Re-export commonly used types
pub use catalog::{
    EntityModel, EntityTypeCatalog, InMemoryEntityCatalog, StaticModel, VariableManifest,
};
pub use config::{CourierConfig, TemplateOnDelete};
pub use courier::{Courier, CourierStores};
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use error::{CourierError, CourierResult};
pub use events::{EntityEvents, LifecycleEvent, LifecycleSink};
pub use lifecycle::SubscriptionLifecycleManager;
pub use models::{
    CreateSubscription, CreateTemplate, EntityType, EventKind, Recipient, RecipientId, Site,
    Subscription, SubscriptionId, Template, UpdateSubscription, UpdateTemplate,
};
pub use providers::{EmailSender, OutgoingEmail, RecordingSender, SentEmail, SmtpConfig, SmtpSender};
pub use recipients::RecipientService;
pub use registry::{BindingKey, SubscriptionRegistry};
pub use repository::{
    InMemoryRecipientStore, InMemorySiteStore, InMemorySubscriptionStore, InMemoryTemplateStore,
    RecipientStore, SiteStore, SubscriptionStore, TemplateStore,
};
pub use service::{DeliveryFailure, DeliveryReport, NotificationService};
pub use subscriptions::SubscriptionService;
pub use templates::{TemplateRenderer, TemplateService};
