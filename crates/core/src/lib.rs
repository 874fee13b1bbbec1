pub mod auth;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod testing;
pub mod ticket;

pub use auth::{
    create_authenticator, AuthError, AuthRequest, Authenticator, Identity, IdentityResolver,
    IdentityState, NoneAuthenticator, SessionIdentity, SessionTokenAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    DatabaseBackend, EngineConfig, SanitizedConfig,
};
pub use engine::{
    EngineError, Snapshot, Subscription, SubscriptionHandle, SubscriptionId, TicketEngine,
    TicketSession,
};
pub use ticket::{
    create_ticket_store, CollectionPath, MemoryTicketStore, NewTicket, Priority,
    SqliteTicketStore, StoreError, Ticket, TicketId, TicketPatch, TicketQuery, TicketStats,
    TicketStatus, TicketStore, UserId,
};
