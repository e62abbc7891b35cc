pub mod connection;
pub mod error;
pub mod memory;
pub mod repositories;
pub mod store;

pub use connection::{Database, DatabaseConfig};
pub use error::{DatabaseError, Result};
pub use memory::InMemoryStore;
pub use repositories::{
    join_requests::PgJoinRequestRepository,
    players::{PgLinkageService, PgPlayerRepository},
    referrals::PgReferralRepository,
};
pub use store::{
    DynJoinRequestStore, DynLinkageService, DynPlayerRepository, DynReferralStore,
    JoinRequestStore, LinkageService, PlayerRepository, ReferralStore, ReservedInsert,
    TransitionOutcome,
};
