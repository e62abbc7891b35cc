pub mod join_requests;
pub mod players;
pub mod referrals;
