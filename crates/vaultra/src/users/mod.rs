//! Account profiles, businesses, and the membership checks every business-scoped
//! endpoint goes through.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    Business, BusinessMembershipView, BusinessUpdate, Membership, MembershipRole, NewBusiness,
    Patch, User, UserProfile, UserUpdate,
};
pub use repository::{BusinessRepository, UserRepository};
pub use router::users_router;
pub use service::UsersService;
