use super::domain::{Business, Membership, MembershipRole, User};
use crate::ids::{BusinessId, UserId};
use crate::store::RepositoryError;

/// Account storage. Emails are unique, compared case-insensitively.
pub trait UserRepository: Send + Sync {
    fn insert_user(&self, user: User) -> Result<User, RepositoryError>;
    fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn update_user(&self, user: User) -> Result<User, RepositoryError>;
}

/// Business and membership storage.
pub trait BusinessRepository: Send + Sync {
    /// Inserts the business together with its first membership in one unit of work.
    fn insert_business(
        &self,
        business: Business,
        owner: Membership,
    ) -> Result<Business, RepositoryError>;
    fn find_business(&self, id: BusinessId) -> Result<Option<Business>, RepositoryError>;
    fn update_business(&self, business: Business) -> Result<Business, RepositoryError>;
    fn membership(
        &self,
        user_id: UserId,
        business_id: BusinessId,
    ) -> Result<Option<Membership>, RepositoryError>;
    fn businesses_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(Business, MembershipRole)>, RepositoryError>;
}
