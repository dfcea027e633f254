use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    Business, BusinessMembershipView, BusinessUpdate, Membership, MembershipRole, NewBusiness,
    Patch, User, UserProfile, UserUpdate,
};
use super::repository::{BusinessRepository, UserRepository};
use crate::error::ApiError;
use crate::ids::{BusinessId, UserId};

/// Profile and business management plus the membership gate.
pub struct UsersService {
    users: Arc<dyn UserRepository>,
    businesses: Arc<dyn BusinessRepository>,
}

impl UsersService {
    pub fn new(users: Arc<dyn UserRepository>, businesses: Arc<dyn BusinessRepository>) -> Self {
        Self { users, businesses }
    }

    pub fn profile(&self, user_id: UserId) -> Result<UserProfile, ApiError> {
        let user = self.find_user(user_id)?;
        let businesses = self.user_businesses(user_id)?;
        Ok(UserProfile::new(&user, businesses))
    }

    pub fn update_profile(&self, user_id: UserId, update: UserUpdate) -> Result<User, ApiError> {
        let mut user = self.find_user(user_id)?;
        if update.is_empty() {
            return Ok(user);
        }
        update.apply(&mut user);
        user.updated_at = Utc::now();
        Ok(self.users.update_user(user)?)
    }

    /// Creates the business and makes `user_id` its owner.
    pub fn create_business(
        &self,
        user_id: UserId,
        request: NewBusiness,
    ) -> Result<Business, ApiError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("Business name is required"));
        }
        if request.revenue_estimate.is_some_and(|value| value < 0.0) {
            return Err(ApiError::validation(
                "Revenue estimate must not be negative",
            ));
        }

        let now = Utc::now();
        let business = Business {
            id: BusinessId::new(),
            name: name.to_string(),
            legal_entity: request.legal_entity,
            industry: request.industry,
            revenue_estimate: request.revenue_estimate,
            founded_at: request.founded_at,
            created_at: now,
            updated_at: now,
        };
        let membership = Membership {
            user_id,
            business_id: business.id,
            role: MembershipRole::Owner,
            created_at: now,
        };

        let stored = self.businesses.insert_business(business, membership)?;
        info!(business_id = %stored.id, %user_id, "business created");
        Ok(stored)
    }

    /// Applies a partial update; only owners and admins may edit.
    pub fn update_business(
        &self,
        business_id: BusinessId,
        user_id: UserId,
        update: BusinessUpdate,
    ) -> Result<Business, ApiError> {
        let membership = self.businesses.membership(user_id, business_id)?;
        if !membership.is_some_and(|membership| membership.role.can_manage_business()) {
            return Err(ApiError::forbidden("Insufficient permissions"));
        }

        let mut business = self
            .businesses
            .find_business(business_id)?
            .ok_or_else(|| ApiError::not_found("Business not found"))?;

        if let Patch::Set(name) = &update.name {
            if name.trim().is_empty() {
                return Err(ApiError::validation("Business name must not be empty"));
            }
        }

        update.apply(&mut business);
        business.updated_at = Utc::now();
        Ok(self.businesses.update_business(business)?)
    }

    pub fn user_businesses(
        &self,
        user_id: UserId,
    ) -> Result<Vec<BusinessMembershipView>, ApiError> {
        let rows = self.businesses.businesses_for_user(user_id)?;
        Ok(rows
            .into_iter()
            .map(|(business, role)| BusinessMembershipView {
                id: business.id,
                name: business.name,
                role,
            })
            .collect())
    }

    /// Membership alone gates access; whether the business exists is not consulted.
    pub fn assert_member(
        &self,
        business_id: BusinessId,
        user_id: UserId,
    ) -> Result<Membership, ApiError> {
        self.businesses
            .membership(user_id, business_id)?
            .ok_or_else(|| ApiError::forbidden("Access denied"))
    }

    pub fn find_business(&self, business_id: BusinessId) -> Result<Option<Business>, ApiError> {
        Ok(self.businesses.find_business(business_id)?)
    }

    fn find_user(&self, user_id: UserId) -> Result<User, ApiError> {
        self.users
            .find_user(user_id)?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }
}
