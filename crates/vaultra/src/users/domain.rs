use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{BusinessId, UserId};

/// Registered account. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    pub legal_entity: Option<String>,
    pub industry: Option<String>,
    pub revenue_estimate: Option<f64>,
    pub founded_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    Owner,
    Admin,
    Member,
}

impl MembershipRole {
    pub fn can_manage_business(self) -> bool {
        matches!(self, MembershipRole::Owner | MembershipRole::Admin)
    }
}

/// Links a user to a business; unique per (user, business).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub user_id: UserId,
    pub business_id: BusinessId,
    pub role: MembershipRole,
    pub created_at: DateTime<Utc>,
}

/// A partial-update slot: either left untouched or replaced with a concrete value.
///
/// JSON `null` and a missing key both deserialize to `Unset`.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Unset,
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn apply(self, slot: &mut T) {
        if let Patch::Set(value) = self {
            *slot = value;
        }
    }

    pub fn apply_optional(self, slot: &mut Option<T>) {
        if let Patch::Set(value) = self {
            *slot = Some(value);
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Set(value),
            None => Patch::Unset,
        }
    }
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub avatar_url: Patch<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        !self.name.is_set() && !self.avatar_url.is_set()
    }

    pub fn apply(self, user: &mut User) {
        self.name.apply_optional(&mut user.name);
        self.avatar_url.apply_optional(&mut user.avatar_url);
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewBusiness {
    pub name: String,
    #[serde(default)]
    pub legal_entity: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub revenue_estimate: Option<f64>,
    #[serde(default)]
    pub founded_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BusinessUpdate {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub legal_entity: Patch<String>,
    #[serde(default)]
    pub industry: Patch<String>,
    #[serde(default)]
    pub revenue_estimate: Patch<f64>,
    #[serde(default)]
    pub founded_at: Patch<NaiveDate>,
}

impl BusinessUpdate {
    pub fn apply(self, business: &mut Business) {
        self.name.apply(&mut business.name);
        self.legal_entity.apply_optional(&mut business.legal_entity);
        self.industry.apply_optional(&mut business.industry);
        self.revenue_estimate
            .apply_optional(&mut business.revenue_estimate);
        self.founded_at.apply_optional(&mut business.founded_at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessMembershipView {
    pub id: BusinessId,
    pub name: String,
    pub role: MembershipRole,
}

/// Profile payload returned by `/users/me` and the auth endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub businesses: Vec<BusinessMembershipView>,
}

impl UserProfile {
    pub fn new(user: &User, businesses: Vec<BusinessMembershipView>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
            businesses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn business() -> Business {
        let now = Utc::now();
        Business {
            id: BusinessId::new(),
            name: "Harbor Coffee".to_string(),
            legal_entity: Some("Harbor Coffee LLC".to_string()),
            industry: None,
            revenue_estimate: Some(120_000.0),
            founded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn null_and_missing_fields_stay_unset() {
        let update: BusinessUpdate =
            serde_json::from_value(json!({ "industry": "retail", "legal_entity": null }))
                .expect("update parses");
        assert_eq!(update.industry, Patch::Set("retail".to_string()));
        assert_eq!(update.legal_entity, Patch::Unset);
        assert_eq!(update.name, Patch::Unset);
    }

    #[test]
    fn apply_touches_only_set_fields() {
        let mut target = business();
        let before = target.clone();
        BusinessUpdate {
            industry: Patch::Set("food service".to_string()),
            ..BusinessUpdate::default()
        }
        .apply(&mut target);

        assert_eq!(target.industry.as_deref(), Some("food service"));
        assert_eq!(target.name, before.name);
        assert_eq!(target.legal_entity, before.legal_entity);
        assert_eq!(target.revenue_estimate, before.revenue_estimate);
    }

    #[test]
    fn only_owners_and_admins_manage() {
        assert!(MembershipRole::Owner.can_manage_business());
        assert!(MembershipRole::Admin.can_manage_business());
        assert!(!MembershipRole::Member.can_manage_business());
    }
}
